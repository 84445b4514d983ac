use crate::common::elements::Element;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Principal atomic shell an emission-line group originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShellType {
    K,
    L,
    M,
}

impl ShellType {
    pub const ALL: [ShellType; 3] = [Self::K, Self::L, Self::M];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::K => "K",
            Self::L => "L",
            Self::M => "M",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "K" => Some(Self::K),
            "L" => Some(Self::L),
            "M" => Some(Self::M),
            _ => None,
        }
    }
}

impl Display for ShellType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical `(element, shell)` identity of a signature.
///
/// Every map keyed by signature uses this type, so decorated variants (custom
/// lines, hidden flags) can never produce a second entry for the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignatureKey {
    pub element: Element,
    pub shell: ShellType,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureKeyParseError {
    #[error("signature identifier '{identifier}' must have the form 'Symbol:Shell'")]
    Malformed { identifier: String },
    #[error("signature identifier '{identifier}' names unknown element '{symbol}'")]
    UnknownElement { identifier: String, symbol: String },
    #[error("signature identifier '{identifier}' names unknown shell '{shell}'")]
    UnknownShell { identifier: String, shell: String },
}

impl SignatureKey {
    pub const fn new(element: Element, shell: ShellType) -> Self {
        Self { element, shell }
    }

    /// Stable identifier used by persisted calibration profiles, e.g. `Fe:K`.
    pub fn identifier(&self) -> String {
        self.to_string()
    }
}

impl Display for SignatureKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.element, self.shell)
    }
}

impl FromStr for SignatureKey {
    type Err = SignatureKeyParseError;

    fn from_str(identifier: &str) -> Result<Self, Self::Err> {
        let (symbol, shell) =
            identifier
                .split_once(':')
                .ok_or_else(|| SignatureKeyParseError::Malformed {
                    identifier: identifier.to_string(),
                })?;
        let element =
            Element::from_symbol(symbol).ok_or_else(|| SignatureKeyParseError::UnknownElement {
                identifier: identifier.to_string(),
                symbol: symbol.to_string(),
            })?;
        let shell =
            ShellType::from_label(shell).ok_or_else(|| SignatureKeyParseError::UnknownShell {
                identifier: identifier.to_string(),
                shell: shell.to_string(),
            })?;
        Ok(Self { element, shell })
    }
}

impl Serialize for SignatureKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.identifier())
    }
}

impl<'de> Deserialize<'de> for SignatureKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let identifier = String::deserialize(deserializer)?;
        identifier.parse().map_err(serde::de::Error::custom)
    }
}

/// One emission line: energy in keV and strength relative to its series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionLine {
    pub energy: f64,
    pub relative_intensity: f64,
}

impl EmissionLine {
    pub const fn new(energy: f64, relative_intensity: f64) -> Self {
        Self {
            energy,
            relative_intensity,
        }
    }
}

/// An element/shell emission-line group used as a fitting template.
///
/// Equality, hashing and ordering only consider the canonical key; line data and
/// visibility are decoration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    element: Element,
    shell: ShellType,
    #[serde(default)]
    lines: Vec<EmissionLine>,
    #[serde(default = "default_visible")]
    visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Signature {
    pub fn new(element: Element, shell: ShellType, lines: Vec<EmissionLine>) -> Self {
        Self {
            element,
            shell,
            lines,
            visible: true,
        }
    }

    /// Line-less canonical signature used for calibration bookkeeping.
    pub fn blank(key: SignatureKey) -> Self {
        Self::new(key.element, key.shell, Vec::new())
    }

    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub const fn key(&self) -> SignatureKey {
        SignatureKey::new(self.element, self.shell)
    }

    pub const fn element(&self) -> Element {
        self.element
    }

    pub const fn shell(&self) -> ShellType {
        self.shell
    }

    pub fn lines(&self) -> &[EmissionLine] {
        &self.lines
    }

    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn strongest_line(&self) -> Option<&EmissionLine> {
        self.lines.iter().max_by(|lhs, rhs| {
            lhs.relative_intensity
                .total_cmp(&rhs.relative_intensity)
                .then_with(|| rhs.energy.total_cmp(&lhs.energy))
        })
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Signature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Signature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.key(), f)
    }
}

impl From<&Signature> for SignatureKey {
    fn from(signature: &Signature) -> Self {
        signature.key()
    }
}
