use crate::domain::SignatureKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Known composition of a physical standard sample.
///
/// Concentrations are keyed by canonical signature; `anchor` names the entry
/// every profile built from this reference is normalized against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReference {
    id: String,
    name: String,
    anchor: SignatureKey,
    #[serde(default)]
    concentrations: BTreeMap<SignatureKey, f64>,
}

impl CalibrationReference {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        anchor: SignatureKey,
        concentrations: impl IntoIterator<Item = (SignatureKey, f64)>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            anchor,
            concentrations: concentrations.into_iter().collect(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn anchor(&self) -> SignatureKey {
        self.anchor
    }

    pub fn contains(&self, key: impl Into<SignatureKey>) -> bool {
        self.concentrations.contains_key(&key.into())
    }

    pub fn concentration(&self, key: impl Into<SignatureKey>) -> Option<f64> {
        self.concentrations.get(&key.into()).copied()
    }

    pub fn concentrations(&self) -> &BTreeMap<SignatureKey, f64> {
        &self.concentrations
    }
}

/// Resolves calibration references by their stable id.
pub trait ReferenceLibrary {
    fn reference(&self, id: &str) -> Option<CalibrationReference>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryReferenceLibrary {
    references: BTreeMap<String, CalibrationReference>,
}

impl InMemoryReferenceLibrary {
    pub fn new(references: impl IntoIterator<Item = CalibrationReference>) -> Self {
        Self {
            references: references
                .into_iter()
                .map(|reference| (reference.id.clone(), reference))
                .collect(),
        }
    }

    pub fn insert(&mut self, reference: CalibrationReference) {
        self.references.insert(reference.id.clone(), reference);
    }
}

impl ReferenceLibrary for InMemoryReferenceLibrary {
    fn reference(&self, id: &str) -> Option<CalibrationReference> {
        self.references.get(id).cloned()
    }
}
