use crate::common::elements::Element;
use crate::domain::{ShellType, SignatureKey};
use std::collections::BTreeMap;

/// Per-element concentration estimate in ppm, relative to the measured total.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Concentrations {
    ppm: BTreeMap<Element, f64>,
}

impl Concentrations {
    /// Picks one signature per element, K over L over M, and shares the total
    /// of `intensity` across those picks.
    pub fn calculate(
        signatures: &[SignatureKey],
        intensity: impl Fn(SignatureKey) -> f64,
    ) -> Self {
        let mut chosen: BTreeMap<Element, SignatureKey> = BTreeMap::new();
        for shell in [ShellType::M, ShellType::L, ShellType::K] {
            for key in signatures.iter().filter(|key| key.shell == shell) {
                chosen.insert(key.element, *key);
            }
        }

        let intensities: BTreeMap<Element, f64> = chosen
            .into_iter()
            .map(|(element, key)| (element, intensity(key)))
            .collect();
        let total: f64 = intensities.values().sum();

        let ppm = intensities
            .into_iter()
            .map(|(element, value)| {
                let share = if total != 0.0 { value / total * 1.0e6 } else { 0.0 };
                (element, share)
            })
            .collect();
        Self { ppm }
    }

    pub fn get(&self, element: Element) -> f64 {
        self.ppm.get(&element).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, element: Element) -> bool {
        self.ppm.contains_key(&element)
    }

    pub fn is_empty(&self) -> bool {
        self.ppm.is_empty()
    }

    /// One-decimal percentage, e.g. `12.5%`.
    pub fn percent(&self, element: Element) -> String {
        format!("{:.1}%", self.get(element) / 10_000.0)
    }

    pub fn elements_by_z(&self) -> Vec<Element> {
        self.ppm.keys().copied().collect()
    }

    /// Highest concentration first; ties keep ascending atomic number.
    pub fn elements_by_concentration(&self) -> Vec<Element> {
        let mut elements = self.elements_by_z();
        elements.sort_by(|lhs, rhs| self.get(*rhs).total_cmp(&self.get(*lhs)));
        elements
    }
}
