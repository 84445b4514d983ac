//! Lookup seam for known emission-line signatures.

use crate::domain::{Signature, SignatureKey};
use std::collections::BTreeMap;

/// Source of signature definitions keyed by `(element, shell)`.
pub trait SignatureCatalog {
    fn get(&self, key: SignatureKey) -> Option<Signature>;

    /// Every known signature, ordered by key.
    fn all(&self) -> Vec<Signature>;

    /// Resolves a persisted identifier such as `Fe:K`.
    fn resolve(&self, identifier: &str) -> Option<Signature> {
        let key = identifier.parse::<SignatureKey>().ok()?;
        self.get(key)
    }
}

/// In-memory catalog; later definitions replace earlier ones with the same key.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    signatures: BTreeMap<SignatureKey, Signature>,
}

impl StaticCatalog {
    pub fn new(signatures: impl IntoIterator<Item = Signature>) -> Self {
        signatures.into_iter().collect()
    }

    pub fn insert(&mut self, signature: Signature) -> Option<Signature> {
        self.signatures
            .insert(signature.key(), signature.with_visibility(true))
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl FromIterator<Signature> for StaticCatalog {
    fn from_iter<I: IntoIterator<Item = Signature>>(iter: I) -> Self {
        let mut catalog = Self::default();
        for signature in iter {
            catalog.insert(signature);
        }
        catalog
    }
}

impl SignatureCatalog for StaticCatalog {
    fn get(&self, key: SignatureKey) -> Option<Signature> {
        self.signatures.get(&key).cloned()
    }

    fn all(&self) -> Vec<Signature> {
        self.signatures.values().cloned().collect()
    }
}
