//! Layered key→bool maps backing entity credentials.
//!
//! Lookups resolve against a materialized merge: the current layer wins,
//! then the layers in their order (earlier layers override later ones).
//! Writes only ever touch the current layer.

use crate::core::{Result, StoreError};
use std::collections::BTreeMap;

pub type CredentialMap = BTreeMap<String, bool>;

#[derive(Debug, Clone, Default)]
pub struct LayeredCredentials {
    current: CredentialMap,
    layers: Vec<CredentialMap>,
    merged: CredentialMap,
}

impl LayeredCredentials {
    pub fn new(current: CredentialMap) -> Self {
        let mut this = Self {
            current,
            layers: Vec::new(),
            merged: CredentialMap::new(),
        };
        this.update_merged();
        this
    }

    /// Recompute the merged view from all layers plus the current layer.
    pub fn update_merged(&mut self) {
        let mut merged = CredentialMap::new();
        for layer in self.layers.iter().rev() {
            merged.extend(layer.iter().map(|(k, v)| (k.clone(), *v)));
        }
        merged.extend(self.current.iter().map(|(k, v)| (k.clone(), *v)));
        self.merged = merged;
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.merged.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.merged.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: bool) {
        let key = key.into();
        self.current.insert(key.clone(), value);
        self.merged.insert(key, value);
    }

    /// Remove a key from the current layer. A key present only through a
    /// layer can not be removed here.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.current.remove(key).is_some() {
            self.update_merged();
            Ok(())
        } else if self.merged.contains_key(key) {
            Err(StoreError::PermissionDenied(format!(
                "key '{}' exists only in layers and cannot be removed",
                key
            )))
        } else {
            Err(StoreError::NotFound(format!("key '{}' not found", key)))
        }
    }

    pub fn add_layer(&mut self, layer: CredentialMap) {
        self.layers.push(layer);
        self.update_merged();
    }

    /// Insert a guard layer at the front, overriding all later layers.
    pub fn insert_layer(&mut self, index: usize, layer: CredentialMap) {
        self.layers.insert(index.min(self.layers.len()), layer);
        self.update_merged();
    }

    pub fn clear_layers(&mut self) {
        self.layers.clear();
        self.update_merged();
    }

    pub fn current(&self) -> &CredentialMap {
        &self.current
    }

    pub fn merged(&self) -> &CredentialMap {
        &self.merged
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }
}
