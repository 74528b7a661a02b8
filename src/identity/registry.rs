//! Name→Entity registry with layered credential inheritance.
//!
//! Entities are created in two phases: construction, then credential
//! materialization against the registry. Materialization re-runs whenever a
//! layer changes anywhere, so effective views never go stale.

use crate::core::{Result, StoreError};
use crate::identity::entity::{Entity, WILDCARD};
use crate::identity::layered::CredentialMap;
use crate::persist::envelope::{Persistable, SourceLocator};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, HashSet};

lazy_static! {
    static ref USERNAME_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_]+$").expect("valid pattern");
}

#[derive(Debug, Default)]
pub struct UserRegistry {
    entities: BTreeMap<String, Entity>,
}

impl UserRegistry {
    /// A fresh registry always holds the wildcard entity.
    pub fn new() -> Self {
        let mut registry = Self {
            entities: BTreeMap::new(),
        };
        // '*' is not a valid name for the public interface, so it is
        // inserted directly.
        registry.entities.insert(WILDCARD.to_string(), Entity::new(WILDCARD));
        registry.materialize_all();
        registry
    }

    /// Rebuild a registry from previously constructed entities.
    pub fn from_entities(entities: Vec<Entity>) -> Self {
        let mut registry = Self {
            entities: entities
                .into_iter()
                .map(|e| (e.name().to_string(), e))
                .collect(),
        };
        registry
            .entities
            .entry(WILDCARD.to_string())
            .or_insert_with(|| Entity::new(WILDCARD));
        registry.materialize_all();
        registry
    }

    pub fn validate_name(&self, name: &str) -> bool {
        USERNAME_PATTERN.is_match(name)
    }

    /// Create an entity with default credentials, inheriting from `*`.
    /// Returns `None` on an invalid or already taken name.
    pub fn make_entity(&mut self, name: &str) -> Option<&Entity> {
        if !self.validate_name(name) || self.entities.contains_key(name) {
            return None;
        }
        let mut entity = Entity::new(name);
        entity.push_base(WILDCARD);
        self.entities.insert(name.to_string(), entity);
        self.materialize_all();
        self.entities.get(name)
    }

    /// Remove an entity, first stripping it from every entity that directly
    /// inherits from it.
    pub fn remove_entity(&mut self, name: &str) -> Result<Entity> {
        if name == WILDCARD {
            return Err(StoreError::PermissionDenied(
                "this entity can not be deleted".to_string(),
            ));
        }
        if !self.entities.contains_key(name) {
            return Err(StoreError::NotFound(format!("unknown entity: {}", name)));
        }

        for entity in self.entities.values_mut() {
            if entity.inherits_directly_from(name) {
                entity.drop_base(name);
            }
        }

        let removed = self.entities.remove(name).expect("checked above");
        self.materialize_all();
        Ok(removed)
    }

    pub fn is_known_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn get_entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Does `name` hold `right` in its effective credential view?
    pub fn has_right(&self, name: &str, right: &str) -> bool {
        self.entities
            .get(name)
            .map(|e| e.has_credential(right))
            .unwrap_or(false)
    }

    pub fn grant_right(&mut self, name: &str, right: &str) -> bool {
        let Some(entity) = self.entities.get_mut(name) else {
            return false;
        };
        entity.set_credential(right, true);
        true
    }

    pub fn revoke_right(&mut self, name: &str, right: &str) -> bool {
        let Some(entity) = self.entities.get_mut(name) else {
            return false;
        };
        entity.set_credential(right, false);
        true
    }

    pub fn add_layer_to_entity(&mut self, name: &str, layer_name: &str) -> bool {
        if !self.entities.contains_key(name) || !self.entities.contains_key(layer_name) {
            return false;
        }
        self.entities
            .get_mut(name)
            .expect("checked above")
            .push_base(layer_name);
        self.materialize_all();
        true
    }

    /// Add a layer at the front, overriding every other inherited layer.
    pub fn add_guard_layer_to_entity(&mut self, name: &str, layer_name: &str) -> bool {
        if !self.entities.contains_key(name) || !self.entities.contains_key(layer_name) {
            return false;
        }
        self.entities
            .get_mut(name)
            .expect("checked above")
            .push_guard_base(layer_name);
        self.materialize_all();
        true
    }

    pub fn remove_layer_from_entity(&mut self, name: &str, layer_name: &str) -> bool {
        if !self.entities.contains_key(name) || !self.entities.contains_key(layer_name) {
            return false;
        }
        self.entities
            .get_mut(name)
            .expect("checked above")
            .drop_base(layer_name);
        self.materialize_all();
        true
    }

    /// Does `name` inherit (transitively) from `ancestor`?
    pub fn inherits_from(&self, name: &str, ancestor: &str) -> bool {
        let mut seen = HashSet::new();
        self.inherits_from_inner(name, ancestor, &mut seen)
    }

    fn inherits_from_inner<'a>(
        &'a self,
        name: &'a str,
        ancestor: &str,
        seen: &mut HashSet<&'a str>,
    ) -> bool {
        let Some(entity) = self.entities.get(name) else {
            return false;
        };
        if !seen.insert(name) {
            return false;
        }
        if entity.inherits_directly_from(ancestor) {
            return true;
        }
        entity
            .inherits()
            .iter()
            .any(|parent| self.inherits_from_inner(parent, ancestor, seen))
    }

    /// Recompute every entity's merged credential view. Children override
    /// parents; among parents, the earlier listed wins.
    fn materialize_all(&mut self) {
        let names: Vec<String> = self.entities.keys().cloned().collect();
        for name in names {
            let merged_parents: Vec<CredentialMap> = self
                .entities
                .get(&name)
                .expect("iterating own keys")
                .inherits()
                .iter()
                .map(|parent| self.effective_view(parent, &mut HashSet::new()))
                .collect();

            let entity = self.entities.get_mut(&name).expect("iterating own keys");
            let creds = entity.credentials_mut();
            creds.clear_layers();
            for layer in merged_parents {
                creds.add_layer(layer);
            }
        }
    }

    fn effective_view(&self, name: &str, seen: &mut HashSet<String>) -> CredentialMap {
        let Some(entity) = self.entities.get(name) else {
            return CredentialMap::new();
        };
        if !seen.insert(name.to_string()) {
            return CredentialMap::new();
        }

        let mut merged = CredentialMap::new();
        for parent in entity.inherits().iter().rev() {
            merged.extend(self.effective_view(parent, seen));
        }
        merged.extend(
            entity
                .credentials()
                .current()
                .iter()
                .map(|(k, v)| (k.clone(), *v)),
        );
        merged
    }
}

impl Persistable for UserRegistry {
    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/identity/registry.rs", "UserRegistry")
    }

    fn ctor_params(&self) -> Result<JsonValue> {
        let mut entities = JsonMap::new();
        for (name, entity) in &self.entities {
            entities.insert(name.clone(), entity.to_envelope()?);
        }
        Ok(json!({ "entities": entities }))
    }
}
