//! A named principal: user, group, or role. The type does not distinguish.
//! Credential keys have the form `<right>:<entity_name>`.

use crate::core::Result;
use crate::identity::layered::{CredentialMap, LayeredCredentials};
use crate::persist::envelope::{Persistable, SourceLocator};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

/// The entity every freshly created entity inherits from.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    credentials: LayeredCredentials,
    inherits_from: Vec<String>,
    meta: JsonMap<String, JsonValue>,
}

impl Entity {
    /// An entity always directly holds its own r/w/x.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut core = CredentialMap::new();
        for right in ["r", "w", "x"] {
            core.insert(format!("{}:{}", right, name), true);
        }
        Self {
            name,
            credentials: LayeredCredentials::new(core),
            inherits_from: Vec::new(),
            meta: JsonMap::new(),
        }
    }

    pub fn with_bases(name: impl Into<String>, bases: Vec<String>) -> Self {
        let mut entity = Self::new(name);
        entity.inherits_from = bases;
        entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inherits(&self) -> &[String] {
        &self.inherits_from
    }

    pub fn credentials(&self) -> &LayeredCredentials {
        &self.credentials
    }

    pub(crate) fn credentials_mut(&mut self) -> &mut LayeredCredentials {
        &mut self.credentials
    }

    pub(crate) fn push_base(&mut self, base: impl Into<String>) {
        self.inherits_from.push(base.into());
    }

    pub(crate) fn push_guard_base(&mut self, base: impl Into<String>) {
        self.inherits_from.insert(0, base.into());
    }

    pub(crate) fn drop_base(&mut self, base: &str) {
        self.inherits_from.retain(|b| b != base);
    }

    /// Grant or revoke one of this entity's own rights.
    pub fn set_credential(&mut self, right: &str, value: bool) {
        self.credentials.set(format!("{}:{}", right, self.name), value);
    }

    pub fn remove_credential(&mut self, right: &str) -> Result<()> {
        self.credentials.remove(&format!("{}:{}", right, self.name))
    }

    /// Does the entity hold its own `right` in the effective view?
    pub fn has_credential(&self, right: &str) -> bool {
        self.credentials
            .get(&format!("{}:{}", right, self.name))
            .unwrap_or(false)
    }

    /// Raw lookup into the effective credential view (inherited keys
    /// included).
    pub fn effective_credential(&self, key: &str) -> Option<bool> {
        self.credentials.get(key)
    }

    pub fn inherits_directly_from(&self, other: &str) -> bool {
        self.inherits_from.iter().any(|b| b == other)
    }

    // std properties -> metadata
    pub fn meta(&self) -> &JsonMap<String, JsonValue> {
        &self.meta
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: JsonValue) -> &mut Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn get_meta(&self, key: &str) -> Option<&JsonValue> {
        self.meta.get(key)
    }

    pub fn fullname(&self) -> Option<&str> {
        self.meta.get("fullname").and_then(JsonValue::as_str)
    }

    pub fn set_fullname(&mut self, fullname: &str) -> &mut Self {
        self.set_meta("fullname", json!(fullname))
    }

    pub fn email(&self) -> Option<&str> {
        self.meta.get("email").and_then(JsonValue::as_str)
    }

    pub fn set_email(&mut self, email: &str) -> &mut Self {
        self.set_meta("email", json!(email))
    }

    pub fn umask(&self) -> Option<u32> {
        self.meta
            .get("umask")
            .and_then(JsonValue::as_u64)
            .map(|v| v as u32)
    }

    pub fn set_umask(&mut self, umask: u32) -> &mut Self {
        self.set_meta("umask", json!(umask))
    }

    pub(crate) fn set_meta_map(&mut self, meta: JsonMap<String, JsonValue>) {
        self.meta = meta;
    }
}

impl Persistable for Entity {
    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/identity/entity.rs", "Entity")
    }

    fn ctor_params(&self) -> Result<JsonValue> {
        Ok(json!({
            "name": self.name,
            "bases": self.inherits_from,
            "meta": self.meta,
        }))
    }
}
