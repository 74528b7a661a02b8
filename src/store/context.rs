//! The carrier every store and asset operation runs under: store handle,
//! user registry, and a stack of `(user, group)` identity frames for
//! setuid-like elevation.

use crate::core::{Result, StoreError};
use crate::identity::UserRegistry;
use crate::store::permissions::{Mode, Permissions};
use crate::store::store::AssetStore;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type SharedRegistry = Arc<RwLock<UserRegistry>>;

pub struct UpdateContext {
    store: Arc<AssetStore>,
    user_registry: SharedRegistry,
    user: String,
    group: String,
    identity: Vec<(String, String)>,
    extras: HashMap<String, JsonValue>,
}

impl UpdateContext {
    pub fn new(
        store: Arc<AssetStore>,
        user_registry: SharedRegistry,
        user: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        let user = user.into();
        let group = group.into();
        Self {
            store,
            user_registry,
            identity: vec![(user.clone(), group.clone())],
            user,
            group,
            extras: HashMap::new(),
        }
    }

    /// A fresh context with the same store, registry, and base identity,
    /// for running one request.
    pub fn fork(&self) -> Self {
        Self::new(
            Arc::clone(&self.store),
            Arc::clone(&self.user_registry),
            self.user.clone(),
            self.group.clone(),
        )
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.store
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.user_registry
    }

    pub fn push_identity(&mut self, user: impl Into<String>, group: impl Into<String>) {
        self.identity.push((user.into(), group.into()));
    }

    pub fn pop_identity(&mut self) -> Result<(String, String)> {
        if self.identity.len() > 1 {
            Ok(self.identity.pop().expect("len checked"))
        } else {
            Err(StoreError::PermissionDenied(
                "base identity can not be removed".to_string(),
            ))
        }
    }

    /// Effective user: the top identity frame.
    pub fn get_user(&self) -> &str {
        &self.identity.last().expect("never empty").0
    }

    pub fn get_group(&self) -> &str {
        &self.identity.last().expect("never empty").1
    }

    pub fn real_user(&self) -> &str {
        &self.user
    }

    pub fn real_group(&self) -> &str {
        &self.group
    }

    pub fn permission_granted(&self, permissions: &Permissions, right: &str) -> bool {
        let registry = self.user_registry.read().expect("registry lock");
        permissions.is_right_granted(&registry, self.get_user(), right)
    }

    /// Permissions for the effective identity, derived from `mode`.
    pub fn make_permissions(&self, mode: Option<Mode>) -> Result<Permissions> {
        let registry = self.user_registry.read().expect("registry lock");
        Permissions::make(&registry, self.get_user(), Some(self.get_group()), mode)
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: JsonValue) {
        self.extras.insert(key.into(), value);
    }

    pub fn get_extra(&self, key: &str) -> Option<&JsonValue> {
        self.extras.get(key)
    }

    pub fn set_mimetype(&mut self, mimetype: &str) {
        self.set_extra("mimetype", JsonValue::String(mimetype.to_string()));
    }

    pub fn mimetype(&self) -> Option<&str> {
        self.get_extra("mimetype").and_then(JsonValue::as_str)
    }
}
