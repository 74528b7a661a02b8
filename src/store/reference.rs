//! References to assets, by id or by store path. References never own the
//! referent; resolving one re-enters the store, which keeps cyclic
//! dependency graphs representable.

use crate::core::{Result, StoreError};
use crate::persist::envelope::{Persistable, SourceLocator};
use crate::store::asset::SharedAsset;
use crate::store::context::UpdateContext;
use crate::store::permissions::Permissions;
use serde_json::{json, Value as JsonValue};

#[derive(Debug, Clone, PartialEq)]
pub enum AssetReference {
    ById { id: i64, name: Option<String> },
    ByPath { path: String, name: Option<String> },
}

impl AssetReference {
    pub fn by_id(id: i64) -> Self {
        Self::ById { id, name: None }
    }

    pub fn by_path(path: impl Into<String>) -> Self {
        Self::ByPath {
            path: path.into(),
            name: None,
        }
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        match self {
            Self::ById { id, .. } => Self::ById {
                id,
                name: Some(name.into()),
            },
            Self::ByPath { path, .. } => Self::ByPath {
                path,
                name: Some(name.into()),
            },
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::ById { name, .. } | Self::ByPath { name, .. } => name.as_deref(),
        }
    }

    /// Retrieve the referenced asset through the store.
    pub fn resolve(&self, context: &UpdateContext) -> Result<SharedAsset> {
        match self {
            Self::ById { id, .. } => context.store().acquire_by_id(*id),
            Self::ByPath { path, .. } => context.store().acquire(context, path),
        }
    }

    /// Coerce a JSON value into a reference: integers become id
    /// references, strings become path references.
    pub fn of(value: &JsonValue) -> Result<Self> {
        if let Some(id) = value.as_i64() {
            return Ok(Self::by_id(id));
        }
        if let Some(path) = value.as_str() {
            return Ok(Self::by_path(path));
        }
        Err(StoreError::TypeMismatch(format!(
            "invalid asset reference: {}",
            value
        )))
    }
}

impl Persistable for AssetReference {
    fn source(&self) -> SourceLocator {
        match self {
            Self::ById { .. } => SourceLocator::new("[]/src/store/reference.rs", "AssetById"),
            Self::ByPath { .. } => SourceLocator::new("[]/src/store/reference.rs", "AssetByPath"),
        }
    }

    fn ctor_params(&self) -> Result<JsonValue> {
        Ok(match self {
            Self::ById { id, name } => json!({ "asset_id": id, "name": name }),
            Self::ByPath { path, name } => json!({ "path": path, "name": name }),
        })
    }
}

/// An id reference flagged as inner-access-aware, mounted by the store in
/// place of the bare id. Carries its own permissions for the execute gate
/// of inner accesses.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRef {
    asset_id: i64,
    permissions: Option<Permissions>,
}

impl ActiveRef {
    pub fn new(asset_id: i64, permissions: Option<Permissions>) -> Self {
        Self {
            asset_id,
            permissions,
        }
    }

    pub fn asset_id(&self) -> i64 {
        self.asset_id
    }

    pub fn permissions(&self) -> Option<&Permissions> {
        self.permissions.as_ref()
    }

    pub fn set_permissions(&mut self, permissions: Option<Permissions>) {
        self.permissions = permissions;
    }

    pub fn resolve(&self, context: &UpdateContext) -> Result<SharedAsset> {
        context.store().acquire_by_id(self.asset_id)
    }
}

impl Persistable for ActiveRef {
    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/store/reference.rs", "ActiveAsset")
    }

    fn ctor_params(&self) -> Result<JsonValue> {
        let permissions = match &self.permissions {
            Some(p) => p.to_envelope()?,
            None => JsonValue::Null,
        };
        Ok(json!({ "asset_id": self.asset_id, "permissions": permissions }))
    }
}
