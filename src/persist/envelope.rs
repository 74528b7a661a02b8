//! Self-describing JSON envelopes.
//!
//! Every persistable object serializes as
//! `{"object_source": [portable_module_path, ClassName, version, params]}`.
//! Decoding routes through a registry keyed by class name; unknown classes
//! come back as an opaque carrier that preserves the payload for later
//! hand-off instead of dropping data.

use crate::action::Action;
use crate::core::{CallResult, Result, StoreError};
use crate::identity::{Entity, UserRegistry};
use crate::path::TreePath;
use crate::store::permissions::Permissions;
use crate::store::reference::{ActiveRef, AssetReference};
use crate::store::tree::{HardLinkRecord, SymLink};
use crate::store::Asset;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;

pub const OBJECT_SOURCE_KEY: &str = "object_source";

/// Stable identifier of a persistable type: portable module path, class
/// name, and the crate version that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    pub module: String,
    pub class_name: String,
    pub version: Option<String>,
}

impl SourceLocator {
    pub fn new(module: &str, class_name: &str) -> Self {
        Self {
            module: module.to_string(),
            class_name: class_name.to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}

/// Conversion into the envelope form. Implementations provide their source
/// locator and constructor parameters; the envelope shape is shared.
pub trait Persistable {
    fn source(&self) -> SourceLocator;
    fn ctor_params(&self) -> Result<JsonValue>;

    fn to_envelope(&self) -> Result<JsonValue> {
        let source = self.source();
        Ok(json!({
            (OBJECT_SOURCE_KEY): [
                source.module,
                source.class_name,
                source.version,
                self.ctor_params()?,
            ]
        }))
    }
}

/// Serialized transport form (pretty-printed JSON envelope).
pub fn to_transport(object: &dyn Persistable) -> Result<String> {
    let envelope = object.to_envelope()?;
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// The `nothing` sentinel: distinguishable from null, serialized with a
/// null source.
pub fn nothing_envelope() -> JsonValue {
    json!({ (OBJECT_SOURCE_KEY): JsonValue::Null })
}

/// Payload of an unknown class, preserved verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueObject {
    pub module: String,
    pub class_name: String,
    pub version: Option<String>,
    pub params: JsonValue,
}

impl Persistable for OpaqueObject {
    fn source(&self) -> SourceLocator {
        SourceLocator {
            module: self.module.clone(),
            class_name: self.class_name.clone(),
            version: self.version.clone(),
        }
    }

    fn ctor_params(&self) -> Result<JsonValue> {
        Ok(self.params.clone())
    }
}

/// A decoded object. Plain JSON decodes to `Json`; envelopes decode to the
/// typed variant their class registered.
pub enum Decoded {
    Json(JsonValue),
    Nothing,
    Timestamp(DateTime<Utc>),
    Duration(Duration),
    Bytes(Vec<u8>),
    Path(TreePath),
    Result(CallResult),
    Permissions(Permissions),
    Entity(Entity),
    Registry(UserRegistry),
    Reference(AssetReference),
    ActiveRef(ActiveRef),
    SymLink(SymLink),
    HardLink(HardLinkRecord),
    Asset(Asset),
    Action(Arc<dyn Action>),
    Opaque(OpaqueObject),
}

impl Decoded {
    fn mismatch(&self, wanted: &str) -> StoreError {
        StoreError::TypeMismatch(format!("decoded a {}, expected {}", self.kind(), wanted))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "Json",
            Self::Nothing => "Nothing",
            Self::Timestamp(_) => "Timestamp",
            Self::Duration(_) => "Duration",
            Self::Bytes(_) => "Bytes",
            Self::Path(_) => "TreePath",
            Self::Result(_) => "CallResult",
            Self::Permissions(_) => "Permissions",
            Self::Entity(_) => "Entity",
            Self::Registry(_) => "UserRegistry",
            Self::Reference(_) => "AssetReference",
            Self::ActiveRef(_) => "ActiveRef",
            Self::SymLink(_) => "SymLink",
            Self::HardLink(_) => "HardLink",
            Self::Asset(_) => "Asset",
            Self::Action(_) => "Action",
            Self::Opaque(_) => "Opaque",
        }
    }

    pub fn into_permissions(self) -> Result<Permissions> {
        match self {
            Self::Permissions(p) => Ok(p),
            other => Err(other.mismatch("Permissions")),
        }
    }

    pub fn into_asset(self) -> Result<Asset> {
        match self {
            Self::Asset(a) => Ok(a),
            other => Err(other.mismatch("Asset")),
        }
    }

    pub fn into_registry(self) -> Result<UserRegistry> {
        match self {
            Self::Registry(r) => Ok(r),
            other => Err(other.mismatch("UserRegistry")),
        }
    }

    pub fn into_entity(self) -> Result<Entity> {
        match self {
            Self::Entity(e) => Ok(e),
            other => Err(other.mismatch("Entity")),
        }
    }

    pub fn into_reference(self) -> Result<AssetReference> {
        match self {
            Self::Reference(r) => Ok(r),
            other => Err(other.mismatch("AssetReference")),
        }
    }

    pub fn into_action(self) -> Result<Arc<dyn Action>> {
        match self {
            Self::Action(a) => Ok(a),
            other => Err(other.mismatch("Action")),
        }
    }

    pub fn into_call_result(self) -> Result<CallResult> {
        match self {
            Self::Result(r) => Ok(r),
            other => Err(other.mismatch("CallResult")),
        }
    }

    pub fn into_timestamp(self) -> Result<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Ok(t),
            other => Err(other.mismatch("Timestamp")),
        }
    }

    pub fn into_json(self) -> Result<JsonValue> {
        match self {
            Self::Json(v) => Ok(v),
            Self::Nothing => Ok(JsonValue::Null),
            other => Err(other.mismatch("plain JSON")),
        }
    }
}

pub type DecodeFn = fn(&JsonValue, Option<&str>) -> Result<Decoded>;

/// Last-chance decoder for class names without a registered decode
/// function, e.g. action classes resolved through the factory registry.
pub type FallbackFn = fn(&str, &JsonValue, Option<&str>) -> Option<Result<Decoded>>;

/// Build-time decoder registry: class name → decode function.
#[derive(Default)]
pub struct PersistRegistry {
    decoders: HashMap<String, DecodeFn>,
    fallback: Option<FallbackFn>,
}

impl PersistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class_name: &str, decoder: DecodeFn) {
        self.decoders.insert(class_name.to_string(), decoder);
    }

    pub fn set_fallback(&mut self, fallback: FallbackFn) {
        self.fallback = Some(fallback);
    }

    pub fn knows(&self, class_name: &str) -> bool {
        self.decoders.contains_key(class_name)
    }

    /// Decode a JSON node. An envelope routes through its registered class
    /// decoder; everything else comes back as plain JSON.
    pub fn decode(&self, value: &JsonValue) -> Result<Decoded> {
        let Some(source) = value.get(OBJECT_SOURCE_KEY) else {
            return Ok(Decoded::Json(value.clone()));
        };

        if source.is_null() {
            return Ok(Decoded::Nothing);
        }

        let parts = source.as_array().ok_or_else(|| {
            StoreError::Serialization(format!("malformed object_source: {}", source))
        })?;
        if parts.len() != 4 {
            return Err(StoreError::Serialization(format!(
                "object_source must have 4 entries, got {}",
                parts.len()
            )));
        }

        let module = parts[0].as_str().unwrap_or_default().to_string();
        let class_name = parts[1].as_str().ok_or_else(|| {
            StoreError::Serialization("object_source class name is not a string".to_string())
        })?;
        let version = parts[2].as_str();
        let params = &parts[3];

        if let Some(decoder) = self.decoders.get(class_name) {
            return decoder(params, version);
        }
        if let Some(fallback) = self.fallback {
            if let Some(result) = fallback(class_name, params, version) {
                return result;
            }
        }

        tracing::warn!(class = class_name, "no decoder registered, keeping raw tree");
        Ok(Decoded::Opaque(OpaqueObject {
            module,
            class_name: class_name.to_string(),
            version: version.map(str::to_string),
            params: params.clone(),
        }))
    }

    /// Decode a possibly absent node: JSON null and the nothing sentinel
    /// both come back as `None`.
    pub fn decode_optional(&self, value: Option<&JsonValue>) -> Result<Option<Decoded>> {
        match value {
            None | Some(JsonValue::Null) => Ok(None),
            Some(node) => match self.decode(node)? {
                Decoded::Nothing => Ok(None),
                decoded => Ok(Some(decoded)),
            },
        }
    }

    pub fn from_transport(&self, packed: &str) -> Result<Decoded> {
        let value: JsonValue = serde_json::from_str(packed)?;
        self.decode(&value)
    }
}
