//! Persistence: self-describing envelopes, external-type converters, and
//! portable paths.
//!
//! The crate-wide standard registry is assembled once at first use; every
//! persistable class registers its decode function here, and action classes
//! resolve through the factory registry as a fallback.

pub mod envelope;
pub mod external;
pub mod portable;

pub use envelope::{
    nothing_envelope, to_transport, Decoded, OpaqueObject, Persistable, PersistRegistry,
    SourceLocator, OBJECT_SOURCE_KEY,
};

use crate::action::registry as action_registry;
use crate::core::{CallError, CallResult, Result, StoreError};
use crate::identity::{Entity, UserRegistry};
use crate::path::TreePath;
use crate::store::asset::{ActionBinding, Asset};
use crate::store::permissions::permissions_from_params;
use crate::store::reference::{ActiveRef, AssetReference};
use crate::store::tree::{HardLinkRecord, SymLink};
use chrono::Utc;
use lazy_static::lazy_static;
use serde_json::{json, Map as JsonMap, Value as JsonValue};

lazy_static! {
    static ref STANDARD: PersistRegistry = build_standard_registry();
}

/// The registry holding every class the crate persists.
pub fn standard() -> &'static PersistRegistry {
    &STANDARD
}

fn build_standard_registry() -> PersistRegistry {
    let mut registry = PersistRegistry::new();
    external::register_converters(&mut registry);

    registry.register("Permissions", |params, _| {
        Ok(Decoded::Permissions(permissions_from_params(params)?))
    });
    registry.register("Entity", decode_entity);
    registry.register("UserRegistry", decode_user_registry);
    registry.register("TreePath", decode_tree_path);
    registry.register("ValidResult", decode_valid_result);
    registry.register("ErrorResult", decode_error_result);
    registry.register("AssetById", decode_asset_by_id);
    registry.register("AssetByPath", decode_asset_by_path);
    registry.register("ActiveAsset", decode_active_asset);
    registry.register("SymLink", decode_sym_link);
    registry.register("HardLink", |params, _| {
        Ok(Decoded::HardLink(HardLinkRecord {
            path: str_param(params, "path")?.to_string(),
        }))
    });
    registry.register("Asset", decode_asset);

    // action classes decode through the factory registry
    registry.set_fallback(|class_name, params, _version| {
        if action_registry::has_factory(class_name) {
            Some(action_registry::build_action(class_name, params).map(Decoded::Action))
        } else {
            None
        }
    });
    registry
}

fn str_param<'a>(params: &'a JsonValue, key: &str) -> Result<&'a str> {
    params.get(key).and_then(JsonValue::as_str).ok_or_else(|| {
        StoreError::Serialization(format!("missing string parameter '{}'", key))
    })
}

fn optional_str_param(params: &JsonValue, key: &str) -> Option<String> {
    params.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

fn decode_entity(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let name = str_param(params, "name")?;
    let bases = params
        .get("bases")
        .and_then(JsonValue::as_array)
        .map(|list| {
            list.iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut entity = Entity::with_bases(name, bases);
    if let Some(meta) = params.get("meta").and_then(JsonValue::as_object) {
        entity.set_meta_map(meta.clone());
    }
    Ok(Decoded::Entity(entity))
}

fn decode_user_registry(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let mut entities = Vec::new();
    if let Some(map) = params.get("entities").and_then(JsonValue::as_object) {
        for node in map.values() {
            entities.push(standard().decode(node)?.into_entity()?);
        }
    }
    Ok(Decoded::Registry(UserRegistry::from_entities(entities)))
}

fn decode_tree_path(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    Ok(Decoded::Path(TreePath::parse(str_param(params, "path")?)?))
}

fn decode_valid_result(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    Ok(Decoded::Result(CallResult::Valid(
        params.get("value").cloned().unwrap_or(JsonValue::Null),
    )))
}

fn decode_error_result(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let prior = match params.get("prior_error") {
        None | Some(JsonValue::Null) => None,
        Some(node) => Some(Box::new(serde_json::from_value::<CallError>(node.clone())?)),
    };
    Ok(Decoded::Result(CallResult::Error(CallError {
        message: optional_str_param(params, "error_message").unwrap_or_default(),
        exception: optional_str_param(params, "exception").unwrap_or_default(),
        stacktrace: params
            .get("stack_trace")
            .and_then(JsonValue::as_array)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        prior,
    })))
}

fn decode_asset_by_id(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let id = params.get("asset_id").and_then(JsonValue::as_i64).ok_or_else(|| {
        StoreError::Serialization("AssetById params missing asset_id".to_string())
    })?;
    let mut reference = AssetReference::by_id(id);
    if let Some(name) = optional_str_param(params, "name") {
        reference = reference.named(name);
    }
    Ok(Decoded::Reference(reference))
}

fn decode_asset_by_path(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let mut reference = AssetReference::by_path(str_param(params, "path")?);
    if let Some(name) = optional_str_param(params, "name") {
        reference = reference.named(name);
    }
    Ok(Decoded::Reference(reference))
}

fn decode_active_asset(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let id = params.get("asset_id").and_then(JsonValue::as_i64).ok_or_else(|| {
        StoreError::Serialization("ActiveAsset params missing asset_id".to_string())
    })?;
    let permissions = match standard().decode_optional(params.get("permissions"))? {
        Some(decoded) => Some(decoded.into_permissions()?),
        None => None,
    };
    Ok(Decoded::ActiveRef(ActiveRef::new(id, permissions)))
}

fn decode_sym_link(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let permissions = match standard().decode_optional(params.get("permissions"))? {
        Some(decoded) => Some(decoded.into_permissions()?),
        None => None,
    };
    Ok(Decoded::SymLink(SymLink {
        path: str_param(params, "path")?.to_string(),
        permissions,
    }))
}

fn decode_asset(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let registry = standard();

    let binding = match params.get("action") {
        None | Some(JsonValue::Null) => {
            return Err(StoreError::Serialization(
                "Asset params missing action".to_string(),
            ))
        }
        Some(node) => match registry.decode(node)? {
            Decoded::Action(action) => ActionBinding::Action(action),
            Decoded::Reference(reference) => ActionBinding::Reference(reference),
            // an unknown action class survives as an opaque stand-in
            Decoded::Opaque(opaque) => ActionBinding::Action(std::sync::Arc::new(
                action_registry::OpaqueAction::new(
                    opaque.module,
                    opaque.class_name,
                    opaque.version,
                    opaque.params,
                ),
            )),
            other => {
                return Err(StoreError::Serialization(format!(
                    "asset action decoded to {}",
                    other.kind()
                )))
            }
        },
    };

    let action_args = params
        .get("action_args")
        .and_then(JsonValue::as_object)
        .cloned()
        .unwrap_or_default();

    let permissions = match registry.decode_optional(params.get("permissions"))? {
        Some(decoded) => Some(decoded.into_permissions()?),
        None => None,
    };

    let build_result = match registry.decode_optional(params.get("build_result"))? {
        Some(decoded) => Some(decoded.into_call_result()?),
        None => None,
    };

    let creation_date = match registry.decode_optional(params.get("creation_date"))? {
        Some(decoded) => decoded.into_timestamp()?,
        None => Utc::now(),
    };
    let last_modification = match registry.decode_optional(params.get("last_modification"))? {
        Some(decoded) => Some(decoded.into_timestamp()?),
        None => None,
    };
    let last_build = match registry.decode_optional(params.get("last_build"))? {
        Some(decoded) => Some(decoded.into_timestamp()?),
        None => None,
    };

    let mut dependencies = Vec::new();
    if let Some(list) = params.get("dependencies").and_then(JsonValue::as_array) {
        for node in list {
            dependencies.push(registry.decode(node)?.into_reference()?);
        }
    }

    let asset = Asset::from_parts(
        binding,
        action_args,
        permissions,
        params.get("local_id").and_then(JsonValue::as_i64).unwrap_or(-1),
        optional_str_param(params, "updater").unwrap_or_else(|| "basic".to_string()),
        params
            .get("meta")
            .cloned()
            .unwrap_or_else(|| JsonValue::Object(JsonMap::new())),
        build_result,
        creation_date,
        last_modification,
        last_build,
        dependencies,
        match params.get("asset_help") {
            None | Some(JsonValue::Null) => None,
            Some(node) => Some(node.clone()),
        },
    );
    Ok(Decoded::Asset(asset))
}

impl Persistable for TreePath {
    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/path/mod.rs", "TreePath")
    }

    fn ctor_params(&self) -> Result<JsonValue> {
        Ok(json!({ "path": self.to_string() }))
    }
}
