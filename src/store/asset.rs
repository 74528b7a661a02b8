//! The asset record: an action paired with configuration, permissions,
//! dependencies, and the captured result of its last run.
//!
//! Every public accessor and mutator synchronizes on the record's lock, and
//! each mutation bumps a version counter. `update` deliberately snapshots
//! what it needs and runs the strategy without holding the lock, so an
//! action that re-enters the store and reaches the same asset cannot
//! deadlock.

use crate::action::{Action, ArgMap};
use crate::core::{CallResult, Result, StoreError};
use crate::path::{ops, TreePath};
use crate::persist::envelope::{Persistable, SourceLocator};
use crate::persist::external;
use crate::store::permissions::Permissions;
use crate::store::reference::AssetReference;
use chrono::{DateTime, Utc};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Id of a record that has not been stored yet.
pub const UNASSIGNED_ID: i64 = -1;

pub type SharedAsset = Arc<Asset>;

/// What an asset executes: an action, or a reference to another asset whose
/// action (and argument layers) apply.
#[derive(Clone)]
pub enum ActionBinding {
    Action(Arc<dyn Action>),
    Reference(AssetReference),
}

impl ActionBinding {
    pub fn as_action(&self) -> Option<&Arc<dyn Action>> {
        match self {
            Self::Action(action) => Some(action),
            Self::Reference(_) => None,
        }
    }
}

impl fmt::Debug for ActionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(action) => write!(f, "Action({})", action.source().class_name),
            Self::Reference(reference) => write!(f, "Reference({:?})", reference),
        }
    }
}

struct AssetInner {
    binding: ActionBinding,
    action_args: ArgMap,
    permissions: Option<Permissions>,
    local_id: i64,
    updater: String,
    meta: JsonValue,
    build_result: Option<CallResult>,
    creation_date: DateTime<Utc>,
    last_modification: Option<DateTime<Utc>>,
    last_build: Option<DateTime<Utc>>,
    dependencies: Vec<AssetReference>,
    named_dependencies: Option<BTreeMap<String, AssetReference>>,
    asset_help: Option<JsonValue>,
}

pub struct Asset {
    inner: Mutex<AssetInner>,
    version: AtomicU64,
}

impl Asset {
    pub fn new(action: Arc<dyn Action>) -> Self {
        Self::with_binding(ActionBinding::Action(action))
    }

    pub fn with_reference(reference: AssetReference) -> Self {
        Self::with_binding(ActionBinding::Reference(reference))
    }

    pub fn with_binding(binding: ActionBinding) -> Self {
        Self {
            inner: Mutex::new(AssetInner {
                binding,
                action_args: ArgMap::new(),
                permissions: None,
                local_id: UNASSIGNED_ID,
                updater: "basic".to_string(),
                meta: JsonValue::Object(JsonMap::new()),
                build_result: None,
                creation_date: Utc::now(),
                last_modification: None,
                last_build: None,
                dependencies: Vec::new(),
                named_dependencies: None,
                asset_help: None,
            }),
            version: AtomicU64::new(0),
        }
    }

    // builder-style configuration for freshly created records
    pub fn with_args(self, args: ArgMap) -> Self {
        self.lock().action_args = args;
        self
    }

    pub fn with_permissions(self, permissions: Permissions) -> Self {
        self.lock().permissions = Some(permissions);
        self
    }

    pub fn with_updater(self, updater: impl Into<String>) -> Self {
        self.lock().updater = updater.into();
        self
    }

    pub fn with_help(self, help: JsonValue) -> Self {
        self.lock().asset_help = Some(help);
        self
    }

    pub fn into_shared(self) -> SharedAsset {
        Arc::new(self)
    }

    /// Reassemble a record from its persisted parts.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        binding: ActionBinding,
        action_args: ArgMap,
        permissions: Option<Permissions>,
        local_id: i64,
        updater: String,
        meta: JsonValue,
        build_result: Option<CallResult>,
        creation_date: DateTime<Utc>,
        last_modification: Option<DateTime<Utc>>,
        last_build: Option<DateTime<Utc>>,
        dependencies: Vec<AssetReference>,
        asset_help: Option<JsonValue>,
    ) -> Self {
        Self {
            inner: Mutex::new(AssetInner {
                binding,
                action_args,
                permissions,
                local_id,
                updater,
                meta,
                build_result,
                creation_date,
                last_modification,
                last_build,
                dependencies,
                named_dependencies: None,
                asset_help,
            }),
            version: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AssetInner> {
        self.inner.lock().expect("asset lock")
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn get_id(&self) -> i64 {
        self.lock().local_id
    }

    pub fn set_id(&self, local_id: i64) -> &Self {
        self.lock().local_id = local_id;
        self.bump();
        self
    }

    pub fn binding(&self) -> ActionBinding {
        self.lock().binding.clone()
    }

    pub fn set_action(&self, action: Arc<dyn Action>) -> &Self {
        let mut inner = self.lock();
        inner.binding = ActionBinding::Action(action);
        inner.last_modification = Some(Utc::now());
        drop(inner);
        self.bump();
        self
    }

    pub fn accepts_inner_access(&self) -> bool {
        match &self.lock().binding {
            ActionBinding::Action(action) => action.accepts_inner_access(),
            ActionBinding::Reference(_) => false,
        }
    }

    pub fn action_args(&self) -> ArgMap {
        self.lock().action_args.clone()
    }

    pub fn set_action_args(&self, args: ArgMap) -> &Self {
        let mut inner = self.lock();
        inner.action_args = args;
        inner.last_modification = Some(Utc::now());
        drop(inner);
        self.bump();
        self
    }

    pub fn set_arg(&self, key: impl Into<String>, value: JsonValue) -> &Self {
        let mut inner = self.lock();
        inner.action_args.insert(key.into(), value);
        inner.last_modification = Some(Utc::now());
        drop(inner);
        self.bump();
        self
    }

    pub fn permissions(&self) -> Option<Permissions> {
        self.lock().permissions.clone()
    }

    /// Permissions are mandatory for any store-gated operation.
    pub fn get_permissions(&self) -> Result<Permissions> {
        self.lock().permissions.clone().ok_or_else(|| {
            StoreError::Internal(
                "asset is not completely initialized: permissions are missing".to_string(),
            )
        })
    }

    pub fn set_permissions(&self, permissions: Permissions) -> &Self {
        self.lock().permissions = Some(permissions);
        self.bump();
        self
    }

    pub fn updater(&self) -> String {
        self.lock().updater.clone()
    }

    pub fn set_updater(&self, updater: impl Into<String>) -> &Self {
        let mut inner = self.lock();
        inner.updater = updater.into();
        inner.last_modification = Some(Utc::now());
        drop(inner);
        self.bump();
        self
    }

    /// Meta access with `_` ↔ `.` key translation, so `make_phony` reaches
    /// `meta.make.phony`.
    pub fn get_meta(&self, key: &str) -> Option<JsonValue> {
        let path = TreePath::parse(&key.replace('_', ".")).ok()?;
        let inner = self.lock();
        ops::path_get(&inner.meta, &path).cloned()
    }

    pub fn set_meta(&self, key: &str, value: JsonValue) -> Result<&Self> {
        let path = TreePath::parse(&key.replace('_', "."))?;
        let mut inner = self.lock();
        ops::path_set(&mut inner.meta, &path, value)?;
        inner.last_modification = Some(Utc::now());
        drop(inner);
        self.bump();
        Ok(self)
    }

    pub fn del_meta(&self, key: &str) -> Option<JsonValue> {
        let path = TreePath::parse(&key.replace('_', ".")).ok()?;
        let mut inner = self.lock();
        let removed = ops::path_del(&mut inner.meta, &path);
        if removed.is_some() {
            inner.last_modification = Some(Utc::now());
            drop(inner);
            self.bump();
        }
        removed
    }

    pub fn meta(&self) -> JsonValue {
        self.lock().meta.clone()
    }

    /// Marked phony: the make strategy rebuilds regardless of timestamps.
    pub fn is_phony(&self) -> bool {
        self.get_meta("make_phony")
            .map(|v| v.as_bool().unwrap_or(false))
            .unwrap_or(false)
    }

    pub fn set_phony(&self, phony: bool) -> Result<&Self> {
        self.set_meta("make_phony", json!(phony))
    }

    pub fn get_result(&self) -> Option<CallResult> {
        self.lock().build_result.clone()
    }

    /// Capture a result; a successful capture bumps the build timestamp.
    pub fn set_result(&self, result: CallResult) -> &Self {
        let mut inner = self.lock();
        inner.build_result = Some(result);
        inner.last_build = Some(Utc::now());
        drop(inner);
        self.bump();
        self
    }

    pub fn clear_result(&self) -> &Self {
        self.lock().build_result = None;
        self.bump();
        self
    }

    pub fn creation_date(&self) -> DateTime<Utc> {
        self.lock().creation_date
    }

    pub fn last_modification(&self) -> Option<DateTime<Utc>> {
        self.lock().last_modification
    }

    pub fn last_build(&self) -> Option<DateTime<Utc>> {
        self.lock().last_build
    }

    pub fn touch(&self) -> &Self {
        self.lock().last_modification = Some(Utc::now());
        self.bump();
        self
    }

    pub fn dependencies(&self) -> Vec<AssetReference> {
        self.lock().dependencies.clone()
    }

    pub fn add_dependencies(&self, dependencies: Vec<AssetReference>) -> &Self {
        let mut inner = self.lock();
        inner.dependencies.extend(dependencies);
        inner.named_dependencies = None;
        inner.last_modification = Some(Utc::now());
        drop(inner);
        self.bump();
        self
    }

    /// Lookup of a named dependency; the name index is built on first use.
    pub fn get_dependency_by_name(&self, name: &str) -> Result<AssetReference> {
        let mut inner = self.lock();
        if inner.named_dependencies.is_none() {
            let index = inner
                .dependencies
                .iter()
                .filter_map(|dep| dep.name().map(|n| (n.to_string(), dep.clone())))
                .collect();
            inner.named_dependencies = Some(index);
        }
        inner
            .named_dependencies
            .as_ref()
            .expect("built above")
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("dependency '{}' not found", name)))
    }

    /// The asset's own help record, falling back to the action's.
    pub fn get_help(&self) -> JsonValue {
        let inner = self.lock();
        if let Some(help) = &inner.asset_help {
            return help.clone();
        }
        match &inner.binding {
            ActionBinding::Action(action) => action.help().as_json(),
            ActionBinding::Reference(reference) => {
                json!({ "description": format!("reference to {:?}", reference) })
            }
        }
    }

    pub fn asset_help(&self) -> Option<JsonValue> {
        self.lock().asset_help.clone()
    }

    pub fn set_asset_help(&self, help: JsonValue) -> &Self {
        self.lock().asset_help = Some(help);
        self.bump();
        self
    }

    /// Clone the record: deep for the mutable containers, shared for the
    /// action and the result snapshot. Mutating the original afterwards
    /// must not show through the clone.
    pub fn clone_asset(&self) -> Asset {
        let inner = self.lock();
        Asset {
            inner: Mutex::new(AssetInner {
                binding: inner.binding.clone(),
                action_args: inner.action_args.clone(),
                permissions: inner.permissions.clone(),
                local_id: inner.local_id,
                updater: inner.updater.clone(),
                meta: inner.meta.clone(),
                build_result: inner.build_result.clone(),
                creation_date: inner.creation_date,
                last_modification: Some(Utc::now()),
                last_build: inner.last_build,
                dependencies: inner.dependencies.clone(),
                named_dependencies: None,
                asset_help: inner.asset_help.clone(),
            }),
            version: AtomicU64::new(0),
        }
    }

    /// Run the configured update strategy. Never unwinds: any failure is
    /// captured as the asset's error result. Returns the asset whose result
    /// was set, which may be a clone of this one.
    pub fn update(
        self: &Arc<Self>,
        context: &mut crate::store::context::UpdateContext,
        kwargs: ArgMap,
    ) -> SharedAsset {
        let outcome = crate::update::strategy_for(&self.updater())
            .and_then(|strategy| strategy.update(self, context, kwargs));
        match outcome {
            Ok(updated) => updated,
            Err(err) => {
                self.set_result(CallResult::from_store_error(&err, "update failed"));
                Arc::clone(self)
            }
        }
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Asset")
            .field("id", &inner.local_id)
            .field("binding", &inner.binding)
            .field("updater", &inner.updater)
            .finish()
    }
}

impl Persistable for Asset {
    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/store/asset.rs", "Asset")
    }

    fn ctor_params(&self) -> Result<JsonValue> {
        let inner = self.lock();

        let action = match &inner.binding {
            ActionBinding::Action(action) => crate::action::action_envelope(action.as_ref()),
            ActionBinding::Reference(reference) => reference.to_envelope()?,
        };
        let permissions = match &inner.permissions {
            Some(p) => p.to_envelope()?,
            None => JsonValue::Null,
        };
        let build_result = match &inner.build_result {
            Some(result) => result_envelope(result)?,
            None => JsonValue::Null,
        };
        let dependencies = inner
            .dependencies
            .iter()
            .map(Persistable::to_envelope)
            .collect::<Result<Vec<_>>>()?;

        Ok(json!({
            "action": action,
            "action_args": inner.action_args,
            "permissions": permissions,
            "local_id": inner.local_id,
            "updater": inner.updater,
            "meta": inner.meta,
            "build_result": build_result,
            "creation_date": external::encode_timestamp(&inner.creation_date),
            "last_modification": external::encode_optional_timestamp(inner.last_modification.as_ref()),
            "last_build": external::encode_optional_timestamp(inner.last_build.as_ref()),
            "dependencies": dependencies,
            "asset_help": inner.asset_help,
        }))
    }
}

/// Envelope form of a call result.
pub fn result_envelope(result: &CallResult) -> Result<JsonValue> {
    let source = match result {
        CallResult::Valid(_) => SourceLocator::new("[]/src/core/result.rs", "ValidResult"),
        CallResult::Error(_) => SourceLocator::new("[]/src/core/result.rs", "ErrorResult"),
    };
    let params = match result {
        CallResult::Valid(value) => json!({ "value": value }),
        CallResult::Error(error) => json!({
            "error_message": error.message,
            "exception": error.exception,
            "stack_trace": error.stacktrace,
            "prior_error": match &error.prior {
                Some(prior) => serde_json::to_value(prior)?,
                None => JsonValue::Null,
            },
        }),
    };
    Ok(json!({
        (crate::persist::envelope::OBJECT_SOURCE_KEY): [
            source.module, source.class_name, source.version, params,
        ]
    }))
}
