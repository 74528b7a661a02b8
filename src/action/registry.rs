//! Action factories and declarative mounts.
//!
//! Factories are the reload indirection: the persistence layer resolves an
//! action class name to a factory, so rebinding a factory (or re-invoking
//! it) refreshes actions without touching stored records. Mounts are the
//! declarative bundle of (factory, store path, owner, group, mode, args)
//! that populates the tree at startup.

use crate::action::{Action, ArgMap, Help};
use crate::core::{Result, StoreError};
use crate::persist::envelope::SourceLocator;
use crate::store::asset::{Asset, SharedAsset};
use crate::store::context::UpdateContext;
use lazy_static::lazy_static;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Once, RwLock};

pub type ActionFactory = fn(&JsonValue) -> Result<Arc<dyn Action>>;

lazy_static! {
    static ref FACTORIES: RwLock<HashMap<String, ActionFactory>> = RwLock::new(HashMap::new());
}

static BUILTIN_FACTORIES: Once = Once::new();

fn ensure_builtin_factories() {
    BUILTIN_FACTORIES.call_once(crate::action::builtin::register_factories);
}

/// Bind (or rebind) a factory for an action class name.
///
/// Called from inside the one-time builtin registration as well, so it must
/// not trigger that registration itself.
pub fn register_factory(class_name: &str, factory: ActionFactory) {
    FACTORIES
        .write()
        .expect("factory lock")
        .insert(class_name.to_string(), factory);
    tracing::debug!(class = class_name, "registered action factory");
}

pub fn has_factory(class_name: &str) -> bool {
    ensure_builtin_factories();
    FACTORIES.read().expect("factory lock").contains_key(class_name)
}

/// Instantiate an action through its registered factory.
pub fn build_action(class_name: &str, params: &JsonValue) -> Result<Arc<dyn Action>> {
    ensure_builtin_factories();
    let factory = FACTORIES
        .read()
        .expect("factory lock")
        .get(class_name)
        .copied()
        .ok_or_else(|| {
            StoreError::Reload(format!("no factory registered for action '{}'", class_name))
        })?;
    factory(params)
}

/// Stand-in for an action whose class is not registered. The original
/// envelope survives re-serialization untouched; executing it reports the
/// missing factory.
pub struct OpaqueAction {
    module: String,
    class_name: String,
    version: Option<String>,
    params: JsonValue,
}

impl OpaqueAction {
    pub fn new(
        module: String,
        class_name: String,
        version: Option<String>,
        params: JsonValue,
    ) -> Self {
        Self {
            module,
            class_name,
            version,
            params,
        }
    }
}

impl Action for OpaqueAction {
    fn execute(
        &self,
        _asset: &SharedAsset,
        _context: &mut UpdateContext,
        _args: &ArgMap,
    ) -> Result<crate::core::CallResult> {
        Err(StoreError::Reload(format!(
            "action class '{}' is not registered",
            self.class_name
        )))
    }

    fn help(&self) -> Help {
        Help::new(format!("unavailable action '{}'", self.class_name))
    }

    fn source(&self) -> SourceLocator {
        SourceLocator {
            module: self.module.clone(),
            class_name: self.class_name.clone(),
            version: self.version.clone(),
        }
    }

    fn ctor_params(&self) -> JsonValue {
        self.params.clone()
    }
}

/// One declarative mount: which action to build, where to put it, and who
/// owns it.
#[derive(Debug, Clone)]
pub struct ActionMount {
    pub path: String,
    pub user: String,
    pub group: String,
    pub mode: String,
    pub factory: String,
    pub factory_params: JsonValue,
    pub action_args: ArgMap,
    pub updater: Option<String>,
}

impl ActionMount {
    pub fn new(path: &str, factory: &str) -> Self {
        Self {
            path: path.to_string(),
            user: "root".to_string(),
            group: "system".to_string(),
            mode: "775".to_string(),
            factory: factory.to_string(),
            factory_params: json!({}),
            action_args: ArgMap::new(),
            updater: None,
        }
    }

    pub fn mode(mut self, mode: &str) -> Self {
        self.mode = mode.to_string();
        self
    }

    pub fn owner(mut self, user: &str, group: &str) -> Self {
        self.user = user.to_string();
        self.group = group.to_string();
        self
    }

    pub fn factory_params(mut self, params: JsonValue) -> Self {
        self.factory_params = params;
        self
    }

    pub fn arg(mut self, key: &str, value: JsonValue) -> Self {
        self.action_args.insert(key.to_string(), value);
        self
    }

    pub fn updater(mut self, updater: &str) -> Self {
        self.updater = Some(updater.to_string());
        self
    }
}

/// The declarative mount registry, populated once and materialized into
/// the tree under each mount's own identity.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    mounts: Vec<ActionMount>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in tooling surface.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(ActionMount::new("bin.ls", "ReadDir").mode("755"));
        registry.add(ActionMount::new("bin.help", "GetHelp").mode("755"));
        registry.add(ActionMount::new("bin.info", "GetAssetInfo"));
        registry.add(ActionMount::new("bin.call", "CallAsset").mode("755"));
        registry.add(ActionMount::new("bin.reload", "UpdateAssetAction").mode("770"));
        registry.add(ActionMount::new("bin.base64", "Base64Encoding"));
        registry.add(
            ActionMount::new("www.index", "CallAsset")
                .mode("755")
                .arg("_ref", json!("bin.ls")),
        );
        registry
    }

    pub fn add(&mut self, mount: ActionMount) {
        self.mounts.push(mount);
    }

    pub fn mounts(&self) -> &[ActionMount] {
        &self.mounts
    }

    /// Build and store every mount's asset. Each store runs under the
    /// mount's owner identity, so ownership and permission synthesis come
    /// out right.
    pub fn create_registered(&self, context: &UpdateContext) -> Result<()> {
        for mount in &self.mounts {
            let action = build_action(&mount.factory, &mount.factory_params)?;
            let mut asset = Asset::new(action).with_args(mount.action_args.clone());
            if let Some(updater) = &mount.updater {
                asset = asset.with_updater(updater.clone());
            }
            let asset = asset.into_shared();

            let mut mount_context = context.fork();
            mount_context.push_identity(&mount.user, &mount.group);
            context.store().store(
                &mount_context,
                &asset,
                Some(&mount.path),
                None,
                Some(mount.mode.as_str().into()),
            )?;
            tracing::info!(path = %mount.path, factory = %mount.factory, "mounted action");
        }
        Ok(())
    }
}
