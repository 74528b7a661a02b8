//! The action contract and its support cast: help records, value
//! predicates, multi-variant dispatch, factories, and the built-in tooling
//! actions.

pub mod builtin;
pub mod dispatch;
pub mod help;
pub mod predicate;
pub mod registry;

pub use dispatch::{ArgMap, DispatchTable, ParamType, VariantSpec};
pub use help::Help;
pub use registry::{build_action, has_factory, register_factory, ActionMount, ActionRegistry};

use crate::core::{CallResult, Result, StoreError};
use crate::persist::envelope::SourceLocator;
use crate::store::asset::SharedAsset;
use crate::store::context::UpdateContext;
use serde_json::{json, Value as JsonValue};

/// Argument key carrying trailing path components of an inner access.
pub const INNER_GET: &str = "_inner_get";
/// Argument keys of the write/delete flavors of the inner-access protocol.
pub const INNER_SET: &str = "_inner_set";
pub const INNER_DEL: &str = "_inner_del";
/// Companion value argument of [`INNER_SET`].
pub const INNER_VALUE: &str = "inner_value";

/// The contract every asset action implements.
///
/// `execute` returns a [`CallResult`] (or an error, which the update
/// machinery captures as one); `pre_execute`/`post_execute` observe the
/// invocation, and a non-null `post_execute` return replaces the result.
/// The make strategy drives `pre_update`, `update_required`, and
/// `update_dependency`.
pub trait Action: Send + Sync {
    fn execute(
        &self,
        asset: &SharedAsset,
        context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult>;

    fn pre_execute(
        &self,
        _asset: &SharedAsset,
        _context: &mut UpdateContext,
        _args: &ArgMap,
    ) -> Result<()> {
        Ok(())
    }

    fn post_execute(
        &self,
        _asset: &SharedAsset,
        _context: &mut UpdateContext,
        _result: &CallResult,
        _args: &ArgMap,
    ) -> Result<Option<CallResult>> {
        Ok(None)
    }

    /// Called immediately before dependencies are updated.
    fn pre_update(&self, _asset: &SharedAsset, _context: &mut UpdateContext) {}

    fn update_required(&self, asset: &SharedAsset, _context: &mut UpdateContext) -> bool {
        crate::update::default_update_required(asset)
    }

    /// How the make strategy refreshes one dependency. The default updates
    /// it with no parameters.
    fn update_dependency(
        &self,
        _asset: &SharedAsset,
        context: &mut UpdateContext,
        dependency: &SharedAsset,
    ) -> Result<SharedAsset> {
        Ok(dependency.update(context, ArgMap::new()))
    }

    fn help(&self) -> Help;

    /// Opting in promotes the mount into an active asset: trailing path
    /// components are forwarded as inner-access arguments.
    fn accepts_inner_access(&self) -> bool {
        false
    }

    // persistence hooks
    fn source(&self) -> SourceLocator;

    /// Stateless actions serialize an empty parameter block.
    fn ctor_params(&self) -> JsonValue {
        json!({})
    }
}

/// Envelope form of an action, mirroring `Persistable::to_envelope`.
pub fn action_envelope(action: &dyn Action) -> JsonValue {
    let source = action.source();
    json!({
        (crate::persist::envelope::OBJECT_SOURCE_KEY): [
            source.module,
            source.class_name,
            source.version,
            action.ctor_params(),
        ]
    })
}

pub fn required_parameter<'a>(args: &'a ArgMap, key: &str) -> Result<&'a JsonValue> {
    args.get(key).ok_or_else(|| {
        StoreError::InvalidArgument(format!("required '{}' parameter missing", key))
    })
}

pub fn required_str_parameter<'a>(args: &'a ArgMap, key: &str) -> Result<&'a str> {
    required_parameter(args, key)?.as_str().ok_or_else(|| {
        StoreError::TypeMismatch(format!("parameter '{}' must be a string", key))
    })
}

pub fn optional_parameter<'a>(args: &'a ArgMap, key: &str) -> Option<&'a JsonValue> {
    args.get(key)
}

/// This action does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAction;

impl Action for NoAction {
    fn execute(
        &self,
        _asset: &SharedAsset,
        _context: &mut UpdateContext,
        _args: &ArgMap,
    ) -> Result<CallResult> {
        Ok(CallResult::valid(JsonValue::Null))
    }

    fn help(&self) -> Help {
        Help::new("This action does nothing.")
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/action/mod.rs", "NoAction")
    }
}
