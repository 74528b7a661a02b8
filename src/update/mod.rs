//! Update strategies: how an asset's action is driven.
//!
//! `basic` flattens reference chains, merges argument layers, and applies
//! the read/execute permission rules. `make` walks dependencies and
//! rebuilds only when something is newer than the last build. `std` is an
//! alias of `basic`.

use crate::action::{Action, ArgMap};
use crate::core::{CallResult, Result, StoreError};
use crate::store::asset::{ActionBinding, SharedAsset};
use crate::store::context::UpdateContext;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Arc;

/// Bound on reference-chain length during action flattening.
const MAX_REFERENCE_CHAIN: usize = 32;

pub trait UpdateStrategy: Send + Sync {
    fn update(
        &self,
        asset: &SharedAsset,
        context: &mut UpdateContext,
        kwargs: ArgMap,
    ) -> Result<SharedAsset>;
}

lazy_static! {
    static ref STRATEGIES: HashMap<&'static str, Arc<dyn UpdateStrategy>> = {
        let mut table: HashMap<&'static str, Arc<dyn UpdateStrategy>> = HashMap::new();
        table.insert("basic", Arc::new(BasicStrategy));
        table.insert("std", Arc::new(BasicStrategy));
        table.insert("make", Arc::new(MakeStrategy));
        table
    };
}

pub fn strategy_for(name: &str) -> Result<Arc<dyn UpdateStrategy>> {
    STRATEGIES
        .get(name)
        .cloned()
        .ok_or_else(|| StoreError::InvalidArgument(format!("unknown update strategy: {}", name)))
}

/// Follow the asset's reference chain down to a concrete action, merging
/// argument maps on the way: for a chain `A → B → C` the effective
/// arguments are `((C.args ∪ B.args) ∪ A.args)`: the shallower layer wins
/// every collision, and the caller's arguments win over all of them.
pub fn get_action_and_args(
    asset: &SharedAsset,
    context: &UpdateContext,
) -> Result<(Arc<dyn Action>, ArgMap)> {
    let mut arg_layers = vec![asset.action_args()];
    let mut binding = asset.binding();

    for _ in 0..MAX_REFERENCE_CHAIN {
        match binding {
            ActionBinding::Action(action) => {
                let mut merged = ArgMap::new();
                for layer in arg_layers.into_iter().rev() {
                    merged.extend(layer);
                }
                return Ok((action, merged));
            }
            ActionBinding::Reference(reference) => {
                let referred = reference.resolve(context)?;
                arg_layers.push(referred.action_args());
                binding = referred.binding();
            }
        }
    }
    Err(StoreError::InvalidArgument(
        "asset reference chain too long".to_string(),
    ))
}

/// Drive pre_execute → execute → post_execute on `target`, capturing every
/// failure as the target's error result. A non-null post_execute return
/// replaces the result.
pub fn execute_action(
    target: SharedAsset,
    action: &Arc<dyn Action>,
    args: &ArgMap,
    context: &mut UpdateContext,
) -> SharedAsset {
    if let Err(err) = action.pre_execute(&target, context, args) {
        target.set_result(CallResult::from_store_error(&err, "in pre_execute()"));
        return target;
    }

    let mut result = match action.execute(&target, context, args) {
        Ok(result) => result,
        Err(err) => {
            target.set_result(CallResult::from_store_error(&err, "action failed"));
            return target;
        }
    };

    match action.post_execute(&target, context, &result, args) {
        Ok(Some(replacement)) => result = replacement,
        Ok(None) => {}
        Err(err) => {
            target.set_result(CallResult::from_store_error(&err, "in post_execute()"));
            return target;
        }
    }

    target.set_result(result);
    target
}

/// Is a rebuild due, going by result presence and timestamps?
pub fn default_update_required(asset: &SharedAsset) -> bool {
    if asset.is_phony() || asset.get_result().is_none() {
        return true;
    }
    match (asset.last_build(), asset.last_modification()) {
        (Some(build), Some(modification)) => build < modification,
        _ => false,
    }
}

/// Call the action unconditionally, not threaded.
///
/// Without caller arguments the update is a *read*: `r` is required, and
/// without `w` the action runs on a clone so the stored record stays
/// untouched. With caller arguments it is a true update: `x` is required
/// and the action always runs on a clone with the merged arguments.
pub struct BasicStrategy;

impl UpdateStrategy for BasicStrategy {
    fn update(
        &self,
        asset: &SharedAsset,
        context: &mut UpdateContext,
        kwargs: ArgMap,
    ) -> Result<SharedAsset> {
        let (action, mut args) = get_action_and_args(asset, context)?;
        let permissions = asset.get_permissions()?;

        if kwargs.is_empty() {
            if !context.permission_granted(&permissions, "r") {
                return Err(StoreError::PermissionDenied(
                    "read permission denied".to_string(),
                ));
            }
            let target = if context.permission_granted(&permissions, "w") {
                Arc::clone(asset)
            } else {
                asset.clone_asset().into_shared()
            };
            return Ok(execute_action(target, &action, &args, context));
        }

        if !context.permission_granted(&permissions, "x") {
            return Err(StoreError::PermissionDenied(
                "execute permission denied".to_string(),
            ));
        }
        args.extend(kwargs);
        let target = asset.clone_asset().into_shared();
        Ok(execute_action(target, &action, &args, context))
    }
}

/// Dependency-driven rebuild: required iff the asset is phony, has no
/// prior result, or is older than its own or any dependency's
/// modification. When required, each dependency is refreshed through
/// `update_dependency` before the asset's action runs.
pub struct MakeStrategy;

impl UpdateStrategy for MakeStrategy {
    fn update(
        &self,
        asset: &SharedAsset,
        context: &mut UpdateContext,
        kwargs: ArgMap,
    ) -> Result<SharedAsset> {
        let ActionBinding::Action(action) = asset.binding() else {
            return Err(StoreError::TypeMismatch(
                "make strategy requires a direct action".to_string(),
            ));
        };

        action.pre_update(asset, context);

        let dependencies = asset
            .dependencies()
            .iter()
            .map(|reference| reference.resolve(context))
            .collect::<Result<Vec<_>>>()?;

        let required = action.update_required(asset, context)
            || dependencies.iter().any(default_update_required);
        if !required {
            return Ok(Arc::clone(asset));
        }

        for dependency in &dependencies {
            action.update_dependency(asset, context, dependency)?;
        }

        let (flat_action, mut args) = get_action_and_args(asset, context)?;
        args.extend(kwargs);
        Ok(execute_action(Arc::clone(asset), &flat_action, &args, context))
    }
}
