//! The reload action: create or replace an asset from an action
//! description, or rebuild an existing asset's action from its registered
//! factory. Rebuilding swaps in a fresh action instance while the stored
//! record survives untouched.

use crate::action::dispatch::{ArgMap, DispatchTable, ParamType, VariantSpec};
use crate::action::predicate::call;
use crate::action::registry::{build_action, has_factory};
use crate::action::{Action, Help};
use crate::core::schema::Schema;
use crate::core::{CallResult, Result, StoreError};
use crate::persist::envelope::SourceLocator;
use crate::store::asset::{ActionBinding, Asset, SharedAsset};
use crate::store::context::UpdateContext;
use crate::store::permissions::Mode;
use lazy_static::lazy_static;
use serde_json::{json, Value as JsonValue};

lazy_static! {
    /// `{action: {module_path, class_name, args?}, action_args?, mode}`
    static ref ASSET_DESCRIPTION_SCHEMA: Schema = Schema::object(vec![
        (
            "action",
            Schema::object(vec![
                ("module_path", Schema::of(ParamType::Str)),
                ("class_name", Schema::of(ParamType::Str)),
                ("args", Schema::optional(Schema::of(ParamType::Map))),
            ]),
        ),
        ("action_args", Schema::optional(Schema::of(ParamType::Map))),
        (
            "mode",
            Schema::choice(vec![Schema::of(ParamType::Int), Schema::of(ParamType::Str)]),
        ),
    ]);
}

pub fn valid_asset_description(value: &JsonValue) -> bool {
    ASSET_DESCRIPTION_SCHEMA.validate(value, None)
}

/// Convenience constructor for the description map.
pub fn make_asset_description(
    module_path: &str,
    class_name: &str,
    mode: &str,
    action_args: Option<JsonValue>,
    asset_action_args: Option<JsonValue>,
) -> Result<JsonValue> {
    let mut action = json!({
        "module_path": module_path,
        "class_name": class_name,
    });
    if let Some(args) = action_args {
        action["args"] = args;
    }

    let mut description = json!({ "action": action, "mode": mode });
    if let Some(args) = asset_action_args {
        description["action_args"] = args;
    }

    if !valid_asset_description(&description) {
        return Err(StoreError::InvalidArgument(format!(
            "invalid asset description: {}",
            description
        )));
    }
    Ok(description)
}

fn description_mode(description: &JsonValue) -> Mode {
    match &description["mode"] {
        JsonValue::Number(n) => Mode::Bits(n.as_u64().unwrap_or(0) as u32),
        other => Mode::Text(other.as_str().unwrap_or("775").to_string()),
    }
}

fn create_from_description(
    context: &mut UpdateContext,
    path_to_asset: &str,
    description: &JsonValue,
) -> Result<CallResult> {
    let action_description = &description["action"];
    let class_name = action_description["class_name"]
        .as_str()
        .expect("validated shape");
    let ctor_params = action_description
        .get("args")
        .cloned()
        .unwrap_or_else(|| json!({}));

    let action = build_action(class_name, &ctor_params)?;
    let action_args = description
        .get("action_args")
        .and_then(JsonValue::as_object)
        .cloned()
        .unwrap_or_default();

    let created = Asset::new(action).with_args(action_args).into_shared();
    context.store().store(
        context,
        &created,
        Some(path_to_asset),
        None,
        Some(description_mode(description)),
    )?;
    Ok(CallResult::valid(json!(format!(
        "stored {} in {}",
        class_name, path_to_asset
    ))))
}

fn rebuild_existing(context: &mut UpdateContext, path_to_asset: &str) -> Result<CallResult> {
    let asset = context.store().acquire(context, path_to_asset)?;
    let ActionBinding::Action(action) = asset.binding() else {
        return Err(StoreError::Reload(format!(
            "asset at '{}' holds a reference, not an action",
            path_to_asset
        )));
    };

    let class_name = action.source().class_name;
    if !has_factory(&class_name) {
        return Err(StoreError::Reload(format!(
            "no factory registered for action '{}'",
            class_name
        )));
    }

    let rebuilt = build_action(&class_name, &action.ctor_params())?;
    asset.set_action(rebuilt);
    Ok(CallResult::valid(json!(format!(
        "reloaded {} in {}",
        class_name, path_to_asset
    ))))
}

pub struct UpdateAssetAction {
    table: DispatchTable,
}

impl Default for UpdateAssetAction {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateAssetAction {
    pub fn new() -> Self {
        let table = DispatchTable::new("UpdateAssetAction")
            .variant(
                VariantSpec::new()
                    .required("path_to_asset", ParamType::Str)
                    .guarded(
                        "asset_description",
                        ParamType::Map,
                        call("valid_asset_description", valid_asset_description),
                    ),
                |_asset, context, args| {
                    let path = args["path_to_asset"].as_str().expect("declared as string");
                    create_from_description(context, path, &args["asset_description"])
                },
            )
            .variant(
                VariantSpec::new().required("path_to_asset", ParamType::Str),
                |_asset, context, args| {
                    let path = args["path_to_asset"].as_str().expect("declared as string");
                    rebuild_existing(context, path)
                },
            )
            .variant(VariantSpec::new().rest(), |_asset, _context, _args| {
                Err(StoreError::InvalidArgument(
                    "no matching handler found".to_string(),
                ))
            });
        Self { table }
    }
}

impl Action for UpdateAssetAction {
    fn execute(
        &self,
        asset: &SharedAsset,
        context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult> {
        self.table.dispatch(asset, context, args)
    }

    fn help(&self) -> Help {
        Help::new("Create or reload an asset's action through the factory registry")
            .returns("a status message")
            .arg("path_to_asset", "str -- the mount path to create or refresh")
            .arg(
                "asset_description",
                "map, optional -- {action: {module_path, class_name, args?}, action_args?, mode}",
            )
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/action/builtin/reload.rs", "UpdateAssetAction")
    }
}
