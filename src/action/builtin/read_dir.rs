//! Directory listing action, also synthesized by the store when a path
//! resolves to a directory.

use crate::action::dispatch::{ArgMap, DispatchTable, ParamType, VariantSpec};
use crate::action::{Action, Help};
use crate::core::{CallResult, Result, StoreError};
use crate::persist::envelope::SourceLocator;
use crate::store::asset::SharedAsset;
use crate::store::context::UpdateContext;
use serde_json::Value as JsonValue;

pub struct ReadDir {
    table: DispatchTable,
}

impl Default for ReadDir {
    fn default() -> Self {
        Self::new()
    }
}

fn listing(context: &mut UpdateContext, path: &str) -> Result<CallResult> {
    let contents = context.store().read_directory(context, path)?;
    Ok(CallResult::valid(contents))
}

/// Normalize a component list (`["bin", "ls"]`) into a dotted path.
fn join_components(components: &[JsonValue]) -> Result<String> {
    let mut parts = Vec::with_capacity(components.len());
    for component in components {
        match component.as_str() {
            Some(part) => parts.push(part.to_string()),
            None => {
                return Err(StoreError::TypeMismatch(format!(
                    "path components must be strings, got {}",
                    component
                )))
            }
        }
    }
    Ok(parts.join("."))
}

impl ReadDir {
    pub fn new() -> Self {
        let table = DispatchTable::new("ReadDir")
            .variant(
                VariantSpec::new().required("path", ParamType::Str).rest(),
                |_asset, context, args| {
                    let path = args["path"].as_str().expect("declared as string");
                    listing(context, path)
                },
            )
            .variant(
                VariantSpec::new().required("path", ParamType::List).rest(),
                |_asset, context, args| {
                    let components = args["path"].as_array().expect("declared as list");
                    let path = join_components(components)?;
                    listing(context, &path)
                },
            )
            // no path at all? use root
            .variant(VariantSpec::new().rest(), |_asset, context, _args| {
                listing(context, "")
            });
        Self { table }
    }
}

impl Action for ReadDir {
    fn execute(
        &self,
        asset: &SharedAsset,
        context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult> {
        self.table.dispatch(asset, context, args)
    }

    fn help(&self) -> Help {
        Help::new("Read the contents of a directory")
            .returns("json listing: path, permissions, contents")
            .arg(
                "path",
                "str | list, optional -- the requested directory, defaults to root",
            )
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/action/builtin/read_dir.rs", "ReadDir")
    }
}
