//! Access JSON-valued assets by tree paths: run the source asset and
//! select a sub-structure of its result.

use crate::action::{optional_parameter, required_str_parameter, Action, ArgMap, Help};
use crate::core::{CallResult, Result, StoreError};
use crate::path::{ops, TreePath};
use crate::persist::envelope::SourceLocator;
use crate::store::asset::SharedAsset;
use crate::store::context::UpdateContext;

pub struct JsonFormat;

impl Action for JsonFormat {
    fn execute(
        &self,
        _asset: &SharedAsset,
        context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult> {
        let path = required_str_parameter(args, "path")?.to_string();
        let key = match optional_parameter(args, "key") {
            Some(value) => Some(
                value
                    .as_str()
                    .ok_or_else(|| {
                        StoreError::TypeMismatch("parameter 'key' must be a string".to_string())
                    })
                    .and_then(TreePath::parse)?,
            ),
            None => None,
        };

        let store = context.store().clone();
        let source_result = store.query(context, &path, ArgMap::new());
        Ok(source_result.then(|data| match &key {
            None => Ok(data),
            Some(key_path) => ops::path_get(&data, key_path).cloned().ok_or_else(|| {
                StoreError::NotFound(format!("\"{}\" not found in the result of {}", key_path, path))
            }),
        }))
    }

    fn help(&self) -> Help {
        Help::new("Access JSON-valued assets by TreePaths")
            .returns("The sub-structure selected by \"key\"")
            .arg("path", "str - path to the source asset")
            .arg("key", "str - defaults to root element")
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/action/builtin/json_format.rs", "JsonFormat")
    }
}
