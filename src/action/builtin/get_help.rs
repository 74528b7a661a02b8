//! Returns the help for an asset given its path.

use crate::action::{required_str_parameter, Action, ArgMap, Help};
use crate::core::{CallResult, Result};
use crate::persist::envelope::SourceLocator;
use crate::store::asset::SharedAsset;
use crate::store::context::UpdateContext;

pub struct GetHelp;

impl Action for GetHelp {
    fn execute(
        &self,
        _asset: &SharedAsset,
        context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult> {
        let path = required_str_parameter(args, "path")?;
        let asset = context.store().acquire(context, path)?;
        Ok(CallResult::valid(asset.get_help()))
    }

    fn help(&self) -> Help {
        Help::new("Returns the help for an asset given its path.")
            .returns("the asset's help record")
            .arg("path", "str -- the store-path to the asset of interest")
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/action/builtin/get_help.rs", "GetHelp")
    }
}
