//! Call an asset identified by a store path, forwarding all remaining
//! arguments. Also mounted (with a preset `_ref`) as the root index.

use crate::action::{required_str_parameter, Action, ArgMap, Help};
use crate::core::{CallResult, Result};
use crate::persist::envelope::SourceLocator;
use crate::store::asset::SharedAsset;
use crate::store::context::UpdateContext;

pub struct CallAsset;

impl Action for CallAsset {
    fn execute(
        &self,
        _asset: &SharedAsset,
        context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult> {
        let path = required_str_parameter(args, "_ref")?.to_string();

        let mut forwarded = args.clone();
        forwarded.remove("_ref");

        let asset = context.store().acquire(context, &path)?;
        let updated = asset.update(context, forwarded);
        Ok(updated
            .get_result()
            .unwrap_or_else(|| CallResult::error("update produced no result")))
    }

    fn help(&self) -> Help {
        Help::new("Call an asset identified by a store-path.")
            .returns("the referred asset's result")
            .arg("_ref", "str -- the store-path to the referred asset")
            .arg("...", "Any -- remaining arguments are forwarded to the update")
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/action/builtin/call_asset.rs", "CallAsset")
    }
}
