//! The built-in tooling surface: directory listing, help, record
//! introspection, call-by-reference, base64 conversion, and the reload
//! action.

pub mod base64_encoding;
pub mod call_asset;
pub mod get_asset_info;
pub mod get_help;
pub mod json_format;
pub mod read_dir;
pub mod reload;

use crate::action::registry::register_factory;
use crate::action::NoAction;
use std::sync::Arc;

/// Bind the factories of every built-in action class.
pub fn register_factories() {
    register_factory("NoAction", |_| Ok(Arc::new(NoAction)));
    register_factory("ReadDir", |_| Ok(Arc::new(read_dir::ReadDir::new())));
    register_factory("GetHelp", |_| Ok(Arc::new(get_help::GetHelp)));
    register_factory("GetAssetInfo", |_| Ok(Arc::new(get_asset_info::GetAssetInfo)));
    register_factory("CallAsset", |_| Ok(Arc::new(call_asset::CallAsset)));
    register_factory("Base64Encoding", |_| {
        Ok(Arc::new(base64_encoding::Base64Encoding))
    });
    register_factory("JsonFormat", |_| Ok(Arc::new(json_format::JsonFormat)));
    register_factory("UpdateAssetAction", |_| {
        Ok(Arc::new(reload::UpdateAssetAction::new()))
    });
}
