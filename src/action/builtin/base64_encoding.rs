//! Convert to and from base64. Exactly one of `encode`/`decode` must be
//! provided; decoding repairs missing padding.

use crate::action::{Action, ArgMap, Help};
use crate::core::{CallResult, Result, StoreError};
use crate::persist::envelope::SourceLocator;
use crate::persist::external::decode_base64_lenient;
use crate::store::asset::SharedAsset;
use crate::store::context::UpdateContext;
use base64::Engine as _;
use serde_json::json;

pub struct Base64Encoding;

impl Action for Base64Encoding {
    fn execute(
        &self,
        _asset: &SharedAsset,
        _context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult> {
        let encode = args.get("encode").and_then(|v| v.as_str());
        let decode = args.get("decode").and_then(|v| v.as_str());

        let result = match (encode, decode) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(StoreError::InvalidArgument(
                    "either encode or decode data must be provided".to_string(),
                ))
            }
            (Some(plain), None) => {
                base64::engine::general_purpose::STANDARD.encode(plain.as_bytes())
            }
            (None, Some(encoded)) => {
                let bytes = decode_base64_lenient(encoded)?;
                String::from_utf8(bytes).map_err(|e| {
                    StoreError::InvalidArgument(format!("decoded data is not text: {}", e))
                })?
            }
        };
        Ok(CallResult::valid(json!(result)))
    }

    fn help(&self) -> Help {
        Help::new("Convert to and from Base64 encoding")
            .returns("The conversion result")
            .arg(
                "encode",
                "str - optional, the data to convert to base64 / mutually exclusive with decode",
            )
            .arg(
                "decode",
                "str - optional, the data to convert from base64 / mutually exclusive with encode",
            )
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/action/builtin/base64_encoding.rs", "Base64Encoding")
    }
}
