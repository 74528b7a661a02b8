//! Help records: description, argument docs, and return docs, rendered as
//! plain JSON for listings and the `bin.help` asset.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Help {
    pub description: Option<String>,
    pub args: JsonMap<String, JsonValue>,
    pub returns: Option<JsonValue>,
}

impl Help {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            args: JsonMap::new(),
            returns: None,
        }
    }

    pub fn returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = Some(json!(returns.into()));
        self
    }

    pub fn arg(mut self, name: impl Into<String>, doc: impl Into<String>) -> Self {
        self.args.insert(name.into(), json!(doc.into()));
        self
    }

    pub fn as_json(&self) -> JsonValue {
        json!({
            "description": self.description,
            "args": self.args,
            "returns": self.returns,
        })
    }
}
