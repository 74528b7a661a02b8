//! Shared fixtures: the demo identity set, an in-memory store, and the
//! dispatched/inner-access test actions.

#![allow(dead_code)]

use assetvault::action::dispatch::{DispatchTable, ParamType, VariantSpec};
use assetvault::action::predicate::{in_range, is_int, when};
use assetvault::action::{register_factory, Action, ArgMap, Help, INNER_GET};
use assetvault::persist::SourceLocator;
use assetvault::{
    bootstrap_entities, AssetStore, CallResult, MemoryStorage, Result, SharedAsset,
    SharedRegistry, StoreError, UpdateContext, UserRegistry,
};
use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, Mutex, RwLock};

pub fn demo_registry() -> SharedRegistry {
    let mut registry = UserRegistry::new();
    bootstrap_entities(&mut registry);
    Arc::new(RwLock::new(registry))
}

pub fn memory_store() -> Arc<AssetStore> {
    let store = Arc::new(AssetStore::new(Box::new(MemoryStorage::new())));
    store.load().unwrap();
    store
}

pub fn context_for(
    store: &Arc<AssetStore>,
    registry: &SharedRegistry,
    user: &str,
    group: &str,
) -> UpdateContext {
    UpdateContext::new(Arc::clone(store), Arc::clone(registry), user, group)
}

/// The dispatch-ordering test action: a string-path variant, a guarded
/// integer-count variant, two float variants, and an error fallthrough.
pub struct TestDispatchedAction {
    table: DispatchTable,
}

impl Default for TestDispatchedAction {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDispatchedAction {
    pub fn new() -> Self {
        let table = DispatchTable::new("TestDispatchedAction")
            .variant(
                VariantSpec::new().required("path", ParamType::Str).rest(),
                |_asset, _context, args| {
                    Ok(CallResult::valid(json!(format!(
                        "some path here: {}",
                        args["path"].as_str().unwrap()
                    ))))
                },
            )
            .variant(
                VariantSpec::new()
                    .guarded(
                        "count",
                        ParamType::Any,
                        when(vec![is_int(), in_range(1000.0, 3000.0)]),
                    )
                    .rest(),
                |_asset, _context, args| {
                    Ok(CallResult::valid(json!(format!(
                        "got a good count: {}",
                        args["count"]
                    ))))
                },
            )
            .variant(
                VariantSpec::new()
                    .required("count", ParamType::Float)
                    .optional("option", ParamType::Str)
                    .rest(),
                |_asset, _context, args| {
                    let option = args.get("option").and_then(|v| v.as_str()).unwrap_or("");
                    Ok(CallResult::valid(json!(format!(
                        "floaty option: {}/{}",
                        args["count"], option
                    ))))
                },
            )
            .variant(
                VariantSpec::new().required("count", ParamType::Float),
                |_asset, _context, args| {
                    Ok(CallResult::valid(json!(format!(
                        "thats floaty: {}",
                        args["count"]
                    ))))
                },
            )
            // fallthrough: no appropriate handler was found
            .variant(VariantSpec::new().rest(), |_asset, _context, args| {
                let mut lines =
                    vec!["no appropriate handler was found".to_string(), "Args:".to_string()];
                lines.extend(args.iter().map(|(k, v)| format!("{}={}", k, v)));
                Ok(CallResult::error(lines.join("\n")))
            });
        Self { table }
    }
}

impl Action for TestDispatchedAction {
    fn execute(
        &self,
        asset: &SharedAsset,
        context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult> {
        self.table.dispatch(asset, context, args)
    }

    fn help(&self) -> Help {
        Help::new("an action to take basic dispatched actions")
            .arg("count", "int | float -- some number / good between 1000 and 3000")
            .arg("option", "str, optional if count is a float")
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/tests/common/mod.rs", "TestDispatchedAction")
    }
}

/// Inner-access test action: uses `method` or the inner-access extras as a
/// member-method name and dispatches to it.
pub struct GimmeAction {
    member_value: i64,
}

impl Default for GimmeAction {
    fn default() -> Self {
        Self::new()
    }
}

impl GimmeAction {
    pub fn new() -> Self {
        Self { member_value: 17 }
    }

    fn handler_name(args: &ArgMap) -> Result<String> {
        if let Some(method) = args.get("method").and_then(JsonValue::as_str) {
            return Ok(method.to_string());
        }
        if let Some(extras) = args.get(INNER_GET).and_then(JsonValue::as_array) {
            let name = extras
                .iter()
                .filter_map(JsonValue::as_str)
                .collect::<Vec<_>>()
                .join(".");
            if !name.is_empty() {
                return Ok(name);
            }
        }
        Err(StoreError::InvalidArgument(
            "method name missing - either provide a 'method' or use inner access".to_string(),
        ))
    }

    fn int_arg(args: &ArgMap, key: &str) -> Result<i64> {
        let value = args
            .get(key)
            .ok_or_else(|| StoreError::InvalidArgument(format!("'{}' missing", key)))?;
        if let Some(n) = value.as_i64() {
            return Ok(n);
        }
        value
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| StoreError::TypeMismatch(format!("'{}' is not an integer", key)))
    }
}

impl Action for GimmeAction {
    fn execute(
        &self,
        _asset: &SharedAsset,
        _context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult> {
        let handler = Self::handler_name(args)?;
        match handler.as_str() {
            "foo" => Ok(CallResult::valid(json!("foo"))),
            "bar" => Ok(CallResult::valid(json!(format!(
                "bar - val={}",
                self.member_value
            )))),
            "baz" => {
                let x = Self::int_arg(args, "x")?;
                Ok(CallResult::valid(json!(format!(
                    "baz - val/x={}",
                    self.member_value as f64 / x as f64
                ))))
            }
            "sum" => {
                let a = Self::int_arg(args, "a")?;
                let b = Self::int_arg(args, "b")?;
                let total = match Self::int_arg(args, "c") {
                    Ok(c) => a + b + c,
                    Err(_) => a + b,
                };
                Ok(CallResult::valid(json!(total)))
            }
            other => Err(StoreError::NotFound(format!("no such method: \"{}\"", other))),
        }
    }

    fn help(&self) -> Help {
        Help::new("offers 'foo', 'bar', 'baz(x)' and 'sum(a, b[, c])' through inner access")
    }

    fn accepts_inner_access(&self) -> bool {
        true
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/tests/common/mod.rs", "GimmeAction")
    }
}

/// Records each execution into a shared log; used by the make-strategy
/// tests to observe build order.
pub struct RecorderAction {
    pub name: String,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl Action for RecorderAction {
    fn execute(
        &self,
        _asset: &SharedAsset,
        _context: &mut UpdateContext,
        _args: &ArgMap,
    ) -> Result<CallResult> {
        self.log.lock().unwrap().push(self.name.clone());
        Ok(CallResult::valid(json!(self.name)))
    }

    fn help(&self) -> Help {
        Help::new("records executions")
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/tests/common/mod.rs", "RecorderAction")
    }
}

/// A stateful action: the prefix it was constructed with persists as its
/// state mapping and survives factory reconstruction.
pub struct PrefixAction {
    state: JsonValue,
}

impl PrefixAction {
    pub fn new(prefix: &str) -> Self {
        Self {
            state: json!({ "prefix": prefix }),
        }
    }

    pub fn from_state(state: JsonValue) -> Self {
        Self { state }
    }
}

impl Action for PrefixAction {
    fn execute(
        &self,
        _asset: &SharedAsset,
        _context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult> {
        let prefix = self.state["prefix"].as_str().unwrap_or_default();
        let text = args.get("text").and_then(JsonValue::as_str).unwrap_or("");
        Ok(CallResult::valid(json!(format!("{}{}", prefix, text))))
    }

    fn help(&self) -> Help {
        Help::new("prepends its configured prefix").arg("text", "str -- the payload")
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/tests/common/mod.rs", "PrefixAction")
    }

    fn ctor_params(&self) -> JsonValue {
        json!({ "state": self.state })
    }
}

/// Sets a non-JSON response type and returns raw text; exercises the
/// gateway's mimetype override.
pub struct PlainTextAction;

impl Action for PlainTextAction {
    fn execute(
        &self,
        _asset: &SharedAsset,
        context: &mut UpdateContext,
        _args: &ArgMap,
    ) -> Result<CallResult> {
        context.set_mimetype("text/plain");
        Ok(CallResult::valid(json!("plain payload")))
    }

    fn help(&self) -> Help {
        Help::new("returns plain text")
    }

    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/tests/common/mod.rs", "PlainTextAction")
    }
}

/// Factories for the test actions, so stored records decode in tests that
/// go through a backend.
pub fn register_test_factories() {
    register_factory("TestDispatchedAction", |_| {
        Ok(Arc::new(TestDispatchedAction::new()))
    });
    register_factory("GimmeAction", |_| Ok(Arc::new(GimmeAction::new())));
    register_factory("PrefixAction", |params| {
        Ok(Arc::new(PrefixAction::from_state(
            params.get("state").cloned().unwrap_or(JsonValue::Null),
        )))
    });
    register_factory("PlainTextAction", |_| Ok(Arc::new(PlainTextAction)));
}
