//! Multi-variant dispatch over named JSON arguments.
//!
//! Variants register in source order and carry declared parameters: a name,
//! a type tag, and an optional precondition predicate. Invocation walks the
//! variants in registration order and calls the first whose declared
//! parameters are all satisfied by the supplied arguments. No match raises
//! `NoVariant`; a matched handler that fails propagates its error untouched.

use crate::action::predicate::Predicate;
use crate::core::{CallResult, Result, StoreError};
use crate::store::asset::SharedAsset;
use crate::store::context::UpdateContext;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub type ArgMap = serde_json::Map<String, JsonValue>;

pub type HandlerFn =
    Arc<dyn Fn(&SharedAsset, &mut UpdateContext, &ArgMap) -> Result<CallResult> + Send + Sync>;

/// Declared type of a dispatch parameter. `Int` and `Float` are strict:
/// a JSON integer is not a float and vice versa; `Number` accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Any,
    Str,
    Int,
    Float,
    Number,
    Bool,
    List,
    Map,
}

impl ParamType {
    pub fn matches(&self, value: &JsonValue) -> bool {
        match self {
            Self::Any => true,
            Self::Str => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_f64(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Map => value.is_object(),
        }
    }
}

#[derive(Debug, Clone)]
struct ParamSpec {
    name: String,
    ty: ParamType,
    predicate: Option<Predicate>,
    required: bool,
}

/// Declared signature of one dispatch variant.
#[derive(Debug, Clone, Default)]
pub struct VariantSpec {
    params: Vec<ParamSpec>,
    forbidden: Vec<String>,
    accepts_rest: bool,
}

impl VariantSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str, ty: ParamType) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            ty,
            predicate: None,
            required: true,
        });
        self
    }

    pub fn guarded(mut self, name: &str, ty: ParamType, predicate: Predicate) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            ty,
            predicate: Some(predicate),
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &str, ty: ParamType) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            ty,
            predicate: None,
            required: false,
        });
        self
    }

    pub fn optional_guarded(mut self, name: &str, ty: ParamType, predicate: Predicate) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            ty,
            predicate: Some(predicate),
            required: false,
        });
        self
    }

    /// The named argument must be absent for the variant to match.
    pub fn without(mut self, name: &str) -> Self {
        self.forbidden.push(name.to_string());
        self
    }

    /// Accept arguments beyond the declared ones (the kwargs tail).
    pub fn rest(mut self) -> Self {
        self.accepts_rest = true;
        self
    }

    fn accepts(&self, args: &ArgMap) -> bool {
        for spec in &self.params {
            match args.get(&spec.name) {
                Some(value) => {
                    if !spec.ty.matches(value) {
                        return false;
                    }
                    if let Some(predicate) = &spec.predicate {
                        if !predicate.matches(value) {
                            return false;
                        }
                    }
                }
                None => {
                    if spec.required {
                        return false;
                    }
                }
            }
        }

        for name in &self.forbidden {
            if args.contains_key(name) {
                return false;
            }
        }

        if !self.accepts_rest {
            for key in args.keys() {
                if !self.params.iter().any(|spec| &spec.name == key) {
                    return false;
                }
            }
        }
        true
    }
}

struct Variant {
    spec: VariantSpec,
    handler: HandlerFn,
}

/// Ordered dispatch namespace: first matching variant wins.
pub struct DispatchTable {
    label: String,
    variants: Vec<Variant>,
}

impl DispatchTable {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            variants: Vec::new(),
        }
    }

    pub fn variant(
        mut self,
        spec: VariantSpec,
        handler: impl Fn(&SharedAsset, &mut UpdateContext, &ArgMap) -> Result<CallResult>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.variants.push(Variant {
            spec,
            handler: Arc::new(handler),
        });
        self
    }

    pub fn dispatch(
        &self,
        asset: &SharedAsset,
        context: &mut UpdateContext,
        args: &ArgMap,
    ) -> Result<CallResult> {
        for variant in &self.variants {
            if variant.spec.accepts(args) {
                return (variant.handler)(asset, context, args);
            }
        }
        Err(StoreError::NoVariant(format!(
            "no variant of {} matches arguments [{}]",
            self.label,
            args.keys().cloned().collect::<Vec<_>>().join(", ")
        )))
    }
}
