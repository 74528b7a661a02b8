//! Declarative shape validation for JSON structures.
//!
//! A schema is a tree of validators; `validate` walks value and schema
//! together and optionally records a trace of what failed where. The
//! reload action uses this to check asset descriptions before acting on
//! them.

use crate::action::dispatch::ParamType;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub enum Schema {
    /// Accepts anything.
    Any,
    /// Accepts values of one of the listed types.
    Type(Vec<ParamType>),
    /// Accepts exactly this value.
    Value(JsonValue),
    /// Validates mapping structures: named fields, plus optional
    /// key/value validators applied across all entries. Keys outside the
    /// field list are accepted.
    Object {
        fields: Vec<(String, Schema)>,
        keys: Option<Box<Schema>>,
        values: Option<Box<Schema>>,
    },
    /// Validates sequences: one validator for every element, or one
    /// validator per position.
    Array {
        all: Option<Box<Schema>>,
        items: Option<Vec<Schema>>,
    },
    /// The wrapped field may be absent; when present it must validate.
    Optional(Box<Schema>),
    /// Accepts the input if any variant accepts it.
    Choice(Vec<Schema>),
    /// Validates through an arbitrary function.
    Custom {
        description: String,
        test: Arc<dyn Fn(&JsonValue) -> bool + Send + Sync>,
    },
}

impl Schema {
    pub fn of(kind: ParamType) -> Self {
        Self::Type(vec![kind])
    }

    pub fn of_types(kinds: Vec<ParamType>) -> Self {
        Self::Type(kinds)
    }

    pub fn value(expected: JsonValue) -> Self {
        Self::Value(expected)
    }

    pub fn object(fields: Vec<(&str, Schema)>) -> Self {
        Self::Object {
            fields: fields
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect(),
            keys: None,
            values: None,
        }
    }

    /// A mapping validated entry-wise instead of field-wise.
    pub fn map_of(keys: Schema, values: Schema) -> Self {
        Self::Object {
            fields: Vec::new(),
            keys: Some(Box::new(keys)),
            values: Some(Box::new(values)),
        }
    }

    pub fn array_of(all: Schema) -> Self {
        Self::Array {
            all: Some(Box::new(all)),
            items: None,
        }
    }

    pub fn tuple(items: Vec<Schema>) -> Self {
        Self::Array {
            all: None,
            items: Some(items),
        }
    }

    pub fn optional(inner: Schema) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn choice(variants: Vec<Schema>) -> Self {
        Self::Choice(variants)
    }

    pub fn custom(
        description: impl Into<String>,
        test: impl Fn(&JsonValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Validate `structure`, appending failure descriptions to `trace`
    /// when one is supplied.
    pub fn validate(&self, structure: &JsonValue, mut trace: Option<&mut Vec<String>>) -> bool {
        match self {
            Self::Any => true,

            Self::Type(kinds) => {
                if kinds.iter().any(|kind| kind.matches(structure)) {
                    return true;
                }
                log_trace(&mut trace, &format!("{} fails", self), structure);
                false
            }

            Self::Value(expected) => {
                if structure == expected {
                    return true;
                }
                log_trace(&mut trace, &format!("not equal {}", expected), structure);
                false
            }

            Self::Object {
                fields,
                keys,
                values,
            } => {
                let Some(map) = structure.as_object() else {
                    log_trace(&mut trace, "expected mapping", structure);
                    return false;
                };

                if let Some(keys) = keys {
                    for key in map.keys() {
                        if !keys.validate(&JsonValue::String(key.clone()), trace.as_deref_mut()) {
                            log_trace(&mut trace, "keys validator failed", structure);
                            return false;
                        }
                    }
                }
                if let Some(values) = values {
                    for value in map.values() {
                        if !values.validate(value, trace.as_deref_mut()) {
                            log_trace(&mut trace, "values validator failed", structure);
                            return false;
                        }
                    }
                }

                for (name, field_schema) in fields {
                    match map.get(name) {
                        Some(value) => {
                            if !field_schema.validate(value, trace.as_deref_mut()) {
                                log_trace(
                                    &mut trace,
                                    &format!("key \"{}\" failed {}", name, field_schema),
                                    structure,
                                );
                                return false;
                            }
                        }
                        None => {
                            if !field_schema.is_optional() {
                                log_trace(
                                    &mut trace,
                                    &format!("key \"{}\" is missing", name),
                                    structure,
                                );
                                return false;
                            }
                        }
                    }
                }
                true
            }

            Self::Array { all, items } => {
                let Some(list) = structure.as_array() else {
                    log_trace(&mut trace, "expected sequence", structure);
                    return false;
                };

                if let Some(all) = all {
                    for item in list {
                        if !all.validate(item, trace.as_deref_mut()) {
                            log_trace(&mut trace, &format!("{} failed", all), structure);
                            return false;
                        }
                    }
                }
                if let Some(items) = items {
                    if list.len() != items.len() {
                        log_trace(
                            &mut trace,
                            &format!("expected {} entries, found {}", items.len(), list.len()),
                            structure,
                        );
                        return false;
                    }
                    for (i, item_schema) in items.iter().enumerate() {
                        if !item_schema.validate(&list[i], trace.as_deref_mut()) {
                            log_trace(
                                &mut trace,
                                &format!("{} failed on index {}", item_schema, i),
                                structure,
                            );
                            return false;
                        }
                    }
                }
                true
            }

            Self::Optional(inner) => inner.validate(structure, trace),

            Self::Choice(variants) => {
                if variants
                    .iter()
                    .any(|variant| variant.validate(structure, None))
                {
                    return true;
                }
                log_trace(&mut trace, &format!("{} rejected", self), structure);
                false
            }

            Self::Custom { description, test } => {
                if test(structure) {
                    return true;
                }
                log_trace(&mut trace, &format!("{} failed", description), structure);
                false
            }
        }
    }
}

fn log_trace(trace: &mut Option<&mut Vec<String>>, message: &str, structure: &JsonValue) {
    if let Some(sink) = trace.as_deref_mut() {
        if sink.is_empty() {
            sink.push(format!("{} on \"{}\"", message, structure));
        } else {
            sink.push(format!("{} in sub-test", message));
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Type(kinds) => write!(f, "Type({:?})", kinds),
            Self::Value(expected) => write!(f, "Value({})", expected),
            Self::Object { .. } => write!(f, "Object()"),
            Self::Array { all: Some(all), .. } => write!(f, "Array(all={})", all),
            Self::Array { items: Some(items), .. } => write!(f, "Array(items={})", items.len()),
            Self::Array { .. } => write!(f, "Array()"),
            Self::Optional(inner) => write!(f, "Optional({})", inner),
            Self::Choice(variants) => write!(f, "Choice({} variants)", variants.len()),
            Self::Custom { description, .. } => write!(f, "Custom({})", description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_schema() -> Schema {
        Schema::object(vec![
            ("name", Schema::of(ParamType::Str)),
            ("age", Schema::of(ParamType::Int)),
            ("tags", Schema::optional(Schema::array_of(Schema::of(ParamType::Str)))),
            (
                "coordinates",
                Schema::tuple(vec![
                    Schema::of(ParamType::Number),
                    Schema::of(ParamType::Number),
                    Schema::of(ParamType::Number),
                ]),
            ),
            (
                "metadata",
                Schema::object(vec![
                    ("id", Schema::of(ParamType::Int)),
                    ("valid", Schema::custom("must be true", |v| v == &json!(true))),
                ]),
            ),
            ("status", Schema::value(json!("active"))),
        ])
    }

    fn person() -> serde_json::Value {
        json!({
            "name": "Alice",
            "age": 30,
            "tags": ["rust", "developer"],
            "coordinates": [10, 20, 30],
            "metadata": {"id": 123, "valid": true},
            "status": "active",
        })
    }

    #[test]
    fn test_valid_structure() {
        assert!(person_schema().validate(&person(), None));
    }

    #[test]
    fn test_optional_field_may_be_absent() {
        let mut data = person();
        data.as_object_mut().unwrap().remove("tags");
        assert!(person_schema().validate(&data, None));
    }

    #[test]
    fn test_failure_records_trace() {
        let mut data = person();
        data["metadata"]["id"] = json!("this should be an integer");

        let mut trace = Vec::new();
        assert!(!person_schema().validate(&data, Some(&mut trace)));
        assert!(!trace.is_empty());
        assert!(trace[0].contains("fails") || trace[0].contains("failed"));
    }

    #[test]
    fn test_tuple_length_mismatch() {
        let mut data = person();
        data["coordinates"] = json!([10, 20]);
        let mut trace = Vec::new();
        assert!(!person_schema().validate(&data, Some(&mut trace)));
    }

    #[test]
    fn test_choice_and_map_of() {
        let mode = Schema::choice(vec![
            Schema::of(ParamType::Int),
            Schema::of(ParamType::Str),
        ]);
        assert!(mode.validate(&json!(0o775), None));
        assert!(mode.validate(&json!("775"), None));
        assert!(!mode.validate(&json!(null), None));

        let string_map = Schema::map_of(Schema::of(ParamType::Str), Schema::of(ParamType::Int));
        assert!(string_map.validate(&json!({"a": 1, "b": 2}), None));
        assert!(!string_map.validate(&json!({"a": "not int"}), None));
    }

    #[test]
    fn test_extra_keys_are_accepted() {
        let schema = Schema::object(vec![("known", Schema::of(ParamType::Int))]);
        assert!(schema.validate(&json!({"known": 1, "extra": "fine"}), None));
    }
}
