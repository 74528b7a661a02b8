//! Value predicates: functions over JSON values with consistent results.
//!
//! Higher-order predicates combine other predicates and are freely
//! chainable, so dispatch preconditions compose from a small set of
//! primitives.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Predicate {
    description: String,
    test: Arc<dyn Fn(&JsonValue) -> bool + Send + Sync>,
}

impl Predicate {
    pub fn new(
        description: impl Into<String>,
        test: impl Fn(&JsonValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    pub fn matches(&self, value: &JsonValue) -> bool {
        (self.test)(value)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.description)
    }
}

pub fn any_() -> Predicate {
    Predicate::new("any", |_| true)
}

pub fn not_none() -> Predicate {
    Predicate::new("not_none", |v| !v.is_null())
}

pub fn value_equals(expected: JsonValue) -> Predicate {
    Predicate::new(format!("value_equals({})", expected), move |v| v == &expected)
}

pub fn is_from(values: Vec<JsonValue>) -> Predicate {
    let description = format!(
        "is_from([{}])",
        values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Predicate::new(description, move |v| values.contains(v))
}

/// String containment on strings, membership on lists.
pub fn contains(needle: JsonValue) -> Predicate {
    Predicate::new(format!("contains({})", needle), move |v| match v {
        JsonValue::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
        JsonValue::Array(items) => items.contains(&needle),
        _ => false,
    })
}

pub fn is_string() -> Predicate {
    Predicate::new("is_string", JsonValue::is_string)
}

/// Integers only; a JSON float never matches.
pub fn is_int() -> Predicate {
    Predicate::new("is_int", |v| v.is_i64() || v.is_u64())
}

/// Floats only; a JSON integer never matches.
pub fn is_float() -> Predicate {
    Predicate::new("is_float", JsonValue::is_f64)
}

pub fn is_number() -> Predicate {
    Predicate::new("is_number", JsonValue::is_number)
}

pub fn is_bool() -> Predicate {
    Predicate::new("is_bool", JsonValue::is_boolean)
}

pub fn is_list() -> Predicate {
    Predicate::new("is_list", JsonValue::is_array)
}

pub fn is_map() -> Predicate {
    Predicate::new("is_map", JsonValue::is_object)
}

/// Inclusive numeric range.
pub fn in_range(low: f64, high: f64) -> Predicate {
    Predicate::new(format!("in_range({}, {})", low, high), move |v| {
        v.as_f64().map(|n| low <= n && n <= high).unwrap_or(false)
    })
}

pub fn matches_pattern(pattern: &str) -> Predicate {
    let regex = Regex::new(pattern);
    let description = format!("matches({})", pattern);
    match regex {
        Ok(regex) => Predicate::new(description, move |v| {
            v.as_str().map(|s| regex.is_match(s)).unwrap_or(false)
        }),
        Err(_) => Predicate::new(format!("matches(<invalid: {}>)", pattern), |_| false),
    }
}

pub fn of_len(low: usize, high: Option<usize>) -> Predicate {
    Predicate::new(
        match high {
            Some(high) => format!("of_len({}..={})", low, high),
            None => format!("of_len(<= {})", low),
        },
        move |v| {
            let len = match v {
                JsonValue::String(s) => s.len(),
                JsonValue::Array(items) => items.len(),
                JsonValue::Object(map) => map.len(),
                _ => return false,
            };
            match high {
                Some(high) => low <= len && len <= high,
                None => len <= low,
            }
        },
    )
}

pub fn not_(predicate: Predicate) -> Predicate {
    Predicate::new(format!("not({})", predicate.description), move |v| {
        !predicate.matches(v)
    })
}

fn join_descriptions(predicates: &[Predicate], separator: &str) -> String {
    predicates
        .iter()
        .map(|p| p.description.clone())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Logical AND of predicates.
pub fn when(predicates: Vec<Predicate>) -> Predicate {
    let description = format!("when([{}])", join_descriptions(&predicates, " and "));
    Predicate::new(description, move |v| predicates.iter().all(|p| p.matches(v)))
}

/// Logical OR of predicates.
pub fn either(predicates: Vec<Predicate>) -> Predicate {
    let description = format!("either([{}])", join_descriptions(&predicates, " or "));
    Predicate::new(description, move |v| predicates.iter().any(|p| p.matches(v)))
}

/// Logical XOR of predicates: exactly one must match.
pub fn one_of(predicates: Vec<Predicate>) -> Predicate {
    let description = format!("one_of([{}])", join_descriptions(&predicates, " xor "));
    Predicate::new(description, move |v| {
        predicates.iter().filter(|p| p.matches(v)).count() == 1
    })
}

/// Wrap an arbitrary function as a predicate.
pub fn call(
    description: impl Into<String>,
    func: impl Fn(&JsonValue) -> bool + Send + Sync + 'static,
) -> Predicate {
    Predicate::new(description, func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_predicates_keep_int_and_float_apart() {
        assert!(is_int().matches(&json!(2337)));
        assert!(!is_int().matches(&json!(2337.0)));
        assert!(is_float().matches(&json!(2337.0)));
        assert!(!is_float().matches(&json!(2337)));
        assert!(is_number().matches(&json!(2337)) && is_number().matches(&json!(2337.0)));
    }

    #[test]
    fn test_in_range_is_inclusive() {
        let range = in_range(1000.0, 3000.0);
        assert!(range.matches(&json!(1000)));
        assert!(range.matches(&json!(2337)));
        assert!(range.matches(&json!(3000.0)));
        assert!(!range.matches(&json!(500)));
        assert!(!range.matches(&json!("2000")));
    }

    #[test]
    fn test_combinators() {
        let good_count = when(vec![is_int(), in_range(1000.0, 3000.0)]);
        assert!(good_count.matches(&json!(2337)));
        assert!(!good_count.matches(&json!(2337.0)));

        let str_or_int = either(vec![is_string(), is_int()]);
        assert!(str_or_int.matches(&json!("x")));
        assert!(str_or_int.matches(&json!(1)));
        assert!(!str_or_int.matches(&json!(1.5)));

        let exactly_one = one_of(vec![is_number(), in_range(0.0, 10.0)]);
        assert!(exactly_one.matches(&json!(100))); // number, out of range
        assert!(!exactly_one.matches(&json!(5))); // both match
    }

    #[test]
    fn test_pattern_and_membership() {
        assert!(matches_pattern("^[a-z]+$").matches(&json!("abc")));
        assert!(!matches_pattern("^[a-z]+$").matches(&json!("ABC")));
        assert!(is_from(vec![json!("a"), json!("b")]).matches(&json!("a")));
        assert!(contains(json!("ell")).matches(&json!("hello")));
        assert!(contains(json!(2)).matches(&json!([1, 2, 3])));
    }
}
