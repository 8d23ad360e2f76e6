//! Record filters declared under `filters:` in a model mapping.
//!
//! Rules are validated and their patterns compiled once per model with
//! [`Filters::compile`]; evaluating a record afterwards cannot fail.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use infrasync_core::{get_value, record::is_truthy, FilterOperation, FilterRule, Record};

use crate::error::SyncError;

/// A validated rule, with its pattern compiled for `regex`.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    field: String,
    operation: FilterOperation,
    value: Value,
    regex: Option<Regex>,
}

impl CompiledRule {
    pub fn new(rule: &FilterRule) -> Result<Self, SyncError> {
        let invalid = |message: &str| SyncError::Filter {
            field: rule.field.clone(),
            message: message.to_string(),
        };

        let value = match (&rule.value, rule.operation.is_unary()) {
            (_, true) => Value::Null,
            (Some(value), false) => value.clone(),
            (None, false) => return Err(invalid("operation requires a value")),
        };

        let regex = match rule.operation {
            FilterOperation::In | FilterOperation::NotIn if !value.is_array() => {
                return Err(invalid("'in' and 'not in' require a list value"))
            }
            FilterOperation::Regex => {
                let pattern = value
                    .as_str()
                    .ok_or_else(|| invalid("'regex' requires a string pattern"))?;
                Some(Regex::new(pattern).map_err(|e| invalid(&e.to_string()))?)
            }
            _ => None,
        };

        Ok(CompiledRule {
            field: rule.field.clone(),
            operation: rule.operation,
            value,
            regex,
        })
    }

    /// Evaluate against `record`. An absent field compares as `null`.
    pub fn matches(&self, record: Record<'_>) -> bool {
        let actual = get_value(record, &self.field).unwrap_or(Value::Null);
        let expected = &self.value;

        match self.operation {
            FilterOperation::IsEmpty => !is_truthy(&actual),
            FilterOperation::IsNotEmpty => is_truthy(&actual),
            FilterOperation::Equal => loosely_equal(&actual, expected),
            FilterOperation::NotEqual => !loosely_equal(&actual, expected),
            FilterOperation::Greater => compare(&actual, expected) == Some(Ordering::Greater),
            FilterOperation::GreaterOrEqual => matches!(
                compare(&actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperation::Less => compare(&actual, expected) == Some(Ordering::Less),
            FilterOperation::LessOrEqual => matches!(
                compare(&actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperation::In => member_of(&actual, expected),
            FilterOperation::NotIn => !member_of(&actual, expected),
            FilterOperation::Contains => contains(&actual, expected),
            FilterOperation::NotContains => !contains(&actual, expected),
            FilterOperation::Regex => match (&self.regex, actual.as_str()) {
                (Some(re), Some(s)) => re.is_match(s),
                _ => false,
            },
        }
    }
}

/// Every rule of a model, compiled.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    rules: Vec<CompiledRule>,
}

impl Filters {
    pub fn compile(rules: &[FilterRule]) -> Result<Self, SyncError> {
        let rules = rules.iter().map(CompiledRule::new).collect::<Result<_, _>>()?;
        Ok(Filters { rules })
    }

    /// `true` when `record` passes every rule.
    pub fn matches(&self, record: Record<'_>) -> bool {
        self.rules.iter().all(|rule| rule.matches(record))
    }
}

/// Equality that treats `1` and `1.0` alike.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Numbers compare numerically, strings lexically; anything else is incomparable.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn member_of(actual: &Value, expected: &Value) -> bool {
    expected
        .as_array()
        .is_some_and(|items| items.iter().any(|item| loosely_equal(actual, item)))
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
        (Value::Array(items), needle) => items.iter().any(|item| loosely_equal(item, needle)),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{json, Map};

    fn record() -> Map<String, Value> {
        match json!({
            "name": "ams-dc1",
            "status": {"value": "active"},
            "rack_count": 12,
            "tags": ["core", "edge"],
            "description": ""
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn rule(field: &str, operation: FilterOperation, value: Option<Value>) -> FilterRule {
        FilterRule {
            field: field.to_string(),
            operation,
            value,
        }
    }

    #[rstest]
    #[case("status.value", FilterOperation::Equal, Some(json!("active")), true)]
    #[case("status.value", FilterOperation::NotEqual, Some(json!("active")), false)]
    #[case("rack_count", FilterOperation::Equal, Some(json!(12.0)), true)]
    #[case("rack_count", FilterOperation::Greater, Some(json!(10)), true)]
    #[case("rack_count", FilterOperation::GreaterOrEqual, Some(json!(12)), true)]
    #[case("rack_count", FilterOperation::Less, Some(json!(12)), false)]
    #[case("rack_count", FilterOperation::LessOrEqual, Some(json!(12)), true)]
    #[case("name", FilterOperation::In, Some(json!(["ams-dc1", "fra-dc1"])), true)]
    #[case("name", FilterOperation::NotIn, Some(json!(["fra-dc1"])), true)]
    #[case("name", FilterOperation::Contains, Some(json!("dc")), true)]
    #[case("tags", FilterOperation::Contains, Some(json!("edge")), true)]
    #[case("tags", FilterOperation::NotContains, Some(json!("access")), true)]
    #[case("description", FilterOperation::IsEmpty, None, true)]
    #[case("missing", FilterOperation::IsEmpty, None, true)]
    #[case("name", FilterOperation::IsNotEmpty, None, true)]
    #[case("name", FilterOperation::Regex, Some(json!("^ams-")), true)]
    #[case("rack_count", FilterOperation::Regex, Some(json!("12")), false)]
    #[case("missing", FilterOperation::Greater, Some(json!(1)), false)]
    fn evaluates_operations(
        #[case] field: &str,
        #[case] operation: FilterOperation,
        #[case] value: Option<Value>,
        #[case] expected: bool,
    ) {
        let map = record();
        let compiled = CompiledRule::new(&rule(field, operation, value)).unwrap();
        assert_eq!(compiled.matches(Record::Mapping(&map)), expected);
    }

    #[test]
    fn all_rules_must_pass() {
        let map = record();
        let rules = vec![
            rule("status.value", FilterOperation::Equal, Some(json!("active"))),
            rule("rack_count", FilterOperation::Less, Some(json!(5))),
        ];
        assert!(!Filters::compile(&rules).unwrap().matches(Record::Mapping(&map)));
        assert!(Filters::compile(&rules[..1]).unwrap().matches(Record::Mapping(&map)));
        assert!(Filters::compile(&[]).unwrap().matches(Record::Mapping(&map)));
    }

    #[test]
    fn compiled_filters_are_reused_across_records() {
        let filters = Filters::compile(&[rule("name", FilterOperation::Regex, Some(json!("^ams-")))]).unwrap();
        let names = ["ams-dc1", "fra-dc1", "ams-dc2"];
        let kept: Vec<_> = names
            .iter()
            .filter(|name| {
                let doc = match json!({ "name": name }) {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                };
                filters.matches(Record::Mapping(&doc))
            })
            .collect();
        assert_eq!(kept, vec![&"ams-dc1", &"ams-dc2"]);
    }

    #[test]
    fn invalid_regex_is_reported_at_compile_time() {
        let err = CompiledRule::new(&rule("name", FilterOperation::Regex, Some(json!("(")))).unwrap_err();
        assert!(matches!(err, SyncError::Filter { ref field, .. } if field == "name"));
    }

    #[test]
    fn binary_operation_without_value_is_reported() {
        assert!(CompiledRule::new(&rule("name", FilterOperation::Equal, None)).is_err());
        assert!(CompiledRule::new(&rule("name", FilterOperation::IsEmpty, None)).is_ok());
    }

    #[test]
    fn in_requires_list() {
        let err = CompiledRule::new(&rule("name", FilterOperation::In, Some(json!("ams-dc1")))).unwrap_err();
        assert!(err.to_string().contains("require a list"));
    }
}
