use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{Condition, FilterOp};

/// Mongo-style document filter: `{ "field": value }` for equality and
/// `{ "field": { "$op": value } }` for everything else. Conditions are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Filter matching every document
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse(where_data: &Value) -> Result<Self, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(Self::all()),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidFilter("filter must be an object".to_string())),
        };

        let mut filter = Self::all();
        for (field, value) in obj {
            if field.starts_with('$') {
                return Err(FilterError::UnsupportedOperator(field.clone()));
            }
            Self::validate_field(field)?;

            match value {
                Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                    for (op, data) in ops {
                        filter.push(field, FilterOp::parse(op)?, data.clone())?;
                    }
                }
                literal => filter.push(field, FilterOp::Eq, literal.clone())?,
            }
        }
        Ok(filter)
    }

    /// Builder form used by services: `Filter::all().eq("is_vaccinated", false)`
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            operator: FilterOp::Eq,
            data: value.into(),
        });
        self
    }

    pub fn ne(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            operator: FilterOp::Ne,
            data: value.into(),
        });
        self
    }

    pub fn by_id(id: impl ToString) -> Self {
        Self::all().eq("id", id.to_string())
    }

    pub fn with(mut self, field: &str, operator: FilterOp, data: Value) -> Result<Self, FilterError> {
        Self::validate_field(field)?;
        self.push(field, operator, data)?;
        Ok(self)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate against an in-memory document
    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        self.conditions.iter().all(|c| Self::matches_condition(c, doc.get(&c.field)))
    }

    fn push(&mut self, field: &str, operator: FilterOp, data: Value) -> Result<(), FilterError> {
        match operator {
            FilterOp::In | FilterOp::NIn if !data.is_array() => {
                return Err(FilterError::InvalidOperatorData(format!("{} requires array", field)));
            }
            FilterOp::Exists if !data.is_boolean() => {
                return Err(FilterError::InvalidOperatorData(format!("$exists on {} requires boolean", field)));
            }
            op if op.is_comparison() && !(data.is_string() || data.is_number()) => {
                return Err(FilterError::InvalidOperatorData(format!(
                    "comparison on {} requires string or number",
                    field
                )));
            }
            _ => {}
        }
        self.conditions.push(Condition {
            field: field.to_string(),
            operator,
            data,
        });
        Ok(())
    }

    fn matches_condition(condition: &Condition, actual: Option<&Value>) -> bool {
        let data = &condition.data;
        match condition.operator {
            FilterOp::Eq => Self::loosely_equal(actual, data),
            FilterOp::Ne => !Self::loosely_equal(actual, data),
            FilterOp::In => Self::in_array(actual, data),
            FilterOp::NIn => !Self::in_array(actual, data),
            FilterOp::Exists => actual.is_some() == data.as_bool().unwrap_or(true),
            op => match actual.and_then(|a| Self::compare(a, data)) {
                Some(ordering) => match op {
                    FilterOp::Gt => ordering == Ordering::Greater,
                    FilterOp::Gte => ordering != Ordering::Less,
                    FilterOp::Lt => ordering == Ordering::Less,
                    FilterOp::Lte => ordering != Ordering::Greater,
                    _ => false,
                },
                None => false,
            },
        }
    }

    // Missing fields equal null
    fn loosely_equal(actual: Option<&Value>, expected: &Value) -> bool {
        match actual {
            Some(value) => value == expected,
            None => expected.is_null(),
        }
    }

    fn in_array(actual: Option<&Value>, data: &Value) -> bool {
        data.as_array()
            .map(|items| items.iter().any(|item| Self::loosely_equal(actual, item)))
            .unwrap_or(false)
    }

    // Only same-typed strings and numbers are ordered
    fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
        match (actual, expected) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            _ => None,
        }
    }

    fn validate_field(field: &str) -> Result<(), FilterError> {
        let mut chars = field.chars();
        let valid = match chars.next() {
            Some(first) => (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
            None => false,
        };
        if valid {
            Ok(())
        } else {
            Err(FilterError::InvalidField(field.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn equality_and_implicit_and() {
        let filter = Filter::parse(&json!({"class_grade": "5A", "is_vaccinated": false})).unwrap();
        assert!(filter.matches(&doc(json!({"class_grade": "5A", "is_vaccinated": false}))));
        assert!(!filter.matches(&doc(json!({"class_grade": "5A", "is_vaccinated": true}))));
    }

    #[test]
    fn missing_field_equals_null() {
        let filter = Filter::parse(&json!({"vaccine_name": null})).unwrap();
        assert!(filter.matches(&doc(json!({"name": "x"}))));
        assert!(!filter.matches(&doc(json!({"vaccine_name": "BCG"}))));
    }

    #[test]
    fn date_strings_compare_chronologically() {
        let filter = Filter::parse(&json!({"date": {"$gte": "2025-03-01"}})).unwrap();
        assert!(filter.matches(&doc(json!({"date": "2025-03-01"}))));
        assert!(filter.matches(&doc(json!({"date": "2025-11-20"}))));
        assert!(!filter.matches(&doc(json!({"date": "2024-12-31"}))));
        // Mixed types never match a comparison
        assert!(!filter.matches(&doc(json!({"date": 20250301}))));
    }

    #[test]
    fn in_and_exists() {
        let filter = Filter::parse(&json!({"role": {"$in": ["admin", "user"]}, "username": {"$exists": true}})).unwrap();
        assert!(filter.matches(&doc(json!({"role": "user", "username": "a"}))));
        assert!(!filter.matches(&doc(json!({"role": "user"}))));
        assert!(!filter.matches(&doc(json!({"role": "guest", "username": "a"}))));
    }

    #[test]
    fn rejects_bad_filters() {
        assert!(matches!(Filter::parse(&json!([1])), Err(FilterError::InvalidFilter(_))));
        assert!(matches!(Filter::parse(&json!({"$where": "1"})), Err(FilterError::UnsupportedOperator(_))));
        assert!(matches!(Filter::parse(&json!({"a": {"$regex": "x"}})), Err(FilterError::UnsupportedOperator(_))));
        assert!(matches!(Filter::parse(&json!({"a'--": 1})), Err(FilterError::InvalidField(_))));
        assert!(matches!(Filter::parse(&json!({"a": {"$in": "x"}})), Err(FilterError::InvalidOperatorData(_))));
        assert!(matches!(Filter::parse(&json!({"a": {"$gt": true}})), Err(FilterError::InvalidOperatorData(_))));
    }

    #[test]
    fn builder_matches_by_id() {
        let filter = Filter::by_id("abc").eq("is_vaccinated", false);
        assert!(filter.matches(&doc(json!({"id": "abc", "is_vaccinated": false}))));
        assert!(!filter.matches(&doc(json!({"id": "abd", "is_vaccinated": false}))));
    }
}
