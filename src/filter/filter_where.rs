use serde_json::{json, Value};
use uuid::Uuid;

use super::error::FilterError;
use super::filter::Filter;
use super::types::{Condition, FilterOp, SqlParam, SqlResult};

/// Compiles a `Filter` into a WHERE clause over a `(id UUID, doc JSONB)` table.
///
/// `id` lives in its own column; every other field is addressed inside `doc`.
pub struct FilterWhere {
    param_values: Vec<SqlParam>,
    param_index: usize,
}

impl FilterWhere {
    fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Placeholders start at `$starting_param_index + 1`
    pub fn generate(filter: &Filter, starting_param_index: usize) -> Result<SqlResult, FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let mut sql_conditions = vec![];
        for condition in filter.conditions() {
            sql_conditions.push(filter_where.build_sql_condition(condition)?);
        }
        let query = if sql_conditions.is_empty() {
            "TRUE".to_string()
        } else {
            sql_conditions.join(" AND ")
        };
        Ok(SqlResult {
            query,
            params: filter_where.param_values,
        })
    }

    fn bind(&mut self, param: SqlParam) -> String {
        self.param_values.push(param);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    fn build_sql_condition(&mut self, condition: &Condition) -> Result<String, FilterError> {
        if condition.field == "id" {
            return self.build_id_condition(condition);
        }

        let field = &condition.field;
        let data = &condition.data;
        match condition.operator {
            FilterOp::Eq => Ok(self.build_eq(field, data)),
            FilterOp::Ne => Ok(format!("NOT {}", self.build_eq(field, data))),
            FilterOp::In => Ok(self.build_in(field, data)),
            FilterOp::NIn => Ok(format!("NOT {}", self.build_in(field, data))),
            FilterOp::Exists => {
                let p = self.bind(SqlParam::Text(field.clone()));
                if data.as_bool().unwrap_or(true) {
                    Ok(format!("(doc ? {})", p))
                } else {
                    Ok(format!("NOT (doc ? {})", p))
                }
            }
            op => {
                // Postgres orders jsonb across types; restrict to same-typed values
                let p = self.bind(SqlParam::Json(data.clone()));
                Ok(format!(
                    "(jsonb_typeof(doc->'{f}') = jsonb_typeof({p}::jsonb) AND doc->'{f}' {op} {p}::jsonb)",
                    f = field,
                    p = p,
                    op = op.to_sql()
                ))
            }
        }
    }

    fn build_eq(&mut self, field: &str, data: &Value) -> String {
        if data.is_null() {
            return format!("(doc->'{f}' IS NULL OR doc->'{f}' = 'null'::jsonb)", f = field);
        }
        let p = self.bind(SqlParam::Json(json!({ field: data })));
        format!("(doc @> {}::jsonb)", p)
    }

    fn build_in(&mut self, field: &str, data: &Value) -> String {
        let items = data.as_array().cloned().unwrap_or_default();
        if items.is_empty() {
            return "(FALSE)".to_string();
        }
        let parts: Vec<String> = items.iter().map(|item| self.build_eq(field, item)).collect();
        format!("({})", parts.join(" OR "))
    }

    fn build_id_condition(&mut self, condition: &Condition) -> Result<String, FilterError> {
        match condition.operator {
            FilterOp::Eq => Ok(self.id_eq(&condition.data)),
            FilterOp::Ne => Ok(format!("NOT {}", self.id_eq(&condition.data))),
            FilterOp::In => {
                let items = condition.data.as_array().cloned().unwrap_or_default();
                if items.is_empty() {
                    return Ok("(FALSE)".to_string());
                }
                let parts: Vec<String> = items.iter().map(|item| self.id_eq(item)).collect();
                Ok(format!("({})", parts.join(" OR ")))
            }
            op => Err(FilterError::UnsupportedOperator(format!("{:?} on id", op))),
        }
    }

    // Ids that are not UUIDs cannot exist in the table
    fn id_eq(&mut self, data: &Value) -> String {
        match data.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => format!("(id = {})", self.bind(SqlParam::Uuid(id))),
            None => "(FALSE)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_is_true() {
        let result = FilterWhere::generate(&Filter::all(), 0).unwrap();
        assert_eq!(result.query, "TRUE");
        assert!(result.params.is_empty());
    }

    #[test]
    fn equality_uses_containment() {
        let filter = Filter::parse(&json!({"student_id": "S1"})).unwrap();
        let result = FilterWhere::generate(&filter, 0).unwrap();
        assert_eq!(result.query, "(doc @> $1::jsonb)");
        assert_eq!(result.params, vec![SqlParam::Json(json!({"student_id": "S1"}))]);
    }

    #[test]
    fn placeholders_continue_from_offset() {
        let id = Uuid::new_v4();
        let filter = Filter::by_id(id).eq("is_vaccinated", false);
        let result = FilterWhere::generate(&filter, 1).unwrap();
        assert_eq!(result.query, "(id = $2) AND (doc @> $3::jsonb)");
        assert_eq!(result.params[0], SqlParam::Uuid(id));
    }

    #[test]
    fn comparison_guards_type() {
        let filter = Filter::parse(&json!({"date": {"$gte": "2025-01-01"}})).unwrap();
        let result = FilterWhere::generate(&filter, 0).unwrap();
        assert_eq!(
            result.query,
            "(jsonb_typeof(doc->'date') = jsonb_typeof($1::jsonb) AND doc->'date' >= $1::jsonb)"
        );
    }

    #[test]
    fn malformed_id_matches_nothing() {
        let result = FilterWhere::generate(&Filter::by_id("not-a-uuid"), 0).unwrap();
        assert_eq!(result.query, "(FALSE)");
        assert!(result.params.is_empty());
    }

    #[test]
    fn null_equality_covers_missing_fields() {
        let filter = Filter::parse(&json!({"vaccine_name": null})).unwrap();
        let result = FilterWhere::generate(&filter, 0).unwrap();
        assert_eq!(
            result.query,
            "(doc->'vaccine_name' IS NULL OR doc->'vaccine_name' = 'null'::jsonb)"
        );
    }
}
