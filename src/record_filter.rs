use serde_json::Value;

use crate::model::FileRecord;

/// Conjunction of attribute equalities over FileRecords. Evaluates in memory and
/// renders to a DynamoDB filter expression so the same filter drives both table
/// backends.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    conditions: Vec<(String, Value)>,
}

/// Filter rendered for a DynamoDB scan: expression plus placeholder bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    pub expression: String,
    pub names: Vec<(String, String)>,
    pub values: Vec<(String, Value)>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn matches_record(&self, record: &FileRecord) -> bool {
        match serde_json::to_value(record) {
            Ok(value) => self.matches(&value),
            Err(e) => {
                tracing::warn!("Could not serialize record {} for filtering: {}", record.s3_location, e);
                false
            }
        }
    }

    /// Apply filter to a JSON view of a record
    pub fn matches(&self, item: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| item.get(field).map(|v| v == value).unwrap_or(false))
    }

    /// Render as a scan filter. Returns None when there is nothing to filter on.
    pub fn to_expression(&self) -> Option<FilterExpression> {
        if self.conditions.is_empty() {
            return None;
        }

        let mut names = Vec::with_capacity(self.conditions.len());
        let mut values = Vec::with_capacity(self.conditions.len());
        let mut clauses = Vec::with_capacity(self.conditions.len());

        for (i, (field, value)) in self.conditions.iter().enumerate() {
            names.push((format!("#f{}", i), field.clone()));
            values.push((format!(":v{}", i), value.clone()));
            clauses.push(format!("#f{} = :v{}", i, i));
        }

        Some(FilterExpression {
            expression: clauses.join(" AND "),
            names,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_equals_filter() {
        let filter = RecordFilter::new().equals("evaluation_status", "pending");

        assert!(filter.matches(&json!({"evaluation_status": "pending"})));
        assert!(!filter.matches(&json!({"evaluation_status": "passed"})));
        assert!(!filter.matches(&json!({})));
    }

    #[test]
    fn test_conditions_are_conjunctive() {
        let filter = RecordFilter::new()
            .equals("bucket", "kb-qa")
            .equals("status", "active");

        assert!(filter.matches(&json!({"bucket": "kb-qa", "status": "active"})));
        assert!(!filter.matches(&json!({"bucket": "kb-qa", "status": "deleted"})));
        assert!(RecordFilter::new().matches(&json!({"anything": 1})));
    }

    #[test]
    fn test_expression_rendering() {
        let filter = RecordFilter::new()
            .equals("evaluation_status", "pending")
            .equals("has_metadata", true);

        let rendered = filter.to_expression().unwrap();
        assert_eq!(rendered.expression, "#f0 = :v0 AND #f1 = :v1");
        assert_eq!(
            rendered.names,
            vec![
                ("#f0".to_string(), "evaluation_status".to_string()),
                ("#f1".to_string(), "has_metadata".to_string())
            ]
        );
        assert_eq!(rendered.values[1], (":v1".to_string(), json!(true)));
        assert!(RecordFilter::new().to_expression().is_none());
    }
}
