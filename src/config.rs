use anyhow::Result;

use crate::defaults::*;
use crate::errors::PipelineError;

/// Runtime settings shared by every handler, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub metadata_table: String,
    pub success_threshold: f64,
    pub qa_bucket: Option<String>,
    pub prod_bucket: Option<String>,
    pub promotion_prefix: String,
    pub pipeline_name: Option<String>,
    pub approval_stage: String,
    pub approval_action: String,
    pub knowledge_base_id: Option<String>,
    pub data_source_id: Option<String>,
    pub processed_marker: String,
    pub chunk_words: usize,
    pub api_addr: String,
    pub endpoint_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            metadata_table: DEFAULT_METADATA_TABLE.to_string(),
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            qa_bucket: None,
            prod_bucket: None,
            promotion_prefix: String::new(),
            pipeline_name: None,
            approval_stage: DEFAULT_APPROVAL_STAGE.to_string(),
            approval_action: DEFAULT_APPROVAL_ACTION.to_string(),
            knowledge_base_id: None,
            data_source_id: None,
            processed_marker: DEFAULT_PROCESSED_MARKER.to_string(),
            chunk_words: DEFAULT_CHUNK_WORDS,
            api_addr: DEFAULT_API_ADDR.to_string(),
            endpoint_url: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Settings::default();

        let success_threshold = match get("SUCCESS_THRESHOLD") {
            Some(raw) => raw.trim().parse::<f64>().map_err(|e| {
                PipelineError::InvalidConfig(format!("SUCCESS_THRESHOLD {:?}: {}", raw, e))
            })?,
            None => defaults.success_threshold,
        };
        if !(0.0..=1.0).contains(&success_threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "SUCCESS_THRESHOLD must be within 0..=1, got {}",
                success_threshold
            ))
            .into());
        }

        let chunk_words = match get("CHUNK_WORDS") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                PipelineError::InvalidConfig(format!("CHUNK_WORDS {:?}: {}", raw, e))
            })?,
            None => defaults.chunk_words,
        };
        if chunk_words == 0 {
            return Err(PipelineError::InvalidConfig("CHUNK_WORDS must be positive".to_string()).into());
        }

        Ok(Self {
            metadata_table: get("METADATA_TABLE").unwrap_or(defaults.metadata_table),
            success_threshold,
            qa_bucket: get("QA_BUCKET"),
            prod_bucket: get("PROD_BUCKET"),
            promotion_prefix: get("PROMOTION_PREFIX").unwrap_or_default(),
            pipeline_name: get("PIPELINE_NAME"),
            approval_stage: get("APPROVAL_STAGE").unwrap_or(defaults.approval_stage),
            approval_action: get("APPROVAL_ACTION").unwrap_or(defaults.approval_action),
            knowledge_base_id: get("KNOWLEDGE_BASE_ID"),
            data_source_id: get("DATA_SOURCE_ID"),
            processed_marker: get("PROCESSED_BUCKET_MARKER").unwrap_or(defaults.processed_marker),
            chunk_words,
            api_addr: get("API_ADDR").unwrap_or(defaults.api_addr),
            endpoint_url: get("AWS_ENDPOINT_URL"),
        })
    }

    /// Fetch a setting only some handlers need, failing that handler when it is absent.
    pub fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
        value
            .as_deref()
            .ok_or_else(|| PipelineError::InvalidConfig(format!("{} is not set", name)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.success_threshold, 0.8);
    }

    #[test]
    fn test_reads_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("METADATA_TABLE", "tracking"),
            ("SUCCESS_THRESHOLD", "0.65"),
            ("QA_BUCKET", "docs-qa"),
            ("PROD_BUCKET", "docs-prod"),
            ("CHUNK_WORDS", "250"),
            ("PIPELINE_NAME", ""),
        ]))
        .unwrap();
        assert_eq!(settings.metadata_table, "tracking");
        assert_eq!(settings.success_threshold, 0.65);
        assert_eq!(settings.qa_bucket.as_deref(), Some("docs-qa"));
        assert_eq!(settings.chunk_words, 250);
        assert_eq!(settings.pipeline_name, None);
    }

    #[test]
    fn test_rejects_bad_threshold_and_chunk_size() {
        assert!(Settings::from_lookup(lookup(&[("SUCCESS_THRESHOLD", "1.5")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("SUCCESS_THRESHOLD", "high")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("CHUNK_WORDS", "0")])).is_err());
    }

    #[test]
    fn test_require_reports_missing_name() {
        let err = Settings::require(&None, "QA_BUCKET").unwrap_err();
        assert!(err.to_string().contains("QA_BUCKET"));
    }
}
