//! Custom transformation step for knowledge-base ingestion: split each content
//! body of an intermediate batch into fixed-size word chunks.

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults::CHUNK_OUTPUT_PREFIX;
use crate::errors::PipelineError;
use crate::metrics::get_metrics_collector;
use crate::services::Services;

pub trait Chunker: Send + Sync {
    fn chunk(&self, text: &str) -> Vec<String>;
}

/// Groups whitespace-separated words, `words_per_chunk` at a time.
#[derive(Debug, Clone, Copy)]
pub struct WordChunker {
    pub words_per_chunk: usize,
}

impl Chunker for WordChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        words
            .chunks(self.words_per_chunk.max(1))
            .map(|group| group.join(" "))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkerRequest {
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub input_files: Vec<InputFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFile {
    #[serde(default)]
    pub original_file_location: Value,
    #[serde(default)]
    pub file_metadata: Value,
    #[serde(default)]
    pub content_batches: Vec<ContentBatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBatch {
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContents {
    #[serde(default)]
    pub file_contents: Vec<ContentItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content_metadata: Value,
    #[serde(default)]
    pub content_body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkerResponse {
    pub output_files: Vec<OutputFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    pub original_file_location: Value,
    pub file_metadata: Value,
    pub content_batches: Vec<ContentBatch>,
}

pub fn chunk_contents(contents: &FileContents, chunker: &dyn Chunker) -> FileContents {
    let file_contents = contents
        .file_contents
        .iter()
        .flat_map(|item| {
            chunker.chunk(&item.content_body).into_iter().map(move |chunk| ContentItem {
                content_type: item.content_type.clone(),
                content_metadata: item.content_metadata.clone(),
                content_body: chunk,
            })
        })
        .collect();
    FileContents { file_contents }
}

pub async fn run_chunker(services: &Services, request: &ChunkerRequest) -> Result<ChunkerResponse> {
    let _measurement = crate::measure_operation!("chunker.run");
    let bucket = request
        .bucket_name
        .as_deref()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| PipelineError::InvalidEvent("bucketName is required".to_string()))?;
    if request.input_files.is_empty() {
        return Err(PipelineError::InvalidEvent("inputFiles is required".to_string()).into());
    }

    let chunker = WordChunker {
        words_per_chunk: services.settings.chunk_words,
    };
    let mut output_files = Vec::with_capacity(request.input_files.len());

    for input in &request.input_files {
        let mut batches = Vec::with_capacity(input.content_batches.len());
        for batch in &input.content_batches {
            let key = batch
                .key
                .as_deref()
                .ok_or_else(|| PipelineError::InvalidEvent("content batch is missing 'key'".to_string()))?;

            let raw = services.objects.get_object(bucket, key).await?;
            let contents: FileContents = serde_json::from_slice(&raw)
                .with_context(|| format!("Batch s3://{}/{} is not valid content JSON", bucket, key))?;

            let chunked = chunk_contents(&contents, &chunker);
            let output_key = format!("{}{}", CHUNK_OUTPUT_PREFIX, key);
            services
                .objects
                .put_object(bucket, &output_key, Bytes::from(serde_json::to_vec(&chunked)?))
                .await?;

            tracing::debug!(
                "Chunked {} into {} items at {}",
                key,
                chunked.file_contents.len(),
                output_key
            );
            get_metrics_collector().track_metric("chunker.chunks_written", chunked.file_contents.len() as f64);
            batches.push(ContentBatch { key: Some(output_key) });
        }

        output_files.push(OutputFile {
            original_file_location: input.original_file_location.clone(),
            file_metadata: input.file_metadata.clone(),
            content_batches: batches,
        });
    }

    tracing::info!("Chunked {} input files from {}", output_files.len(), bucket);
    Ok(ChunkerResponse { output_files })
}
