//! Printing rendered hash results

use colored::*;
use rangehash_core::{ArtifactIndex, Job, Payload, RenderedResult};
use serde_json::{Map, Value, json};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Parse the `output.default_format` config value, falling back to text
    pub fn from_config(value: &str) -> Self {
        <Self as clap::ValueEnum>::from_str(value, true).unwrap_or(OutputFormat::Text)
    }
}

/// Record keys whose values are artifact file ids
pub fn is_artifact_key(key: &str) -> bool {
    key == "Hash file" || key.starts_with("Stream")
}

/// Artifact ids referenced by a record, in record order
pub fn artifact_ids(fields: &[(String, String)]) -> Vec<&str> {
    fields
        .iter()
        .filter(|(key, _)| is_artifact_key(key))
        .map(|(_, value)| value.as_str())
        .collect()
}

/// `Key: value` lines, keys highlighted when `color` is set
pub fn record_text(fields: &[(String, String)], color: bool) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            if color {
                format!("{}: {}\n", key.yellow(), value.cyan())
            } else {
                format!("{key}: {value}\n")
            }
        })
        .collect()
}

/// JSON document describing a finished job and its rendering
///
/// Artifact ids in the record are paired with their on-disk paths, since
/// ids are only meaningful inside this process.
pub fn result_json(job: &Job, rendered: &RenderedResult, artifacts: &ArtifactIndex) -> Value {
    let mut doc = Map::new();
    doc.insert("job".to_string(), json!(job.summary()));
    doc.insert("content_type".to_string(), json!(rendered.content_type));

    match &rendered.payload {
        Payload::Record(record) => {
            let fields: Map<String, Value> = record
                .fields()
                .iter()
                .map(|(key, value)| (key.clone(), json!(value)))
                .collect();
            let files: Map<String, Value> = artifact_ids(record.fields())
                .into_iter()
                .filter_map(|id| {
                    artifacts
                        .path(id)
                        .map(|path| (id.to_string(), json!(path.display().to_string())))
                })
                .collect();
            doc.insert("record".to_string(), Value::Object(fields));
            doc.insert("artifacts".to_string(), Value::Object(files));
        }
        Payload::File(path) => {
            doc.insert("file".to_string(), json!(path.display().to_string()));
        }
    }
    Value::Object(doc)
}
