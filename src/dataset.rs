//! Dataset retrieval and envelope decoding.
//!
//! The portal answers with a CKAN-style envelope; only `result.records` is
//! consumed. Raw text is returned untouched so sanitization happens in one place.
use crate::config::{DatasetQuery, DatasetSource};
use crate::error::PipelineError;
use crate::record::RawRecord;
use serde_json::Value;
use std::fs;
use std::time::Instant;

/// Upper bound on the dataset response body.
const MAX_DATASET_BYTES: u64 = 256 * 1024 * 1024;

/// Load the raw dataset text from the configured source.
pub fn load_raw(source: &DatasetSource, agent: &ureq::Agent) -> Result<String, PipelineError> {
    match source {
        DatasetSource::File(path) => fs::read_to_string(path)
            .map_err(|err| PipelineError::Fetch(format!("read {}: {err}", path.display()))),
        DatasetSource::Remote(query) => fetch_remote(query, agent),
    }
}

fn fetch_remote(query: &DatasetQuery, agent: &ureq::Agent) -> Result<String, PipelineError> {
    let start = Instant::now();
    let limit = query.limit.to_string();
    let mut request = agent
        .get(&query.endpoint)
        .query("resource_id", &query.resource_id)
        .query("limit", &limit);
    if !query.fields.is_empty() {
        request = request.query("fields", query.fields.join(","));
    }
    let mut response = request
        .call()
        .map_err(|err| PipelineError::Fetch(format!("GET {}: {err}", query.endpoint)))?;
    let text = response
        .body_mut()
        .with_config()
        .limit(MAX_DATASET_BYTES)
        .read_to_string()
        .map_err(|err| PipelineError::Fetch(format!("read dataset body: {err}")))?;

    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        response_bytes = text.len(),
        "dataset fetch complete"
    );
    Ok(text)
}

/// Extract the ordered record list from a parsed envelope.
pub fn records_from_envelope(mut envelope: Value) -> Result<Vec<RawRecord>, PipelineError> {
    if envelope.get("success").and_then(Value::as_bool) == Some(false) {
        let detail = envelope
            .get("error")
            .map(|error| error.to_string())
            .unwrap_or_else(|| "success=false".to_string());
        return Err(PipelineError::Fetch(format!("portal reported failure: {detail}")));
    }
    let Some(Value::Array(records)) = envelope.pointer_mut("/result/records").map(Value::take)
    else {
        return Err(PipelineError::MalformedInput(
            "missing result.records array".to_string(),
        ));
    };
    records
        .into_iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::Object(fields) => Ok(RawRecord::new(fields)),
            other => Err(PipelineError::MalformedInput(format!(
                "result.records[{index}] is not an object: {other}"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_records_in_order() {
        let envelope = json!({
            "success": true,
            "result": {"records": [
                {"_id": 1, "Suburb": "Box Hill"},
                {"_id": 2, "Suburb": "Carlton"}
            ]}
        });
        let records = records_from_envelope(envelope).expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text("Suburb").as_deref(), Some("Carlton"));
    }

    #[test]
    fn portal_failure_is_a_fetch_error() {
        let envelope = json!({"success": false, "error": {"message": "Not found"}});
        let err = records_from_envelope(envelope).expect_err("failure");
        assert!(matches!(err, PipelineError::Fetch(_)));
    }

    #[test]
    fn missing_records_or_scalar_rows_are_malformed() {
        let err = records_from_envelope(json!({"result": {}})).expect_err("missing");
        assert!(matches!(err, PipelineError::MalformedInput(_)));

        let err = records_from_envelope(json!({"result": {"records": [1]}})).expect_err("scalar");
        assert!(matches!(err, PipelineError::MalformedInput(_)));
    }

    #[test]
    fn file_source_reads_text_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dataset.json");
        std::fs::write(&path, "{\"result\": {\"records\": []}}").expect("write");
        let agent = ureq::Agent::new_with_defaults();
        let text = load_raw(&DatasetSource::File(path), &agent).expect("load");
        assert!(text.contains("records"));

        let missing = DatasetSource::File(dir.path().join("absent.json"));
        assert!(matches!(
            load_raw(&missing, &agent),
            Err(PipelineError::Fetch(_))
        ));
    }
}
