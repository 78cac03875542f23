//! Projection of raw dataset rows to deduplicated minimal records.
use crate::record::{MinimalRecord, RawRecord};
use std::collections::HashSet;

/// Drop unidentifiable rows, project the rest, and keep the first occurrence
/// of each identity key in input order.
pub fn normalize_records(records: &[RawRecord]) -> Vec<MinimalRecord> {
    let mut seen = HashSet::new();
    let mut minimal = Vec::new();
    let mut dropped = 0usize;
    for record in records {
        if !record.has_mandatory_fields() {
            dropped += 1;
            continue;
        }
        let key = record.identity_key();
        if seen.insert(key.clone()) {
            minimal.push(MinimalRecord::from_key(key));
        }
    }
    tracing::info!(
        input = records.len(),
        incomplete = dropped,
        unique = minimal.len(),
        "normalized dataset records"
    );
    minimal
}
