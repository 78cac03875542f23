//! Recombination of the full dataset with resolved store entries.
use crate::record::{EnrichedRecord, RawRecord};
use crate::store::Store;

/// One output row per raw record whose site has coordinates, in dataset order.
///
/// Raw rows sharing a site each get their own copy of its coordinates; rows
/// without a resolved site are dropped.
pub fn enrich_records(raw: &[RawRecord], store: &Store) -> Vec<EnrichedRecord> {
    let enriched: Vec<EnrichedRecord> = raw
        .iter()
        .filter_map(|record| {
            let site = store.get(&record.identity_key())?;
            EnrichedRecord::join(record, site)
        })
        .collect();
    tracing::info!(
        raw = raw.len(),
        enriched = enriched.len(),
        "joined coordinates onto dataset"
    );
    enriched
}
