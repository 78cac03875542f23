//! End-to-end reconciliation run.
//!
//! `reconcile` is the pure core (records + store + geocoder in, enriched rows
//! out); `run` wraps it with store loading, dataset retrieval, and persistence.
use crate::config::RunConfig;
use crate::dataset;
use crate::error::PipelineError;
use crate::geocode::{self, Geocoder, PassOptions, PassTally};
use crate::join::enrich_records;
use crate::normalize::normalize_records;
use crate::persist::write_outputs;
use crate::record::{EnrichedRecord, RawRecord};
use crate::sanitize::parse_sanitized;
use crate::store::{MergeOutcome, Store, StoreStats};
use serde::Serialize;
use std::time::Instant;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dataset_records: usize,
    pub unique_sites: usize,
    pub merge: MergeOutcome,
    pub geocode: PassTally,
    pub enriched_records: usize,
    pub store: StoreStats,
}

/// Normalize, merge, geocode, and join; mutates `store` in place.
pub fn reconcile<G: Geocoder + ?Sized>(
    records: &[RawRecord],
    store: &mut Store,
    geocoder: &mut G,
    options: &PassOptions,
) -> (Vec<EnrichedRecord>, RunSummary) {
    let minimal = normalize_records(records);
    let unique_sites = minimal.len();
    let merge = store.merge(minimal);
    let tally = geocode::resolve_pending(store.records_mut(), geocoder, options);
    let enriched = enrich_records(records, store);
    let summary = RunSummary {
        dataset_records: records.len(),
        unique_sites,
        merge,
        geocode: tally,
        enriched_records: enriched.len(),
        store: store.stats(),
    };
    (enriched, summary)
}

/// Parse raw dataset text into ordered records.
pub fn parse_dataset(raw: &str) -> Result<Vec<RawRecord>, PipelineError> {
    let envelope = parse_sanitized(raw)?;
    dataset::records_from_envelope(envelope)
}

/// Execute one full run; nothing is written unless every fatal step succeeds.
pub fn run<G: Geocoder + ?Sized>(
    config: &RunConfig,
    agent: &ureq::Agent,
    geocoder: &mut G,
) -> Result<RunSummary, PipelineError> {
    let start = Instant::now();
    // Load the store first so a corrupt file fails before any network traffic.
    let mut store = Store::load(&config.paths.store)?;
    let raw = dataset::load_raw(&config.dataset, agent)?;
    let records = parse_dataset(&raw)?;

    let options = PassOptions::from(&config.geocode);
    let (enriched, summary) = reconcile(&records, &mut store, geocoder, &options);
    write_outputs(&config.paths, &enriched, &store)?;

    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        enriched = summary.enriched_records,
        stored = summary.store.total,
        "run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetSource, GeocodeSettings, OutputPaths};
    use crate::error::GeocodeError;
    use crate::geocode::GeocodeHit;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    /// Resolves every query except those containing `fail_marker`.
    struct FakeGeocoder {
        fail_marker: &'static str,
        calls: Vec<String>,
    }

    impl FakeGeocoder {
        fn failing_on(fail_marker: &'static str) -> Self {
            Self {
                fail_marker,
                calls: Vec::new(),
            }
        }
    }

    impl Geocoder for FakeGeocoder {
        fn forward(&mut self, query: &str) -> Result<GeocodeHit, GeocodeError> {
            self.calls.push(query.to_string());
            if query.contains(self.fail_marker) {
                return Err(GeocodeError::NoMatch);
            }
            Ok(GeocodeHit {
                latitude: -37.0 - self.calls.len() as f64 / 100.0,
                longitude: 145.0,
                label: Some(query.to_string()),
                confidence: Some(0.8),
            })
        }
    }

    const DATASET: &str = r#"{
        "success": true,
        "result": {"records": [
            {"_id": 1, "Suburb": "Box Hill", "Site_streetaddress": "1 Main St", "Site_state": "VIC", "Site_postcode": "3128", "Site_title": "Cafe\n"},
            {"_id": 2, "Suburb": "Box Hill", "Site_streetaddress": "1 Main St", "Site_state": "VIC", "Site_postcode": "3128", "Site_title": "Cafe\t(again)"},
            {"_id": 3, "Suburb": "Carlton", "Site_streetaddress": "5 Nowhere Rd", "Site_state": "VIC", "Site_postcode": "3053", "Site_title": "Gym"},
            {"_id": 4, "Suburb": "Melbourne", "Site_streetaddress": null, "Site_state": "VIC", "Site_postcode": "3000", "Site_title": "Tram route 86"}
        ]}
    }"#;

    fn options() -> PassOptions {
        PassOptions {
            region: "Victoria".to_string(),
            country_name: "Australia".to_string(),
            retries: 0,
            backoff: Duration::ZERO,
            interval: Duration::ZERO,
            max_lookups: None,
        }
    }

    fn config_for(dir: &Path) -> RunConfig {
        let dataset_path = dir.join("snapshot.json");
        fs::write(&dataset_path, DATASET).expect("write dataset");
        RunConfig {
            dataset: DatasetSource::File(dataset_path),
            geocode: GeocodeSettings {
                endpoint: "http://127.0.0.1:9/v1/forward".to_string(),
                access_key: "test".to_string(),
                region: "Victoria".to_string(),
                country_code: "AU".to_string(),
                country_name: "Australia".to_string(),
                retries: 0,
                backoff: Duration::ZERO,
                interval: Duration::ZERO,
                max_lookups: None,
            },
            paths: OutputPaths {
                enriched: dir.join("docs").join("datavic.json"),
                store: dir.join("database.json"),
            },
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn duplicate_rows_share_one_site_and_both_get_coordinates() {
        let records = parse_dataset(DATASET).expect("parse dataset");
        let mut store = Store::default();
        let mut geocoder = FakeGeocoder::failing_on("Nowhere");
        let (enriched, summary) = reconcile(&records, &mut store, &mut geocoder, &options());

        assert_eq!(summary.dataset_records, 4);
        assert_eq!(summary.unique_sites, 2);
        assert_eq!(geocoder.calls.len(), 2);
        assert_eq!(store.len(), 2);
        assert!(store.records()[1].skip);

        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].fields()["Site_title"], "Cafe");
        assert_eq!(enriched[1].fields()["Site_title"], "Cafe(again)");
        assert_eq!(
            enriched[0].fields()["latitude"],
            enriched[1].fields()["latitude"]
        );
    }

    #[test]
    fn rerun_on_same_dataset_is_idempotent_and_offline() {
        let records = parse_dataset(DATASET).expect("parse dataset");
        let mut store = Store::default();
        let (first_rows, _) = reconcile(
            &records,
            &mut store,
            &mut FakeGeocoder::failing_on("Nowhere"),
            &options(),
        );
        let first_store = store.clone();

        let mut geocoder = FakeGeocoder::failing_on("Nowhere");
        let (second_rows, summary) = reconcile(&records, &mut store, &mut geocoder, &options());
        assert!(geocoder.calls.is_empty());
        assert_eq!(summary.merge.inserted, 0);
        assert_eq!(store, first_store);
        assert_eq!(second_rows, first_rows);
    }

    #[test]
    fn run_writes_outputs_and_second_run_keeps_store_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_for(dir.path());
        let agent = ureq::Agent::new_with_defaults();

        let summary = run(&config, &agent, &mut FakeGeocoder::failing_on("Nowhere"))
            .expect("first run");
        assert_eq!(summary.store.resolved, 1);
        assert_eq!(summary.store.skipped, 1);
        let first_store = fs::read(&config.paths.store).expect("read store");
        let enriched: serde_json::Value =
            serde_json::from_slice(&fs::read(&config.paths.enriched).expect("read enriched"))
                .expect("parse enriched");
        assert_eq!(enriched.as_array().map(Vec::len), Some(2));

        let mut geocoder = FakeGeocoder::failing_on("Nowhere");
        run(&config, &agent, &mut geocoder).expect("second run");
        assert!(geocoder.calls.is_empty());
        assert_eq!(fs::read(&config.paths.store).expect("reread store"), first_store);
    }

    #[test]
    fn corrupt_store_aborts_before_writing_anything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_for(dir.path());
        fs::write(&config.paths.store, "not json").expect("write corrupt store");
        let agent = ureq::Agent::new_with_defaults();

        let mut geocoder = FakeGeocoder::failing_on("Nowhere");
        let err = run(&config, &agent, &mut geocoder).expect_err("corrupt store");
        assert!(matches!(err, PipelineError::StoreCorrupt { .. }));
        assert!(geocoder.calls.is_empty());
        assert!(!config.paths.enriched.exists());
        assert_eq!(
            fs::read_to_string(&config.paths.store).expect("read store"),
            "not json"
        );
    }

    #[test]
    fn malformed_dataset_aborts_without_outputs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_for(dir.path());
        let DatasetSource::File(path) = &config.dataset else {
            panic!("expected file dataset");
        };
        fs::write(path, "{\"result\": {\"records\": [").expect("write truncated dataset");
        let agent = ureq::Agent::new_with_defaults();

        let err = run(&config, &agent, &mut FakeGeocoder::failing_on("Nowhere"))
            .expect_err("malformed dataset");
        assert!(matches!(err, PipelineError::MalformedInput(_)));
        assert!(!config.paths.store.exists());
        assert!(!config.paths.enriched.exists());
    }
}
