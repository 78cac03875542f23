//! Selective geocoding of store entries.
//!
//! Entries that already carry coordinates or a skip flag are never sent to the
//! service again. Lookups run strictly one at a time, in store order.
mod client;

pub use client::PositionstackClient;

use crate::config::GeocodeSettings;
use crate::error::GeocodeError;
use crate::record::MinimalRecord;
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};

/// Top result of a forward-geocoding lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub latitude: f64,
    pub longitude: f64,
    pub label: Option<String>,
    pub confidence: Option<f64>,
}

/// A forward-geocoding backend.
pub trait Geocoder {
    fn forward(&mut self, query: &str) -> Result<GeocodeHit, GeocodeError>;
}

/// Knobs for one selective pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOptions {
    pub region: String,
    pub country_name: String,
    pub retries: u32,
    pub backoff: Duration,
    pub interval: Duration,
    pub max_lookups: Option<usize>,
}

impl From<&GeocodeSettings> for PassOptions {
    fn from(settings: &GeocodeSettings) -> Self {
        Self {
            region: settings.region.clone(),
            country_name: settings.country_name.clone(),
            retries: settings.retries,
            backoff: settings.backoff,
            interval: settings.interval,
            max_lookups: settings.max_lookups,
        }
    }
}

/// What happened to each entry during a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassTally {
    /// Already settled; no request issued.
    pub cached: usize,
    pub resolved: usize,
    /// Failed this run and flagged `skip`.
    pub skipped: usize,
    /// Left pending because the lookup cap was reached.
    pub deferred: usize,
    /// Requests sent, retries included.
    pub requests: usize,
}

/// Free-text query for a site; a missing state falls back to the region.
pub fn build_query(record: &MinimalRecord, region: &str, country_name: &str) -> String {
    let state = record.state.as_deref().unwrap_or(region);
    [
        record.street_address.as_deref(),
        record.suburb.as_deref(),
        record.postcode.as_deref(),
        Some(state),
        Some(country_name),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Geocode every unsettled entry in place.
pub fn resolve_pending<G: Geocoder + ?Sized>(
    records: &mut [MinimalRecord],
    geocoder: &mut G,
    options: &PassOptions,
) -> PassTally {
    let mut tally = PassTally::default();
    let mut lookups = 0usize;
    let mut last_request: Option<Instant> = None;

    for record in records.iter_mut() {
        let query = build_query(record, &options.region, &options.country_name);
        if record.is_settled() {
            tracing::debug!(%query, "cached");
            tally.cached += 1;
            continue;
        }
        if options.max_lookups.is_some_and(|cap| lookups >= cap) {
            tally.deferred += 1;
            continue;
        }
        lookups += 1;

        tracing::info!(%query, "geocoding");
        let mut attempt = 0u32;
        let outcome = loop {
            pace(&mut last_request, options.interval);
            tally.requests += 1;
            match geocoder.forward(&query) {
                Err(err) if err.is_transient() && attempt < options.retries => {
                    attempt += 1;
                    tracing::debug!(%query, attempt, error = %err, "transient failure; retrying");
                    thread::sleep(retry_delay(options.backoff, attempt));
                }
                other => break other,
            }
        };

        match outcome {
            Ok(hit) => {
                record.latitude = Some(hit.latitude);
                record.longitude = Some(hit.longitude);
                record.label = hit.label;
                record.confidence = hit.confidence;
                tally.resolved += 1;
            }
            Err(err) => {
                tracing::warn!(%query, error = %err, "geocoding failed; marking skip");
                record.skip = true;
                tally.skipped += 1;
            }
        }
    }

    if tally.deferred > 0 {
        tracing::info!(
            deferred = tally.deferred,
            "lookup cap reached; remaining sites stay pending"
        );
    }
    tracing::info!(
        cached = tally.cached,
        resolved = tally.resolved,
        skipped = tally.skipped,
        requests = tally.requests,
        "geocoding pass complete"
    );
    tally
}

/// Linear backoff; saturates instead of overflowing on large settings.
fn retry_delay(backoff: Duration, attempt: u32) -> Duration {
    backoff.saturating_mul(attempt)
}

fn pace(last_request: &mut Option<Instant>, interval: Duration) {
    if let Some(last) = *last_request {
        let elapsed = last.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
    *last_request = Some(Instant::now());
}
