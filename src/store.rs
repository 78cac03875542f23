//! Durable minimal-record store.
//!
//! The store is the only state carried between runs. It grows monotonically:
//! entries are appended on first sight and afterwards only gain coordinates or
//! a skip flag.
use crate::error::PipelineError;
use crate::persist::write_json_atomic;
use crate::record::{IdentityKey, MinimalRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Store {
    records: Vec<MinimalRecord>,
    index: HashMap<IdentityKey, usize>,
}

/// Counts from folding a batch into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub retained: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub pending: usize,
}

impl Store {
    /// Build a store; later duplicates of a key are discarded.
    pub fn from_records(records: Vec<MinimalRecord>) -> Self {
        let mut store = Self::default();
        for record in records {
            store.insert_if_absent(record);
        }
        store
    }

    /// Load the store; an absent file is an empty store, anything unreadable is corrupt.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no store yet; starting empty");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(PipelineError::StoreCorrupt {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                })
            }
        };
        let records: Vec<MinimalRecord> =
            serde_json::from_slice(&bytes).map_err(|err| PipelineError::StoreCorrupt {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        let loaded = records.len();
        let store = Self::from_records(records);
        if store.len() != loaded {
            tracing::warn!(
                path = %path.display(),
                duplicates = loaded - store.len(),
                "store contained duplicate sites; kept first occurrences"
            );
        }
        Ok(store)
    }

    /// Persist as a pretty-printed JSON array in store order.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        write_json_atomic(path, self.records())
    }

    /// Fold freshly normalized records in; existing entries always win.
    pub fn merge(&mut self, incoming: Vec<MinimalRecord>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for record in incoming {
            if self.insert_if_absent(record) {
                outcome.inserted += 1;
            } else {
                outcome.retained += 1;
            }
        }
        tracing::info!(
            inserted = outcome.inserted,
            retained = outcome.retained,
            total = self.len(),
            "merged dataset into store"
        );
        outcome
    }

    fn insert_if_absent(&mut self, record: MinimalRecord) -> bool {
        let key = record.identity_key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&MinimalRecord> {
        self.index.get(key).map(|&position| &self.records[position])
    }

    pub fn records(&self) -> &[MinimalRecord] {
        &self.records
    }

    /// Mutable view for the geocoder; identity fields must not be changed.
    pub fn records_mut(&mut self) -> &mut [MinimalRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: self.records.len(),
            ..StoreStats::default()
        };
        for record in &self.records {
            if record.is_resolved() {
                stats.resolved += 1;
            } else if record.skip {
                stats.skipped += 1;
            } else {
                stats.pending += 1;
            }
        }
        stats
    }

    /// Reset skip flags, optionally only for one postcode. Returns how many changed.
    pub fn clear_skips(&mut self, postcode: Option<&str>) -> usize {
        let mut cleared = 0;
        for record in &mut self.records {
            if !record.skip {
                continue;
            }
            if postcode.is_some_and(|wanted| record.postcode.as_deref() != Some(wanted)) {
                continue;
            }
            record.skip = false;
            cleared += 1;
        }
        cleared
    }
}
