//! Error taxonomy for a reconciliation run.
//!
//! Only `GeocodeError` is recoverable; it is absorbed per record by the
//! selective geocoder. Every `PipelineError` aborts the run.
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that terminate a run with a non-zero exit status.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("dataset fetch failed: {0}")]
    Fetch(String),

    #[error("malformed dataset: {0}")]
    MalformedInput(String),

    #[error("store {} is corrupt: {reason}", .path.display())]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-record geocoding failure; downgraded to a skip flag by the caller.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("geocoder returned HTTP {0}")]
    Status(u16),

    #[error("geocoder error {code}: {message}")]
    Api { code: String, message: String },

    #[error("no match")]
    NoMatch,

    #[error("malformed geocoder response: {0}")]
    Malformed(String),
}

impl GeocodeError {
    /// Whether a retry could plausibly succeed (rate limiting, outages).
    pub fn is_transient(&self) -> bool {
        match self {
            GeocodeError::Network(_) => true,
            GeocodeError::Status(code) => *code == 429 || *code >= 500,
            GeocodeError::Api { .. } | GeocodeError::NoMatch | GeocodeError::Malformed(_) => {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_covers_rate_limits_and_outages_only() {
        assert!(GeocodeError::Network("reset".to_string()).is_transient());
        assert!(GeocodeError::Status(429).is_transient());
        assert!(GeocodeError::Status(503).is_transient());
        assert!(!GeocodeError::Status(401).is_transient());
        assert!(!GeocodeError::NoMatch.is_transient());
        assert!(!GeocodeError::Malformed("data".to_string()).is_transient());
    }

    #[test]
    fn store_corrupt_message_names_the_file() {
        let err = PipelineError::StoreCorrupt {
            path: PathBuf::from("database.json"),
            reason: "expected value at line 1 column 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "store database.json is corrupt: expected value at line 1 column 1"
        );
    }
}
