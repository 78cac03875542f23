//! Shared test infrastructure for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Nothing listens on the discard port, so every lookup fails fast.
pub const UNREACHABLE_GEOCODER: &str = "http://127.0.0.1:9/v1/forward";

/// Scratch workspace holding a dataset snapshot and the run outputs.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let fixture = manifest_dir().join("tests/fixtures/exposures.json");
        fs::copy(&fixture, dir.path().join("snapshot.json")).expect("copy fixture");
        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn store_path(&self) -> PathBuf {
        self.path("database.json")
    }

    pub fn output_path(&self) -> PathBuf {
        self.path("docs/datavic.json")
    }

    /// `run` against the snapshot with the given extra arguments.
    pub fn run(&self, extra: &[&str]) -> Output {
        let mut command = bin();
        command
            .arg("run")
            .arg("--dataset-file")
            .arg(self.path("snapshot.json"))
            .arg("--store")
            .arg(self.store_path())
            .arg("--output")
            .arg(self.output_path())
            .arg("--geocode-endpoint")
            .arg(UNREACHABLE_GEOCODER)
            .arg("--timeout-secs")
            .arg("5")
            .args(extra);
        command.output().expect("run exposure-geocode")
    }

    pub fn read_json(&self, path: &Path) -> serde_json::Value {
        let text = fs::read_to_string(path).expect("read json output");
        serde_json::from_str(&text).expect("parse json output")
    }
}

/// The built binary with no ambient credential.
pub fn bin() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_exposure-geocode"));
    command.env_remove("POSITIONSTACK_ACCESS_KEY");
    command.env("RUST_LOG", "warn");
    command
}

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}
