//! Output file writing.
//!
//! Each file is staged next to its destination and renamed into place, so a
//! reader never observes a half-written document. The two outputs are still
//! written independently; a crash between them leaves the store one run behind.
//! A replaced file keeps its permissions; new files are world-readable on Unix.
use crate::config::OutputPaths;
use crate::error::PipelineError;
use crate::record::EnrichedRecord;
use crate::store::Store;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub fn write_json_atomic<T>(path: &Path, value: &T) -> Result<(), PipelineError>
where
    T: Serialize + ?Sized,
{
    let io_err = |source: std::io::Error| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(io_err)?;

    let staged = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    if let Some(permissions) = target_permissions(path) {
        staged.as_file().set_permissions(permissions).map_err(io_err)?;
    }
    {
        let mut writer = BufWriter::new(staged.as_file());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|err| io_err(err.into()))?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)?;
    }
    staged.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => new_file_permissions(),
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

/// Write the enriched dataset, then the updated store.
pub fn write_outputs(
    paths: &OutputPaths,
    enriched: &[EnrichedRecord],
    store: &Store,
) -> Result<(), PipelineError> {
    write_json_atomic(&paths.enriched, enriched)?;
    store.save(&paths.store)?;
    tracing::info!(
        enriched_path = %paths.enriched.display(),
        enriched = enriched.len(),
        store_path = %paths.store.display(),
        stored = store.len(),
        "wrote outputs"
    );
    Ok(())
}
