//! Eager (whole-document) flattening entry points.
//!
//! [`flatten`] collects the stream into a [`FlattenOutput`]; use
//! [`crate::stream::flatten_stream`] directly to process lines as they are
//! produced. [`flatten_to_dir`] is what the CLI runs: document plus assets
//! into one directory.

use crate::config::FlattenConfig;
use crate::error::FlattenError;
use crate::output::{dedup_assets, Asset, FlattenOutput, FlattenStats};
use crate::stream::{flatten_stream, flatten_stream_from_str, FlattenStream};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Flatten the document rooted at `start` (`.tex` implied).
///
/// # Errors
/// Returns `Err(FlattenError)` for any fatal condition:
/// - the start file or an `\input` file is missing or unreadable
/// - conditionals are unbalanced or test an undeclared flag
/// - the include depth limit is exceeded
pub fn flatten(start: impl AsRef<Path>, config: &FlattenConfig) -> Result<FlattenOutput, FlattenError> {
    let stream = flatten_stream(start, config)?;
    drain(stream, config)
}

/// Flatten in-memory source text. Includes and assets resolve under `base_dir`.
pub fn flatten_str(source: &str, config: &FlattenConfig) -> Result<FlattenOutput, FlattenError> {
    drain(flatten_stream_from_str(source, config), config)
}

/// Run the pipeline and return only the de-duplicated assets.
///
/// The document text is produced and dropped; this is the list an external
/// copy step needs.
pub fn collect_assets(start: impl AsRef<Path>, config: &FlattenConfig) -> Result<Vec<Asset>, FlattenError> {
    let mut stream = flatten_stream(start, config)?;
    for line in stream.by_ref() {
        line?;
    }
    let assets = stream.take_assets();
    Ok(dedup_assets(&assets).into_iter().cloned().collect())
}

/// Flatten `start` into `out_dir`: `document.tex` plus copies of every asset.
///
/// The output directory is created if needed. The document is written to a
/// temporary file in `out_dir` and renamed into place only after the whole
/// pipeline succeeded, so a failed run never leaves a truncated document.
/// Assets are copied under their basename; when two assets share one, the
/// later one wins and a warning is logged.
pub fn flatten_to_dir(
    start: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &FlattenConfig,
) -> Result<FlattenStats, FlattenError> {
    let out_dir = out_dir.as_ref();
    let doc_path = out_dir.join(&config.output_name);

    std::fs::create_dir_all(out_dir).map_err(|e| FlattenError::OutputWriteFailed {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let mut stream = flatten_stream(start, config)?;

    let write_err = |e: std::io::Error| FlattenError::OutputWriteFailed {
        path: doc_path.clone(),
        source: e,
    };
    let tmp = tempfile::NamedTempFile::new_in(out_dir).map_err(write_err)?;
    let mut writer = BufWriter::new(tmp);
    for line in stream.by_ref() {
        writer.write_all(line?.as_bytes()).map_err(write_err)?;
    }
    let tmp = writer.into_inner().map_err(|e| write_err(e.into_error()))?;
    tmp.persist(&doc_path).map_err(|e| write_err(e.error))?;
    info!("Wrote {}", doc_path.display());

    if config.copy_assets {
        copy_assets(&dedup_assets(stream.assets()), out_dir)?;
    }

    let stats = stream.stats();
    if let Some(ref cb) = config.progress_callback {
        cb.on_flatten_complete(&stats);
    }
    Ok(stats)
}

/// Copy assets flat into `out_dir`, keyed by basename.
pub fn copy_assets(assets: &[&Asset], out_dir: &Path) -> Result<usize, FlattenError> {
    let mut targets: HashMap<OsString, &Path> = HashMap::new();
    let mut copied = 0;

    for asset in assets {
        let Some(name) = asset.file_name() else {
            warn!("Skipping asset without a file name: {}", asset.reference.display());
            continue;
        };
        if let Some(previous) = targets.insert(name.to_os_string(), &asset.reference) {
            warn!(
                "Assets '{}' and '{}' share the name {:?}; keeping the latter",
                previous.display(),
                asset.reference.display(),
                name
            );
        }

        let target = out_dir.join(name);
        if same_file(&asset.resolved, &target) {
            debug!("{} is already in place", target.display());
            continue;
        }
        std::fs::copy(&asset.resolved, &target).map_err(|e| FlattenError::AssetCopyFailed {
            path: asset.resolved.clone(),
            source: e,
        })?;
        debug!("Copied {} -> {}", asset.resolved.display(), target.display());
        copied += 1;
    }

    info!("Copied {} asset(s) to {}", copied, out_dir.display());
    Ok(copied)
}

/// Copying a file onto itself would truncate it.
fn same_file(a: &Path, b: &Path) -> bool {
    match (canonical(a), canonical(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn canonical(p: &Path) -> Option<PathBuf> {
    std::fs::canonicalize(p).ok()
}

fn drain(mut stream: FlattenStream, config: &FlattenConfig) -> Result<FlattenOutput, FlattenError> {
    let mut document = String::new();
    for line in stream.by_ref() {
        document.push_str(&line?);
    }

    let stats = stream.stats();
    let assets = stream.take_assets();
    info!(
        "Flatten complete: {} file(s), {} -> {} lines, {} asset(s), {}ms",
        stats.files_read, stats.lines_in, stats.lines_out, stats.unique_assets, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_flatten_complete(&stats);
    }

    Ok(FlattenOutput {
        document,
        assets,
        stats,
    })
}
