//! Streaming API: the composed pipeline as a lazy line iterator.
//!
//! [`flatten_stream`] opens the start file and returns a [`FlattenStream`]
//! that yields one output line at a time. Nothing is buffered beyond the
//! per-stage state, so arbitrarily large documents flatten in constant
//! memory. The eager [`crate::flatten::flatten`] is a thin wrapper that
//! concatenates this stream.
//!
//! The first error ends the stream. Lines already yielded must then be
//! treated as an incomplete document.

use crate::config::FlattenConfig;
use crate::error::FlattenError;
use crate::output::{dedup_assets, Asset, FlattenStats};
use crate::pipeline::assets::AssetScanner;
use crate::pipeline::blank_lines::BlankLineNormalizer;
use crate::pipeline::conditional::ConditionalState;
use crate::pipeline::include::IncludeResolver;
use crate::pipeline::macros::MacroTable;
use crate::pipeline::{LineResult, Staged};
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;
use tracing::info;

type Conditionals = Staged<IncludeResolver, ConditionalState>;
type Expanded = Staged<Conditionals, MacroTable>;
type Scanned = Staged<Expanded, AssetScanner>;

/// Lazy stream of flattened document lines.
pub struct FlattenStream {
    lines: BlankLineNormalizer<Scanned>,
    started: Instant,
    lines_out: usize,
}

impl FlattenStream {
    /// Compose the remaining stages on top of an include resolver.
    pub fn new(resolver: IncludeResolver, config: &FlattenConfig) -> Self {
        let conditionals = Staged::new(resolver, ConditionalState::new());
        let expanded = Staged::new(conditionals, MacroTable::new());
        let scanned = Staged::new(expanded, AssetScanner::new(config));
        Self {
            lines: BlankLineNormalizer::new(scanned),
            started: Instant::now(),
            lines_out: 0,
        }
    }

    /// Assets discovered so far, duplicates included.
    pub fn assets(&self) -> &[Asset] {
        self.lines.get_ref().stage().assets()
    }

    /// Move the discovered assets out of the stream.
    pub fn take_assets(&mut self) -> Vec<Asset> {
        self.lines.get_mut().stage_mut().take_assets()
    }

    /// Counters for everything consumed so far.
    pub fn stats(&self) -> FlattenStats {
        let scanned = self.lines.get_ref();
        let expanded = scanned.get_ref();
        let conditionals = expanded.get_ref();
        let resolver = conditionals.get_ref();
        let assets = scanned.stage().assets();

        FlattenStats {
            files_read: resolver.files_read(),
            lines_in: resolver.lines_read(),
            lines_out: self.lines_out,
            flags_declared: conditionals.stage().declared(),
            macros_defined: expanded.stage().definitions_seen(),
            assets_found: assets.len(),
            unique_assets: dedup_assets(assets).len(),
            total_duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

impl Iterator for FlattenStream {
    type Item = LineResult;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.lines.next();
        if let Some(Ok(_)) = item {
            self.lines_out += 1;
        }
        item
    }
}

/// Open `start` (`.tex` implied) and stream the flattened document.
///
/// # Errors
/// Fails immediately only if the start file cannot be opened; every later
/// failure arrives as an `Err` item in the stream.
pub fn flatten_stream(
    start: impl AsRef<Path>,
    config: &FlattenConfig,
) -> Result<FlattenStream, FlattenError> {
    let start = start.as_ref();
    info!("Starting flatten: {}", start.display());
    let resolver = IncludeResolver::open(start, config)?;
    Ok(FlattenStream::new(resolver, config))
}

/// Stream the flattened form of in-memory source text.
///
/// `\input` and asset paths still resolve against `config.base_dir`.
pub fn flatten_stream_from_str(source: &str, config: &FlattenConfig) -> FlattenStream {
    let reader = Cursor::new(source.as_bytes().to_vec());
    let resolver = IncludeResolver::from_reader("<memory>", reader, config);
    FlattenStream::new(resolver, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stream_yields_lines_lazily() {
        let config = FlattenConfig::default();
        let mut s = flatten_stream_from_str("one\ntwo\n", &config);
        assert_eq!(s.next().unwrap().unwrap(), "one\n");
        assert_eq!(s.stats().lines_out, 1);
        assert_eq!(s.next().unwrap().unwrap(), "two\n");
        assert!(s.next().is_none());
        assert_eq!(s.stats().lines_out, 2);
    }

    #[test]
    fn stats_reflect_every_stage() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fig.pdf"), "").unwrap();
        std::fs::write(
            dir.path().join("main.tex"),
            "\\newif\\ifdraft\n\\newcommand{\\BigO}{O(n)}\n\\includegraphics{fig}\n\\includegraphics{fig}\n\\BigO\n",
        )
        .unwrap();
        let config = FlattenConfig::builder()
            .base_dir(dir.path())
            .build()
            .unwrap();

        let mut s = flatten_stream(dir.path().join("main.tex"), &config).unwrap();
        let lines: Vec<String> = s.by_ref().collect::<Result<_, _>>().unwrap();
        let stats = s.stats();

        assert_eq!(lines, vec!["\n", "\\includegraphics{fig.pdf}\n", "\\includegraphics{fig.pdf}\n", "O(n)\n"]);
        assert_eq!(stats.files_read, 1);
        assert_eq!(stats.lines_in, 5);
        assert_eq!(stats.lines_out, 4);
        assert_eq!(stats.flags_declared, 1);
        assert_eq!(stats.macros_defined, 1);
        assert_eq!(stats.assets_found, 2);
        assert_eq!(stats.unique_assets, 1);
        assert_eq!(s.take_assets().len(), 2);
        assert!(s.assets().is_empty());
    }

    #[test]
    fn missing_start_file_fails_up_front() {
        let dir = TempDir::new().unwrap();
        let config = FlattenConfig::builder()
            .base_dir(dir.path())
            .build()
            .unwrap();
        let err = flatten_stream(dir.path().join("nope"), &config).err().unwrap();
        assert!(matches!(err, FlattenError::FileNotFound { .. }));
    }
}
