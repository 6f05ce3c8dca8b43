//! Result types returned by the flattening entry points.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Which directive an asset was discovered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// `\includegraphics{...}`
    Graphic,
    /// `\documentclass{...}` resolving to a local `.cls` file.
    Class,
    /// `\bibliography{...}` resolving to a local `.bib` file.
    Bibliography,
}

/// A referenced file that exists on disk and must ship with the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub kind: AssetKind,
    /// Path as written in the source, with the implied extension added
    /// (e.g. `figs/plot.pdf` for `\includegraphics{figs/plot}`).
    pub reference: PathBuf,
    /// Path on disk, i.e. `reference` resolved against the base directory.
    pub resolved: PathBuf,
}

impl Asset {
    /// Final path segment; the name the asset gets in the output directory.
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.reference.file_name()
    }
}

/// Counters collected over one flattening run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenStats {
    /// Source files opened for inclusion, the start file included.
    pub files_read: usize,
    /// Lines produced by include resolution.
    pub lines_in: usize,
    /// Lines in the final document.
    pub lines_out: usize,
    /// `\newif` declarations seen.
    pub flags_declared: usize,
    /// Allow-listed `\newcommand` definitions captured.
    pub macros_defined: usize,
    /// Asset occurrences reported, duplicates included.
    pub assets_found: usize,
    /// Distinct asset paths.
    pub unique_assets: usize,
    /// Wall-clock time of the run.
    pub total_duration_ms: u64,
}

/// Everything a flattening run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenOutput {
    /// The flattened document text.
    pub document: String,
    /// Every asset occurrence in discovery order, duplicates included.
    pub assets: Vec<Asset>,
    pub stats: FlattenStats,
}

impl FlattenOutput {
    /// Assets with duplicate on-disk paths removed, first occurrence kept.
    pub fn unique_assets(&self) -> Vec<&Asset> {
        dedup_assets(&self.assets)
    }
}

/// Remove repeated resolved paths while keeping discovery order.
pub fn dedup_assets(assets: &[Asset]) -> Vec<&Asset> {
    let mut seen: HashSet<&Path> = HashSet::new();
    assets
        .iter()
        .filter(|a| seen.insert(a.resolved.as_path()))
        .collect()
}
