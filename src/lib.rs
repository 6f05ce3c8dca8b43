//! # texflatten
//!
//! Flatten a multi-file LaTeX source tree into one self-contained
//! `document.tex` plus the files it references.
//!
//! ## Why this crate?
//!
//! Journals and preprint servers want a single source file and a flat
//! directory of figures. Real projects have `\input` trees, `\newif` switches
//! for draft/final builds, shorthand macros, and figures scattered across
//! subdirectories. This crate resolves all of that with a small, fixed
//! directive vocabulary; every other line passes through byte-for-byte.
//!
//! ## Pipeline Overview
//!
//! ```text
//! main.tex
//!  │
//!  ├─ 1. Include      splice \input{...} files depth-first
//!  ├─ 2. Conditional  evaluate \newif flags, drop inactive branches
//!  ├─ 3. Macros       capture allow-listed \newcommand, expand uses
//!  ├─ 4. Assets       report graphics/.cls/.bib, rewrite graphic paths
//!  ├─ 5. Blank lines  collapse blank runs, space out headings
//!  └─ 6. Output       document.tex + copied assets
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use texflatten::{flatten_to_dir, FlattenConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FlattenConfig::default();
//!     let stats = flatten_to_dir("paper", "submission", &config)?;
//!     eprintln!("{} files -> {} lines, {} assets",
//!         stats.files_read, stats.lines_out, stats.unique_assets);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `texflatten` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod flatten;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FlattenConfig, FlattenConfigBuilder};
pub use error::FlattenError;
pub use flatten::{collect_assets, copy_assets, flatten, flatten_str, flatten_to_dir};
pub use output::{Asset, AssetKind, FlattenOutput, FlattenStats};
pub use pipeline::macros::KNOWN_MACROS;
pub use progress::{FlattenProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{flatten_stream, flatten_stream_from_str, FlattenStream};
