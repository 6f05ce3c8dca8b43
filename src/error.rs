//! Error types for the texflatten library.
//!
//! Every failure is fatal: a flattening run either produces a complete
//! document or aborts. There is no per-line recovery, so a single
//! [`FlattenError`] enum covers input, structural, and output failures.
//!
//! Malformed directives are *not* errors. A line that only looks like a
//! directive is passed through as ordinary text.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the texflatten library.
#[derive(Debug, Error)]
pub enum FlattenError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// An included file (or a class file selected for scanning) does not exist.
    #[error("Source file not found: '{path}'\nCheck the \\input name and the base directory.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was opened but reading it failed (I/O error or invalid UTF-8).
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Structure errors ──────────────────────────────────────────────────
    /// The conditional stack did not return to its top-level sentinel.
    ///
    /// `residual` holds the stack contents at the point of failure. An empty
    /// stack means an `\fi` appeared with no open conditional.
    #[error("Unmatched conditional: residual stack {residual:?}")]
    UnmatchedConditional { residual: Vec<bool> },

    /// A conditional test referenced a flag that was never declared.
    #[error("Unknown flag '{flag}': \\if{flag} used without a preceding \\newif\\if{flag}")]
    UnknownFlag { flag: String },

    /// Include (or class-file) nesting went deeper than the configured limit.
    ///
    /// This is how a cyclic `\input` graph surfaces.
    #[error("Include depth limit {limit} exceeded while opening '{path}'\nIs there an \\input cycle?")]
    IncludeDepthExceeded { path: PathBuf, limit: usize },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the flattened document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not copy a discovered asset into the output directory.
    #[error("Failed to copy asset '{path}': {source}")]
    AssetCopyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlattenError {
    /// Map an `open()` failure to the most specific variant.
    pub(crate) fn from_open(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FlattenError::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => FlattenError::PermissionDenied { path },
            _ => FlattenError::ReadFailed { path, source: err },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_conditional_display() {
        let e = FlattenError::UnmatchedConditional {
            residual: vec![true, false],
        };
        let msg = e.to_string();
        assert!(msg.contains("[true, false]"), "got: {msg}");
    }

    #[test]
    fn unknown_flag_display() {
        let e = FlattenError::UnknownFlag {
            flag: "draft".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("'draft'"), "got: {msg}");
        assert!(msg.contains("\\newif\\ifdraft"), "got: {msg}");
    }

    #[test]
    fn depth_exceeded_display() {
        let e = FlattenError::IncludeDepthExceeded {
            path: PathBuf::from("loop.tex"),
            limit: 64,
        };
        assert!(e.to_string().contains("64"));
        assert!(e.to_string().contains("loop.tex"));
    }

    #[test]
    fn from_open_maps_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let e = FlattenError::from_open(PathBuf::from("missing.tex"), err);
        assert!(matches!(e, FlattenError::FileNotFound { .. }));
    }

    #[test]
    fn from_open_maps_other_to_read_failed() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let e = FlattenError::from_open(PathBuf::from("a.tex"), err);
        assert!(matches!(e, FlattenError::ReadFailed { .. }));
        assert!(e.to_string().contains("disk on fire"));
    }
}
