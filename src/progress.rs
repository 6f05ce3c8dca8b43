//! Progress-callback trait for flattening events.
//!
//! Inject an [`Arc<dyn FlattenProgressCallback>`] via
//! [`crate::config::FlattenConfigBuilder::progress_callback`] to be told
//! about every source file the pipeline opens and every asset it finds.
//! The CLI uses this to drive its spinner.
//!
//! # Example
//!
//! ```rust
//! use texflatten::{Asset, FlattenConfig, FlattenProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct AssetCounter {
//!     seen: AtomicUsize,
//! }
//!
//! impl FlattenProgressCallback for AssetCounter {
//!     fn on_asset(&self, asset: &Asset) {
//!         self.seen.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("found {}", asset.reference.display());
//!     }
//! }
//!
//! let counter = Arc::new(AssetCounter { seen: AtomicUsize::new(0) });
//!
//! let config = FlattenConfig::builder()
//!     .progress_callback(counter as Arc<dyn FlattenProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{Asset, FlattenStats};
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as it reads files and discovers assets.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The pipeline is single-threaded; `Send + Sync` is
/// required only so a config can be shared across threads.
pub trait FlattenProgressCallback: Send + Sync {
    /// Called when a source file is opened.
    ///
    /// # Arguments
    /// * `path`: resolved path of the file
    /// * `depth`: nesting depth (0 for the start file)
    fn on_file_open(&self, path: &Path, depth: usize) {
        let _ = (path, depth);
    }

    /// Called once per discovered asset occurrence, in discovery order.
    fn on_asset(&self, asset: &Asset) {
        let _ = asset;
    }

    /// Called once after the whole document has been produced.
    fn on_flatten_complete(&self, stats: &FlattenStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl FlattenProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::FlattenConfig`].
pub type ProgressCallback = Arc<dyn FlattenProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::AssetKind;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        opens: AtomicUsize,
        max_depth: AtomicUsize,
        assets: AtomicUsize,
    }

    impl FlattenProgressCallback for TrackingCallback {
        fn on_file_open(&self, _path: &Path, depth: usize) {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.max_depth.fetch_max(depth, Ordering::SeqCst);
        }

        fn on_asset(&self, _asset: &Asset) {
            self.assets.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample_asset() -> Asset {
        Asset {
            kind: AssetKind::Graphic,
            reference: PathBuf::from("figs/plot.pdf"),
            resolved: PathBuf::from("./figs/plot.pdf"),
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_file_open(Path::new("main.tex"), 0);
        cb.on_asset(&sample_asset());
        cb.on_flatten_complete(&FlattenStats::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            opens: AtomicUsize::new(0),
            max_depth: AtomicUsize::new(0),
            assets: AtomicUsize::new(0),
        };

        tracker.on_file_open(Path::new("main.tex"), 0);
        tracker.on_file_open(Path::new("intro.tex"), 1);
        tracker.on_file_open(Path::new("intro/detail.tex"), 2);
        tracker.on_asset(&sample_asset());

        assert_eq!(tracker.opens.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.max_depth.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.assets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn FlattenProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_file_open(Path::new("main.tex"), 0);
        cb.on_asset(&sample_asset());
    }
}
