//! Configuration types for flattening a LaTeX source tree.
//!
//! All flattening behaviour is controlled through [`FlattenConfig`], built
//! via its [`FlattenConfigBuilder`]. The directive vocabulary itself is fixed;
//! the config only decides *where* files are looked up and *what* happens
//! to the results.

use crate::error::FlattenError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Name of the flattened document written into the output directory.
pub const DEFAULT_OUTPUT_NAME: &str = "document.tex";

/// Extension appended to `\includegraphics` paths that have none.
pub const DEFAULT_GRAPHIC_EXTENSION: &str = "pdf";

/// Configuration for a flattening run.
///
/// Built via [`FlattenConfig::builder()`] or using
/// [`FlattenConfig::default()`].
///
/// # Example
/// ```rust
/// use texflatten::FlattenConfig;
///
/// let config = FlattenConfig::builder()
///     .base_dir("paper")
///     .default_graphic_extension("png")
///     .build()
///     .unwrap();
/// assert_eq!(config.default_graphic_extension, "png");
/// ```
#[derive(Clone)]
pub struct FlattenConfig {
    /// Directory that the start file and every `\input`, `\includegraphics`,
    /// `\documentclass` and `\bibliography` path are resolved against.
    /// Absolute paths are used as-is. Default: `.`.
    ///
    /// LaTeX itself resolves these against the directory it was started in,
    /// so the default reproduces running from the project root.
    pub base_dir: PathBuf,

    /// File name of the flattened document inside the output directory.
    /// Default: `document.tex`.
    pub output_name: String,

    /// Extension (without the dot) tried for graphics written without one.
    /// Default: `pdf`, which is what pdflatex picks first.
    pub default_graphic_extension: String,

    /// Maximum nesting of `\input` files and scanned class files. Default: 64.
    ///
    /// No real document comes near this. Hitting it almost always means an
    /// include cycle.
    pub max_include_depth: usize,

    /// Copy discovered assets next to the flattened document. Default: true.
    pub copy_assets: bool,

    /// Observer for file-open and asset events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            default_graphic_extension: DEFAULT_GRAPHIC_EXTENSION.to_string(),
            max_include_depth: 64,
            copy_assets: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for FlattenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlattenConfig")
            .field("base_dir", &self.base_dir)
            .field("output_name", &self.output_name)
            .field("default_graphic_extension", &self.default_graphic_extension)
            .field("max_include_depth", &self.max_include_depth)
            .field("copy_assets", &self.copy_assets)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn FlattenProgressCallback>"),
            )
            .finish()
    }
}

impl FlattenConfig {
    /// Create a new builder for `FlattenConfig`.
    pub fn builder() -> FlattenConfigBuilder {
        FlattenConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`FlattenConfig`].
#[derive(Debug)]
pub struct FlattenConfigBuilder {
    config: FlattenConfig,
}

impl FlattenConfigBuilder {
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = dir.into();
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.config.output_name = name.into();
        self
    }

    /// Accepts `pdf` or `.pdf`; the leading dot is dropped.
    pub fn default_graphic_extension(mut self, ext: impl Into<String>) -> Self {
        let ext = ext.into();
        self.config.default_graphic_extension = ext.trim_start_matches('.').to_string();
        self
    }

    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.config.max_include_depth = depth;
        self
    }

    pub fn copy_assets(mut self, v: bool) -> Self {
        self.config.copy_assets = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FlattenConfig, FlattenError> {
        let c = &self.config;
        if c.max_include_depth == 0 {
            return Err(FlattenError::InvalidConfig(
                "Include depth limit must be ≥ 1".into(),
            ));
        }
        if c.default_graphic_extension.is_empty() {
            return Err(FlattenError::InvalidConfig(
                "Default graphic extension must not be empty".into(),
            ));
        }
        if c.default_graphic_extension.contains(['/', '\\']) {
            return Err(FlattenError::InvalidConfig(format!(
                "Default graphic extension must not contain a path separator, got '{}'",
                c.default_graphic_extension
            )));
        }
        if c.output_name.is_empty() || c.output_name.contains(['/', '\\']) {
            return Err(FlattenError::InvalidConfig(format!(
                "Output name must be a plain file name, got '{}'",
                c.output_name
            )));
        }
        Ok(self.config)
    }
}
