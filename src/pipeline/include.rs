//! Include resolution: splice `\input{...}` files depth-first.
//!
//! The resolver keeps an explicit stack of open readers instead of
//! recursing, so each file handle is closed as soon as its last line has
//! been read and an include cycle surfaces as
//! [`FlattenError::IncludeDepthExceeded`] rather than a stack overflow.

use crate::config::FlattenConfig;
use crate::error::FlattenError;
use crate::pipeline::comment::trim_newline;
use crate::pipeline::LineResult;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// `\input{name}`, optionally followed by spaces and a comment, alone on the line.
static RE_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\\input\{([^}]*)\} *(?:%.*)?$").unwrap());

/// Return the file name named by an include directive, if the line is one.
///
/// `line` must not contain its trailing newline.
pub fn include_target(line: &str) -> Option<&str> {
    RE_INPUT
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Append the implied `.tex` extension unless it is already there.
pub fn tex_file_name(name: &str) -> String {
    if name.ends_with(".tex") {
        name.to_string()
    } else {
        format!("{name}.tex")
    }
}

/// Locate the start file: used as given if it exists, otherwise with `.tex` added.
pub fn resolve_start(start: &Path) -> PathBuf {
    if start.is_file() {
        return start.to_path_buf();
    }
    match start.to_str() {
        Some(s) => PathBuf::from(tex_file_name(s)),
        None => start.to_path_buf(),
    }
}

struct Frame {
    path: PathBuf,
    reader: Box<dyn BufRead>,
    depth: usize,
}

/// Lazy, single-pass stream of the fully expanded document.
pub struct IncludeResolver {
    stack: Vec<Frame>,
    base_dir: PathBuf,
    max_depth: usize,
    progress: Option<ProgressCallback>,
    files_read: usize,
    lines_read: usize,
    failed: bool,
}

impl IncludeResolver {
    /// Open the start file (`.tex` implied) and prepare to stream it.
    ///
    /// A relative `start` is taken relative to `config.base_dir`, like every
    /// `\input` below it.
    pub fn open(start: &Path, config: &FlattenConfig) -> Result<Self, FlattenError> {
        let mut resolver = Self::empty(config);
        resolver.push_file(resolve_start(&config.base_dir.join(start)), 0)?;
        Ok(resolver)
    }

    /// Stream from an in-memory reader; includes still resolve under `base_dir`.
    pub fn from_reader(
        name: impl Into<PathBuf>,
        reader: impl BufRead + 'static,
        config: &FlattenConfig,
    ) -> Self {
        let mut resolver = Self::empty(config);
        resolver.stack.push(Frame {
            path: name.into(),
            reader: Box::new(reader),
            depth: 0,
        });
        resolver
    }

    fn empty(config: &FlattenConfig) -> Self {
        Self {
            stack: Vec::new(),
            base_dir: config.base_dir.clone(),
            max_depth: config.max_include_depth,
            progress: config.progress_callback.clone(),
            files_read: 0,
            lines_read: 0,
            failed: false,
        }
    }

    /// Files opened so far, the start file included.
    pub fn files_read(&self) -> usize {
        self.files_read
    }

    /// Lines yielded so far.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    fn push_file(&mut self, path: PathBuf, depth: usize) -> Result<(), FlattenError> {
        if depth > self.max_depth {
            return Err(FlattenError::IncludeDepthExceeded {
                path,
                limit: self.max_depth,
            });
        }
        let file = File::open(&path).map_err(|e| FlattenError::from_open(path.clone(), e))?;
        debug!("Opened {} (depth {})", path.display(), depth);
        if let Some(ref cb) = self.progress {
            cb.on_file_open(&path, depth);
        }
        self.files_read += 1;
        self.stack.push(Frame {
            path,
            reader: Box::new(BufReader::new(file)),
            depth,
        });
        Ok(())
    }
}

impl Iterator for IncludeResolver {
    type Item = LineResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let frame = self.stack.last_mut()?;
            let mut line = String::new();
            match frame.reader.read_line(&mut line) {
                Ok(0) => {
                    debug!("Finished {}", frame.path.display());
                    self.stack.pop();
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(FlattenError::ReadFailed {
                        path: frame.path.clone(),
                        source: e,
                    }));
                }
            }

            let depth = frame.depth;
            if let Some(name) = include_target(trim_newline(&line)) {
                let path = self.base_dir.join(tex_file_name(name));
                if let Err(e) = self.push_file(path, depth + 1) {
                    self.failed = true;
                    return Some(Err(e));
                }
                continue;
            }

            // A spliced file's last line must not run into the includer's next line.
            if depth > 0 && !line.ends_with('\n') {
                line.push('\n');
            }
            self.lines_read += 1;
            return Some(Ok(line));
        }
    }
}
