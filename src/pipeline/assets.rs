//! Asset discovery: find the files a flattened document still depends on.
//!
//! Three directives are recognised anywhere on a line:
//!
//! - `\includegraphics[opts]{path}`: `path` gets the default extension if it
//!   has none; when the file exists it is reported and the argument is
//!   rewritten to its basename, since assets land flat in the output dir.
//! - `\documentclass[opts]{name}`: a local `name.cls` is reported and then
//!   scanned for assets of its own. The class text itself is not emitted.
//! - `\bibliography{a,b}`: each local `a.bib`, `b.bib` is reported.
//!
//! References to files that do not exist (system classes, TeX-tree graphics)
//! are left alone and are not errors. Duplicates are reported every time;
//! de-duplication belongs to whoever copies the files.

use crate::config::FlattenConfig;
use crate::error::FlattenError;
use crate::output::{Asset, AssetKind};
use crate::pipeline::LineStage;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

static RE_GRAPHICS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\includegraphics(?:\[[^\]]*\])?\{([^}]*)\}").unwrap());

static RE_DOCUMENTCLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\documentclass(?:\[[^\]]*\])?\{([^}]*)\}").unwrap());

static RE_BIBLIOGRAPHY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\bibliography\{([^}]*)\}").unwrap());

/// Per-asset hook in addition to the progress callback.
pub type Reporter = Box<dyn FnMut(&Asset)>;

/// Scans lines for asset references and records every existing one.
pub struct AssetScanner {
    base_dir: PathBuf,
    default_extension: String,
    max_depth: usize,
    progress: Option<ProgressCallback>,
    reporter: Option<Reporter>,
    found: Vec<Asset>,
}

impl AssetScanner {
    pub fn new(config: &FlattenConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
            default_extension: config.default_graphic_extension.clone(),
            max_depth: config.max_include_depth,
            progress: config.progress_callback.clone(),
            reporter: None,
            found: Vec::new(),
        }
    }

    /// Also hand every discovered asset to `report`.
    pub fn with_reporter(mut self, report: impl FnMut(&Asset) + 'static) -> Self {
        self.reporter = Some(Box::new(report));
        self
    }

    /// Every asset occurrence so far, in discovery order.
    pub fn assets(&self) -> &[Asset] {
        &self.found
    }

    pub fn take_assets(&mut self) -> Vec<Asset> {
        std::mem::take(&mut self.found)
    }

    /// Scan one document line, returning it with graphic paths rewritten.
    pub fn scan_line(&mut self, line: String) -> Result<String, FlattenError> {
        self.scan_line_at(line, 0)
    }

    fn scan_line_at(&mut self, line: String, depth: usize) -> Result<String, FlattenError> {
        let line = if RE_GRAPHICS.is_match(&line) {
            self.rewrite_graphics(&line)
        } else {
            line
        };

        if let Some(name) = RE_DOCUMENTCLASS
            .captures(&line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
        {
            let reference = PathBuf::from(format!("{name}.cls"));
            if let Some(asset) = self.existing(AssetKind::Class, reference) {
                let class_path = asset.resolved.clone();
                self.report(asset);
                self.scan_class_file(class_path, depth + 1)?;
            }
        }

        if let Some(names) = RE_BIBLIOGRAPHY.captures(&line).and_then(|caps| caps.get(1)) {
            let references: Vec<PathBuf> = names
                .as_str()
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(|n| PathBuf::from(format!("{n}.bib")))
                .collect();
            for reference in references {
                if let Some(asset) = self.existing(AssetKind::Bibliography, reference) {
                    self.report(asset);
                }
            }
        }

        Ok(line)
    }

    fn rewrite_graphics(&mut self, line: &str) -> String {
        RE_GRAPHICS
            .replace_all(line, |caps: &Captures<'_>| {
                let (Some(whole), Some(arg)) = (caps.get(0), caps.get(1)) else {
                    return caps[0].to_string();
                };
                let reference = self.graphic_reference(arg.as_str());
                let Some(asset) = self.existing(AssetKind::Graphic, reference) else {
                    return caps[0].to_string();
                };
                let basename = match asset.file_name() {
                    Some(name) => name.to_string_lossy().into_owned(),
                    None => return caps[0].to_string(),
                };
                self.report(asset);

                let text = whole.as_str();
                let start = arg.start() - whole.start();
                let end = arg.end() - whole.start();
                format!("{}{}{}", &text[..start], basename, &text[end..])
            })
            .into_owned()
    }

    /// The path as referenced, with the default extension when it has none.
    fn graphic_reference(&self, raw: &str) -> PathBuf {
        let raw = raw.trim();
        if Path::new(raw).extension().is_some() {
            PathBuf::from(raw)
        } else {
            PathBuf::from(format!("{raw}.{}", self.default_extension))
        }
    }

    fn existing(&self, kind: AssetKind, reference: PathBuf) -> Option<Asset> {
        let resolved = self.base_dir.join(&reference);
        resolved.is_file().then_some(Asset {
            kind,
            reference,
            resolved,
        })
    }

    fn report(&mut self, asset: Asset) {
        debug!("Found {:?} asset {}", asset.kind, asset.reference.display());
        if let Some(ref cb) = self.progress {
            cb.on_asset(&asset);
        }
        if let Some(ref mut report) = self.reporter {
            report(&asset);
        }
        self.found.push(asset);
    }

    /// Scan a class file for nested asset references; its text is discarded.
    fn scan_class_file(&mut self, path: PathBuf, depth: usize) -> Result<(), FlattenError> {
        if depth > self.max_depth {
            return Err(FlattenError::IncludeDepthExceeded {
                path,
                limit: self.max_depth,
            });
        }
        let file = File::open(&path).map_err(|e| FlattenError::from_open(path.clone(), e))?;
        if let Some(ref cb) = self.progress {
            cb.on_file_open(&path, depth);
        }
        debug!("Scanning class file {}", path.display());
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| FlattenError::ReadFailed {
                path: path.clone(),
                source: e,
            })?;
            self.scan_line_at(line, depth)?;
        }
        Ok(())
    }
}

impl LineStage for AssetScanner {
    fn process(&mut self, line: String) -> Result<Option<String>, FlattenError> {
        self.scan_line(line).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn tree(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for f in files {
            let p = dir.path().join(f);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(p, "").unwrap();
        }
        dir
    }

    fn scanner(dir: &TempDir) -> AssetScanner {
        AssetScanner::new(&FlattenConfig::builder().base_dir(dir.path()).build().unwrap())
    }

    fn references(scanner: &AssetScanner) -> Vec<String> {
        scanner
            .assets()
            .iter()
            .map(|a| a.reference.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn graphic_gets_default_extension_and_basename() {
        let dir = tree(&["figs/plot.pdf"]);
        let mut s = scanner(&dir);
        let out = s.scan_line("\\includegraphics{figs/plot}\n".into()).unwrap();
        assert_eq!(out, "\\includegraphics{plot.pdf}\n");
        assert_eq!(references(&s), vec!["figs/plot.pdf"]);
        assert_eq!(s.assets()[0].resolved, dir.path().join("figs/plot.pdf"));
        assert_eq!(s.assets()[0].kind, AssetKind::Graphic);
    }

    #[test]
    fn graphic_options_are_preserved() {
        let dir = tree(&["img/cat.png"]);
        let mut s = scanner(&dir);
        let out = s
            .scan_line("  \\includegraphics[width=0.5\\linewidth]{img/cat.png} % cat\n".into())
            .unwrap();
        assert_eq!(out, "  \\includegraphics[width=0.5\\linewidth]{cat.png} % cat\n");
    }

    #[test]
    fn every_graphic_on_a_line_is_handled() {
        let dir = tree(&["a/one.pdf", "b/two.pdf"]);
        let mut s = scanner(&dir);
        let out = s
            .scan_line("\\includegraphics{a/one}\\hfill\\includegraphics{b/two}\n".into())
            .unwrap();
        assert_eq!(out, "\\includegraphics{one.pdf}\\hfill\\includegraphics{two.pdf}\n");
        assert_eq!(references(&s), vec!["a/one.pdf", "b/two.pdf"]);
    }

    #[test]
    fn missing_graphic_is_left_verbatim() {
        let dir = tree(&[]);
        let mut s = scanner(&dir);
        let line = "\\includegraphics{figs/absent}\n".to_string();
        assert_eq!(s.scan_line(line.clone()).unwrap(), line);
        assert!(s.assets().is_empty());
    }

    #[test]
    fn duplicates_are_reported_each_time() {
        let dir = tree(&["logo.pdf"]);
        let mut s = scanner(&dir);
        s.scan_line("\\includegraphics{logo}\n".into()).unwrap();
        s.scan_line("\\includegraphics{logo}\n".into()).unwrap();
        assert_eq!(s.assets().len(), 2);
    }

    #[test]
    fn class_file_is_reported_and_scanned() {
        let dir = tree(&["badge.pdf", "refs.bib"]);
        std::fs::write(
            dir.path().join("acmart.cls"),
            "\\LoadClass{article}\n\\includegraphics{badge}\n\\bibliography{refs}\n",
        )
        .unwrap();
        let mut s = scanner(&dir);
        let line = "\\documentclass[sigconf]{acmart}\n".to_string();
        assert_eq!(s.scan_line(line.clone()).unwrap(), line);
        assert_eq!(references(&s), vec!["acmart.cls", "badge.pdf", "refs.bib"]);
    }

    #[test]
    fn system_class_is_ignored() {
        let dir = tree(&[]);
        let mut s = scanner(&dir);
        s.scan_line("\\documentclass{article}\n".into()).unwrap();
        assert!(s.assets().is_empty());
    }

    #[test]
    fn bibliography_list_is_split() {
        let dir = tree(&["refs.bib", "extra.bib"]);
        let mut s = scanner(&dir);
        s.scan_line("\\bibliography{refs, extra,missing}\n".into())
            .unwrap();
        assert_eq!(references(&s), vec!["refs.bib", "extra.bib"]);
        assert!(s.assets().iter().all(|a| a.kind == AssetKind::Bibliography));
    }

    #[test]
    fn bibliographystyle_is_not_a_bibliography() {
        let dir = tree(&["plain.bib"]);
        let mut s = scanner(&dir);
        s.scan_line("\\bibliographystyle{plain}\n".into()).unwrap();
        assert!(s.assets().is_empty());
    }

    #[test]
    fn self_referencing_class_hits_depth_limit() {
        let dir = tree(&[]);
        std::fs::write(dir.path().join("loop.cls"), "\\documentclass{loop}\n").unwrap();
        let config = FlattenConfig::builder()
            .base_dir(dir.path())
            .max_include_depth(4)
            .build()
            .unwrap();
        let mut s = AssetScanner::new(&config);
        let err = s.scan_line("\\documentclass{loop}\n".into()).unwrap_err();
        assert!(matches!(err, FlattenError::IncludeDepthExceeded { limit: 4, .. }));
    }

    #[test]
    fn reporter_sees_every_asset() {
        let dir = tree(&["a.pdf"]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut s = scanner(&dir).with_reporter(move |a| sink.borrow_mut().push(a.reference.clone()));
        s.scan_line("\\includegraphics{a}\n".into()).unwrap();
        assert_eq!(*seen.borrow(), vec![PathBuf::from("a.pdf")]);
    }
}
