//! Blank-line normalisation for the assembled document.
//!
//! Removing directives leaves runs of blank lines behind. This stage keeps
//! at most one blank line per run and makes sure every `\section`,
//! `\subsection`, `\subsubsection`, ... starts after a blank line. Lines
//! carrying a comment are passed through without touching the gap state, so
//! commented-out blocks keep their exact shape.

use crate::pipeline::comment::has_comment;
use crate::pipeline::LineResult;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\\(?:sub)*section\*?\{").unwrap());

/// Is this line a (sub)*section heading?
pub fn is_section_heading(line: &str) -> bool {
    RE_SECTION.is_match(line)
}

fn is_blank(line: &str) -> bool {
    line == "\n" || line == "\r\n"
}

/// Iterator adaptor collapsing blank runs and spacing out headings.
pub struct BlankLineNormalizer<I> {
    inner: I,
    in_gap: bool,
    pending: Option<String>,
}

impl<I> BlankLineNormalizer<I>
where
    I: Iterator<Item = LineResult>,
{
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            in_gap: false,
            pending: None,
        }
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut I {
        &mut self.inner
    }
}

impl<I> Iterator for BlankLineNormalizer<I>
where
    I: Iterator<Item = LineResult>,
{
    type Item = LineResult;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(line) = self.pending.take() {
            return Some(Ok(line));
        }
        loop {
            let line = match self.inner.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };

            if line.is_empty() {
                continue;
            }
            if has_comment(&line) {
                return Some(Ok(line));
            }
            if is_blank(&line) {
                if self.in_gap {
                    continue;
                }
                self.in_gap = true;
                return Some(Ok(line));
            }

            let was_in_gap = std::mem::replace(&mut self.in_gap, false);
            if !was_in_gap && is_section_heading(&line) {
                self.pending = Some(line);
                return Some(Ok("\n".to_string()));
            }
            return Some(Ok(line));
        }
    }
}
