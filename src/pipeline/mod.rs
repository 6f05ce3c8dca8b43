//! Pipeline stages for flattening a LaTeX source tree.
//!
//! Each submodule implements exactly one transformation step over a lazy
//! stream of lines. Stages never look backwards or forwards in the stream;
//! whatever they need to remember (open files, the conditional stack, the
//! macro table, the blank-gap flag) lives in the stage's own state.
//!
//! ## Data Flow
//!
//! ```text
//! include ──▶ conditional ──▶ macros ──▶ assets ──▶ blank_lines
//! (\input)    (\newif/\if/\fi) (\newcommand) (\includegraphics…) (spacing)
//! ```
//!
//! 1. [`include`]      depth-first splice of `\input{...}` files
//! 2. [`conditional`]  evaluate `\newif` flags and drop inactive branches
//! 3. [`macros`]       capture allow-listed `\newcommand`s and expand them
//! 4. [`assets`]       report graphics/class/bibliography files and
//!    rewrite graphic paths to basenames
//! 5. [`blank_lines`]  collapse blank runs and space out section headings
//!
//! Every line is a `String` ending in `\n`, except possibly the very last
//! line of the start file.

pub mod assets;
pub mod blank_lines;
pub mod comment;
pub mod conditional;
pub mod include;
pub mod macros;

use crate::error::FlattenError;

/// One item of a line stream.
pub type LineResult = Result<String, FlattenError>;

/// A one-line-in, at-most-one-line-out transformation with private state.
///
/// Wrap a stage in [`Staged`] to run it over a line iterator.
pub trait LineStage {
    /// Transform one line. `Ok(None)` drops the line from the output.
    fn process(&mut self, line: String) -> Result<Option<String>, FlattenError>;

    /// Called once after the upstream iterator is exhausted.
    fn finish(&mut self) -> Result<(), FlattenError> {
        Ok(())
    }
}

/// Iterator adaptor driving a [`LineStage`] over an upstream line stream.
///
/// The first error (from upstream, the stage, or [`LineStage::finish`]) is
/// yielded once and ends the stream.
pub struct Staged<I, S> {
    inner: I,
    stage: S,
    done: bool,
}

impl<I, S> Staged<I, S>
where
    I: Iterator<Item = LineResult>,
    S: LineStage,
{
    pub fn new(inner: I, stage: S) -> Self {
        Self {
            inner,
            stage,
            done: false,
        }
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }
}

impl<I, S> Iterator for Staged<I, S>
where
    I: Iterator<Item = LineResult>,
    S: LineStage,
{
    type Item = LineResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.inner.next() {
                Some(Ok(line)) => match self.stage.process(line) {
                    Ok(Some(out)) => return Some(Ok(out)),
                    Ok(None) => continue,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return self.stage.finish().err().map(Err);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn lines_of(text: &str) -> impl Iterator<Item = LineResult> + '_ {
    text.split_inclusive('\n').map(|l| Ok(l.to_string()))
}
