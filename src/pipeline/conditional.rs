//! Conditional evaluation over `\newif` flags.
//!
//! Recognised directives, matched against the trimmed line with any comment
//! removed:
//!
//! | Directive            | Effect                                   |
//! |----------------------|------------------------------------------|
//! | `\newif\ifNAME`      | declare `NAME`, initially false          |
//! | `\NAMEtrue`          | set `NAME`                               |
//! | `\NAMEfalse`         | clear `NAME`                             |
//! | `\ifNAME`            | push the current value of `NAME`         |
//! | `\else`              | negate the top of the stack              |
//! | `\fi` (first token)  | pop the stack                            |
//!
//! A line is emitted only while every level of the stack is true. Directive
//! lines are replaced by a blank line, or vanish entirely when the raw line
//! carried a comment. `\iftrue` and `\iffalse` are always available.

use crate::error::FlattenError;
use crate::pipeline::comment::{directive_text, has_comment};
use crate::pipeline::LineStage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

static RE_NEWIF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\\newif\s*\\if([A-Za-z@]+)").unwrap());

static RE_CONTROL_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\\([A-Za-z@]+)").unwrap());

/// Built-in TeX conditionals that may legitimately stand alone on a line.
const PRIMITIVE_CONDITIONALS: &[&str] = &[
    "cat", "case", "csname", "defined", "dim", "eof", "fontchar", "hbox", "hmode", "inner",
    "mmode", "num", "odd", "vbox", "vmode", "void", "x",
];

/// A recognised control directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    Declare(&'a str),
    Set(&'a str, bool),
    Test(&'a str),
    Else,
    End,
}

/// Flag table plus the stack of branch values.
#[derive(Debug)]
pub struct ConditionalState {
    flags: HashMap<String, bool>,
    stack: Vec<bool>,
    declared: usize,
}

impl Default for ConditionalState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionalState {
    pub fn new() -> Self {
        let flags = HashMap::from([("true".to_string(), true), ("false".to_string(), false)]);
        Self {
            flags,
            stack: vec![true],
            declared: 0,
        }
    }

    /// Current value of a flag, if it is known.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    /// Number of `\newif` declarations processed.
    pub fn declared(&self) -> usize {
        self.declared
    }

    /// Are we inside active branches only?
    pub fn is_active(&self) -> bool {
        self.stack.iter().all(|&b| b)
    }

    /// Classify a directive text (already trimmed and comment-stripped).
    ///
    /// Returns `Ok(None)` for ordinary text. A bare `\ifNAME` line naming an
    /// undeclared flag is an error; with trailing arguments it is left alone,
    /// since macros such as `\ifthenelse{..}{..}{..}` share the prefix.
    pub fn classify<'a>(&self, text: &'a str) -> Result<Option<Directive<'a>>, FlattenError> {
        if let Some(caps) = RE_NEWIF.captures(text) {
            if let Some(name) = caps.get(1) {
                return Ok(Some(Directive::Declare(name.as_str())));
            }
        }

        if let Some(word) = RE_CONTROL_WORD.captures(text).and_then(|c| c.get(1)) {
            let word = word.as_str();
            if let Some(name) = word.strip_suffix("true") {
                if self.flags.contains_key(name) {
                    return Ok(Some(Directive::Set(name, true)));
                }
            }
            if let Some(name) = word.strip_suffix("false") {
                if self.flags.contains_key(name) {
                    return Ok(Some(Directive::Set(name, false)));
                }
            }
            if let Some(name) = word.strip_prefix("if") {
                if self.flags.contains_key(name) {
                    return Ok(Some(Directive::Test(name)));
                }
            }
            if word == "else" {
                return Ok(Some(Directive::Else));
            }
        }

        if text.split_whitespace().next() == Some("\\fi") {
            return Ok(Some(Directive::End));
        }

        if let Some(name) = bare_undeclared_test(text) {
            if !PRIMITIVE_CONDITIONALS.contains(&name) {
                return Err(FlattenError::UnknownFlag {
                    flag: name.to_string(),
                });
            }
        }

        Ok(None)
    }

    /// Apply a directive to the flag table and stack.
    ///
    /// Declarations and assignments take effect whether or not the current
    /// branch is active; only line visibility follows the stack.
    pub fn apply(&mut self, directive: Directive<'_>) -> Result<(), FlattenError> {
        match directive {
            Directive::Declare(name) => {
                debug!("Declared flag '{}'", name);
                self.flags.insert(name.to_string(), false);
                self.declared += 1;
            }
            Directive::Set(name, value) => {
                debug!("Flag '{}' = {}", name, value);
                self.flags.insert(name.to_string(), value);
            }
            Directive::Test(name) => {
                let value = self.flag(name).ok_or_else(|| FlattenError::UnknownFlag {
                    flag: name.to_string(),
                })?;
                self.stack.push(value);
            }
            Directive::Else => {
                if let Some(top) = self.stack.last_mut() {
                    *top = !*top;
                }
            }
            Directive::End => {
                if self.stack.len() <= 1 {
                    self.stack.clear();
                    return Err(FlattenError::UnmatchedConditional {
                        residual: Vec::new(),
                    });
                }
                self.stack.pop();
            }
        }
        Ok(())
    }

    /// The stack must be back to its sentinel at end of input.
    pub fn check_balanced(&self) -> Result<(), FlattenError> {
        if self.stack != [true] {
            return Err(FlattenError::UnmatchedConditional {
                residual: self.stack.clone(),
            });
        }
        Ok(())
    }
}

/// `\ifNAME` with nothing else on the line.
fn bare_undeclared_test(text: &str) -> Option<&str> {
    let rest = text.trim_end().strip_prefix("\\if")?;
    (!rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphabetic() || b == b'@'))
        .then_some(rest)
}

impl LineStage for ConditionalState {
    fn process(&mut self, raw: String) -> Result<Option<String>, FlattenError> {
        let handled = match self.classify(directive_text(&raw))? {
            Some(directive) => {
                self.apply(directive)?;
                true
            }
            None => false,
        };

        if !self.is_active() {
            return Ok(None);
        }
        if !handled {
            return Ok(Some(raw));
        }
        if has_comment(&raw) {
            Ok(None)
        } else {
            Ok(Some("\n".to_string()))
        }
    }

    fn finish(&mut self) -> Result<(), FlattenError> {
        self.check_balanced()
    }
}
