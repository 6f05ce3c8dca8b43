//! Capture and expansion of allow-listed `\newcommand` macros.
//!
//! Only the names in [`KNOWN_MACROS`] are captured; any other `\newcommand`
//! stays in the document untouched. A captured definition line is removed
//! from the output entirely, and every later line has each known macro
//! substituted once, in definition order. A macro's own expansion is never
//! rescanned for itself, so expansion always terminates.

use crate::error::FlattenError;
use crate::pipeline::LineStage;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use tracing::debug;

/// Macro names whose definitions are captured and expanded.
pub const KNOWN_MACROS: &[&str] = &[
    "fxnote",
    "BigO",
    "Sort",
    "Scan",
    "rfig",
    "rtab",
    "rsec",
    "rapp",
    "picheight",
];

/// TeX allows at most nine parameters.
const MAX_ARITY: usize = 9;

static RE_NEWCOMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\\newcommand\{\\([^}]+)\}(?:\[(\d+)\])?\{(.*)\}$").unwrap()
});

/// A captured macro: name, parameter count, and body template.
#[derive(Debug, Clone)]
pub struct MacroDef {
    name: String,
    arity: usize,
    body: String,
    pattern: Regex,
}

impl MacroDef {
    pub fn new(
        name: impl Into<String>,
        arity: usize,
        body: impl Into<String>,
    ) -> Result<Self, FlattenError> {
        let name = name.into();
        let source = format!(
            r"\\{}{}",
            regex::escape(&name),
            r"\{([^}]*)\}".repeat(arity)
        );
        let pattern = Regex::new(&source)
            .map_err(|e| FlattenError::Internal(format!("macro pattern for '{name}': {e}")))?;
        Ok(Self {
            name,
            arity,
            body: body.into(),
            pattern,
        })
    }

    /// Replace every invocation in `line`; borrows when there is none.
    pub fn expand_in<'a>(&self, line: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(line, |caps: &Captures<'_>| {
            let end = caps.get(0).map_or(line.len(), |m| m.end());
            // `\BigOmega` is a different control word than `\BigO`.
            if self.arity == 0 && line[end..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                return caps[0].to_string();
            }
            self.instantiate(caps)
        })
    }

    /// Fill the body template: `#n` takes argument n, `##` is a literal `#`,
    /// everything else (backslashes, `$`) is copied as-is.
    fn instantiate(&self, caps: &Captures<'_>) -> String {
        let mut out = String::with_capacity(self.body.len());
        let mut chars = self.body.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '#' {
                out.push(c);
                continue;
            }
            match chars.peek().copied() {
                Some('#') => {
                    chars.next();
                    out.push('#');
                }
                Some(d @ '1'..='9') if (d as usize - '0' as usize) <= self.arity => {
                    chars.next();
                    let idx = d as usize - '0' as usize;
                    out.push_str(caps.get(idx).map_or("", |m| m.as_str()));
                }
                _ => out.push('#'),
            }
        }
        out
    }
}

/// Parse a `\newcommand{\NAME}[N]{BODY}` line (already trimmed).
///
/// Returns `(name, arity, body)`. Arity above nine is not a valid definition.
pub fn parse_definition(line: &str) -> Option<(&str, usize, &str)> {
    let caps = RE_NEWCOMMAND.captures(line)?;
    let name = caps.get(1)?.as_str();
    let arity = match caps.get(2) {
        Some(m) => m.as_str().parse::<usize>().ok()?,
        None => 0,
    };
    if arity > MAX_ARITY {
        return None;
    }
    let body = caps.get(3)?.as_str();
    Some((name, arity, body))
}

/// Definitions seen so far, in first-definition order.
#[derive(Debug, Default)]
pub struct MacroTable {
    defs: Vec<MacroDef>,
    definitions_seen: usize,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a definition; a redefinition replaces the body in place.
    pub fn define(&mut self, def: MacroDef) {
        self.definitions_seen += 1;
        match self.defs.iter_mut().find(|d| d.name == def.name) {
            Some(existing) => *existing = def,
            None => self.defs.push(def),
        }
    }

    /// Definition lines captured, redefinitions included.
    pub fn definitions_seen(&self) -> usize {
        self.definitions_seen
    }

    /// Apply every macro once, in table order.
    pub fn expand<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let mut current: Cow<'a, str> = Cow::Borrowed(line);
        for def in &self.defs {
            let next = match def.expand_in(&current) {
                Cow::Owned(s) => Some(s),
                Cow::Borrowed(_) => None,
            };
            if let Some(s) = next {
                current = Cow::Owned(s);
            }
        }
        current
    }
}

impl LineStage for MacroTable {
    fn process(&mut self, raw: String) -> Result<Option<String>, FlattenError> {
        if let Some((name, arity, body)) = parse_definition(raw.trim()) {
            if KNOWN_MACROS.contains(&name) {
                debug!("Defined macro \\{} with {} argument(s)", name, arity);
                self.define(MacroDef::new(name, arity, body)?);
                return Ok(None);
            }
        }
        if let Cow::Owned(expanded) = self.expand(&raw) {
            return Ok(Some(expanded));
        }
        Ok(Some(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{lines_of, Staged};

    fn run(src: &str) -> String {
        Staged::new(lines_of(src), MacroTable::new())
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
            .concat()
    }

    #[test]
    fn parse_definition_shapes() {
        assert_eq!(
            parse_definition("\\newcommand{\\BigO}{O(n)}"),
            Some(("BigO", 0, "O(n)"))
        );
        assert_eq!(
            parse_definition("\\newcommand{\\rfig}[1]{Figure~\\ref{fig:#1}}"),
            Some(("rfig", 1, "Figure~\\ref{fig:#1}"))
        );
        assert_eq!(parse_definition("\\newcommand{\\x}[10]{#1}"), None);
        assert_eq!(parse_definition("\\renewcommand{\\BigO}{O(n)}"), None);
        assert_eq!(parse_definition("\\newcommand{\\BigO}{O(n)} % note"), None);
    }

    #[test]
    fn zero_arity_macro_after_definition_only() {
        let src = "before \\BigO\n\\newcommand{\\BigO}{O(n)}\nafter \\BigO and \\BigO\n";
        assert_eq!(run(src), "before \\BigO\nafter O(n) and O(n)\n");
    }

    #[test]
    fn definition_line_produces_nothing() {
        assert_eq!(run("  \\newcommand{\\Sort}{\\textsc{Sort}}  \n"), "");
    }

    #[test]
    fn positional_arguments_are_substituted() {
        let src = "\\newcommand{\\rfig}[1]{Figure~\\ref{fig:#1}}\nsee \\rfig{plot}.\n";
        assert_eq!(run(src), "see Figure~\\ref{fig:plot}.\n");
    }

    #[test]
    fn two_arguments_in_any_order() {
        let src = "\\newcommand{\\fxnote}[2]{[#2: #1]}\n\\fxnote{fix}{me}\n";
        assert_eq!(run(src), "[me: fix]\n");
    }

    #[test]
    fn wrong_argument_count_is_left_alone() {
        let src = "\\newcommand{\\rtab}[2]{Table #1#2}\n\\rtab{a} only one\n";
        assert_eq!(run(src), "\\rtab{a} only one\n");
    }

    #[test]
    fn body_backslashes_and_dollars_survive() {
        let src = "\\newcommand{\\Scan}{$\\mathrm{scan}\\,1$}\nx \\Scan\n";
        assert_eq!(run(src), "x $\\mathrm{scan}\\,1$\n");
    }

    #[test]
    fn double_hash_is_literal_hash() {
        let def = MacroDef::new("rsec", 1, "Sec.~##\\ref{#1}").unwrap();
        assert_eq!(def.expand_in("\\rsec{intro}"), "Sec.~#\\ref{intro}");
    }

    #[test]
    fn names_outside_allow_list_are_not_captured() {
        let src = "\\newcommand{\\foo}{bar}\n\\foo\n";
        assert_eq!(run(src), src);
    }

    #[test]
    fn longer_control_word_is_not_an_invocation() {
        let src = "\\newcommand{\\BigO}{O(n)}\n$\\BigOmega$ vs $\\BigO$\n";
        assert_eq!(run(src), "$\\BigOmega$ vs $O(n)$\n");
    }

    #[test]
    fn redefinition_replaces_body() {
        let src = "\\newcommand{\\BigO}{O(n)}\n\\BigO\n\\newcommand{\\BigO}{O(1)}\n\\BigO\n";
        assert_eq!(run(src), "O(n)\nO(1)\n");
    }

    #[test]
    fn expansion_is_single_pass() {
        let mut table = MacroTable::new();
        table.define(MacroDef::new("Sort", 0, "\\Sort again").unwrap());
        assert_eq!(table.expand("\\Sort"), "\\Sort again");
    }

    #[test]
    fn untouched_lines_are_borrowed() {
        let mut table = MacroTable::new();
        table.define(MacroDef::new("BigO", 0, "O(n)").unwrap());
        assert!(matches!(table.expand("plain text\n"), Cow::Borrowed(_)));
    }
}
