//! Comment-aware line helpers shared by the stages.
//!
//! A `%` starts a comment unless it is escaped as `\%`. An even run of
//! backslashes (`\\%`) escapes the backslash, not the percent sign.

/// Byte offset of the first unescaped `%`, if any.
pub fn comment_start(line: &str) -> Option<usize> {
    let mut backslashes = 0usize;
    for (i, b) in line.bytes().enumerate() {
        if b == b'%' && backslashes % 2 == 0 {
            return Some(i);
        }
        if b == b'\\' {
            backslashes += 1;
        } else {
            backslashes = 0;
        }
    }
    None
}

/// Does the line carry a comment marker anywhere?
pub fn has_comment(line: &str) -> bool {
    comment_start(line).is_some()
}

/// The part of the line before its comment marker.
pub fn strip_comment(line: &str) -> &str {
    match comment_start(line) {
        Some(i) => &line[..i],
        None => line,
    }
}

/// The text control directives are matched against: trimmed, comment removed.
pub fn directive_text(raw: &str) -> &str {
    strip_comment(raw.trim())
}

/// The line without its terminating `\n` (or `\r\n`).
pub fn trim_newline(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_comment() {
        assert_eq!(comment_start("text % note\n"), Some(5));
        assert!(has_comment("% whole line\n"));
    }

    #[test]
    fn escaped_percent_is_not_a_comment() {
        assert_eq!(comment_start("50\\% of cases\n"), None);
        assert!(!has_comment("50\\% of cases\n"));
    }

    #[test]
    fn escaped_backslash_then_comment() {
        // `\\` is a line break, so the `%` that follows is a real comment.
        assert_eq!(comment_start("a\\\\% b"), Some(3));
    }

    #[test]
    fn strip_comment_keeps_prefix() {
        assert_eq!(strip_comment("\\fi % end draft"), "\\fi ");
        assert_eq!(strip_comment("no comment"), "no comment");
    }

    #[test]
    fn directive_text_trims_then_strips() {
        assert_eq!(directive_text("   \\else  % flip\n"), "\\else  ");
        assert_eq!(directive_text("\\fi\n"), "\\fi");
    }

    #[test]
    fn trim_newline_variants() {
        assert_eq!(trim_newline("a\n"), "a");
        assert_eq!(trim_newline("a\r\n"), "a");
        assert_eq!(trim_newline("a"), "a");
    }
}
