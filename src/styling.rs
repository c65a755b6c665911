//! Inline Styling Parser - Markup to Styled Runs
//!
//! Grammar, in precedence order: `**bold**`, `*italic*`, `__underline__`.
//! The parser is total: unmatched delimiters fall through as literal text
//! and styled content is never re-scanned (no nesting).

use serde::{Deserialize, Serialize};

pub type StyledLine = Vec<StyledRun>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StyledRun {
    pub content: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
}

impl StyledRun {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            bold: false,
            italic: false,
            underline: false,
        }
    }

    pub fn bold(content: impl Into<String>) -> Self {
        Self {
            bold: true,
            ..Self::plain(content)
        }
    }

    pub fn italic(content: impl Into<String>) -> Self {
        Self {
            italic: true,
            ..Self::plain(content)
        }
    }

    pub fn underline(content: impl Into<String>) -> Self {
        Self {
            underline: true,
            ..Self::plain(content)
        }
    }
}

/// Parse marked-up text into lines of styled runs.
/// Line breaks split the input into independent run-sequences.
pub fn parse_markup(text: &str) -> Vec<StyledLine> {
    text.split('\n').map(parse_line).collect()
}

fn parse_line(line: &str) -> StyledLine {
    let mut runs = Vec::new();
    let mut literal = String::new();
    let mut rest = line;

    while !rest.is_empty() {
        if let Some((content, remainder)) = take_delimited(rest, "**") {
            flush(&mut runs, &mut literal);
            runs.push(StyledRun::bold(content));
            rest = remainder;
        } else if let Some((content, remainder)) = take_delimited(rest, "*") {
            flush(&mut runs, &mut literal);
            runs.push(StyledRun::italic(content));
            rest = remainder;
        } else if let Some((content, remainder)) = take_delimited(rest, "__") {
            flush(&mut runs, &mut literal);
            runs.push(StyledRun::underline(content));
            rest = remainder;
        } else {
            let ch = rest.chars().next().unwrap();
            literal.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    flush(&mut runs, &mut literal);
    runs
}

/// Matches `<delim>content<delim>` at the start of `rest`.
fn take_delimited<'a>(rest: &'a str, delim: &str) -> Option<(&'a str, &'a str)> {
    let inner = rest.strip_prefix(delim)?;
    let end = inner.find(delim)?;
    Some((&inner[..end], &inner[end + delim.len()..]))
}

fn flush(runs: &mut Vec<StyledRun>, literal: &mut String) {
    if !literal.is_empty() {
        runs.push(StyledRun::plain(std::mem::take(literal)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_styles_in_one_line() {
        let lines = parse_markup("This is **bold** and *italic* and __under__ text");
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            vec![
                StyledRun::plain("This is "),
                StyledRun::bold("bold"),
                StyledRun::plain(" and "),
                StyledRun::italic("italic"),
                StyledRun::plain(" and "),
                StyledRun::underline("under"),
                StyledRun::plain(" text"),
            ],
        );
    }

    #[test]
    fn line_breaks_split_run_sequences() {
        let lines = parse_markup("**Certificate**\nof *Completion*");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], vec![StyledRun::bold("Certificate")]);
        assert_eq!(
            lines[1],
            vec![StyledRun::plain("of "), StyledRun::italic("Completion")],
        );
    }

    #[test]
    fn unmatched_delimiters_are_literal() {
        let lines = parse_markup("a ** b * c __ d");
        assert_eq!(lines[0], vec![StyledRun::plain("a ** b * c __ d")]);
    }

    #[test]
    fn styles_do_not_nest() {
        let lines = parse_markup("**a *b* c**");
        assert_eq!(lines[0], vec![StyledRun::bold("a *b* c")]);
    }

    #[test]
    fn empty_input_yields_one_empty_line() {
        let lines = parse_markup("");
        assert_eq!(lines, vec![vec![]]);
    }

    #[test]
    fn totality_preserves_content_modulo_matched_pairs() {
        let cases = [
            "plain",
            "**bold** tail",
            "*lone star",
            "__dunder__ and __open",
            "***mixed**",
            "a**b**c*d*e__f__g",
            "****",
        ];
        for case in cases {
            let lines = parse_markup(case);
            let rejoined: String = lines
                .iter()
                .map(|line| {
                    line.iter()
                        .map(|run| run.content.as_str())
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join("\n");
            let mut expected = case.to_string();
            // Matched pairs vanish from the rejoined content; recompute by
            // re-parsing and stripping the styled delimiters per run.
            for line in &lines {
                for run in line {
                    let delim = if run.bold {
                        Some("**")
                    } else if run.italic {
                        Some("*")
                    } else if run.underline {
                        Some("__")
                    } else {
                        None
                    };
                    if let Some(d) = delim {
                        let marked = format!("{d}{}{d}", run.content);
                        expected = expected.replacen(&marked, &run.content, 1);
                    }
                }
            }
            assert_eq!(rejoined, expected, "case: {case}");
        }
    }
}
