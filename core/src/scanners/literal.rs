/// String literal decoding
///
/// Turns the raw inner text of a Ruby string literal into the text stored as
/// a message id. Escape sequences for control characters are kept in their
/// two-character form and real line breaks become `\n`, so a decoded literal
/// is always a single logical line in PO-escaped form.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteStyle {
    /// `'...'`, `%q(...)`, `<<'EOS'`
    Single,
    /// `"..."`, `%Q(...)`, `%(...)`, `<<EOS`
    Double,
}

/// A string literal as found by the lexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrLiteral {
    pub style: QuoteStyle,
    /// Inner text with escapes untouched
    pub raw: String,
    /// Closing delimiter; escaping it yields the delimiter itself
    pub close: char,
    /// Contains `#{...}`, so the value is only known at runtime
    pub interpolated: bool,
}

impl StrLiteral {
    pub fn single(raw: impl Into<String>) -> Self {
        Self {
            style: QuoteStyle::Single,
            raw: raw.into(),
            close: '\'',
            interpolated: false,
        }
    }

    pub fn double(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            style: QuoteStyle::Double,
            interpolated: has_interpolation(&raw),
            raw,
            close: '"',
        }
    }

    pub fn decode(&self) -> String {
        decode(self.style, &self.raw, self.close)
    }
}

/// How two adjacent literal segments were separated in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    /// Whitespace, `+` or a `\` continuation
    Direct,
    /// A bare line break
    LineBreak,
}

/// Decode the raw inner text of one literal.
pub fn decode(style: QuoteStyle, raw: &str, close: char) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\n' => out.push_str("\\n"),
            '\\' => {
                let Some(next) = chars.next() else {
                    out.push('\\');
                    break;
                };
                match style {
                    QuoteStyle::Single if next == '\\' || next == close => out.push(next),
                    QuoteStyle::Double if next == close || next == '"' || next == '#' => {
                        out.push(next)
                    }
                    // backslash-newline continues a double-quoted line
                    QuoteStyle::Double if next == '\n' => {}
                    _ => {
                        out.push('\\');
                        if next == '\n' {
                            out.push_str("\\n");
                        } else {
                            out.push(next);
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Decode a chain of concatenated literals into one message text.
///
/// Each segment is decoded on its own; the joiner of a segment describes the
/// separator in front of it and is ignored for the first segment.
pub fn decode_concatenated(segments: &[(Joiner, &StrLiteral)]) -> String {
    let mut out = String::new();
    for (idx, (joiner, literal)) in segments.iter().enumerate() {
        if idx > 0 && *joiner == Joiner::LineBreak {
            out.push_str("\\n");
        }
        out.push_str(&literal.decode());
    }
    out
}

/// `#{` not preceded by an escaping backslash
pub fn has_interpolation(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'#' if bytes[i + 1] == b'{' => return true,
            _ => i += 1,
        }
    }
    false
}

/// Strip the common leading indentation of non-blank lines (`<<~` heredocs).
pub fn dedent(body: &str) -> String {
    let indent = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    body.split_inclusive('\n')
        .map(|line| {
            let strip = line
                .char_indices()
                .take_while(|(idx, c)| *idx < indent && (*c == ' ' || *c == '\t'))
                .count();
            &line[strip..]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_quote_escapes() {
        assert_eq!(StrLiteral::single(r"it\'s").decode(), "it's");
        assert_eq!(StrLiteral::single(r"back\\slash").decode(), r"back\slash");
        // anything else keeps its backslash
        assert_eq!(StrLiteral::single(r"tab\t").decode(), r"tab\t");
        assert_eq!(StrLiteral::single(r#"double "quote""#).decode(), r#"double "quote""#);
    }

    #[test]
    fn double_quote_resolves_escaped_quote() {
        let literal = StrLiteral::double(r#"double \"quote\" in double quote"#);
        assert_eq!(literal.decode(), r#"double "quote" in double quote"#);
        assert_eq!(StrLiteral::double(r#"d\"e\"f\""#).decode(), r#"d"e"f""#);
    }

    #[test]
    fn double_quote_keeps_control_escapes() {
        assert_eq!(StrLiteral::double(r"\taaa").decode(), r"\taaa");
        assert_eq!(StrLiteral::double(r"one new line\n").decode(), r"one new line\n");
        assert_eq!(StrLiteral::double(r"a\\b").decode(), r"a\\b");
        assert_eq!(StrLiteral::double(r"\#").decode(), "#");
    }

    #[test]
    fn real_line_break_becomes_escape() {
        let literal = StrLiteral::double("multiple\nlines\nliteral\n");
        assert_eq!(literal.decode(), r"multiple\nlines\nliteral\n");
        assert_eq!(StrLiteral::single("nnn\nooo").decode(), r"nnn\nooo");
    }

    #[test]
    fn newline_escape_is_idempotent() {
        let escaped = StrLiteral::double(r"middle\nnew line").decode();
        assert_eq!(escaped, r"middle\nnew line");
        assert_eq!(StrLiteral::double(escaped.clone()).decode(), escaped);
    }

    #[test]
    fn backslash_newline_in_double_quotes_continues() {
        assert_eq!(StrLiteral::double("long \\\nline").decode(), "long line");
    }

    #[test]
    fn concatenation() {
        let lll = StrLiteral::double("lll");
        let mmm = StrLiteral::single("mmm");
        assert_eq!(
            decode_concatenated(&[(Joiner::Direct, &lll), (Joiner::Direct, &mmm)]),
            "lllmmm"
        );
        assert_eq!(
            decode_concatenated(&[(Joiner::Direct, &lll), (Joiner::LineBreak, &mmm)]),
            r"lll\nmmm"
        );
    }

    #[test]
    fn interpolation_detection() {
        assert!(StrLiteral::double("hello #{name}").interpolated);
        assert!(!StrLiteral::double(r"hello \#{name}").interpolated);
        assert!(!StrLiteral::double("This is a # including string.").interpolated);
        assert!(!StrLiteral::single("#{name}").interpolated);
    }

    #[test]
    fn dedent_strips_common_indentation() {
        let body = "    Here document1\n      indented\n\n    Here document2\n";
        assert_eq!(dedent(body), "Here document1\n  indented\n\nHere document2\n");
    }
}
