/// Ruby format handler: gettext marker calls
///
/// Recognizes the four marker families (`_`, `n_`, `p_`, `N_` and their
/// aliases) in the token stream produced by the lexer, decodes their literal
/// arguments and attaches tagged comments found directly above the call.

use super::{ExtractError, FormatHandler, SourceFormat};
use crate::catalog::{Catalog, TranslationEntry};
use crate::config::{CommentTags, ExtractorConfig, MarkerConfig, MarkerKind};
use crate::encoding;
use crate::scanners::lexer::{tokenize, Comment, Token, TokenKind};
use crate::scanners::literal::{decode_concatenated, Joiner, StrLiteral};
use log::debug;

/// Words that may follow a paren-less call on the same line
const STATEMENT_MODIFIERS: &[&str] = &["if", "unless", "while", "until", "and", "or", "then", "do"];

#[derive(Debug, Clone)]
pub struct RubyHandler {
    markers: MarkerConfig,
    tags: CommentTags,
}

/// Decoded arguments of one marker call
#[derive(Debug, Clone, PartialEq, Eq)]
struct MarkerArgs {
    msgid: String,
    plural: Option<String>,
    context: Option<String>,
}

impl RubyHandler {
    pub fn new(markers: MarkerConfig, tags: CommentTags) -> Self {
        Self { markers, tags }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.markers.clone(), config.comment_tags.clone())
    }

    /// Extract messages from already decoded Ruby source.
    pub fn extract_source(&self, path: &str, source: &str) -> Result<Catalog, ExtractError> {
        let lexed = tokenize(source)?;
        let tokens = &lexed.tokens;
        let mut catalog = Catalog::new();

        for (idx, token) in tokens.iter().enumerate() {
            let TokenKind::Ident(name) = &token.kind else {
                continue;
            };
            let Some(kind) = self.markers.kind_of(name) else {
                continue;
            };
            if is_definition(tokens, idx) {
                continue;
            }

            match parse_call(tokens, idx + 1, kind) {
                Some(Ok(args)) if args.msgid.is_empty() => {
                    debug!("{}:{}: skipping empty msgid", path, token.line);
                }
                Some(Ok(args)) => {
                    let mut entry = TranslationEntry::new(args.msgid).with_reference(path, token.line);
                    entry.msgid_plural = args.plural;
                    entry.msgctxt = args.context;
                    let run = comment_run(&lexed.comments, token.line);
                    entry.comment = capture_tagged(run, &self.tags.note, &self.tags.extracted);
                    entry.extracted_comment =
                        capture_tagged(run, &self.tags.extracted, &self.tags.note);
                    catalog.add(entry);
                }
                Some(Err(())) => {
                    let skipped = ExtractError::UnsupportedArgumentShape {
                        marker: name.clone(),
                        line: token.line,
                    };
                    debug!("{}: {}", path, skipped);
                }
                // the identifier is used as something other than a call
                None => {}
            }
        }

        Ok(catalog)
    }
}

impl FormatHandler for RubyHandler {
    fn extract(&self, path: &str, content: &[u8]) -> Result<Catalog, ExtractError> {
        let source = encoding::decode_ruby_source(content);
        self.extract_source(path, &source)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Ruby
    }
}

/// `def _(...)` or `def self._(...)`
fn is_definition(tokens: &[Token], idx: usize) -> bool {
    let is_def = |i: usize| matches!(&tokens[i].kind, TokenKind::Ident(word) if word == "def");
    match idx {
        0 => false,
        1 | 2 => is_def(idx - 1),
        _ => is_def(idx - 1) || (tokens[idx - 1].kind == TokenKind::Punct('.') && is_def(idx - 3)),
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    in_parens: bool,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos).map(|token| &token.kind)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&TokenKind::Newline) {
            self.bump();
        }
    }

    fn eat(&mut self, punct: char) -> bool {
        if self.peek() == Some(&TokenKind::Punct(punct)) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// One argument made of a literal or a chain of concatenated literals.
    fn literal(&mut self) -> Result<String, ()> {
        if self.in_parens {
            self.skip_newlines();
        }
        let Some(TokenKind::Str(first)) = self.peek() else {
            return Err(());
        };
        if first.interpolated {
            return Err(());
        }
        self.bump();

        let mut segments: Vec<(Joiner, &StrLiteral)> = vec![(Joiner::Direct, first)];
        loop {
            let save = self.pos;
            let (mut joined, mut broken) = (false, false);
            loop {
                match self.peek() {
                    Some(TokenKind::Punct('+' | '\\')) => joined = true,
                    Some(TokenKind::Newline) if self.in_parens || joined => broken = true,
                    _ => break,
                }
                self.bump();
            }
            match self.peek() {
                Some(TokenKind::Str(next)) if !next.interpolated => {
                    self.bump();
                    let joiner = if broken && !joined {
                        Joiner::LineBreak
                    } else {
                        Joiner::Direct
                    };
                    segments.push((joiner, next));
                }
                Some(TokenKind::Str(_)) => return Err(()),
                _ => {
                    self.pos = save;
                    break;
                }
            }
        }

        Ok(decode_concatenated(&segments))
    }

    fn comma(&mut self) -> Result<(), ()> {
        if self.in_parens {
            self.skip_newlines();
        }
        if self.eat(',') {
            self.skip_newlines();
            Ok(())
        } else {
            Err(())
        }
    }

    /// The call ends here, or continues with further (ignored) arguments
    /// when `more_allowed`.
    fn close(&mut self, more_allowed: bool) -> Result<(), ()> {
        if self.in_parens {
            self.skip_newlines();
            return match self.peek() {
                Some(TokenKind::Punct(')')) => Ok(()),
                Some(TokenKind::Punct(',')) if more_allowed => Ok(()),
                _ => Err(()),
            };
        }
        match self.peek() {
            None | Some(TokenKind::Newline) => Ok(()),
            Some(TokenKind::Punct(')' | ']' | '}' | ';')) => Ok(()),
            Some(TokenKind::Punct(',')) if more_allowed => Ok(()),
            Some(TokenKind::Ident(word)) if STATEMENT_MODIFIERS.contains(&word.as_str()) => Ok(()),
            _ => Err(()),
        }
    }
}

/// Parse the arguments following a marker identifier at `start`.
///
/// Returns `None` when no call follows the identifier and `Some(Err(()))`
/// when the arguments are not the literals the marker family needs.
fn parse_call(tokens: &[Token], start: usize, kind: MarkerKind) -> Option<Result<MarkerArgs, ()>> {
    let mut cursor = Cursor {
        tokens,
        pos: start,
        in_parens: false,
    };
    match cursor.peek()? {
        TokenKind::Punct('(') => {
            cursor.bump();
            cursor.in_parens = true;
        }
        TokenKind::Str(_) => {}
        TokenKind::Punct('[') if kind == MarkerKind::Plural => {}
        _ => return None,
    }
    Some(parse_args(&mut cursor, kind))
}

fn parse_args(cursor: &mut Cursor<'_>, kind: MarkerKind) -> Result<MarkerArgs, ()> {
    match kind {
        MarkerKind::Simple | MarkerKind::MarkOnly => {
            let msgid = cursor.literal()?;
            cursor.close(false)?;
            Ok(MarkerArgs {
                msgid,
                plural: None,
                context: None,
            })
        }
        MarkerKind::Contextual => {
            let context = cursor.literal()?;
            cursor.comma()?;
            let msgid = cursor.literal()?;
            cursor.close(false)?;
            Ok(MarkerArgs {
                msgid,
                plural: None,
                context: Some(context),
            })
        }
        MarkerKind::Plural => {
            if cursor.in_parens {
                cursor.skip_newlines();
            }
            let (msgid, plural) = if cursor.eat('[') {
                // n_(["singular", "plural"], n)
                let outer = cursor.in_parens;
                cursor.in_parens = true;
                let msgid = cursor.literal()?;
                cursor.comma()?;
                let plural = cursor.literal()?;
                cursor.skip_newlines();
                if !cursor.eat(']') {
                    return Err(());
                }
                cursor.in_parens = outer;
                (msgid, plural)
            } else {
                let msgid = cursor.literal()?;
                cursor.comma()?;
                (msgid, cursor.literal()?)
            };
            cursor.close(true)?;
            Ok(MarkerArgs {
                msgid,
                plural: Some(plural),
                context: None,
            })
        }
    }
}

/// Full-line comments on consecutive lines ending right above `line`
fn comment_run(comments: &[Comment], line: usize) -> &[Comment] {
    let end = comments.partition_point(|comment| comment.line < line);
    let mut start = end;
    let mut expected = line;
    while start > 0 {
        let comment = &comments[start - 1];
        if !comment.own_line || comment.line + 1 != expected {
            break;
        }
        expected = comment.line;
        start -= 1;
    }
    &comments[start..end]
}

/// Text of the comment run starting at the first line tagged with `tag`.
///
/// Capture stops at a line tagged with `other`. The tag is removed from the
/// first line; later lines are kept as written after their `#`.
fn capture_tagged(run: &[Comment], tag: &str, other: &str) -> Option<String> {
    if tag.is_empty() {
        return None;
    }
    let body = |comment: &Comment| comment.text.trim_start_matches('#').to_string();
    let first = run
        .iter()
        .position(|comment| body(comment).trim_start().starts_with(tag))?;

    let mut lines = Vec::new();
    let head = body(&run[first]);
    let head = head.trim_start()[tag.len()..].trim();
    if !head.is_empty() {
        lines.push(head.to_string());
    }
    for comment in &run[first + 1..] {
        let text = body(comment);
        if !other.is_empty() && text.trim_start().starts_with(other) {
            break;
        }
        lines.push(text.trim_end().to_string());
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
