/// Ruby lexer for marker extraction
///
/// Only understands as much Ruby as is needed to find marker calls and their
/// string arguments: identifiers, punctuation that separates arguments,
/// string literals (quoted, percent and heredoc), regular expressions that
/// may hide quotes, and comments. The lexer is an explicit state machine;
/// every state consumes input and decides the next state.

use super::literal::{dedent, has_interpolation, QuoteStyle, StrLiteral};
use crate::formats::ExtractError;
use std::collections::VecDeque;

/// Keywords after which a `/` starts a regular expression
const REGEX_AFTER_KEYWORDS: &[&str] = &[
    "if", "elsif", "unless", "while", "until", "when", "and", "or", "not", "return", "then",
    "else", "case", "in", "do",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Str(StrLiteral),
    /// `( ) [ ] { } , + . ;` and `\` line continuation
    Punct(char),
    Newline,
    /// Anything irrelevant to marker calls (numbers, operators, word arrays)
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

/// A `#` comment, without the leading `#`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub line: usize,
    pub text: String,
    /// Nothing but whitespace precedes the comment on its line
    pub own_line: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Delim {
    open: char,
    close: char,
    depth: usize,
    /// `%w[...]`, regular expressions: consumed but not emitted as a string
    discard: bool,
}

impl Delim {
    fn quote(c: char) -> Self {
        Self {
            open: c,
            close: c,
            depth: 0,
            discard: false,
        }
    }

    fn percent(open: char, discard: bool) -> Self {
        let close = match open {
            '(' => ')',
            '[' => ']',
            '{' => '}',
            '<' => '>',
            other => other,
        };
        Self {
            open,
            close,
            depth: 0,
            discard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuote(Delim),
    DoubleQuote(Delim),
    /// `/.../` or `%r{...}`, double-quote escaping rules
    Regex(Delim),
    /// Reading the bodies of heredocs opened on the previous line
    Heredoc,
    Comment { own_line: bool },
    /// `=begin` ... `=end`
    BlockComment,
}

#[derive(Debug)]
struct PendingHeredoc {
    token: usize,
    id: String,
    indented: bool,
    squiggly: bool,
    style: QuoteStyle,
    line: usize,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    state: State,
    line_has_code: bool,
    buf: String,
    start_line: usize,
    heredocs: VecDeque<PendingHeredoc>,
    out: Lexed,
}

/// Tokenize Ruby source.
pub fn tokenize(source: &str) -> Result<Lexed, ExtractError> {
    let mut lexer = Lexer::new(source);
    lexer.run()?;
    Ok(lexer.out)
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            state: State::Normal,
            line_has_code: false,
            buf: String::new(),
            start_line: 1,
            heredocs: VecDeque::new(),
            out: Lexed::default(),
        }
    }

    fn run(&mut self) -> Result<(), ExtractError> {
        while self.pos < self.chars.len() {
            let state = self.state;
            match state {
                State::Normal => self.step_normal(),
                State::SingleQuote(delim) => {
                    self.step_quoted(QuoteStyle::Single, delim, State::SingleQuote)
                }
                State::DoubleQuote(delim) => {
                    self.step_quoted(QuoteStyle::Double, delim, State::DoubleQuote)
                }
                State::Regex(delim) => self.step_regex(delim),
                State::Heredoc => self.step_heredoc()?,
                State::Comment { own_line } => self.step_comment(own_line),
                State::BlockComment => self.step_block_comment(),
            }
        }

        let state = self.state;
        match state {
            State::SingleQuote(_) | State::DoubleQuote(_) => {
                return Err(ExtractError::LiteralSyntax {
                    line: self.start_line,
                    message: "unterminated string literal".to_string(),
                });
            }
            State::Regex(_) => {
                return Err(ExtractError::LiteralSyntax {
                    line: self.start_line,
                    message: "unterminated regular expression".to_string(),
                });
            }
            State::Comment { own_line } => self.finish_comment(own_line),
            _ => {}
        }

        if let Some(doc) = self.heredocs.front() {
            return Err(unterminated_heredoc(doc));
        }
        Ok(())
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.chars[self.pos - 1] == '\n'
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars().enumerate().all(|(i, c)| self.peek(i) == Some(c))
    }

    fn push(&mut self, kind: TokenKind, line: usize) {
        if kind != TokenKind::Newline {
            self.line_has_code = true;
        }
        self.out.tokens.push(Token { kind, line });
    }

    /// Called after a line break has been consumed.
    fn end_line(&mut self) {
        self.line += 1;
        self.line_has_code = false;
        if !self.heredocs.is_empty() {
            self.state = State::Heredoc;
        }
    }

    /// Consume the rest of the current line including its line break.
    fn read_line(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                break;
            }
            text.push(c);
        }
        text
    }

    fn step_normal(&mut self) {
        if self.at_line_start() {
            if self.starts_with("=begin")
                && self.peek(6).map_or(true, |c| c.is_whitespace())
            {
                self.state = State::BlockComment;
                return;
            }
            if self.starts_with("__END__") && matches!(self.peek(7), None | Some('\n')) {
                // the rest of the file is data
                self.pos = self.chars.len();
                return;
            }
        }

        let c = self.chars[self.pos];
        let line = self.line;
        match c {
            '\n' => {
                self.pos += 1;
                self.push(TokenKind::Newline, line);
                self.end_line();
            }
            ' ' | '\t' | '\r' => self.pos += 1,
            '#' => {
                self.pos += 1;
                self.buf.clear();
                self.start_line = line;
                self.state = State::Comment {
                    own_line: !self.line_has_code,
                };
            }
            '"' => self.open_quote(QuoteStyle::Double, Delim::quote('"')),
            '\'' => self.open_quote(QuoteStyle::Single, Delim::quote('\'')),
            '\\' if self.peek(1) == Some('\n') => {
                self.pos += 2;
                self.push(TokenKind::Punct('\\'), line);
                self.end_line();
            }
            '<' if self.heredoc_ahead() => self.start_heredoc(),
            '%' if self.percent_literal_ahead() => self.start_percent_literal(),
            '/' if self.regex_ahead() => self.open_regex(Delim::percent('/', true)),
            '$' if self.peek(1).map_or(false, |n| n.is_ascii_punctuation()) => {
                // special globals like $' and $"
                self.pos += 2;
                self.push(TokenKind::Other, line);
            }
            c if c == '_' || c.is_alphabetic() => self.read_ident(),
            c if c.is_ascii_digit() => {
                while self
                    .peek(0)
                    .map_or(false, |d| d.is_ascii_alphanumeric() || d == '_')
                {
                    self.pos += 1;
                }
                self.push(TokenKind::Other, line);
            }
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | '+' | '.' | ';' => {
                self.pos += 1;
                self.push(TokenKind::Punct(c), line);
            }
            _ => {
                self.pos += 1;
                self.push(TokenKind::Other, line);
            }
        }
    }

    fn read_ident(&mut self) {
        let line = self.line;
        let mut ident = String::new();
        while let Some(c) = self.peek(0) {
            if c == '_' || c.is_alphanumeric() {
                ident.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if let Some(c @ ('?' | '!')) = self.peek(0) {
            if self.peek(1) != Some('=') {
                ident.push(c);
                self.pos += 1;
            }
        }
        self.push(TokenKind::Ident(ident), line);
    }

    fn open_quote(&mut self, style: QuoteStyle, delim: Delim) {
        self.pos += 1;
        self.buf.clear();
        self.start_line = self.line;
        self.state = match style {
            QuoteStyle::Single => State::SingleQuote(delim),
            QuoteStyle::Double => State::DoubleQuote(delim),
        };
    }

    fn open_regex(&mut self, delim: Delim) {
        self.pos += 1;
        self.buf.clear();
        self.start_line = self.line;
        self.state = State::Regex(delim);
    }

    /// `/` in operand position: line start, after an operator or opening
    /// punctuation, after a keyword, or `meth /re/` with a space before only.
    fn regex_ahead(&self) -> bool {
        let mut i = self.pos;
        let mut spaced = false;
        while i > 0 && matches!(self.chars[i - 1], ' ' | '\t') {
            i -= 1;
            spaced = true;
        }
        if i == 0 || self.chars[i - 1] == '\n' {
            return true;
        }

        let prev = self.chars[i - 1];
        if prev == '_' || prev.is_alphanumeric() {
            let end = i;
            while i > 0 && (self.chars[i - 1] == '_' || self.chars[i - 1].is_alphanumeric()) {
                i -= 1;
            }
            let word: String = self.chars[i..end].iter().collect();
            if REGEX_AFTER_KEYWORDS.contains(&word.as_str()) {
                return true;
            }
            if word.starts_with(|c: char| c.is_ascii_digit()) {
                return false;
            }
            // `split /,/` passes a regex, `a / b` and `a /= b` divide
            return spaced && self.peek(1).map_or(false, |c| !c.is_whitespace() && c != '=');
        }

        matches!(
            prev,
            '(' | ',' | '=' | '[' | '{' | '|' | '&' | '!' | ';' | '?' | ':' | '+' | '-' | '*' | '<'
                | '>' | '~' | '^' | '%'
        )
    }

    fn step_regex(&mut self, delim: Delim) {
        self.step_quoted(QuoteStyle::Double, delim, State::Regex);
        if self.state == State::Normal {
            // options such as /x/im
            while self.peek(0).map_or(false, |c| c.is_ascii_alphabetic()) {
                self.pos += 1;
            }
        }
    }

    fn step_quoted(&mut self, style: QuoteStyle, mut delim: Delim, resume: fn(Delim) -> State) {
        let c = self.chars[self.pos];
        self.pos += 1;
        match c {
            '\\' => {
                self.buf.push('\\');
                if let Some(next) = self.peek(0) {
                    self.pos += 1;
                    self.buf.push(next);
                    if next == '\n' {
                        self.line += 1;
                    }
                }
            }
            '\n' => {
                self.buf.push('\n');
                self.line += 1;
            }
            '#' if style == QuoteStyle::Double && self.peek(0) == Some('{') => {
                self.buf.push('#');
                self.copy_interpolation();
            }
            c if c == delim.close && delim.depth == 0 => {
                self.finish_literal(style, delim);
                return;
            }
            c if c == delim.close => {
                delim.depth -= 1;
                self.buf.push(c);
            }
            c if c == delim.open && delim.open != delim.close => {
                delim.depth += 1;
                self.buf.push(c);
            }
            c => self.buf.push(c),
        }
        self.state = resume(delim);
    }

    /// Copy `{...}` of an interpolation verbatim, skipping over nested strings
    /// so their quotes do not end the outer literal.
    fn copy_interpolation(&mut self) {
        let mut depth = 0usize;
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            self.buf.push(c);
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                '\n' => self.line += 1,
                '"' | '\'' => self.copy_nested_string(c),
                _ => {}
            }
        }
    }

    fn copy_nested_string(&mut self, quote: char) {
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            self.buf.push(c);
            match c {
                '\\' => {
                    if let Some(next) = self.peek(0) {
                        self.pos += 1;
                        self.buf.push(next);
                    }
                }
                '\n' => self.line += 1,
                c if c == quote => return,
                _ => {}
            }
        }
    }

    fn finish_literal(&mut self, style: QuoteStyle, delim: Delim) {
        let raw = std::mem::take(&mut self.buf);
        let kind = if delim.discard {
            TokenKind::Other
        } else {
            TokenKind::Str(StrLiteral {
                style,
                interpolated: style == QuoteStyle::Double && has_interpolation(&raw),
                raw,
                close: delim.close,
            })
        };
        self.push(kind, self.start_line);
        self.state = State::Normal;
    }

    fn step_comment(&mut self, own_line: bool) {
        match self.peek(0) {
            Some('\n') | None => self.finish_comment(own_line),
            Some(c) => {
                self.buf.push(c);
                self.pos += 1;
            }
        }
    }

    fn finish_comment(&mut self, own_line: bool) {
        self.out.comments.push(Comment {
            line: self.start_line,
            text: std::mem::take(&mut self.buf),
            own_line,
        });
        self.state = State::Normal;
    }

    fn step_block_comment(&mut self) {
        let text = self.read_line();
        self.line_has_code = false;
        if text.starts_with("=end") {
            self.state = State::Normal;
        }
    }

    /// `<<ID`, `<<-ID`, `<<~ID`, `<<"ID"`, `<<'ID'`, but not `a << b` or `a<<b`.
    fn heredoc_ahead(&self) -> bool {
        if self.peek(1) != Some('<') {
            return false;
        }
        if self.pos > 0 {
            let prev = self.chars[self.pos - 1];
            if prev.is_alphanumeric() || prev == '_' || prev == ')' || prev == ']' {
                return false;
            }
        }
        let mut offset = 2;
        if matches!(self.peek(offset), Some('-' | '~')) {
            offset += 1;
        }
        matches!(self.peek(offset), Some(c) if c == '_' || c == '"' || c == '\'' || c.is_ascii_alphabetic())
    }

    fn start_heredoc(&mut self) {
        let line = self.line;
        self.pos += 2;
        let (mut indented, mut squiggly) = (false, false);
        match self.peek(0) {
            Some('-') => {
                indented = true;
                self.pos += 1;
            }
            Some('~') => {
                indented = true;
                squiggly = true;
                self.pos += 1;
            }
            _ => {}
        }

        let mut id = String::new();
        let style = match self.peek(0) {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                while let Some(c) = self.peek(0) {
                    self.pos += 1;
                    if c == quote || c == '\n' {
                        break;
                    }
                    id.push(c);
                }
                if quote == '\'' {
                    QuoteStyle::Single
                } else {
                    QuoteStyle::Double
                }
            }
            _ => {
                while let Some(c) = self.peek(0) {
                    if c == '_' || c.is_ascii_alphanumeric() {
                        id.push(c);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                QuoteStyle::Double
            }
        };

        // the body is filled in once the heredoc's lines are reached
        let token = self.out.tokens.len();
        self.push(TokenKind::Str(StrLiteral::double(String::new())), line);
        self.heredocs.push_back(PendingHeredoc {
            token,
            id,
            indented,
            squiggly,
            style,
            line,
        });
    }

    fn step_heredoc(&mut self) -> Result<(), ExtractError> {
        let Some(doc) = self.heredocs.pop_front() else {
            self.state = State::Normal;
            return Ok(());
        };

        let mut body = String::new();
        loop {
            if self.pos >= self.chars.len() {
                return Err(unterminated_heredoc(&doc));
            }
            let text = self.read_line();
            let candidate = if doc.indented {
                text.trim()
            } else {
                text.trim_end()
            };
            if candidate == doc.id {
                break;
            }
            body.push_str(&text);
            body.push('\n');
        }
        if doc.squiggly {
            body = dedent(&body);
        }

        let literal = match doc.style {
            QuoteStyle::Single => StrLiteral::single(body),
            QuoteStyle::Double => StrLiteral::double(body),
        };
        self.out.tokens[doc.token].kind = TokenKind::Str(literal);

        if self.heredocs.is_empty() {
            self.state = State::Normal;
        }
        Ok(())
    }

    /// `%q(...)`, `%Q[...]`, `%(...)`, `%w{...}`, `%r{...}` in operand position
    fn percent_literal_ahead(&self) -> bool {
        let operand_position = self.pos == 0 || {
            let prev = self.chars[self.pos - 1];
            prev.is_whitespace() || matches!(prev, '(' | ',' | '=' | '[' | '{')
        };
        if !operand_position {
            return false;
        }
        let is_delim = |c: Option<char>| matches!(c, Some('(' | '[' | '{' | '<' | '|' | '!' | '/'));
        match self.peek(1) {
            Some('q' | 'Q' | 'w' | 'W' | 'i' | 'I' | 'r') => is_delim(self.peek(2)),
            next => is_delim(next),
        }
    }

    fn start_percent_literal(&mut self) {
        self.pos += 1;
        if self.peek(0) == Some('r') {
            self.pos += 1;
            let open = self.chars[self.pos];
            self.open_regex(Delim::percent(open, true));
            return;
        }
        let (style, discard) = match self.peek(0) {
            Some('q') => (QuoteStyle::Single, false),
            Some('Q') => (QuoteStyle::Double, false),
            Some('w' | 'W' | 'i' | 'I') => (QuoteStyle::Single, true),
            _ => (QuoteStyle::Double, false),
        };
        if self.peek(0).map_or(false, |c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let open = self.chars[self.pos];
        self.open_quote(style, Delim::percent(open, discard));
    }
}

fn unterminated_heredoc(doc: &PendingHeredoc) -> ExtractError {
    ExtractError::LiteralSyntax {
        line: doc.line,
        message: format!("heredoc terminator {} not found", doc.id),
    }
}
