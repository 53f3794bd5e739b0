//! Pattern-driven tokenizer. The caller registers a skip class, separator
//! and comment classes, and an ordered list of token patterns; `lex` then
//! walks the input trying each class at the cursor, first match wins.

use std::rc::Rc;

use regex::Regex;

use crate::error::ParseError;
use crate::token::{Position, Span, Token, TokenKind};

/// A compiled regular expression paired with the token kind it produces.
/// Matches are always anchored at the current input cursor.
#[derive(Debug, Clone)]
pub struct Pattern {
    kind: TokenKind,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str, kind: TokenKind) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(r"\A(?:{})", source))?;
        Ok(Self { kind, regex })
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Length of the match at the start of `input`, if any. Empty matches
    /// are treated as misses so the lexer always makes progress.
    fn match_len(&self, input: &str) -> Option<usize> {
        self.regex.find(input).map(|m| m.end()).filter(|&len| len > 0)
    }
}

/// Turns source text into a flat vector of spanned tokens. Configured once
/// before use; immutable afterwards so it can be shared.
#[derive(Debug, Default)]
pub struct Lexer {
    skip: Option<Pattern>,
    line_sep: Option<Pattern>,
    command_sep: Option<Pattern>,
    multiline_comment: Option<(Pattern, Pattern)>,
    singleline_comment: Option<Pattern>,
    patterns: Vec<Pattern>,
}

impl Lexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches of the skip class are consumed without producing a token.
    pub fn set_skip(&mut self, pattern: Pattern) {
        self.skip = Some(pattern);
    }

    /// The line separator drives line counting; columns reset after each
    /// match of it inside any consumed text.
    pub fn set_line_sep(&mut self, pattern: Pattern) {
        self.line_sep = Some(pattern);
    }

    /// Statement terminators are emitted as ordinary tokens of the
    /// pattern's kind.
    pub fn set_command_sep(&mut self, pattern: Pattern) {
        self.command_sep = Some(pattern);
    }

    pub fn set_multiline_comment(&mut self, open: Pattern, close: Pattern) {
        self.multiline_comment = Some((open, close));
    }

    pub fn set_singleline_comment(&mut self, pattern: Pattern) {
        self.singleline_comment = Some(pattern);
    }

    /// Registers a normal token pattern. Patterns are tried in
    /// registration order and the first anchored match wins.
    pub fn add_pattern(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
    }

    pub fn lex(&self, input: &str, filename: &str) -> Result<Vec<Token>, ParseError> {
        let file: Rc<str> = Rc::from(filename);
        let mut tokens = Vec::new();
        let mut cursor = Cursor::new();

        while cursor.offset < input.len() {
            let rest = &input[cursor.offset..];

            if let Some(skip) = &self.skip {
                if let Some(len) = skip.match_len(rest) {
                    self.consume(&mut cursor, input, len);
                    continue;
                }
            }

            if let Some((open, close)) = &self.multiline_comment {
                if let Some(len) = open.match_len(rest) {
                    self.consume_block_comment(&mut cursor, input, len, close, &file)?;
                    continue;
                }
            }

            if let Some(comment) = &self.singleline_comment {
                if let Some(len) = comment.match_len(rest) {
                    self.consume_line_comment(&mut cursor, input, len);
                    continue;
                }
            }

            if let Some(sep) = &self.command_sep {
                if let Some(len) = sep.match_len(rest) {
                    tokens.push(self.emit(&mut cursor, input, len, sep.kind(), &file));
                    continue;
                }
            }

            match self
                .patterns
                .iter()
                .find_map(|p| p.match_len(rest).map(|len| (len, p.kind())))
            {
                Some((len, kind)) => tokens.push(self.emit(&mut cursor, input, len, kind, &file)),
                None => {
                    return Err(ParseError::at_position(
                        "Unknown character",
                        file,
                        cursor.position(),
                    ))
                }
            }
        }

        Ok(tokens)
    }

    fn emit(
        &self,
        cursor: &mut Cursor,
        input: &str,
        len: usize,
        kind: TokenKind,
        file: &Rc<str>,
    ) -> Token {
        let start = cursor.position();
        let text = input[cursor.offset..cursor.offset + len].to_string();
        self.consume(cursor, input, len);
        Token::leaf(kind, text, Span::new(file.clone(), start, cursor.position()))
    }

    /// Advances the cursor over `len` bytes, applying the line separator
    /// pattern to keep the line and column counters honest.
    fn consume(&self, cursor: &mut Cursor, input: &str, len: usize) {
        let text = &input[cursor.offset..cursor.offset + len];
        let mut i = 0;
        while i < text.len() {
            if let Some(sep) = &self.line_sep {
                if let Some(sep_len) = sep.match_len(&text[i..]) {
                    cursor.line += 1;
                    cursor.column = 1;
                    i += sep_len;
                    continue;
                }
            }
            cursor.column += 1;
            i += text[i..].chars().next().map_or(1, char::len_utf8);
        }
        cursor.offset += len;
    }

    fn consume_block_comment(
        &self,
        cursor: &mut Cursor,
        input: &str,
        open_len: usize,
        close: &Pattern,
        file: &Rc<str>,
    ) -> Result<(), ParseError> {
        let start = cursor.position();
        self.consume(cursor, input, open_len);
        while cursor.offset < input.len() {
            if let Some(close_len) = close.match_len(&input[cursor.offset..]) {
                self.consume(cursor, input, close_len);
                return Ok(());
            }
            let step = input[cursor.offset..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            self.consume(cursor, input, step);
        }
        Err(ParseError::at_position(
            "Unterminated comment",
            file.clone(),
            start,
        ))
    }

    /// Consumes up to, but not including, the next line separator so the
    /// terminator still comes through as a statement separator token.
    fn consume_line_comment(&self, cursor: &mut Cursor, input: &str, open_len: usize) {
        self.consume(cursor, input, open_len);
        while cursor.offset < input.len() {
            if let Some(sep) = &self.line_sep {
                if sep.match_len(&input[cursor.offset..]).is_some() {
                    return;
                }
            }
            let step = input[cursor.offset..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            self.consume(cursor, input, step);
        }
    }
}

struct Cursor {
    offset: usize,
    line: u32,
    column: u32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}
