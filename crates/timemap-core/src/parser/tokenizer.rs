//! Link-format tokenizer: converts Timemap text into a token stream
//!
//! Recognizes exactly four kinds of token:
//! URI references (`<...>`), attributes (`name="value"`), and the
//! separators `;` and `,`. Whitespace between tokens is insignificant;
//! anything else is a lexical error.
//!
//! Guarantees:
//! - Lazy: lines are pulled from the source only as tokens are consumed
//! - Scoped: the source is released exactly once, on exhaustion, on error,
//!   on `close()`, or on drop
//! - Positioned: every token and every error carries line:column

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use super::source::{LineSource, ReaderSource};
use crate::{Error, Result};

/// Token types for Link-format syntax
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<uri-reference>`, brackets stripped
    Uri(String),
    /// `name="value"`, quotes stripped
    Attribute { name: String, value: String },
    Semicolon,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Uri(uri) => write!(f, "<{}>", uri),
            Token::Attribute { name, value } => write!(f, "{}=\"{}\"", name, value),
            Token::Semicolon => f.write_str(";"),
            Token::Comma => f.write_str(","),
        }
    }
}

/// Position in source text for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Token with source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Lazy tokenizer over a line source
pub struct Tokenizer<S: LineSource> {
    source: Option<S>,
    pending: VecDeque<Result<SpannedToken>>,
    line: usize,
}

impl<S: LineSource> Tokenizer<S> {
    /// Take ownership of `source`; it is held until the stream ends.
    pub fn new(source: S) -> Self {
        Tokenizer {
            source: Some(source),
            pending: VecDeque::new(),
            line: 0,
        }
    }

    /// Stop early and release the source. Safe to call more than once.
    pub fn close(&mut self) {
        self.pending.clear();
        self.release();
    }

    /// True until the source has been released.
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
            tracing::trace!(lines = self.line, "released timemap source");
        }
    }
}

impl<S: LineSource> Iterator for Tokenizer<S> {
    type Item = Result<SpannedToken>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if item.is_err() {
                    self.close();
                }
                return Some(item);
            }

            let source = self.source.as_mut()?;
            match source.next_line() {
                Ok(Some(text)) => {
                    self.line += 1;
                    LineLexer::new(&text, self.line).lex_into(&mut self.pending);
                }
                Ok(None) => {
                    self.release();
                    return None;
                }
                Err(e) => {
                    self.release();
                    return Some(Err(Error::Io(e)));
                }
            }
        }
    }
}

impl<S: LineSource> Drop for Tokenizer<S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Tokenize in-memory text eagerly, stopping at the first error.
pub fn tokenize(text: &str) -> Result<Vec<SpannedToken>> {
    Tokenizer::new(ReaderSource::from_text(text)).collect()
}

// ── Single-line lexer ──────────────────────────────────────

struct LineLexer {
    input: Vec<char>,
    position: usize,
    line: usize,
}

impl LineLexer {
    fn new(text: &str, line: usize) -> Self {
        LineLexer {
            input: text.chars().collect(),
            position: 0,
            line,
        }
    }

    /// Queue every token on the line; an error ends the line.
    fn lex_into(mut self, out: &mut VecDeque<Result<SpannedToken>>) {
        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                return;
            }
            let item = self.next_token();
            let failed = item.is_err();
            out.push_back(item);
            if failed {
                return;
            }
        }
    }

    // ── Character helpers ──────────────────────────────

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn current_span(&self) -> Span {
        Span {
            line: self.line,
            column: self.position + 1,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.position += 1;
            } else {
                break;
            }
        }
    }

    fn text_between(&self, start: usize, end: usize) -> String {
        self.input[start..end].iter().collect()
    }

    // ── Main dispatch ──────────────────────────────────

    fn next_token(&mut self) -> Result<SpannedToken> {
        let span = self.current_span();
        let token = match self.peek() {
            Some(';') => {
                self.position += 1;
                Some(Token::Semicolon)
            }
            Some(',') => {
                self.position += 1;
                Some(Token::Comma)
            }
            Some('<') => self.read_uri(),
            Some(c) if c.is_ascii_alphabetic() => self.read_attribute(),
            _ => None,
        };

        match token {
            Some(token) => Ok(SpannedToken { token, span }),
            None => Err(Error::Lexical {
                text: self.offending_text(span),
                span,
            }),
        }
    }

    /// `<` then one or more non-`>` characters then `>`.
    fn read_uri(&mut self) -> Option<Token> {
        let start = self.position + 1;
        let close = self.input[start..].iter().position(|&c| c == '>')?;
        if close == 0 {
            return None;
        }
        let uri = self.text_between(start, start + close);
        self.position = start + close + 1;
        Some(Token::Uri(uri))
    }

    /// ASCII letters, `=`, then a double-quoted value without inner quotes.
    fn read_attribute(&mut self) -> Option<Token> {
        let start = self.position;
        let mut cursor = start;
        while self.input.get(cursor).is_some_and(|c| c.is_ascii_alphabetic()) {
            cursor += 1;
        }
        let name_end = cursor;
        if self.input.get(cursor) != Some(&'=') || self.input.get(cursor + 1) != Some(&'"') {
            return None;
        }
        let value_start = cursor + 2;
        let close = self.input[value_start..].iter().position(|&c| c == '"')?;
        let name = self.text_between(start, name_end);
        let value = self.text_between(value_start, value_start + close);
        self.position = value_start + close + 1;
        Some(Token::Attribute { name, value })
    }

    /// The run of text a failed match started on, for diagnostics.
    fn offending_text(&self, span: Span) -> String {
        let start = span.column - 1;
        let end = self.input[start..]
            .iter()
            .skip(1)
            .position(|&c| c.is_whitespace() || c == ',' || c == ';')
            .map_or(self.input.len(), |offset| start + 1 + offset);
        self.text_between(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|st| st.token)
            .collect()
    }

    fn attr(name: &str, value: &str) -> Token {
        Token::Attribute {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Source that counts how often it was closed.
    struct CountingSource {
        lines: VecDeque<String>,
        closes: Rc<Cell<usize>>,
    }

    impl CountingSource {
        fn new(text: &str) -> (Self, Rc<Cell<usize>>) {
            let closes = Rc::new(Cell::new(0));
            let lines = text.split_inclusive('\n').map(str::to_string).collect();
            (
                CountingSource {
                    lines,
                    closes: Rc::clone(&closes),
                },
                closes,
            )
        }
    }

    impl LineSource for CountingSource {
        fn next_line(&mut self) -> std::io::Result<Option<String>> {
            Ok(self.lines.pop_front())
        }

        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
        }
    }

    // ── Token kinds ────────────────────────────────────

    #[test]
    fn test_tokenize_link_value() {
        let toks = tokens(r#"<http://example.com/>;rel="original","#);
        assert_eq!(
            toks,
            vec![
                Token::Uri("http://example.com/".to_string()),
                Token::Semicolon,
                attr("rel", "original"),
                Token::Comma,
            ]
        );
    }

    #[test]
    fn test_tokenize_whitespace_between_tokens() {
        let toks = tokens("  <a> ;\trel=\"x y\"  ,\n\n  <b>");
        assert_eq!(
            toks,
            vec![
                Token::Uri("a".to_string()),
                Token::Semicolon,
                attr("rel", "x y"),
                Token::Comma,
                Token::Uri("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_empty_attribute_value() {
        assert_eq!(tokens(r#"type="""#), vec![attr("type", "")]);
    }

    #[test]
    fn test_tokenize_datetime_with_commas_inside_quotes() {
        let toks = tokens(r#"datetime="Tue, 24 Jan 2012 00:00:00 GMT""#);
        assert_eq!(toks, vec![attr("datetime", "Tue, 24 Jan 2012 00:00:00 GMT")]);
    }

    #[test]
    fn test_display_reproduces_raw_text() {
        assert_eq!(Token::Uri("x".into()).to_string(), "<x>");
        assert_eq!(attr("rel", "self").to_string(), r#"rel="self""#);
        assert_eq!(Token::Comma.to_string(), ",");
    }

    #[test]
    fn test_empty_input() {
        assert!(tokens("").is_empty());
        assert!(tokens("   \n\n\t  ").is_empty());
    }

    // ── Lexical errors ─────────────────────────────────

    #[test]
    fn test_bare_word_is_lexical_error() {
        let err = tokenize("<a>; bogus ,").unwrap_err();
        match err {
            Error::Lexical { text, span } => {
                assert_eq!(text, "bogus");
                assert_eq!(span, Span { line: 1, column: 6 });
            }
            other => panic!("expected lexical error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_uri_brackets_rejected() {
        assert!(matches!(tokenize("<>"), Err(Error::Lexical { .. })));
    }

    #[test]
    fn test_unterminated_uri_rejected() {
        let err = tokenize("<http://example.com/").unwrap_err();
        assert!(err.to_string().contains("<http://example.com/"));
    }

    #[test]
    fn test_unquoted_attribute_rejected() {
        let err = tokenize("rel=memento").unwrap_err();
        assert!(matches!(err, Error::Lexical { ref text, .. } if text == "rel=memento"));
    }

    #[test]
    fn test_tokens_before_error_are_yielded() {
        let items: Vec<_> = Tokenizer::new(ReaderSource::from_text("<a>; ! ,")).collect();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(items[1].is_ok());
        assert!(items[2].is_err());
    }

    // ── Span tracking ──────────────────────────────────

    #[test]
    fn test_span_tracking() {
        let toks = tokenize("<a>;\n  rel=\"x\",").unwrap();
        assert_eq!(toks[0].span, Span { line: 1, column: 1 });
        assert_eq!(toks[1].span, Span { line: 1, column: 4 });
        assert_eq!(toks[2].span, Span { line: 2, column: 3 });
        assert_eq!(toks[3].span, Span { line: 2, column: 10 });
    }

    // ── Resource release ───────────────────────────────

    #[test]
    fn test_release_once_on_exhaustion() {
        let (source, closes) = CountingSource::new("<a>,\n<b>\n");
        let mut tokenizer = Tokenizer::new(source);
        assert_eq!(tokenizer.by_ref().count(), 3);
        assert!(!tokenizer.is_open());
        assert!(tokenizer.next().is_none());
        drop(tokenizer);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_release_once_on_error() {
        let (source, closes) = CountingSource::new("<a>,\n???\n<b>\n");
        let mut tokenizer = Tokenizer::new(source);
        let items: Vec<_> = tokenizer.by_ref().collect();
        assert!(items.last().unwrap().is_err());
        assert_eq!(closes.get(), 1);
        drop(tokenizer);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_release_once_on_early_close() {
        let (source, closes) = CountingSource::new("<a>,\n<b>,\n<c>\n");
        let mut tokenizer = Tokenizer::new(source);
        assert!(tokenizer.next().is_some());
        tokenizer.close();
        tokenizer.close();
        assert!(tokenizer.next().is_none());
        drop(tokenizer);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_release_once_on_drop() {
        let (source, closes) = CountingSource::new("<a>,\n<b>\n");
        let mut tokenizer = Tokenizer::new(source);
        assert!(tokenizer.next().is_some());
        drop(tokenizer);
        assert_eq!(closes.get(), 1);
    }
}
