//! Lexer for the Vesper programming language
//!
//! The lexer transforms source text into a stream of tokens, handling:
//! - All Vesper keywords (module, import, func, let, mut, struct, class, ...)
//! - Numeric literals (decimal, hex, octal, binary, float) with `_` separators
//! - String and character literals with escape sequences
//! - All operators and punctuation, recognized greedily
//! - Comments (`//` line and nesting `/* */` block)
//! - Lifetime markers (`'a`) versus character literals (`'a'`)
//! - Annotations (`@doc`, `@deprecated`, `@test`)
//!
//! Tokens are produced one at a time; `peek_token` gives one-token lookahead
//! and `save_state`/`restore_state` support the parser's bounded speculative
//! parsing. Errors produce an [`TokenKind::Invalid`] token and a diagnostic;
//! the lexer never panics on any input.

#![allow(clippy::cast_possible_truncation)] // Offsets are u32; files > 4GB are unsupported

mod span;
mod token;

pub use span::Span;
pub use token::{identifier_kind, LiteralValue, Token, TokenKind};

use thiserror::Error;

use crate::diagnostics::DiagnosticEngine;
use crate::source::SourceLocation;

/// Lexical error messages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated string literal (newline in string)")]
    NewlineInString,
    #[error("unterminated character literal")]
    UnterminatedChar,
    #[error("unterminated character literal (expected closing ')")]
    UnclosedChar,
    #[error("unterminated block comment")]
    UnterminatedBlockComment,
    #[error("expected hexadecimal digit after '0x'")]
    MissingHexDigits,
    #[error("expected binary digit after '0b'")]
    MissingBinaryDigits,
    #[error("expected digit in exponent")]
    MissingExponentDigits,
    #[error("invalid integer literal")]
    InvalidIntLiteral,
}

/// Snapshot of the full scanner state, for bounded parser lookahead
#[derive(Debug, Clone)]
pub struct LexerState {
    current: u32,
    token_start: u32,
    line: u32,
    column: u32,
    token_line: u32,
    token_column: u32,
    has_peeked: bool,
    peeked: Token,
}

/// The Vesper lexer
pub struct Lexer<'src> {
    source: &'src str,
    filename: String,

    /// Current byte position in the source
    current: u32,
    /// Start of the token being scanned
    token_start: u32,
    line: u32,
    column: u32,
    token_line: u32,
    token_column: u32,

    /// One-token peek cache
    has_peeked: bool,
    peeked: Token,
}

impl<'src> Lexer<'src> {
    /// Create a lexer for the given source text. The text must outlive the
    /// lexer; token lexemes are copied out as they are produced.
    #[must_use]
    pub fn new(source: &'src str, filename: impl Into<String>) -> Self {
        Self {
            source,
            filename: filename.into(),
            current: 0,
            token_start: 0,
            line: 1,
            column: 1,
            token_line: 1,
            token_column: 1,
            has_peeked: false,
            peeked: Token::default(),
        }
    }

    /// Check if the scanner has consumed the whole buffer
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.current as usize >= self.source.len()
    }

    /// The filename this lexer reports positions against
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Snapshot the scanner state
    #[must_use]
    pub fn save_state(&self) -> LexerState {
        LexerState {
            current: self.current,
            token_start: self.token_start,
            line: self.line,
            column: self.column,
            token_line: self.token_line,
            token_column: self.token_column,
            has_peeked: self.has_peeked,
            peeked: self.peeked.clone(),
        }
    }

    /// Restore a previously saved scanner state
    pub fn restore_state(&mut self, state: &LexerState) {
        self.current = state.current;
        self.token_start = state.token_start;
        self.line = state.line;
        self.column = state.column;
        self.token_line = state.token_line;
        self.token_column = state.token_column;
        self.has_peeked = state.has_peeked;
        self.peeked = state.peeked.clone();
    }

    /// Peek at the next token without consuming it. Idempotent.
    pub fn peek_token(&mut self, diag: &mut DiagnosticEngine) -> Token {
        if !self.has_peeked {
            self.peeked = self.scan_token(diag);
            self.has_peeked = true;
        }
        self.peeked.clone()
    }

    /// Lex the next token from the source
    pub fn next_token(&mut self, diag: &mut DiagnosticEngine) -> Token {
        if self.has_peeked {
            self.has_peeked = false;
            return self.peeked.clone();
        }
        self.scan_token(diag)
    }

    /// Lex all tokens through EOF
    pub fn lex_all(&mut self, diag: &mut DiagnosticEngine) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token(diag);
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    // ==================== Character inspection ====================

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source.as_bytes()[self.current as usize]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current as usize + 1 >= self.source.len() {
            0
        } else {
            self.source.as_bytes()[self.current as usize + 1]
        }
    }

    fn advance(&mut self) -> u8 {
        let c = self.source.as_bytes()[self.current as usize];
        self.current += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn match_char(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.advance();
        true
    }

    /// Step back one byte (only valid when the byte is not a newline start)
    fn back_up(&mut self) {
        self.current -= 1;
        self.column -= 1;
    }

    // ==================== Skipping ====================

    fn skip_whitespace(&mut self, diag: &mut DiagnosticEngine) {
        while !self.is_at_end() {
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.advance();
                }
                b'/' => {
                    if self.peek_next() == b'/' {
                        self.skip_line_comment();
                    } else if self.peek_next() == b'*' {
                        if !self.skip_block_comment(diag) {
                            return;
                        }
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        self.advance();
        self.advance();
        while !self.is_at_end() && self.peek() != b'\n' {
            self.advance();
        }
    }

    /// Block comments nest. Returns false if the comment was unterminated.
    fn skip_block_comment(&mut self, diag: &mut DiagnosticEngine) -> bool {
        self.advance();
        self.advance();
        let mut depth = 1u32;

        while !self.is_at_end() && depth > 0 {
            if self.peek() == b'/' && self.peek_next() == b'*' {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.peek() == b'*' && self.peek_next() == b'/' {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                self.advance();
            }
        }

        if depth > 0 {
            let loc = SourceLocation {
                file: self.filename.clone(),
                line: self.line,
                column: self.column,
                offset: self.current,
            };
            diag.error(loc, LexError::UnterminatedBlockComment.to_string());
            return false;
        }
        true
    }

    // ==================== Token producers ====================

    fn token_location(&self) -> SourceLocation {
        SourceLocation {
            file: self.filename.clone(),
            line: self.token_line,
            column: self.token_column,
            offset: self.token_start,
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        let text = &self.source[self.token_start as usize..self.current as usize];
        Token::new(
            kind,
            text,
            Span::new(self.token_start, self.current),
            self.token_line,
            self.token_column,
        )
    }

    fn make_token_with_text(&self, kind: TokenKind, text: &str) -> Token {
        Token::new(
            kind,
            text,
            Span::new(self.token_start, self.current),
            self.token_line,
            self.token_column,
        )
    }

    fn error_token(&self, error: &LexError, diag: &mut DiagnosticEngine) -> Token {
        diag.error(self.token_location(), error.to_string());
        self.make_token(TokenKind::Invalid)
    }

    // ==================== Scanning ====================

    fn scan_token(&mut self, diag: &mut DiagnosticEngine) -> Token {
        self.skip_whitespace(diag);

        self.token_start = self.current;
        self.token_line = self.line;
        self.token_column = self.column;

        if self.is_at_end() {
            return self.make_token(TokenKind::Eof);
        }

        let c = self.advance();

        // Identifiers and keywords
        if c.is_ascii_alphabetic() || c == b'_' {
            // A bare `_` not followed by an identifier character is the wildcard
            if c == b'_' && !(self.peek().is_ascii_alphanumeric() || self.peek() == b'_') {
                return self.make_token(TokenKind::Underscore);
            }
            return self.lex_identifier_or_keyword();
        }

        // Numbers
        if c.is_ascii_digit() {
            self.back_up();
            return self.lex_number(diag);
        }

        // Strings
        if c == b'"' {
            self.back_up();
            return self.lex_string(diag);
        }

        // Character literal or lifetime marker
        if c == b'\'' {
            return self.lex_apostrophe(diag);
        }

        // Annotations
        if c == b'@' {
            if self.peek().is_ascii_alphabetic() {
                self.back_up();
                return self.lex_annotation();
            }
            return self.make_token(TokenKind::At);
        }

        match c {
            b'(' => self.make_token(TokenKind::LParen),
            b')' => self.make_token(TokenKind::RParen),
            b'[' => self.make_token(TokenKind::LBracket),
            b']' => self.make_token(TokenKind::RBracket),
            b'{' => self.make_token(TokenKind::LBrace),
            b'}' => self.make_token(TokenKind::RBrace),
            b',' => self.make_token(TokenKind::Comma),
            b';' => self.make_token(TokenKind::Semicolon),
            b'~' => self.make_token(TokenKind::Tilde),
            b'?' => self.make_token(TokenKind::Question),

            b':' => {
                if self.match_char(b':') {
                    self.make_token(TokenKind::ColonColon)
                } else {
                    self.make_token(TokenKind::Colon)
                }
            }

            b'.' => {
                if self.match_char(b'.') {
                    if self.match_char(b'.') {
                        self.make_token(TokenKind::DotDotDot)
                    } else {
                        self.make_token(TokenKind::DotDot)
                    }
                } else {
                    self.make_token(TokenKind::Dot)
                }
            }

            b'+' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::PlusEqual)
                } else {
                    self.make_token(TokenKind::Plus)
                }
            }

            b'-' => {
                if self.match_char(b'>') {
                    self.make_token(TokenKind::Arrow)
                } else if self.match_char(b'=') {
                    self.make_token(TokenKind::MinusEqual)
                } else {
                    self.make_token(TokenKind::Minus)
                }
            }

            b'*' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::StarEqual)
                } else {
                    self.make_token(TokenKind::Star)
                }
            }

            b'/' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::SlashEqual)
                } else {
                    self.make_token(TokenKind::Slash)
                }
            }

            b'%' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::PercentEqual)
                } else {
                    self.make_token(TokenKind::Percent)
                }
            }

            b'=' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::EqualEqual)
                } else if self.match_char(b'>') {
                    self.make_token(TokenKind::FatArrow)
                } else {
                    self.make_token(TokenKind::Equal)
                }
            }

            b'!' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::BangEqual)
                } else {
                    self.error_token(&LexError::UnexpectedChar('!'), diag)
                }
            }

            b'<' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::LessEqual)
                } else if self.match_char(b'<') {
                    self.make_token(TokenKind::ShiftLeft)
                } else {
                    self.make_token(TokenKind::Less)
                }
            }

            b'>' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::GreaterEqual)
                } else if self.match_char(b'>') {
                    self.make_token(TokenKind::ShiftRight)
                } else {
                    self.make_token(TokenKind::Greater)
                }
            }

            b'&' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::AmpersandEqual)
                } else {
                    self.make_token(TokenKind::Ampersand)
                }
            }

            b'|' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::PipeEqual)
                } else {
                    self.make_token(TokenKind::Pipe)
                }
            }

            b'^' => {
                if self.match_char(b'=') {
                    self.make_token(TokenKind::CaretEqual)
                } else {
                    self.make_token(TokenKind::Caret)
                }
            }

            b'#' => {
                if self.match_char(b'!') {
                    self.make_token(TokenKind::HashBang)
                } else {
                    self.make_token(TokenKind::Hash)
                }
            }

            _ => {
                // Consume the rest of a multi-byte UTF-8 sequence so the
                // invalid token covers a whole character
                while !self.is_at_end() && (self.peek() & 0xC0) == 0x80 {
                    self.advance();
                }
                let text = &self.source[self.token_start as usize..self.current as usize];
                let ch = text.chars().next().unwrap_or('\u{FFFD}');
                self.error_token(&LexError::UnexpectedChar(ch), diag)
            }
        }
    }

    fn lex_identifier_or_keyword(&mut self) -> Token {
        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == b'_') {
            self.advance();
        }

        let text = &self.source[self.token_start as usize..self.current as usize];
        self.make_token(identifier_kind(text))
    }

    fn lex_number(&mut self, diag: &mut DiagnosticEngine) -> Token {
        // Radix prefixes
        if self.peek() == b'0' {
            match self.peek_next() {
                b'x' | b'X' => {
                    self.advance();
                    self.advance();
                    if self.is_at_end() || !self.peek().is_ascii_hexdigit() {
                        return self.error_token(&LexError::MissingHexDigits, diag);
                    }
                    while !self.is_at_end()
                        && (self.peek().is_ascii_hexdigit() || self.peek() == b'_')
                    {
                        self.advance();
                    }
                    return self.finish_int_token(16, 2, diag);
                }
                b'b' | b'B' => {
                    self.advance();
                    self.advance();
                    if self.is_at_end() || !matches!(self.peek(), b'0' | b'1') {
                        return self.error_token(&LexError::MissingBinaryDigits, diag);
                    }
                    while !self.is_at_end() && matches!(self.peek(), b'0' | b'1' | b'_') {
                        self.advance();
                    }
                    return self.finish_int_token(2, 2, diag);
                }
                b'o' | b'O' => {
                    self.advance();
                    self.advance();
                    while !self.is_at_end() && matches!(self.peek(), b'0'..=b'7' | b'_') {
                        self.advance();
                    }
                    return self.finish_int_token(8, 2, diag);
                }
                _ => {}
            }
        }

        let mut is_float = false;

        while !self.is_at_end() && (self.peek().is_ascii_digit() || self.peek() == b'_') {
            self.advance();
        }

        // Fractional part, but `1..2` is a range, not a float
        if self.peek() == b'.' && self.peek_next() != b'.' {
            is_float = true;
            self.advance();
            while !self.is_at_end() && (self.peek().is_ascii_digit() || self.peek() == b'_') {
                self.advance();
            }
        }

        // Exponent
        if matches!(self.peek(), b'e' | b'E') {
            is_float = true;
            self.advance();
            if matches!(self.peek(), b'+' | b'-') {
                self.advance();
            }
            if !self.peek().is_ascii_digit() {
                return self.error_token(&LexError::MissingExponentDigits, diag);
            }
            while !self.is_at_end() && (self.peek().is_ascii_digit() || self.peek() == b'_') {
                self.advance();
            }
        }

        if is_float {
            let text = &self.source[self.token_start as usize..self.current as usize];
            let clean: String = text.chars().filter(|&c| c != '_').collect();
            let mut token = self.make_token(TokenKind::FloatLiteral);
            match clean.parse::<f64>() {
                Ok(v) => token.value = LiteralValue::Float(v),
                Err(_) => return self.error_token(&LexError::InvalidIntLiteral, diag),
            }
            token
        } else {
            self.finish_int_token(10, 0, diag)
        }
    }

    fn finish_int_token(&mut self, radix: u32, prefix_len: usize, diag: &mut DiagnosticEngine) -> Token {
        let text = &self.source[self.token_start as usize..self.current as usize];
        let clean: String = text[prefix_len..].chars().filter(|&c| c != '_').collect();
        match i64::from_str_radix(&clean, radix) {
            Ok(v) => {
                let mut token = self.make_token(TokenKind::IntLiteral);
                token.value = LiteralValue::Int(v);
                token
            }
            Err(_) => self.error_token(&LexError::InvalidIntLiteral, diag),
        }
    }

    fn lex_string(&mut self, diag: &mut DiagnosticEngine) -> Token {
        self.advance(); // opening quote
        let content_start = self.current;

        while !self.is_at_end() && self.peek() != b'"' {
            if self.peek() == b'\\' {
                self.advance();
                if self.is_at_end() {
                    return self.error_token(&LexError::UnterminatedString, diag);
                }
                // The escaped character is consumed but not interpreted here;
                // interpretation is the parser's concern
                self.advance();
            } else if self.peek() == b'\n' {
                return self.error_token(&LexError::NewlineInString, diag);
            } else {
                self.advance();
            }
        }

        if self.is_at_end() {
            return self.error_token(&LexError::UnterminatedString, diag);
        }

        let content_end = self.current;
        self.advance(); // closing quote

        let content = &self.source[content_start as usize..content_end as usize];
        self.make_token_with_text(TokenKind::StringLiteral, content)
    }

    fn lex_char(&mut self, diag: &mut DiagnosticEngine) -> Token {
        self.advance(); // opening quote

        if self.is_at_end() {
            return self.error_token(&LexError::UnterminatedChar, diag);
        }

        if self.peek() == b'\\' {
            self.advance();
            if self.is_at_end() {
                return self.error_token(&LexError::UnterminatedChar, diag);
            }
            self.advance();
        } else {
            self.advance();
        }

        if self.is_at_end() || self.peek() != b'\'' {
            return self.error_token(&LexError::UnclosedChar, diag);
        }

        self.advance(); // closing quote
        self.make_token(TokenKind::CharLiteral)
    }

    /// Disambiguate `'a'` (char literal) from `'a` (lifetime marker) with one
    /// character of lookahead, restoring position on the discarded branch.
    fn lex_apostrophe(&mut self, diag: &mut DiagnosticEngine) -> Token {
        if !self.is_at_end() && self.peek().is_ascii_alphabetic() {
            let saved_current = self.current;
            let saved_line = self.line;
            let saved_column = self.column;

            self.advance(); // the letter
            if !self.is_at_end() && self.peek() == b'\'' {
                // Char literal like 'a': rewind to before the opening quote
                self.current = saved_current;
                self.line = saved_line;
                self.column = saved_column;
                self.back_up();
                return self.lex_char(diag);
            }

            // Lifetime marker: consume the rest of the identifier
            while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == b'_') {
                self.advance();
            }
            return self.make_token(TokenKind::Apostrophe);
        }

        if !self.is_at_end() && self.peek() == b'\\' {
            self.back_up();
            return self.lex_char(diag);
        }

        self.make_token(TokenKind::Apostrophe)
    }

    fn lex_annotation(&mut self) -> Token {
        self.advance(); // @

        let name_start = self.current;
        let name_column = self.column;
        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == b'_') {
            self.advance();
        }

        let name = &self.source[name_start as usize..self.current as usize];
        match name {
            "doc" => self.make_token(TokenKind::KwDoc),
            "deprecated" => self.make_token(TokenKind::KwDeprecated),
            "test" => self.make_token(TokenKind::KwTest),
            _ => {
                // Unknown annotation: emit `@` alone and re-lex the name as
                // an identifier on the next call
                self.current = name_start;
                self.line = self.token_line;
                self.column = name_column;
                self.make_token(TokenKind::At)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        let mut diag = DiagnosticEngine::silent();
        Lexer::new(source, "test.vsp").lex_all(&mut diag)
    }

    fn lex_kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    fn lex_with_errors(source: &str) -> (Vec<Token>, u32) {
        let mut diag = DiagnosticEngine::silent();
        let tokens = Lexer::new(source, "test.vsp").lex_all(&mut diag);
        (tokens, diag.error_count())
    }

    #[test]
    fn lex_declaration_keywords() {
        assert_eq!(
            lex_kinds("module import func let mut const struct class enum trait impl type"),
            vec![
                TokenKind::KwModule,
                TokenKind::KwImport,
                TokenKind::KwFunc,
                TokenKind::KwLet,
                TokenKind::KwMut,
                TokenKind::KwConst,
                TokenKind::KwStruct,
                TokenKind::KwClass,
                TokenKind::KwEnum,
                TokenKind::KwTrait,
                TokenKind::KwImpl,
                TokenKind::KwType,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lex_remaining_keywords() {
        assert_eq!(
            lex_kinds("self Self if else match for while loop break continue return in"),
            vec![
                TokenKind::KwSelf,
                TokenKind::KwSelfType,
                TokenKind::KwIf,
                TokenKind::KwElse,
                TokenKind::KwMatch,
                TokenKind::KwFor,
                TokenKind::KwWhile,
                TokenKind::KwLoop,
                TokenKind::KwBreak,
                TokenKind::KwContinue,
                TokenKind::KwReturn,
                TokenKind::KwIn,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            lex_kinds("move ref drop async await spawn unsafe pub public private"),
            vec![
                TokenKind::KwMove,
                TokenKind::KwRef,
                TokenKind::KwDrop,
                TokenKind::KwAsync,
                TokenKind::KwAwait,
                TokenKind::KwSpawn,
                TokenKind::KwUnsafe,
                TokenKind::KwPub,
                TokenKind::KwPublic,
                TokenKind::KwPrivate,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            lex_kinds("true false and or not as is where use Void panic assert"),
            vec![
                TokenKind::KwTrue,
                TokenKind::KwFalse,
                TokenKind::KwAnd,
                TokenKind::KwOr,
                TokenKind::KwNot,
                TokenKind::KwAs,
                TokenKind::KwIs,
                TokenKind::KwWhere,
                TokenKind::KwUse,
                TokenKind::KwVoid,
                TokenKind::KwPanic,
                TokenKind::KwAssert,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lex_identifiers() {
        let tokens = lex("foo bar_baz _private camelCase x1");
        assert!(tokens[..5].iter().all(|t| t.kind == TokenKind::Identifier));
        assert_eq!(tokens[0].text, "foo");
        assert_eq!(tokens[2].text, "_private");
    }

    #[test]
    fn bare_underscore_is_wildcard() {
        assert_eq!(
            lex_kinds("_ _x x_"),
            vec![
                TokenKind::Underscore,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lex_integers() {
        let tokens = lex("42 0xFF 0b1010 0o777");
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[0].value, LiteralValue::Int(42));
        assert_eq!(tokens[1].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[1].value, LiteralValue::Int(255));
        assert_eq!(tokens[2].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[2].value, LiteralValue::Int(10));
        assert_eq!(tokens[3].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[3].value, LiteralValue::Int(511));
    }

    #[test]
    fn lex_integers_with_underscores() {
        let tokens = lex("1_000_000 0xFF_FF 0b1010_1010");
        assert_eq!(tokens[0].value, LiteralValue::Int(1_000_000));
        assert_eq!(tokens[0].text, "1_000_000");
        assert_eq!(tokens[1].value, LiteralValue::Int(0xFFFF));
        assert_eq!(tokens[2].value, LiteralValue::Int(0b1010_1010));
    }

    #[test]
    fn lex_floats() {
        let tokens = lex("3.14 1.0e10 2.5e-3 1e6");
        assert_eq!(tokens[0].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[0].value, LiteralValue::Float(3.14));
        assert_eq!(tokens[1].value, LiteralValue::Float(1.0e10));
        assert_eq!(tokens[2].value, LiteralValue::Float(2.5e-3));
        assert_eq!(tokens[3].value, LiteralValue::Float(1e6));
    }

    #[test]
    fn dot_dot_is_not_a_float() {
        assert_eq!(
            lex_kinds("0..10"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::DotDot,
                TokenKind::IntLiteral,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn bad_numeric_literals() {
        let (tokens, errors) = lex_with_errors("0x");
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
        assert_eq!(errors, 1);

        let (tokens, errors) = lex_with_errors("0b2");
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
        assert_eq!(errors, 1);

        let (tokens, errors) = lex_with_errors("1e+");
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
        assert_eq!(errors, 1);
    }

    #[test]
    fn lex_strings() {
        let tokens = lex(r#""hello" "with \"escape\"" """#);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text, "hello");
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].text, r#"with \"escape\""#);
        assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[2].text, "");
    }

    #[test]
    fn unterminated_string() {
        let (tokens, errors) = lex_with_errors("\"abc");
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
        assert_eq!(errors, 1);

        let (tokens, errors) = lex_with_errors("\"abc\ndef\"");
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
        assert!(errors >= 1);
    }

    #[test]
    fn lex_char_literals() {
        let tokens = lex(r"'a' '\n' 'Z'");
        assert_eq!(tokens[0].kind, TokenKind::CharLiteral);
        assert_eq!(tokens[0].text, "'a'");
        assert_eq!(tokens[1].kind, TokenKind::CharLiteral);
        assert_eq!(tokens[1].text, r"'\n'");
        assert_eq!(tokens[2].kind, TokenKind::CharLiteral);
    }

    #[test]
    fn lifetime_vs_char_literal() {
        // 'a followed by a non-quote is a lifetime marker
        let tokens = lex("'a T");
        assert_eq!(tokens[0].kind, TokenKind::Apostrophe);
        assert_eq!(tokens[0].text, "'a");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);

        // 'a' is a char literal
        let tokens = lex("'a'");
        assert_eq!(tokens[0].kind, TokenKind::CharLiteral);

        // Longer lifetime names
        let tokens = lex("'static");
        assert_eq!(tokens[0].kind, TokenKind::Apostrophe);
        assert_eq!(tokens[0].text, "'static");
    }

    #[test]
    fn lex_annotations() {
        assert_eq!(
            lex_kinds("@doc @deprecated @test"),
            vec![
                TokenKind::KwDoc,
                TokenKind::KwDeprecated,
                TokenKind::KwTest,
                TokenKind::Eof
            ]
        );

        // Unknown annotations split into @ + identifier
        assert_eq!(
            lex_kinds("@custom"),
            vec![TokenKind::At, TokenKind::Identifier, TokenKind::Eof]
        );
        let tokens = lex("@custom");
        assert_eq!(tokens[0].text, "@");
        assert_eq!(tokens[1].text, "custom");
    }

    #[test]
    fn lex_operators() {
        assert_eq!(
            lex_kinds("+ - * / % = == != < <= > >= & | ^ ~ << >>"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Ampersand,
                TokenKind::Pipe,
                TokenKind::Caret,
                TokenKind::Tilde,
                TokenKind::ShiftLeft,
                TokenKind::ShiftRight,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lex_compound_assignment() {
        assert_eq!(
            lex_kinds("+= -= *= /= %= &= |= ^="),
            vec![
                TokenKind::PlusEqual,
                TokenKind::MinusEqual,
                TokenKind::StarEqual,
                TokenKind::SlashEqual,
                TokenKind::PercentEqual,
                TokenKind::AmpersandEqual,
                TokenKind::PipeEqual,
                TokenKind::CaretEqual,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lex_punctuation() {
        assert_eq!(
            lex_kinds("( ) [ ] { } , ; : :: . .. ... -> => @ # #! ?"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Colon,
                TokenKind::ColonColon,
                TokenKind::Dot,
                TokenKind::DotDot,
                TokenKind::DotDotDot,
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::At,
                TokenKind::Hash,
                TokenKind::HashBang,
                TokenKind::Question,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lone_bang_is_an_error() {
        let (tokens, errors) = lex_with_errors("!");
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
        assert_eq!(errors, 1);

        let (tokens, errors) = lex_with_errors("a != b");
        assert_eq!(tokens[1].kind, TokenKind::BangEqual);
        assert_eq!(errors, 0);
    }

    #[test]
    fn lex_comments() {
        assert_eq!(
            lex_kinds("foo // comment\nbar"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
        );
        assert_eq!(
            lex_kinds("foo /* block */ bar"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn block_comments_nest() {
        assert_eq!(
            lex_kinds("a /* outer /* inner */ still outer */ b"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_block_comment() {
        let (tokens, errors) = lex_with_errors("a /* never closed");
        assert_eq!(errors, 1);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn statement_token_sequence() {
        assert_eq!(
            lex_kinds("let mut x: Int32 = 1 + 2 * 3;"),
            vec![
                TokenKind::KwLet,
                TokenKind::KwMut,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::IntLiteral,
                TokenKind::Plus,
                TokenKind::IntLiteral,
                TokenKind::Star,
                TokenKind::IntLiteral,
                TokenKind::Semicolon,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn line_and_column_tracking() {
        let tokens = lex("let x\n  = 1");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1)); // let
        assert_eq!((tokens[1].line, tokens[1].column), (1, 5)); // x
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3)); // =
        assert_eq!((tokens[3].line, tokens[3].column), (2, 5)); // 1
    }

    #[test]
    fn spans_slice_back_into_source() {
        let source = "func add(a: Int32) -> Int32 { return a; }";
        for token in lex(source) {
            if token.kind == TokenKind::Eof {
                continue;
            }
            if token.kind == TokenKind::StringLiteral {
                continue; // text excludes the quotes
            }
            assert_eq!(&source[token.span.as_range()], token.text);
        }
    }

    #[test]
    fn peek_is_idempotent() {
        let mut diag = DiagnosticEngine::silent();
        let mut lexer = Lexer::new("let x = 1;", "test.vsp");

        let p1 = lexer.peek_token(&mut diag);
        let p2 = lexer.peek_token(&mut diag);
        assert_eq!(p1, p2);

        let next = lexer.next_token(&mut diag);
        assert_eq!(next, p1);
        assert_eq!(next.kind, TokenKind::KwLet);
    }

    #[test]
    fn save_restore_is_identity() {
        let mut diag = DiagnosticEngine::silent();
        let mut lexer = Lexer::new("foo bar baz qux", "test.vsp");

        lexer.next_token(&mut diag); // foo
        let state = lexer.save_state();

        let bar = lexer.next_token(&mut diag);
        let baz = lexer.next_token(&mut diag);
        assert_eq!(bar.text, "bar");
        assert_eq!(baz.text, "baz");

        lexer.restore_state(&state);
        assert_eq!(lexer.next_token(&mut diag).text, "bar");
        assert_eq!(lexer.next_token(&mut diag).text, "baz");
    }

    #[test]
    fn save_restore_preserves_peek_cache() {
        let mut diag = DiagnosticEngine::silent();
        let mut lexer = Lexer::new("a b c", "test.vsp");

        let peeked = lexer.peek_token(&mut diag);
        let state = lexer.save_state();
        lexer.next_token(&mut diag);
        lexer.next_token(&mut diag);

        lexer.restore_state(&state);
        assert_eq!(lexer.next_token(&mut diag), peeked);
    }

    #[test]
    fn stream_always_ends_with_eof() {
        for source in ["", "   ", "func", "\"unterminated", "/* open", "!@#$"] {
            let mut diag = DiagnosticEngine::silent();
            let tokens = Lexer::new(source, "test.vsp").lex_all(&mut diag);
            assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof, "source: {source:?}");
        }
    }

    #[test]
    fn error_recovery_continues() {
        let (tokens, errors) = lex_with_errors("let $ x = 5;");
        assert!(errors >= 1);
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::KwLet));
        assert!(kinds.contains(&TokenKind::Invalid));
        assert!(kinds.contains(&TokenKind::Identifier));
        assert!(kinds.contains(&TokenKind::Equal));
        assert!(kinds.contains(&TokenKind::IntLiteral));
    }
}
