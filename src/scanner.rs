use std::iter::FusedIterator;

use log::{debug, info};
use phf::phf_map;

use crate::error::JazzError;
use crate::token::{Token, TokenType};

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::AND,
    "else" => TokenType::ELSE,
    "false" => TokenType::FALSE,
    "fn" => TokenType::FN,
    "for" => TokenType::FOR,
    "if" => TokenType::IF,
    "nil" => TokenType::NIL,
    "or" => TokenType::OR,
    "print" => TokenType::PRINT,
    "return" => TokenType::RETURN,
    "true" => TokenType::TRUE,
    "let" => TokenType::LET,
    "while" => TokenType::WHILE,
};

/// Single forward pass over the source with two characters of lookahead.
///
/// Iterating yields `Ok(Token)` and `Err(JazzError)` interleaved, so a chunk
/// with lexical errors still produces every token that scanned cleanly.  One
/// EOF token is always emitted last.
#[derive(Debug, Clone)]
pub struct Scanner {
    source: Vec<char>,
    start: usize,
    current: usize,
    line: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        info!("Initializing Scanner with {} chars", source.chars().count());
        Self {
            source: source.chars().collect(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Scans one lexeme.  `Ok(Some)` is a token kind, `Ok(None)` means the
    /// lexeme produces no token (whitespace, comments).
    fn scan_token(&mut self) -> Result<Option<TokenType>, JazzError> {
        let c: char = self.advance();
        debug!("Processing char {:?} at line {}", c, self.line);

        let token_type = match c {
            '(' => TokenType::LEFT_PAREN,

            ')' => TokenType::RIGHT_PAREN,

            '{' => TokenType::LEFT_BRACE,

            '}' => TokenType::RIGHT_BRACE,

            ',' => TokenType::COMMA,

            '.' => TokenType::DOT,

            '-' => TokenType::MINUS,

            '+' => TokenType::PLUS,

            ';' => TokenType::SEMICOLON,

            '*' => TokenType::STAR,

            '!' => {
                if self.match_char('=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                }
            }

            '=' => {
                if self.match_char('=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                }
            }

            '<' => {
                if self.match_char('=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                }
            }

            '>' => {
                if self.match_char('=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                }
            }

            ' ' | '\r' | '\t' => return Ok(None),

            '\n' => {
                self.line += 1;
                return Ok(None);
            }

            '/' => {
                if self.match_char('/') {
                    debug!("Found line comment, skipping until newline");
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                    return Ok(None);
                }

                if self.match_char('*') {
                    debug!("Found block comment, skipping until '*/'");
                    self.skip_block_comment()?;
                    return Ok(None);
                }

                TokenType::SLASH
            }

            '"' => self.scan_string()?,

            '0'..='9' => self.scan_number(),

            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),

            _ => {
                return Err(JazzError::lex(
                    self.line,
                    format!("unexpected character {}", c),
                ));
            }
        };

        Ok(Some(token_type))
    }

    /// Consumes up to and including the terminating `*/`.  Block comments do
    /// not nest.
    fn skip_block_comment(&mut self) -> Result<(), JazzError> {
        loop {
            if self.is_at_end() {
                return Err(JazzError::lex(self.line, "unterminated block comment"));
            }

            if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                return Ok(());
            }

            if self.peek() == '\n' {
                self.line += 1;
            }

            self.advance();
        }
    }

    fn scan_string(&mut self) -> Result<TokenType, JazzError> {
        while !self.is_at_end() && self.peek() != '"' {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            return Err(JazzError::lex(self.line, "unterminated string"));
        }

        self.advance();

        // The literal is the raw slice between the quotes.  Escape sequences
        // are not processed.
        let literal: String = self.source[self.start + 1..self.current - 1]
            .iter()
            .collect();

        debug!("Scanned string literal: {}", literal);

        Ok(TokenType::STRING(literal))
    }

    fn scan_number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let number: f64 = text.parse().unwrap_or(0.0);

        debug!("Scanned number: {}", number);

        TokenType::NUMBER(number)
    }

    fn scan_identifier(&mut self) -> TokenType {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();

        match KEYWORDS.get(&text) {
            Some(token_type) => {
                debug!("Scanned keyword: {}", text);

                token_type.clone()
            }

            None => {
                debug!("Scanned identifier: {}", text);

                TokenType::IDENTIFIER
            }
        }
    }

    #[inline]
    fn advance(&mut self) -> char {
        let c = self.source[self.current];

        self.current += 1;

        c
    }

    #[inline]
    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            false
        } else {
            self.current += 1;

            true
        }
    }

    #[inline]
    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    #[inline]
    fn peek_next(&self) -> char {
        if self.current + 1 >= self.len() {
            '\0'
        } else {
            self.source[self.current + 1]
        }
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        self.current >= self.len()
    }
}

impl Iterator for Scanner {
    type Item = Result<Token, JazzError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.is_at_end() {
                // Emit EOF exactly once, then fuse.
                if self.current == self.len() {
                    self.current += 1;

                    info!("Reached EOF at line {}", self.line);

                    return Some(Ok(Token::new(TokenType::EOF, String::new(), self.line)));
                }

                return None;
            }

            self.start = self.current;

            // A token is reported at the line it begins on, even when the
            // lexeme spans lines.
            let line = self.line;

            match self.scan_token() {
                Err(e) => return Some(Err(e)),

                Ok(Some(token_type)) => {
                    let lexeme: String = self.source[self.start..self.current].iter().collect();

                    debug!(
                        "Emitting token: type={:?}, lexeme={}, line={}",
                        token_type, lexeme, line
                    );

                    return Some(Ok(Token::new(token_type, lexeme, line)));
                }

                Ok(None) => continue,
            }
        }
    }
}

impl FusedIterator for Scanner {}
