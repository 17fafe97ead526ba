//! Hand-written char-by-char scanner (§3a), grounded in the original `token.cpp`: no regex, no
//! generated state machine, just a `Peekable<Chars>` and a big `match`.
//!
//! `Token` carries `kind`/`line`/`col` and no separate raw `text` field: every `TokenKind` that
//! would need the source text already owns it (`Identifier(String)`, `Int(i64)`, `Str(String)`,
//! ...), so a second copy of the same bytes would just be redundant.

use crate::token::{keyword, Token, TokenKind};
use roo_diagnostics::{ErrorKind, ErrorState, Location};
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    file: Option<&'static str>,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: Option<&'static str>) -> Self {
        Self {
            chars: source.chars().peekable(),
            file,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(mut self, errors: &mut ErrorState) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token(errors);
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }

    fn loc(&self) -> Location {
        match self.file {
            Some(file) => Location::new(file, self.line, self.col),
            None => Location {
                file: None,
                line: self.line,
                col: self.col,
            },
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        match c {
            Some('\n') => {
                self.line += 1;
                self.col = 1;
            }
            Some(_) => self.col += 1,
            None => {}
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next_token(&mut self, errors: &mut ErrorState) -> Token {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.bump();
                }
                Some('\n') => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    return Token::new(TokenKind::Line, line, col);
                }
                Some('/') => {
                    // Peek ahead without consuming unless it's actually a comment.
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'/') {
                        while let Some(c) = self.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.bump();
                        }
                        continue;
                    }
                    break;
                }
                _ => break,
            }
        }

        let (line, col) = (self.line, self.col);
        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, line, col);
        };

        if c.is_ascii_alphabetic() || c == '_' {
            return self.lex_identifier(line, col);
        }
        if c.is_ascii_digit() {
            return self.lex_number(line, col);
        }
        if c == '"' {
            return self.lex_string(line, col, errors);
        }

        self.bump();
        let kind = match c {
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '*' => TokenKind::Star,
            '&' => TokenKind::Amp,
            '#' => {
                if self.peek() == Some('[') {
                    self.bump();
                    TokenKind::AttrOpen
                } else {
                    TokenKind::Hash
                }
            }
            '+' => {
                if self.peek() == Some('+') {
                    self.bump();
                    TokenKind::PlusPlus
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.peek() == Some('-') {
                    self.bump();
                    TokenKind::MinusMinus
                } else if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '/' => TokenKind::Slash,
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            other => {
                errors.raise(self.loc(), ErrorKind::UnexpectedChar(other));
                return self.next_token(errors);
            }
        };

        Token::new(kind, line, col)
    }

    fn lex_identifier(&mut self, line: u32, col: u32) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = keyword(&text).unwrap_or(TokenKind::Identifier(text));
        Token::new(kind, line, col)
    }

    fn lex_number(&mut self, line: u32, col: u32) -> Token {
        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' && !is_float {
                is_float = true;
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let kind = if is_float {
            TokenKind::Float(text.parse().unwrap_or(0.0))
        } else {
            TokenKind::Int(text.parse().unwrap_or(0))
        };
        Token::new(kind, line, col)
    }

    fn lex_string(&mut self, line: u32, col: u32, errors: &mut ErrorState) -> Token {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some(other) => {
                        errors.raise(self.loc(), ErrorKind::IllegalEscapeSequence(other));
                    }
                    None => {
                        errors.raise(self.loc(), ErrorKind::UnterminatedString);
                        break;
                    }
                },
                Some(c) => text.push(c),
                None => {
                    errors.raise(self.loc(), ErrorKind::UnterminatedString);
                    break;
                }
            }
        }
        Token::new(TokenKind::Str(text), line, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut errors = ErrorState::new();
        Lexer::new(src, None)
            .tokenize(&mut errors)
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_a_function_signature() {
        let ks = kinds("fn add(a: int, b: int) -> int {");
        assert_eq!(
            ks,
            vec![
                TokenKind::KwFn,
                TokenKind::Identifier("add".into()),
                TokenKind::LParen,
                TokenKind::Identifier("a".into()),
                TokenKind::Colon,
                TokenKind::Identifier("int".into()),
                TokenKind::Comma,
                TokenKind::Identifier("b".into()),
                TokenKind::Colon,
                TokenKind::Identifier("int".into()),
                TokenKind::RParen,
                TokenKind::Arrow,
                TokenKind::Identifier("int".into()),
                TokenKind::LBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_numbers_and_comparison_operators() {
        assert_eq!(
            kinds("3 >= 2.5"),
            vec![
                TokenKind::Int(3),
                TokenKind::Ge,
                TokenKind::Float(2.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(
            kinds("1 // this is ignored\n2"),
            vec![TokenKind::Int(1), TokenKind::Line, TokenKind::Int(2), TokenKind::Eof],
        );
    }

    #[test]
    fn recognizes_attribute_open() {
        assert_eq!(kinds("#[Entry]"), vec![
            TokenKind::AttrOpen,
            TokenKind::Identifier("Entry".into()),
            TokenKind::RBracket,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn unterminated_string_raises_error() {
        let mut errors = ErrorState::new();
        Lexer::new("\"abc", None).tokenize(&mut errors);
        assert!(errors.has_errored());
    }
}
