//! SQL lexer
//!
//! Converts SQL strings into a stream of tokens. `--` starts a comment that
//! runs to the end of the line; strings are single-quoted with `''` as the
//! escape for an embedded quote.

use super::token::Token;
use crate::error::{Error, Result};

/// SQL tokenizer
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Tokenize the entire input, ending with `Token::Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();

        if self.is_at_end() {
            return Ok(Token::Eof);
        }

        let ch = self.current_char();
        match ch {
            '(' => {
                self.advance();
                Ok(Token::LParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RParen)
            }
            ',' => {
                self.advance();
                Ok(Token::Comma)
            }
            ';' => {
                self.advance();
                Ok(Token::Semicolon)
            }
            '*' => {
                self.advance();
                Ok(Token::Asterisk)
            }
            '=' => {
                self.advance();
                Ok(Token::Eq)
            }
            '<' => {
                self.advance();
                if !self.is_at_end() {
                    match self.current_char() {
                        '=' => {
                            self.advance();
                            return Ok(Token::Lte);
                        }
                        '>' => {
                            self.advance();
                            return Ok(Token::Neq);
                        }
                        _ => {}
                    }
                }
                Ok(Token::Lt)
            }
            '>' => {
                self.advance();
                if !self.is_at_end() && self.current_char() == '=' {
                    self.advance();
                    return Ok(Token::Gte);
                }
                Ok(Token::Gt)
            }
            '!' => {
                self.advance();
                if !self.is_at_end() && self.current_char() == '=' {
                    self.advance();
                    return Ok(Token::Neq);
                }
                Err(Error::UnexpectedCharacter('!', self.position))
            }
            '-' => {
                self.advance();
                if !self.is_at_end() && self.current_char().is_ascii_digit() {
                    return match self.read_number()? {
                        Token::IntegerLiteral(n) => Ok(Token::IntegerLiteral(-n)),
                        Token::FloatLiteral(n) => Ok(Token::FloatLiteral(-n)),
                        other => Ok(other),
                    };
                }
                Err(Error::UnexpectedCharacter('-', self.position))
            }
            '\'' => self.read_string(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_word()),
            c => Err(Error::UnexpectedCharacter(c, self.position)),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while !self.is_at_end() && self.current_char().is_whitespace() {
                self.advance();
            }
            // A `--` comment runs to the end of the line.
            if self.position + 1 < self.input.len()
                && self.input[self.position] == '-'
                && self.input[self.position + 1] == '-'
            {
                while !self.is_at_end() && self.current_char() != '\n' {
                    self.advance();
                }
                continue;
            }
            return;
        }
    }

    fn read_string(&mut self) -> Result<Token> {
        let start = self.position;
        self.advance(); // opening quote

        let mut value = String::new();
        while !self.is_at_end() {
            let ch = self.current_char();
            if ch == '\'' {
                // A doubled quote is an escaped quote.
                if self.position + 1 < self.input.len() && self.input[self.position + 1] == '\'' {
                    value.push('\'');
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance();
                return Ok(Token::StringLiteral(value));
            }
            value.push(ch);
            self.advance();
        }

        Err(Error::UnterminatedString(start))
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.position;
        let mut text = String::new();
        let mut is_float = false;

        while !self.is_at_end() {
            let ch = self.current_char();
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else if ch == '.' && !is_float {
                is_float = true;
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            text.parse::<f64>()
                .map(Token::FloatLiteral)
                .map_err(|_| Error::InvalidNumber(start))
        } else {
            text.parse::<i64>()
                .map(Token::IntegerLiteral)
                .map_err(|_| Error::InvalidNumber(start))
        }
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();
        while !self.is_at_end() {
            let ch = self.current_char();
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::keyword(&word).unwrap_or(Token::Identifier(word))
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}
