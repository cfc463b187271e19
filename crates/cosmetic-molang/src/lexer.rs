//! Tokenizer for Molang source text

use crate::error::{MolangError, Result};
use std::fmt;

/// A single lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f32),
    Ident(String),
    Dot,
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    Question,
    QuestionQuestion,
    Colon,
    Assign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {n}"),
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Dot => f.write_str("'.'"),
            Token::Comma => f.write_str("','"),
            Token::Semicolon => f.write_str("';'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Bang => f.write_str("'!'"),
            Token::Question => f.write_str("'?'"),
            Token::QuestionQuestion => f.write_str("'??'"),
            Token::Colon => f.write_str("':'"),
            Token::Assign => f.write_str("'='"),
            Token::Eq => f.write_str("'=='"),
            Token::NotEq => f.write_str("'!='"),
            Token::Lt => f.write_str("'<'"),
            Token::LtEq => f.write_str("'<='"),
            Token::Gt => f.write_str("'>'"),
            Token::GtEq => f.write_str("'>='"),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
        }
    }
}

/// A token together with the byte offset it started at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token itself
    pub token: Token,
    /// Byte offset into the source
    pub offset: usize,
}

/// Split Molang source into tokens.
///
/// Identifiers are lowercased since Molang is case-insensitive.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let literal = &source[start..i];
            // Optional float suffix, e.g. `0.5f`
            if i < bytes.len() && (bytes[i] == b'f' || bytes[i] == b'F') {
                i += 1;
            }
            let value = literal
                .parse::<f32>()
                .map_err(|_| MolangError::InvalidNumber {
                    offset: start,
                    literal: literal.to_string(),
                })?;
            tokens.push(Spanned {
                token: Token::Number(value),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(source[start..i].to_ascii_lowercase()),
                offset: start,
            });
            continue;
        }

        let next = bytes.get(i + 1).map(|b| *b as char);
        let (token, len) = match (c, next) {
            ('?', Some('?')) => (Token::QuestionQuestion, 2),
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::LtEq, 2),
            ('>', Some('=')) => (Token::GtEq, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('.', _) => (Token::Dot, 1),
            (',', _) => (Token::Comma, 1),
            (';', _) => (Token::Semicolon, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('!', _) => (Token::Bang, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            ('=', _) => (Token::Assign, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            _ => {
                return Err(MolangError::UnexpectedCharacter {
                    offset: start,
                    found: c,
                });
            }
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
        i += len;
    }

    Ok(tokens)
}
