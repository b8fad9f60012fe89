//! Minimal C++ lexer producing the token stream the passes operate on.
//!
//! This is not a conforming preprocessor: it tokenizes already-preprocessed
//! text. Comments are skipped, `( ) [ ] { }` are linked while scanning, and
//! `<<`/`>>` are emitted as single tokens so the angle-bracket passes see
//! the same ambiguity the real front end produces.

use std::fmt;

use crate::stream::TokenStream;
use crate::token::{Token, TokenId};

/// Tokenization failure with the offending line.
#[derive(Debug, Clone)]
pub struct LexError {
    pub line: u32,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for LexError {}

// Longest-match operator tables. Three-byte forms first.
const OPS3: &[&str] = &["<<=", ">>=", "->*", "..."];
const OPS2: &[&str] = &[
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "::", "->", "++", "--",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
];

struct Cursor<'s> {
    bytes: &'s [u8],
    pos: usize,
    line: u32,
}

impl<'s> Cursor<'s> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, off: usize) -> Option<u8> {
        self.bytes.get(self.pos + off).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError { line: self.line, message: message.into() }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_cont(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Tokenize one source file into a fresh stream.
pub fn tokenize(src: &str, file_index: u32) -> Result<TokenStream, LexError> {
    let mut stream = TokenStream::new();
    let mut cur = Cursor { bytes: src.as_bytes(), pos: 0, line: 1 };
    // open ( [ { tokens waiting for their closer
    let mut brackets: Vec<TokenId> = Vec::new();

    while let Some(b) = cur.peek() {
        // whitespace
        if b.is_ascii_whitespace() {
            cur.bump();
            continue;
        }
        // comments
        if cur.starts_with("//") {
            while let Some(c) = cur.peek() {
                if c == b'\n' {
                    break;
                }
                cur.bump();
            }
            continue;
        }
        if cur.starts_with("/*") {
            cur.bump();
            cur.bump();
            loop {
                if cur.starts_with("*/") {
                    cur.bump();
                    cur.bump();
                    break;
                }
                if cur.bump().is_none() {
                    return Err(cur.error("unterminated comment"));
                }
            }
            continue;
        }

        let line = cur.line;

        // identifiers and keywords
        if is_ident_start(b) {
            let start = cur.pos;
            while cur.peek().is_some_and(is_ident_cont) {
                cur.bump();
            }
            let text = &src[start..cur.pos];
            stream.push_back(Token::new(text, file_index, line));
            continue;
        }

        // numbers: integers, hex/octal, floats with exponent and suffixes
        if b.is_ascii_digit() || (b == b'.' && cur.peek_at(1).is_some_and(|c| c.is_ascii_digit())) {
            let start = cur.pos;
            cur.bump();
            while let Some(c) = cur.peek() {
                let is_num_part = c.is_ascii_alphanumeric() || c == b'.' || c == b'_';
                let is_exp_sign = (c == b'+' || c == b'-')
                    && matches!(cur.bytes.get(cur.pos.wrapping_sub(1)), Some(b'e') | Some(b'E'))
                    && !src[start..cur.pos].starts_with("0x")
                    && !src[start..cur.pos].starts_with("0X");
                if is_num_part || is_exp_sign {
                    cur.bump();
                } else {
                    break;
                }
            }
            stream.push_back(Token::new(&src[start..cur.pos], file_index, line));
            continue;
        }

        // character and string literals
        if b == b'\'' || b == b'"' {
            let quote = b;
            let start = cur.pos;
            cur.bump();
            loop {
                match cur.peek() {
                    Some(b'\\') => {
                        cur.bump();
                        cur.bump();
                    }
                    Some(c) if c == quote => {
                        cur.bump();
                        break;
                    }
                    Some(b'\n') | None => {
                        return Err(cur.error("unterminated literal"));
                    }
                    Some(_) => {
                        cur.bump();
                    }
                }
            }
            stream.push_back(Token::new(&src[start..cur.pos], file_index, line));
            continue;
        }

        // operators and punctuation, longest match first
        let mut text: Option<&str> = None;
        for &op in OPS3 {
            if cur.starts_with(op) {
                text = Some(op);
                break;
            }
        }
        if text.is_none() {
            for &op in OPS2 {
                if cur.starts_with(op) {
                    text = Some(op);
                    break;
                }
            }
        }
        let text = match text {
            Some(t) => {
                for _ in 0..t.len() {
                    cur.bump();
                }
                t
            }
            None => {
                cur.bump();
                &src[cur.pos - 1..cur.pos]
            }
        };

        let id = stream.push_back(Token::new(text, file_index, line));
        match text {
            "(" | "[" | "{" => brackets.push(id),
            ")" | "]" | "}" => {
                let open = brackets.pop().ok_or_else(|| {
                    cur.error(format!("unmatched '{}'", text))
                })?;
                let want = match text {
                    ")" => "(",
                    "]" => "[",
                    _ => "{",
                };
                if stream.text(open) != want {
                    return Err(cur.error(format!(
                        "mismatched '{}' closed by '{}'",
                        stream.text(open),
                        text
                    )));
                }
                stream.create_mutual_links(open, id);
            }
            _ => {}
        }
    }

    if let Some(open) = brackets.pop() {
        return Err(LexError {
            line: stream.token(open).line,
            message: format!("unclosed '{}'", stream.text(open)),
        });
    }
    Ok(stream)
}

/// Fold `unsigned` / `signed` / doubled `long` modifier words into flags on
/// the adjacent standard-type token, so the manglers see `int` with
/// `is_unsigned` instead of two tokens. A bare modifier becomes `int`.
pub fn simplify_std_types(stream: &mut TokenStream) {
    const INT_TYPES: &[&str] = &["char", "short", "int", "long"];

    let mut cur = stream.front();
    while let Some(id) = cur {
        let text = stream.text(id);
        if text == "unsigned" || text == "signed" {
            let unsigned = text == "unsigned";
            match stream.next(id) {
                Some(next) if INT_TYPES.contains(&stream.text(next)) => {
                    if unsigned {
                        stream.token_mut(next).is_unsigned = true;
                    } else {
                        stream.token_mut(next).is_signed = true;
                    }
                    cur = stream.delete_token(id);
                    continue;
                }
                _ => {
                    stream.set_text(id, "int");
                    if unsigned {
                        stream.token_mut(id).is_unsigned = true;
                    } else {
                        stream.token_mut(id).is_signed = true;
                    }
                }
            }
        } else if text == "long" && stream.text_is(id, 1, "long") {
            let second = stream.next(id).unwrap();
            let tok = stream.token(second);
            let (u, s) = (tok.is_unsigned, tok.is_signed);
            let first = stream.token_mut(id);
            first.is_long = true;
            first.is_unsigned |= u;
            first.is_signed |= s;
            stream.delete_token(second);
            continue;
        }
        cur = stream.next(id);
    }
}
