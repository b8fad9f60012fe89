//! Token records for the simplification core.
//!
//! A token is an atomic lexeme with its text, a classification tag, a source
//! location, type-modifier flags and an optional paired-bracket link. Tokens
//! live in a [`TokenStream`](crate::stream::TokenStream) arena and are
//! addressed by [`TokenId`].

use std::fmt;

use strum_macros::{Display, IntoStaticStr};

/// Stable identifier of a token inside its stream arena.
///
/// Ids survive arbitrary splicing around them; an id becomes invalid only
/// when its own token is erased (and may later be recycled for a new token).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct TokenId(pub u32);

impl TokenId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification tag of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TokenKind {
    /// User identifier.
    Identifier,
    /// Reserved word (`template`, `class`, `int`, ...).
    Keyword,
    /// Numeric literal, integer or floating.
    Number,
    /// Character literal including the quotes.
    CharLit,
    /// String literal including the quotes.
    StrLit,
    /// Operator (`+`, `<<`, `==`, ...).
    Op,
    /// Punctuator (brackets, `;`, `,`, `::`, ...).
    Punct,
}

const KEYWORDS: &[&str] = &[
    "auto", "bool", "break", "case", "catch", "char", "class", "const",
    "continue", "default", "delete", "do", "double", "else", "enum",
    "explicit", "extern", "float", "for", "friend", "goto", "if", "inline",
    "int", "long", "mutable", "namespace", "new", "operator", "private",
    "protected", "public", "register", "return", "short", "signed", "sizeof",
    "static", "struct", "switch", "template", "this", "throw", "try",
    "typedef", "typename", "union", "unsigned", "using", "virtual", "void",
    "volatile", "wchar_t", "while",
];

const ASSIGNMENT_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=",
];

const COMPARISON_OPS: &[&str] = &["==", "!=", "<", ">", "<=", ">="];

const CONST_OPS: &[&str] = &[
    "+", "-", "*", "/", "%", "==", "!=", "<", ">", "<=", ">=", "&&", "||",
    "!", "&", "|", "^", "~", "<<", ">>",
];

const STANDARD_TYPES: &[&str] = &[
    "bool", "char", "short", "int", "long", "float", "double", "size_t",
    "wchar_t",
];

/// One lexeme with metadata.
#[derive(Debug, Clone)]
pub struct Token {
    text: String,
    kind: TokenKind,
    /// Index of the source file the token came from.
    pub file_index: u32,
    /// 1-based source line.
    pub line: u32,
    /// The token folded an `unsigned` modifier into itself.
    pub is_unsigned: bool,
    /// The token folded a `signed` modifier into itself.
    pub is_signed: bool,
    /// The token folded a second `long` into itself (`long long`).
    pub is_long: bool,
    /// Variable number assigned by the symbol table, 0 when unassigned.
    pub var_id: u32,
    /// Paired-bracket link to the matching opener/closer.
    pub link: Option<TokenId>,
}

impl Token {
    /// Create a token, classifying it from its text.
    pub fn new(text: impl Into<String>, file_index: u32, line: u32) -> Self {
        let text = text.into();
        let kind = classify(&text);
        Token {
            text,
            kind,
            file_index,
            line,
            is_unsigned: false,
            is_signed: false,
            is_long: false,
            var_id: 0,
            link: None,
        }
    }

    /// Clone for insertion at another stream position: keeps text, kind and
    /// modifier flags but drops the bracket link and takes a new location.
    pub fn clone_at(&self, file_index: u32, line: u32) -> Self {
        Token {
            text: self.text.clone(),
            kind: self.kind,
            file_index,
            line,
            is_unsigned: self.is_unsigned,
            is_signed: self.is_signed,
            is_long: self.is_long,
            var_id: 0,
            link: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Replace the text, reclassifying the token.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.kind = classify(&self.text);
    }

    /// Identifier or keyword.
    pub fn is_name(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier | TokenKind::Keyword)
    }

    pub fn is_number(&self) -> bool {
        self.kind == TokenKind::Number
    }

    pub fn is_char_lit(&self) -> bool {
        self.kind == TokenKind::CharLit
    }

    pub fn is_assignment_op(&self) -> bool {
        self.kind == TokenKind::Op && ASSIGNMENT_OPS.contains(&self.text.as_str())
    }

    pub fn is_comparison_op(&self) -> bool {
        self.kind == TokenKind::Op && COMPARISON_OPS.contains(&self.text.as_str())
    }

    /// Operator that leaves its operands unchanged (anything arithmetic,
    /// bitwise, logical or relational; assignment excluded).
    pub fn is_const_op(&self) -> bool {
        self.kind == TokenKind::Op && CONST_OPS.contains(&self.text.as_str())
    }

    /// `bool`, `char`, `int` and the other built-in type words.
    pub fn is_standard_type(&self) -> bool {
        STANDARD_TYPES.contains(&self.text.as_str())
    }
}

fn classify(text: &str) -> TokenKind {
    let bytes = text.as_bytes();
    match bytes.first() {
        None => TokenKind::Punct,
        Some(b) if b.is_ascii_digit() => TokenKind::Number,
        Some(b'\'') => TokenKind::CharLit,
        Some(b'"') => TokenKind::StrLit,
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {
            if KEYWORDS.contains(&text) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            }
        }
        Some(b'.') if bytes.len() > 1 && bytes[1].is_ascii_digit() => TokenKind::Number,
        _ => {
            if CONST_OPS.contains(&text) || ASSIGNMENT_OPS.contains(&text) || text == "?" {
                TokenKind::Op
            } else {
                TokenKind::Punct
            }
        }
    }
}
