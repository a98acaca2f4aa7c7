//! Tokenizer for the notebook's imperative language.
//!
//! Blocks are delimited by Python-style significant indentation: a line's
//! leading whitespace is compared against an indentation stack, emitting
//! `Indent`/`Dedent` tokens on increase/decrease. Newlines inside `(` `[` `)`
//! `]` are suppressed, matching the source language's own continuation rule.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    // keywords are recognized by the parser from Name, except these which
    // never double as identifiers because the builtin grammar reserves them
    Newline,
    Indent,
    Dedent,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug)]
pub struct LexError(pub String);

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut depth: i32 = 0; // bracket nesting depth
    let mut at_line_start = true;
    let mut pending_blank_or_comment;

    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let n = chars.len();

    while i < n {
        if at_line_start && depth == 0 {
            // measure indentation
            let line_start = i;
            let mut col = 0usize;
            while i < n && (chars[i] == ' ' || chars[i] == '\t') {
                col += if chars[i] == '\t' { 8 } else { 1 };
                i += 1;
            }
            pending_blank_or_comment = false;
            if i >= n || chars[i] == '\n' || chars[i] == '#' {
                pending_blank_or_comment = true;
            }
            if !pending_blank_or_comment {
                let current = *indents.last().unwrap();
                if col > current {
                    indents.push(col);
                    tokens.push(Token::Indent);
                } else {
                    while col < *indents.last().unwrap() {
                        indents.pop();
                        tokens.push(Token::Dedent);
                    }
                    if col != *indents.last().unwrap() {
                        return Err(LexError("inconsistent indentation".into()));
                    }
                }
            }
            at_line_start = false;
            i = line_start + (i - line_start); // no-op, keep position
            continue;
        }

        let c = chars[i];
        if c == '#' {
            while i < n && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '\n' {
            i += 1;
            if depth == 0 {
                // only emit Newline if the previous token isn't already a
                // structural token (avoid blank-line spam)
                if !matches!(tokens.last(), Some(Token::Newline) | None | Some(Token::Indent) | Some(Token::Dedent)) {
                    tokens.push(Token::Newline);
                }
                at_line_start = true;
            }
            continue;
        }
        if c == ' ' || c == '\t' || c == '\r' {
            i += 1;
            continue;
        }
        if c == '\\' && i + 1 < n && chars[i + 1] == '\n' {
            i += 2;
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && i + 1 < n && chars[i + 1].is_ascii_digit()) {
            let start = i;
            let mut is_float = false;
            while i < n && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i < n && chars[i] == '.' {
                is_float = true;
                i += 1;
                while i < n && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            if is_float {
                tokens.push(Token::Float(text.parse().map_err(|_| LexError(format!("bad float literal '{text}'")))?));
            } else {
                tokens.push(Token::Int(text.parse().map_err(|_| LexError(format!("bad int literal '{text}'")))?));
            }
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let mut s = String::new();
            while i < n && chars[i] != quote {
                if chars[i] == '\\' && i + 1 < n {
                    i += 1;
                    match chars[i] {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        '\\' => s.push('\\'),
                        '\'' => s.push('\''),
                        '"' => s.push('"'),
                        other => s.push(other),
                    }
                    i += 1;
                } else {
                    s.push(chars[i]);
                    i += 1;
                }
            }
            if i >= n {
                return Err(LexError("unterminated string literal".into()));
            }
            i += 1; // closing quote
            tokens.push(Token::Str(s));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < n && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Token::Name(text));
            continue;
        }

        macro_rules! two {
            ($second:expr, $double:expr, $single:expr) => {{
                if i + 1 < n && chars[i + 1] == $second {
                    i += 2;
                    $double
                } else {
                    i += 1;
                    $single
                }
            }};
        }

        let tok = match c {
            '+' => two!('=', Token::PlusEq, Token::Plus),
            '-' => two!('=', Token::MinusEq, Token::Minus),
            '*' => two!('=', Token::StarEq, Token::Star),
            '/' => two!('=', Token::SlashEq, Token::Slash),
            '%' => {
                i += 1;
                Token::Percent
            }
            '=' => two!('=', Token::EqEq, Token::Eq),
            '!' => {
                if i + 1 < n && chars[i + 1] == '=' {
                    i += 2;
                    Token::NotEq
                } else {
                    return Err(LexError("unexpected '!'".into()));
                }
            }
            '<' => two!('=', Token::LtEq, Token::Lt),
            '>' => two!('=', Token::GtEq, Token::Gt),
            '(' => {
                depth += 1;
                i += 1;
                Token::LParen
            }
            ')' => {
                depth -= 1;
                i += 1;
                Token::RParen
            }
            '[' => {
                depth += 1;
                i += 1;
                Token::LBracket
            }
            ']' => {
                depth -= 1;
                i += 1;
                Token::RBracket
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            ':' => {
                i += 1;
                Token::Colon
            }
            '.' => {
                i += 1;
                Token::Dot
            }
            other => return Err(LexError(format!("unexpected character '{other}'"))),
        };
        tokens.push(tok);
    }

    if !matches!(tokens.last(), Some(Token::Newline) | None) {
        tokens.push(Token::Newline);
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token::Dedent);
    }
    tokens.push(Token::Eof);
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_assignment() {
        let toks = tokenize("x = 1\n").unwrap();
        assert_eq!(toks[0], Token::Name("x".into()));
        assert_eq!(toks[1], Token::Eq);
        assert_eq!(toks[2], Token::Int(1));
    }

    #[test]
    fn indentation_produces_indent_and_dedent() {
        let src = "if x:\n    y = 1\nz = 2\n";
        let toks = tokenize(src).unwrap();
        assert!(toks.contains(&Token::Indent));
        assert!(toks.contains(&Token::Dedent));
    }

    #[test]
    fn string_escapes_are_decoded() {
        let toks = tokenize("\"a\\nb\"\n").unwrap();
        assert_eq!(toks[0], Token::Str("a\nb".into()));
    }
}
