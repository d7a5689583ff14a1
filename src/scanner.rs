//! Byte-cursor lexer (spec.md §4.1).
//!
//! There is no separate tokenization pass: [`next_token`] is called
//! on-demand by the expression/statement evaluator with the current cursor
//! position, producing one token plus the advanced cursor, matching the
//! source's one-ahead lookahead design (spec.md §2). Tokens borrow directly
//! from the source `&str` (spec.md §4.1: "Tokens carry absolute pointers
//! into the source buffer; the buffer must outlive the tokens" — the
//! idiomatic Rust equivalent of a raw pointer-into-buffer is a borrowed
//! slice tied to the source's lifetime).
//!
//! Per the Design Note "Late binding at scan time", identifier
//! classification consults the live [`Namespaces`] (and the constants
//! table); this is why `next_token` takes `&Namespaces` even though
//! scanning is otherwise pure.

use crate::namespace::Namespaces;
use crate::status::Status;
use crate::token::{GroupKind, Keyword, NumericLiteral, Op, Token, TokenKind};

/// Scans one token starting at byte offset `pos`, returning the token and
/// the offset just past it.
pub fn next_token<'a>(src: &'a str, mut pos: usize, ns: &Namespaces) -> (usize, Token<'a>) {
    let bytes = src.as_bytes();

    loop {
        while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t' || bytes[pos] == b'\r') {
            pos += 1;
        }
        if pos < bytes.len() && bytes[pos] == b'#' {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }
        break;
    }

    if pos >= bytes.len() {
        return (pos, Token::new(TokenKind::End, ""));
    }

    let c = bytes[pos];

    if c == b'\n' || c == b';' {
        let start = pos;
        pos += 1;
        return (pos, Token::new(TokenKind::Separator, &src[start..pos]));
    }
    if c == b',' {
        let start = pos;
        pos += 1;
        return (pos, Token::new(TokenKind::ArgSeparator, &src[start..pos]));
    }
    if c.is_ascii_digit() {
        return scan_number(src, pos);
    }
    if c == b'_' || c.is_ascii_alphabetic() {
        return scan_identifier(src, pos, ns);
    }
    if c == b'"' {
        return scan_double_quotes(src, pos);
    }
    if c == b'\'' {
        return scan_single_quotes(src, pos);
    }
    if c == b'(' {
        return scan_group(src, pos, b'(', b')', GroupKind::Paren);
    }
    if c == b'[' {
        return scan_group(src, pos, b'[', b']', GroupKind::Bracket);
    }
    if c == b'{' {
        return scan_group(src, pos, b'{', b'}', GroupKind::Brace);
    }
    if c == b')' || c == b']' || c == b'}' {
        let start = pos;
        pos += 1;
        return (
            pos,
            Token::new(TokenKind::CloseUnbalanced(c as char), &src[start..pos]).with_status(Status::UnclosedExpression),
        );
    }
    if let Some((op, len)) = Op::scan(&src[pos..]) {
        let start = pos;
        pos += len;
        return (pos, Token::new(TokenKind::Operator(op), &src[start..pos]));
    }

    // Unrecognized byte: consume it as a single-byte unexpected token.
    let start = pos;
    pos += 1;
    (pos, Token::new(TokenKind::UnboundIdent(&src[start..pos]), &src[start..pos]).with_status(Status::UnexpectedToken))
}

fn has_nonzero_digit(text: &str) -> bool {
    text.bytes().any(|b| b.is_ascii_digit() && b != b'0')
}

fn scan_number<'a>(src: &'a str, start: usize) -> (usize, Token<'a>) {
    let bytes = src.as_bytes();
    let mut i = start;

    if bytes.get(i) == Some(&b'0') && matches!(bytes.get(i + 1), Some(b'x') | Some(b'X')) {
        i += 2;
        let hex_start = i;
        while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
            i += 1;
        }
        let text = &src[start..i];
        return match i64::from_str_radix(&src[hex_start..i], 16) {
            Ok(v) => (i, Token::new(TokenKind::Number(NumericLiteral::Int(v)), text)),
            Err(_) => (i, Token::new(TokenKind::Number(NumericLiteral::Int(0)), text).with_status(Status::OutOfRange)),
        };
    }

    let mut is_real = false;
    let mut last_was_exp = false;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => {
                last_was_exp = false;
                i += 1;
            }
            b'.' => {
                is_real = true;
                last_was_exp = false;
                i += 1;
            }
            b'e' | b'E' => {
                is_real = true;
                last_was_exp = true;
                i += 1;
            }
            b'+' | b'-' if last_was_exp => {
                last_was_exp = false;
                i += 1;
            }
            _ => break,
        }
    }
    let text = &src[start..i];

    if is_real {
        match text.parse::<f64>() {
            Ok(v) if v.is_infinite() => {
                (i, Token::new(TokenKind::Number(NumericLiteral::Real(0.0)), text).with_status(Status::Overflow))
            }
            Ok(v) if v == 0.0 && has_nonzero_digit(text) => {
                (i, Token::new(TokenKind::Number(NumericLiteral::Real(0.0)), text).with_status(Status::Underflow))
            }
            Ok(v) => (i, Token::new(TokenKind::Number(NumericLiteral::Real(v)), text)),
            Err(_) => {
                (i, Token::new(TokenKind::Number(NumericLiteral::Real(0.0)), text).with_status(Status::OutOfRange))
            }
        }
    } else if text.len() > 1 && text.starts_with('0') {
        match i64::from_str_radix(&text[1..], 8) {
            Ok(v) => (i, Token::new(TokenKind::Number(NumericLiteral::Int(v)), text)),
            Err(_) => (i, Token::new(TokenKind::Number(NumericLiteral::Int(0)), text).with_status(Status::OutOfRange)),
        }
    } else {
        match text.parse::<i64>() {
            Ok(v) => (i, Token::new(TokenKind::Number(NumericLiteral::Int(v)), text)),
            Err(_) => (i, Token::new(TokenKind::Number(NumericLiteral::Int(0)), text).with_status(Status::OutOfRange)),
        }
    }
}

/// Classifies an identifier at scan time (spec.md §4.1, Design Note "Late
/// binding at scan time"): keyword, else bound-variable-or-constant, else
/// bound-function, else unbound.
fn scan_identifier<'a>(src: &'a str, start: usize, ns: &Namespaces) -> (usize, Token<'a>) {
    let bytes = src.as_bytes();
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'_' || b == b'.' || b.is_ascii_alphanumeric() {
            i += 1;
        } else {
            break;
        }
    }
    let text = &src[start..i];

    if let Some(kw) = Keyword::from_str(text) {
        return (i, Token::new(TokenKind::Keyword(kw), text));
    }
    if ns.is_bound_variable(text) {
        return (i, Token::new(TokenKind::Variable(text), text));
    }
    if ns.is_bound_function(text) {
        return (i, Token::new(TokenKind::FunctionName(text), text));
    }
    (i, Token::new(TokenKind::UnboundIdent(text), text))
}

fn scan_double_quotes<'a>(src: &'a str, start: usize) -> (usize, Token<'a>) {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    let inner_start = i;
    loop {
        if i >= bytes.len() {
            return (
                i,
                Token::new(TokenKind::StringLit(&src[inner_start..i]), &src[start..i])
                    .with_status(Status::UnterminatedString),
            );
        }
        match bytes[i] {
            b'"' => {
                let inner_end = i;
                i += 1;
                return (i, Token::new(TokenKind::StringLit(&src[inner_start..inner_end]), &src[start..i]));
            }
            b'\\' if i + 1 < bytes.len() => i += 2,
            _ => i += 1,
        }
    }
}

fn scan_single_quotes<'a>(src: &'a str, start: usize) -> (usize, Token<'a>) {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    let inner_start = i;
    while i < bytes.len() && bytes[i] != b'\'' {
        i += 1;
    }
    if i >= bytes.len() {
        return (
            i,
            Token::new(TokenKind::ScriptLit(&src[inner_start..i]), &src[start..i])
                .with_status(Status::UnterminatedString),
        );
    }
    let inner_end = i;
    i += 1;
    (i, Token::new(TokenKind::ScriptLit(&src[inner_start..inner_end]), &src[start..i]))
}

/// Balanced scan over a bracketed group, skipping quoted regions so that
/// brackets inside string literals don't affect nesting depth (spec.md
/// §4.1).
fn scan_group<'a>(src: &'a str, start: usize, open: u8, close: u8, kind: GroupKind) -> (usize, Token<'a>) {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    let inner_start = i;
    let mut depth = 1usize;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'\'' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'\'' {
                    i += 1;
                }
                i += 1;
            }
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b if b == open => {
                depth += 1;
                i += 1;
            }
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    let inner_end = i;
                    i += 1;
                    return (i, Token::new(TokenKind::Group(kind, &src[inner_start..inner_end]), &src[start..i]));
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    (
        i,
        Token::new(TokenKind::Group(kind, &src[inner_start..i]), &src[start..i]).with_status(Status::UnclosedExpression),
    )
}

/// Splits `text` on top-level occurrences of `sep`, skipping over quoted
/// regions and nested `()`/`[]`/`{}` groups so a separator inside a literal
/// or a sub-expression doesn't split it. Used to break apart argument lists,
/// matrix-literal rows/columns, and array-literal elements (spec.md §4.3,
/// §4.4) without re-deriving the scanner's own bracket/quote skipping.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut depth = 0i32;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'\'' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'\'' {
                    i += 1;
                }
                i += 1;
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                i += 1;
            }
            b')' | b']' | b'}' => {
                depth -= 1;
                i += 1;
            }
            b if depth == 0 && b == sep => {
                parts.push(&text[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Expands backslash escapes in a double-quoted literal's raw interior text
/// (spec.md §4.1, §6): `\n \r \t \a \b \f \v \\ \' \"`. Unknown escapes keep
/// the backslash dropped and the following byte verbatim.
pub fn expand_escapes(raw: &str) -> Vec<u8> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let escaped = match bytes[i + 1] {
                b'n' => b'\n',
                b'r' => b'\r',
                b't' => b'\t',
                b'a' => 0x07,
                b'b' => 0x08,
                b'f' => 0x0c,
                b'v' => 0x0b,
                b'\\' => b'\\',
                b'\'' => b'\'',
                b'"' => b'"',
                other => other,
            };
            out.push(escaped);
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}
