//! Scanner behavior from spec.md §4.1: late-binding classification, number
//! literal forms, string escapes, and balanced group scanning.

use gua::namespace::Namespaces;
use gua::scanner::next_token;
use gua::token::{GroupKind, NumericLiteral, TokenKind};

#[test]
fn unbound_identifier_classifies_as_unbound_ident() {
    let ns = Namespaces::new();
    let (_, token) = next_token("frobnicate", 0, &ns);
    assert!(matches!(token.kind, TokenKind::UnboundIdent("frobnicate")));
}

#[test]
fn bound_variable_classifies_as_variable() {
    let mut ns = Namespaces::new();
    ns.set("x", gua::value::Value::Integer(1), gua::namespace::Scope::Local);
    let (_, token) = next_token("x", 0, &ns);
    assert!(matches!(token.kind, TokenKind::Variable("x")));
}

#[test]
fn hex_and_octal_integer_literals() {
    let ns = Namespaces::new();
    let (_, hex) = next_token("0x1F", 0, &ns);
    assert!(matches!(hex.kind, TokenKind::Number(NumericLiteral::Int(31))));

    let (_, octal) = next_token("017", 0, &ns);
    assert!(matches!(octal.kind, TokenKind::Number(NumericLiteral::Int(15))));
}

#[test]
fn real_literal_promotes_on_decimal_point() {
    let ns = Namespaces::new();
    let (_, token) = next_token("3.5", 0, &ns);
    match token.kind {
        TokenKind::Number(NumericLiteral::Real(r)) => assert!((r - 3.5).abs() < 1e-12),
        other => panic!("expected Real(3.5), got {other:?}"),
    }
}

#[test]
fn double_quoted_string_is_a_string_literal_token() {
    let ns = Namespaces::new();
    let (end, token) = next_token("\"hi\\n\" rest", 0, &ns);
    assert!(matches!(token.kind, TokenKind::StringLit(_)));
    assert_eq!(&"\"hi\\n\" rest"[end..], " rest");
}

#[test]
fn single_quoted_text_is_a_script_literal_token() {
    let ns = Namespaces::new();
    let (_, token) = next_token("'x = 1'", 0, &ns);
    assert!(matches!(token.kind, TokenKind::ScriptLit(_)));
}

#[test]
fn balanced_groups_yield_interior_payload() {
    let ns = Namespaces::new();
    let (end, token) = next_token("(1+2) rest", 0, &ns);
    match token.kind {
        TokenKind::Group(GroupKind::Paren, interior) => assert_eq!(interior, "1+2"),
        other => panic!("expected a Paren group, got {other:?}"),
    }
    assert_eq!(&"(1+2) rest"[end..], " rest");
}

#[test]
fn maximal_munch_prefers_two_byte_operators() {
    let ns = Namespaces::new();
    let (_, token) = next_token("==", 0, &ns);
    assert!(matches!(token.kind, TokenKind::Operator(gua::token::Op::Eq)));

    let (_, token) = next_token("=", 0, &ns);
    assert!(matches!(token.kind, TokenKind::Operator(gua::token::Op::Assign)));
}

#[test]
fn comment_runs_to_end_of_line() {
    let ns = Namespaces::new();
    let (_, token) = next_token("# a comment\n1", 0, &ns);
    assert!(matches!(token.kind, TokenKind::Number(NumericLiteral::Int(1))) || matches!(token.kind, TokenKind::Separator));
}
