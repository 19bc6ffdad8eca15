//! Integration tests for the lexer and parser
//!
//! Tests that realistic programs tokenize and parse into the expected shape.

use monkey_foundation::ErrorKind;
use monkey_language::{Expression, Lexer, Statement, TokenKind, evaluator, parse, vm};

const PROGRAM: &str = r#"
let five = 5;
let add = fn(x, y) {
    x + y;
};
let result = add(five, 10);
if (5 < 10) {
    return true;
} else {
    return false;
}
10 != 9;
[1, 2];
{"foo": "bar"}
"#;

// =============================================================================
// Lexer
// =============================================================================

#[test]
fn program_tokenizes_without_illegal_tokens() {
    let tokens = Lexer::tokenize_all(PROGRAM);
    assert!(tokens.iter().all(|t| !matches!(t.kind, TokenKind::Illegal(_))));
    assert!(matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)));
}

#[test]
fn spans_point_back_into_the_source() {
    for token in Lexer::tokenize_all(PROGRAM) {
        let text = &PROGRAM[token.span.start..token.span.end];
        match &token.kind {
            TokenKind::Ident(name) => assert_eq!(text, name),
            TokenKind::Int(digits) => assert_eq!(text, digits),
            TokenKind::String(s) => assert_eq!(text, format!("\"{s}\"")),
            _ => {}
        }
    }
}

#[test]
fn token_lines_are_one_based() {
    let tokens = Lexer::tokenize_all("let a = 1;\nlet b = 2;");
    let second_let = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Let)
        .nth(1)
        .unwrap();
    assert_eq!(second_let.span.line, 2);
    assert_eq!(second_let.span.column, 1);
}

// =============================================================================
// Parser
// =============================================================================

#[test]
fn program_parses_into_statements() {
    let program = parse(PROGRAM).unwrap();
    assert_eq!(program.statements.len(), 7);
    assert!(matches!(program.statements[0], Statement::Let { .. }));
    assert!(matches!(
        program.statements[3],
        Statement::Expression(Expression::If { .. })
    ));
    assert!(matches!(
        program.statements[6],
        Statement::Expression(Expression::Hash(..))
    ));
}

#[test]
fn let_bound_function_literals_carry_their_name() {
    let program = parse("let add = fn(x, y) { x + y };").unwrap();
    assert_eq!(program.to_string(), "let add = fn<add>(x, y) (x + y);");
}

#[test]
fn every_error_in_a_program_is_reported() {
    let error = parse("let = 1;\nlet y 2;\nlet z = 3;").unwrap_err();
    let errors = error.into_errors();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].to_string().contains("1:5"));
    assert!(errors[1].to_string().contains("2:7"));
}

#[test]
fn pathological_nesting_is_an_error_on_both_engines() {
    let parens = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
    let chain = vec!["1"; 200_000].join(" + ");
    for source in [parens, chain] {
        for error in [vm::eval(&source).unwrap_err(), evaluator::eval(&source).unwrap_err()] {
            let errors = error.into_errors();
            assert!(matches!(
                errors[0].kind,
                ErrorKind::LimitExceeded { what: "nested expressions", .. }
            ));
        }
    }
}
