use crate::parser::tests::{parse, syntax_error, tree};
use pretty_assertions::assert_eq;
use tek_diagnostic::ErrorKind;

/// The tree of `v: var = <expr>`, unwrapped down to the initializer.
fn expr(source: &str) -> String {
    let full = tree(&format!("v: var = {source}"));
    full.strip_prefix("(Mod (Decl (Var ")
        .and_then(|rest| rest.strip_suffix(")))"))
        .unwrap_or_else(|| panic!("unexpected tree {full}"))
        .to_string()
}

#[test]
fn test_precedence_and_associativity() {
    assert_eq!(expr("1 + 2 * 3"), "(Binary Literal (Binary Literal Literal))");
    assert_eq!(expr("a - b - c"), "(Binary (Binary Ident Ident) Ident)");
    assert_eq!(expr("(1 + 2) * 3"), "(Binary (Binary Literal Literal) Literal)");
    assert_eq!(
        expr("a || b && c == d"),
        "(Binary Ident (Binary Ident (Binary Ident Ident)))"
    );
    assert_eq!(expr("a << 1 | b & c"), "(Binary (Binary Ident Literal) (Binary Ident Ident))");
}

#[test]
fn test_unary_and_postfix() {
    assert_eq!(
        expr("-a.b[0](x, y)"),
        "(Unary (Call (Index (Field Ident) Literal) Ident Ident))"
    );
    assert_eq!(expr("!*p"), "(Unary (Unary Ident))");
    assert_eq!(expr("f()"), "(Call Ident)");
}

#[test]
fn test_array_literals() {
    assert_eq!(expr("[1, 2, 3,]"), "(Array Literal Literal Literal)");
    assert_eq!(expr("[]"), "Array");
}

#[test]
fn test_if_else_chain() {
    assert_eq!(
        expr("if a {} else if b {} else {}"),
        "(If Ident (IfArms Block (If Ident (IfArms Block Block))))"
    );
    assert_eq!(expr("if a {}"), "(If Ident (IfArms Block))");
}

#[test]
fn test_loop() {
    assert_eq!(expr("loop {\n break\n}"), "(Loop (Block Break))");
}

#[test]
fn test_expression_errors() {
    assert_eq!(syntax_error("v: var = ,"), (ErrorKind::GenSynExprExpected, 4));
    assert_eq!(
        syntax_error("v: var = f(a b)"),
        (ErrorKind::GenSynExprCallExpectedCloseParentheses, 7)
    );
    assert_eq!(
        syntax_error("v: var = a[1 2]"),
        (ErrorKind::GenSynExprIndexExpectedCloseBracket, 7)
    );
    assert_eq!(
        syntax_error("v: var = (1 2)"),
        (ErrorKind::GenSynExprExpectedCloseParentheses, 6)
    );
    assert_eq!(
        syntax_error("v: var = [1 2]"),
        (ErrorKind::GenSynExprArrayExpectedCloseBracket, 6)
    );
    assert_eq!(syntax_error("v: var = a.1"), (ErrorKind::GenSynExprFieldExpectedIdent, 6));
    assert_eq!(
        syntax_error("v: var = if a {} else b"),
        (ErrorKind::GenSynExprIfElseUnexpectedToken, 9)
    );
}

#[test]
fn test_deep_nesting_grows_the_stack() {
    const DEPTH: usize = 20_000;
    let source = format!("v: var = {}1{}", "(".repeat(DEPTH), ")".repeat(DEPTH));
    assert_eq!(parse(&source).result, Ok(()));
}
