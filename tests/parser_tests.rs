use treepath::{ParseError, compile};

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_precedence_dump() {
    let expr = compile("1 + 2 * 3").unwrap();
    assert_eq!(
        format!("{:?}", expr),
        "+ [ Integer 1, * [ Integer 2, Integer 3 ] ]"
    );
}

#[test]
fn test_path_dump() {
    let expr = compile("a/b").unwrap();
    assert_eq!(format!("{:?}", expr), "Path [ Step a, Step b ]");
}

#[test]
fn test_predicate_dump() {
    let expr = compile("item[2]").unwrap();
    assert_eq!(
        format!("{:?}", expr),
        "Path [ Predicate [ Step item, Integer 2 ] ]"
    );
}

#[test]
fn test_precedence() {
    assert_eq!(compile("1 + 2 * 3").unwrap().as_int(), 7);
    assert_eq!(compile("(1 + 2) * 3").unwrap().as_int(), 9);
}

#[test]
fn test_signed_literals() {
    assert_eq!(compile("-4").unwrap().as_int(), -4);
    assert_eq!(compile("+4").unwrap().as_int(), 4);
    assert_eq!(compile("-2.5").unwrap().as_float(), -2.5);
    assert_eq!(compile("1 - -2").unwrap().as_int(), 3);
}

#[test]
fn test_string_literals() {
    assert_eq!(compile("'hello'").unwrap().as_string(), "hello");
    assert_eq!(compile("\"it's\"").unwrap().as_string(), "it's");
}

#[test]
fn test_empty_predicate_is_tolerated() {
    assert!(compile("item[]").is_ok());
}

#[test]
fn test_single_comparison_then_junk_is_ignored() {
    // A statement carries one comparison; the rest of the input is dropped.
    let expr = compile("1 = 1 = 2").unwrap();
    assert!(expr.as_bool());
    assert_eq!(compile("1 2").unwrap().as_int(), 1);
}

#[test]
fn test_hyphenated_function_names() {
    assert!(compile("substring-before('a-b', '-')").is_ok());
    assert!(compile("hours-from-time('10:00')").is_ok());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_empty_input() {
    assert_eq!(compile("").err(), Some(ParseError::Empty));
    assert_eq!(compile("   ").err(), Some(ParseError::Empty));
}

#[test]
fn test_unterminated_string() {
    assert!(matches!(compile("'abc"), Err(ParseError::Syntax { .. })));
}

#[test]
fn test_unterminated_paren() {
    assert!(matches!(compile("(1 + 2"), Err(ParseError::Syntax { .. })));
}

#[test]
fn test_unterminated_predicate() {
    assert!(matches!(compile("a["), Err(ParseError::Syntax { .. })));
    assert!(matches!(compile("a[1"), Err(ParseError::Syntax { .. })));
}

#[test]
fn test_dangling_operator() {
    assert!(matches!(compile("1 +"), Err(ParseError::Syntax { .. })));
    assert!(matches!(compile("1 <"), Err(ParseError::Syntax { .. })));
    assert!(matches!(compile("2 *"), Err(ParseError::Syntax { .. })));
}

#[test]
fn test_bang_requires_equals() {
    assert!(matches!(compile("1 ! 2"), Err(ParseError::Syntax { .. })));
    assert!(compile("1 != 2").is_ok());
}

#[test]
fn test_unknown_function() {
    assert_eq!(
        compile("foo(1)").err(),
        Some(ParseError::UnknownFunction("foo".to_string()))
    );
}

#[test]
fn test_attribute_step_needs_name() {
    assert!(matches!(compile("a/@"), Err(ParseError::Syntax { .. })));
}

#[test]
fn test_unterminated_function_call() {
    assert!(matches!(
        compile("concat('a', 'b'"),
        Err(ParseError::Syntax { .. })
    ));
}

#[test]
fn test_error_reports_offset() {
    match compile("1 + + '") {
        Err(ParseError::Syntax { offset, .. }) => assert!(offset > 0),
        other => panic!("expected syntax error, got {:?}", other),
    }
}
