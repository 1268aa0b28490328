pub mod common;

use common::*;
use regatta::{ErrorKind, Regex};

#[test]
fn test_invalid_patterns_fail_to_parse() {
    test_parse_fails("(");
    test_parse_fails(")");
    test_parse_fails("a{3,1}");
    test_parse_fails("[z-a]");
    test_parse_fails("[abc");
    test_parse_fails("\\");
    test_parse_fails("a**");
    test_parse_fails("^*");
    test_parse_fails("*a");
    test_parse_fails("(?<=a+)b");
    test_parse_fails("(?<dup>x)(?<dup>y)");
    test_parse_fails("(?<1a>x)");
    test_parse_fails(r"\2(a)");
    test_parse_fails(r"\k<missing>(?<present>a)");
    test_parse_fails("[[:alpha:]]");
    test_parse_fails("(?Pweird)");
}

#[test]
fn test_valid_odd_patterns_parse() {
    // Annex-B style oddities that stay legal.
    assert!(Regex::new("a{b").is_ok());
    assert!(Regex::new("}").is_ok());
    assert!(Regex::new("]").is_ok());
    assert!(Regex::new("[-a]").is_ok());
    assert!(Regex::new("[a-]").is_ok());
    assert!(Regex::new(r"\1(a)").is_ok());
}

#[test]
fn test_error_kinds() {
    assert_eq!(
        Regex::new("(").unwrap_err().kind,
        ErrorKind::MismatchingParen
    );
    assert_eq!(
        Regex::new("[z-a]").unwrap_err().kind,
        ErrorKind::InvalidRange
    );
    assert_eq!(
        Regex::new("a**").unwrap_err().kind,
        ErrorKind::InvalidRepetitionMarker
    );
    assert_eq!(
        Regex::new(r"\5(a)").unwrap_err().kind,
        ErrorKind::InvalidBackReference
    );
}

#[test]
fn test_error_display_points_at_the_token() {
    let err = Regex::new("ab(cd").unwrap_err();
    let rendered = format!("{}", err);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "Error during parsing of regular expression:");
    assert_eq!(lines[1], "    ab(cd");
    assert_eq!(lines[2], "      ^---- Mismatching parenthesis");

    // A caller-supplied message overrides the default text.
    assert!(err
        .error_string(Some("while compiling a user script"))
        .ends_with("^---- while compiling a user script"));
}
