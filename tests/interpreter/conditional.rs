//! Conditional tests: if / elseIf / else / endIf

use super::{error_of, log_of};

#[test]
fn test_first_true_branch_wins() {
    let log = log_of(&[
        ("if", "false", ""),
        ("emit", "A", ""),
        ("elseIf", "true", ""),
        ("emit", "B", ""),
        ("elseIf", "true", ""),
        ("emit", "C", ""),
        ("else", "", ""),
        ("emit", "D", ""),
        ("endIf", "", ""),
        ("emit", "after", ""),
    ]);
    assert_eq!(log, vec!["B", "after"]);
}

#[test]
fn test_if_true_skips_else() {
    let log = log_of(&[
        ("if", "1 < 2", ""),
        ("emit", "then", ""),
        ("else", "", ""),
        ("emit", "else", ""),
        ("endIf", "", ""),
    ]);
    assert_eq!(log, vec!["then"]);
}

#[test]
fn test_all_conditions_false_runs_else() {
    let log = log_of(&[
        ("store", "x", "3"),
        ("if", "x == 1", ""),
        ("emit", "one", ""),
        ("elseIf", "x == 2", ""),
        ("emit", "two", ""),
        ("else", "", ""),
        ("emit", "other", ""),
        ("endIf", "", ""),
    ]);
    assert_eq!(log, vec!["other"]);
}

#[test]
fn test_false_without_else_skips_to_end() {
    let log = log_of(&[
        ("if", "false", ""),
        ("emit", "body", ""),
        ("endIf", "", ""),
        ("emit", "after", ""),
    ]);
    assert_eq!(log, vec!["after"]);
}

#[test]
fn test_later_conditions_are_not_evaluated() {
    // `missing` is undefined; evaluating it would fail the run
    let log = log_of(&[
        ("if", "true", ""),
        ("emit", "first", ""),
        ("elseIf", "missing", ""),
        ("emit", "second", ""),
        ("endIf", "", ""),
    ]);
    assert_eq!(log, vec!["first"]);
}

#[test]
fn test_nested_conditionals() {
    let log = log_of(&[
        ("store", "x", "5"),
        ("if", "x > 1", ""),
        ("if", "x > 10", ""),
        ("emit", "big", ""),
        ("else", "", ""),
        ("emit", "medium", ""),
        ("endIf", "", ""),
        ("emit", "outer", ""),
        ("endIf", "", ""),
    ]);
    assert_eq!(log, vec!["medium", "outer"]);
}

#[test]
fn test_else_reached_without_its_if_is_rejected() {
    let err = error_of(&[
        ("goto", "inside", ""),
        ("if", "true", ""),
        ("label", "inside", ""),
        ("else", "", ""),
        ("endIf", "", ""),
    ]);
    assert!(err.message().contains("unexpected command"), "{}", err);
    assert_eq!(err.location().map(|loc| loc.line()), Some(4));
}
