//! Jump tests: label / goto / gotoIf / skipNext and range restrictions

use super::{error_of, log_of, run};

#[test]
fn test_goto_label() {
    let log = log_of(&[
        ("goto", "end", ""),
        ("emit", "skipped", ""),
        ("label", "end", ""),
        ("emit", "reached", ""),
    ]);
    assert_eq!(log, vec!["reached"]);
}

#[test]
fn test_goto_backward_builds_a_loop() {
    let log = log_of(&[
        ("store", "n", "0"),
        ("label", "top", ""),
        ("store", "n", "n + 1"),
        ("echo", "n", ""),
        ("gotoIf", "n < 3", "top"),
    ]);
    assert_eq!(log, vec!["1", "2", "3"]);
}

#[test]
fn test_goto_if_false_falls_through() {
    let log = log_of(&[
        ("gotoIf", "false", "end"),
        ("emit", "kept", ""),
        ("label", "end", ""),
    ]);
    assert_eq!(log, vec!["kept"]);
}

#[test]
fn test_goto_unknown_label() {
    let err = error_of(&[("goto", "nowhere", "")]);
    assert_eq!(err.message(), "Target label 'nowhere' is not found.");
}

#[test]
fn test_goto_out_of_loop_is_rejected() {
    let err = error_of(&[
        ("while", "true", ""),
        ("goto", "out", ""),
        ("endWhile", "", ""),
        ("label", "out", ""),
    ]);
    assert!(err.message().contains("Attempt to jump out of loop @[1-3] into the top level"), "{}", err);
}

#[test]
fn test_goto_into_loop_is_rejected() {
    let err = error_of(&[
        ("goto", "inside", ""),
        ("while", "false", ""),
        ("label", "inside", ""),
        ("endWhile", "", ""),
    ]);
    assert!(err.message().contains("Attempt to jump out of the top level into loop"), "{}", err);
}

#[test]
fn test_goto_within_loop_is_allowed() {
    let log = log_of(&[
        ("foreach", "x", "1, 2"),
        ("goto", "next", ""),
        ("emit", "skipped", ""),
        ("label", "next", ""),
        ("echo", "x", ""),
        ("endForeach", "", ""),
    ]);
    assert_eq!(log, vec!["1", "2"]);
}

#[test]
fn test_goto_from_try_into_catch_is_a_catchable_error() {
    let outcome = run(&[
        ("try", "", ""),
        ("goto", "handler", ""),
        ("catch", "", ""),
        ("label", "handler", ""),
        ("store", "e", "_error"),
        ("endTry", "", ""),
    ]);
    assert!(outcome.result.is_ok());
    let message = match outcome.var("e") {
        Some(blockflow::Value::Map(fields)) => fields.get("message").map(|m| m.to_string()),
        _ => None,
    };
    assert!(
        message.is_some_and(|m| m.starts_with("Attempt to jump out of try @[1-3] into catch @[3-6]")),
        "{:?}",
        outcome.var("e")
    );
}

#[test]
fn test_skip_next_defaults_to_one_row() {
    let log = log_of(&[
        ("skipNext", "", ""),
        ("emit", "a", ""),
        ("emit", "b", ""),
    ]);
    assert_eq!(log, vec!["b"]);
}

#[test]
fn test_skip_next_counts_exact_rows() {
    let log = log_of(&[
        ("skipNext", "2", ""),
        ("emit", "a", ""),
        ("// a comment row is skipped too", "", ""),
        ("emit", "b", ""),
        ("emit", "c", ""),
    ]);
    assert_eq!(log, vec!["b", "c"]);

    let log = log_of(&[
        ("skipNext", "3", ""),
        ("emit", "a", ""),
        ("emit", "b", ""),
        ("emit", "c", ""),
        ("emit", "d", ""),
    ]);
    assert_eq!(log, vec!["d"]);
}

#[test]
fn test_skip_next_zero_is_a_no_op() {
    let log = log_of(&[("skipNext", "0", ""), ("emit", "a", "")]);
    assert_eq!(log, vec!["a"]);
}

#[test]
fn test_skip_next_rejects_negative_and_fractional_amounts() {
    let err = error_of(&[("skipNext", "-1", ""), ("emit", "a", "")]);
    assert!(err.message().contains("cannot be negative"), "{}", err);
    let err = error_of(&[("skipNext", "1.5", ""), ("emit", "a", "")]);
    assert!(err.message().contains("whole number"), "{}", err);
}

#[test]
fn test_skip_next_out_of_loop_is_rejected() {
    let err = error_of(&[
        ("while", "true", ""),
        ("skipNext", "1", ""),
        ("endWhile", "", ""),
        ("emit", "a", ""),
    ]);
    assert!(err.message().contains("Attempt to jump out of loop"), "{}", err);
}

#[test]
fn test_goto_out_of_if_leaves_it_open() {
    // The range check allows it, but the loop terminator finds the if still active
    let err = error_of(&[
        ("store", "n", "0"),
        ("while", "n < 2", ""),
        ("if", "true", ""),
        ("goto", "skip", ""),
        ("endIf", "", ""),
        ("emit", "unreached", ""),
        ("label", "skip", ""),
        ("endWhile", "", ""),
    ]);
    assert_eq!(err.message(), "unexpected command, active command was @3");
    assert_eq!(err.location().map(|loc| loc.line()), Some(8));
}
