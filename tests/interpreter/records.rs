//! Record tests: forJson / forXml / loadJsonVars / loadXmlVars

use super::{Row, Run, num, session};
use blockflow::{MemoryRecordSource, Value};

const PEOPLE: &str = r#"[{"name": "a", "n": 1}, {"name": "b", "n": 2}, {"name": "c", "n": 3}]"#;

fn run_with_records(rows: &[Row<'_>]) -> Run {
    let (mut session, log) = session(rows);
    let records = MemoryRecordSource::new()
        .with_document("people.json", PEOPLE)
        .with_document("one.json", r#"{"user": "x", "id": 7}"#)
        .with_document("empty.json", "[]")
        .with_document("broken.json", r#"[{"a": 1}, {"b": 2}]"#);
    session.set_record_source(Box::new(records));
    let result = session.run();
    Run {
        result,
        log: log.entries(),
        session,
    }
}

#[test]
fn test_for_json_visits_each_record() {
    let outcome = run_with_records(&[
        ("forJson", "people.json", ""),
        ("echo", "name + n", ""),
        ("endForJson", "", ""),
    ]);
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.log, vec!["a1", "b2", "c3"]);
    assert_eq!(outcome.var("name"), None);
    assert_eq!(outcome.var("n"), None);
}

#[test]
fn test_for_json_break() {
    let outcome = run_with_records(&[
        ("store", "n", "'kept'"),
        ("forJson", "people.json", ""),
        ("break", "n == 2", ""),
        ("echo", "name", ""),
        ("endForJson", "", ""),
    ]);
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.log, vec!["a"]);
    assert_eq!(outcome.var("n"), Some(Value::from("kept")));
}

#[test]
fn test_for_json_over_empty_document() {
    let outcome = run_with_records(&[
        ("forJson", "empty.json", ""),
        ("emit", "body", ""),
        ("endForJson", "", ""),
        ("emit", "after", ""),
    ]);
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.log, vec!["after"]);
}

#[test]
fn test_for_json_inconsistent_records() {
    let outcome = run_with_records(&[("forJson", "broken.json", ""), ("endForJson", "", "")]);
    let message = outcome.result.err().map(|err| err.message().to_string());
    assert_eq!(
        message.as_deref(),
        Some("Inconsistent JSON object #2; unexpected attribute 'b'")
    );
}

#[test]
fn test_for_json_missing_document() {
    let outcome = run_with_records(&[("forJson", "nope.json", ""), ("endForJson", "", "")]);
    assert!(outcome.result.is_err());
}

#[test]
fn test_for_xml_is_unsupported_by_default_sources() {
    let outcome = run_with_records(&[("forXml", "data.xml", ""), ("endForXml", "", "")]);
    let message = outcome.result.err().map(|err| err.message().to_string());
    assert_eq!(
        message.as_deref(),
        Some("XML record files are not supported by this record source")
    );
}

#[test]
fn test_load_vars_is_an_alias_for_load_xml_vars() {
    let legacy = run_with_records(&[("loadVars", "data.xml", "")]);
    let xml = run_with_records(&[("loadXmlVars", "data.xml", "")]);
    let legacy = legacy.result.err().map(|err| err.message().to_string());
    assert_eq!(
        legacy.as_deref(),
        Some("XML record files are not supported by this record source")
    );
    assert_eq!(legacy, xml.result.err().map(|err| err.message().to_string()));
}

#[test]
fn test_load_single_record() {
    let outcome = run_with_records(&[("loadJsonVars", "one.json", ""), ("echo", "user", "")]);
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.log, vec!["x"]);
    assert_eq!(outcome.var("id"), Some(num(7)));
}

#[test]
fn test_load_requires_selector_for_many_records() {
    let outcome = run_with_records(&[("loadJsonVars", "people.json", "")]);
    let message = outcome.result.err().map(|err| err.message().to_string());
    assert!(message.is_some_and(|m| m.starts_with("Multiple JSON records are not valid for this command")));
}

#[test]
fn test_load_with_selector() {
    let outcome = run_with_records(&[("loadJsonVars", "people.json", "name == 'b'")]);
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.var("n"), Some(num(2)));
}

#[test]
fn test_load_selector_without_match() {
    let outcome = run_with_records(&[("loadJsonVars", "people.json", "n > 10")]);
    let message = outcome.result.err().map(|err| err.message().to_string());
    assert!(message.is_some_and(|m| m.starts_with("JSON record not found for selector expression: n > 10")));
}

#[test]
fn test_load_from_empty_document() {
    let outcome = run_with_records(&[("loadJsonVars", "empty.json", "")]);
    let message = outcome.result.err().map(|err| err.message().to_string());
    assert_eq!(message.as_deref(), Some("No JSON records found in empty.json"));
}
