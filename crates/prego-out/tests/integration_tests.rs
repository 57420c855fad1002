//! Integration tests for the formatters as the runners use them.

use prego_core::{OutputFormatter, OutputItem, PregoError, ResultBinding};
use prego_out::{Formatter, OutputSpec};
use serde_json::{json, Value};

fn item(value: Value) -> OutputItem {
    let binding: ResultBinding = match value {
        Value::Object(map) => ResultBinding::new(map),
        _ => unreachable!(),
    };
    OutputItem::from(binding)
}

// =============================================================================
// Extraction
// =============================================================================

#[test]
fn test_extract_nested_field_from_binding() {
    let formatter = Formatter::from_spec("extract=res.alerts.0.severity").unwrap();
    let line = formatter
        .print(&item(json!({"res": {"alerts": [{"severity": "high"}]}})))
        .unwrap();
    assert_eq!(line, "\"high\"");
}

#[test]
fn test_extract_count() {
    let formatter = Formatter::from_spec("regogo=res.#").unwrap();
    let line = formatter.print(&item(json!({"res": [1, 2, 3, 4]}))).unwrap();
    assert_eq!(line, "4");
}

#[test]
fn test_extract_missing_path_prints_null() {
    let formatter = Formatter::from_spec("extract=res.nope").unwrap();
    assert_eq!(formatter.print(&item(json!({"res": 1}))).unwrap(), "null");
}

// =============================================================================
// Templates
// =============================================================================

#[test]
fn test_template_renders_each_item() {
    let formatter = Formatter::from_spec("gotemplate={{res.user}} did {{res.action}}").unwrap();
    let lines: Vec<String> = [
        json!({"res": {"user": "ana", "action": "login"}}),
        json!({"res": {"user": "bo", "action": "logout"}}),
    ]
    .into_iter()
    .map(|v| formatter.print(&item(v)).unwrap())
    .collect();

    assert_eq!(lines, vec!["ana did login", "bo did logout"]);
}

#[test]
fn test_template_missing_fields_render_empty() {
    let formatter = Formatter::from_spec("template=[{{res.missing}}]").unwrap();
    assert_eq!(formatter.print(&item(json!({"res": {}}))).unwrap(), "[]");
}

#[test]
fn test_staged_items_need_not_be_objects() {
    let formatter = Formatter::from_spec("template=value={{this}}").unwrap();
    assert_eq!(formatter.print(&OutputItem(json!(7))).unwrap(), "value=7");
}

// =============================================================================
// Configuration errors
// =============================================================================

#[test]
fn test_unknown_format_is_config_error() {
    match Formatter::from_spec("xml") {
        Err(PregoError::Config(message)) => {
            assert_eq!(message, "unsupported output format: xml")
        }
        _ => panic!("expected a configuration error"),
    }
}

#[test]
fn test_spec_round_trips_through_formatter_new() {
    let spec: OutputSpec = "extract=res".parse().unwrap();
    assert!(matches!(Formatter::new(&spec).unwrap(), Formatter::Extraction(_)));
}
