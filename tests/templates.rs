// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::time::Duration;

use formail::{
    ConditionalSet, Root, Sandbox, TemplateContext, TemplateError, Value,
};

fn ctx_value(json: &str) -> Value {
    Value::from_json_str(json).unwrap()
}

#[test]
fn interpolation_renders_context_values() {
    let data = ctx_value(r#"{"name": "World", "n": 2}"#);
    let sandbox = Sandbox::new();
    let out = sandbox
        .render("Hello {{ name }}! {{ n + 3 }}", &TemplateContext::new(&data))
        .unwrap();
    assert_eq!(out, "Hello World! 5");
}

#[test]
fn escaping_round_trips_to_identity() {
    let data = ctx_value(r#"{"v": "<b>\"AT&T\" isn't</b>"}"#);
    let sandbox = Sandbox::new();
    let out = sandbox
        .render("{{ v }}", &TemplateContext::new(&data))
        .unwrap();
    assert_eq!(out, "<b>\"AT&T\" isn't</b>");
}

#[test]
fn literal_template_text_passes_through() {
    let data = Value::new_object();
    let sandbox = Sandbox::new();
    let out = sandbox
        .render("<p>static {{ 'x' }} markup</p>", &TemplateContext::new(&data))
        .unwrap();
    assert_eq!(out, "<p>static x markup</p>");
}

#[test]
fn constructor_access_renders_as_literal_text() {
    let data = ctx_value(r#"{"data": {"name": "Ada"}}"#);
    let sandbox = Sandbox::new();
    let out = sandbox
        .render("{{ data.constructor }}", &TemplateContext::new(&data))
        .unwrap();
    assert_eq!(out, "{ { data.constructor } }");
}

#[test]
fn prototype_and_bracket_call_are_neutralized() {
    let data = Value::new_object();
    let sandbox = Sandbox::new();
    let out = sandbox
        .render(
            "{{ a.__proto__ }} / {{ b['f']('x') }} / {{ ok }}",
            &TemplateContext::new(&data),
        )
        .unwrap();
    assert!(out.contains("{ { a.__proto__ } }"));
    assert!(out.contains("{ { b['f']('x') } }"));
    // The benign interpolation still evaluated (to empty).
    assert!(out.ends_with("/ "));
}

#[test]
fn member_calls_are_a_syntax_error() {
    let data = Value::new_object();
    let sandbox = Sandbox::new();
    let err = sandbox
        .render("{{ data.toString() }}", &TemplateContext::new(&data))
        .unwrap_err();
    assert!(matches!(err, TemplateError::Syntax(_)));
}

#[test]
fn exhausted_budget_is_a_fatal_timeout() {
    let data = ctx_value(r#"{"n": 1}"#);
    let sandbox = Sandbox::with_budget(Duration::ZERO);
    let template = "{{ n + 1 }} ".repeat(2000);
    let err = sandbox
        .render(&template, &TemplateContext::new(&data))
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[test]
fn render_map_degrades_bad_fields_to_null() {
    let _ = env_logger::builder().is_test(true).try_init();
    let data = ctx_value(r#"{"name": "Ada"}"#);
    let sandbox = Sandbox::new();
    let mut fields = BTreeMap::new();
    fields.insert("subject".to_string(), "Hi {{ name }}".to_string());
    fields.insert("body".to_string(), "{{ name | noSuchFilter }}".to_string());

    let out = sandbox
        .render_map(&fields, &TemplateContext::new(&data))
        .unwrap();
    assert_eq!(out["subject"].as_str(), Some("Hi Ada"));
    assert!(out["body"].is_null());
}

#[test]
fn render_map_timeout_fails_the_whole_map() {
    let data = ctx_value(r#"{"n": 1}"#);
    let sandbox = Sandbox::with_budget(Duration::ZERO);
    let mut fields = BTreeMap::new();
    fields.insert("subject".to_string(), "plain".to_string());
    fields.insert("body".to_string(), "{{ n }} ".repeat(2000));

    let err = sandbox
        .render_map(&fields, &TemplateContext::new(&data))
        .unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn type_predicate_filters() {
    let data = ctx_value(r#"{"s": "x", "a": [1], "o": {"k": 1}}"#);
    let sandbox = Sandbox::new();
    let ctx = TemplateContext::new(&data);
    assert_eq!(
        sandbox
            .render("{{ s | isString }} {{ a | isArray }} {{ o | isObject }} {{ a | isString }}", &ctx)
            .unwrap(),
        "true true true false"
    );
}

#[test]
fn utility_filters_and_helpers() {
    let data = ctx_value(r#"{"name": "ada", "tags": ["a", "b"], "card": "4111111111111111"}"#);
    let sandbox = Sandbox::new();
    let ctx = TemplateContext::new(&data);

    assert_eq!(sandbox.render("{{ name | upper }}", &ctx).unwrap(), "ADA");
    assert_eq!(
        sandbox.render("{{ tags | join(' + ') }}", &ctx).unwrap(),
        "a + b"
    );
    assert_eq!(
        sandbox.render("{{ missing | default('n/a') }}", &ctx).unwrap(),
        "n/a"
    );
    assert_eq!(
        sandbox.render("{{ card | mask }}", &ctx).unwrap(),
        "************1111"
    );
    assert_eq!(
        sandbox
            .render("{{ concat(name, '@', 'example.org') }}", &ctx)
            .unwrap(),
        "ada@example.org"
    );
}

#[test]
fn date_filter_formats() {
    let data = ctx_value(r#"{"when": "2024-03-01T12:30:00Z"}"#);
    let sandbox = Sandbox::new();
    let out = sandbox
        .render("{{ when | date('yyyy-MM-dd') }}", &TemplateContext::new(&data))
        .unwrap();
    assert_eq!(out, "2024-03-01");
}

#[test]
fn submission_table_filter_injects_rendered_html() {
    let data = Value::new_object();
    let table = "<table><tr><td>cell</td></tr></table>";
    let sandbox = Sandbox::new();
    let ctx = TemplateContext::new(&data).with_table_html(table);
    let out = sandbox.render("{{ 'x' | submissionTable }}", &ctx).unwrap();
    // Auto-escape then the single final unescape leaves the markup intact.
    assert_eq!(out, table);
}

#[test]
fn component_filters_resolve_through_reflection() {
    let form = ctx_value(
        r#"{"components": [
            {"key": "name", "type": "textfield", "label": "Full Name"}
        ]}"#,
    );
    let submission = ctx_value(r#"{"name": "Ada"}"#);
    let root = Root::new(&form, &submission, &ConditionalSet::default()).unwrap();

    let data = Value::new_object();
    let sandbox = Sandbox::new();
    let ctx = TemplateContext::new(&data).with_reflect(&root);
    assert_eq!(
        sandbox
            .render("{{ 'name' | componentLabel }}: {{ 'name' | componentValue }}", &ctx)
            .unwrap(),
        "Full Name: Ada"
    );
}

#[test]
fn logic_and_comparison_operators() {
    let data = ctx_value(r#"{"a": 2, "b": "2"}"#);
    let sandbox = Sandbox::new();
    let ctx = TemplateContext::new(&data);
    assert_eq!(sandbox.render("{{ a == b }}", &ctx).unwrap(), "true");
    assert_eq!(sandbox.render("{{ a > 1 && a < 3 }}", &ctx).unwrap(), "true");
    assert_eq!(sandbox.render("{{ missing || 'fallback' }}", &ctx).unwrap(), "fallback");
    assert_eq!(sandbox.render("{{ !a }}", &ctx).unwrap(), "false");
    assert_eq!(sandbox.render("{{ 10 / 0 }}", &ctx).unwrap(), "");
}

#[test]
fn bare_expression_evaluation() {
    let data = ctx_value(r#"{"data": {"first": "Ada", "last": "Lovelace"}}"#);
    let sandbox = Sandbox::new();
    let v = sandbox
        .evaluate("data.first + ' ' + data.last", &TemplateContext::new(&data))
        .unwrap();
    assert_eq!(v.as_str(), Some("Ada Lovelace"));
}

#[test]
fn hostile_bare_expression_evaluates_to_undefined() {
    let data = Value::new_object();
    let sandbox = Sandbox::new();
    let v = sandbox
        .evaluate("x.constructor", &TemplateContext::new(&data))
        .unwrap();
    assert!(v.is_undefined());
}
