// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-kind conversion of resolved submission values into display content.
//!
//! Most kinds produce plain text; files and surveys build markup directly
//! into the document and hand back the node. Protected components always
//! render the redaction marker, whatever their kind.

use crate::html::{HtmlDocument, NodeId};
use crate::render::RenderMetadata;
use crate::schema::{Component, ComponentKind};
use crate::value::Value;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;

pub const PROTECTED_MARKER: &str = "--- PROTECTED ---";

/// What a formatted component contributes to its table cell.
pub enum CellContent {
    Text(String),
    Node(NodeId),
}

pub fn format_value(
    doc: &mut HtmlDocument,
    comp: &Component,
    value: &Value,
    data_path: &str,
    meta: &RenderMetadata,
) -> CellContent {
    if comp.protected {
        return CellContent::Text(PROTECTED_MARKER.to_string());
    }

    match &comp.kind {
        ComponentKind::File => CellContent::Node(file_links(doc, value)),
        ComponentKind::Survey => CellContent::Node(survey_table(doc, comp, value)),
        // Selects resolve their own `multiple` handling against the label
        // cache, which may be row-aligned with the selected values.
        ComponentKind::Select => {
            CellContent::Text(select_string(comp, value, data_path, meta))
        }
        _ => {
            if comp.multiple {
                if let Ok(items) = value.as_array() {
                    let joined = items
                        .iter()
                        .map(|item| scalar_string(comp, item, data_path, meta))
                        .collect::<Vec<_>>()
                        .join(", ");
                    return CellContent::Text(joined);
                }
            }
            CellContent::Text(scalar_string(comp, value, data_path, meta))
        }
    }
}

fn scalar_string(comp: &Component, value: &Value, data_path: &str, meta: &RenderMetadata) -> String {
    match &comp.kind {
        ComponentKind::Checkbox => yes_no(truthy(value)),
        ComponentKind::Signature => yes_no(!value.is_empty()),
        ComponentKind::Radio => radio_string(comp, value),
        ComponentKind::SelectBoxes => selectboxes_string(comp, value),
        ComponentKind::Select => select_string(comp, value, data_path, meta),
        ComponentKind::Address => address_string(comp, value),
        ComponentKind::DateTime => datetime_string(comp, value, meta),
        ComponentKind::Currency => currency_string(comp, value),
        ComponentKind::Custom(_) => match value {
            Value::Array(_) | Value::Object(_) => value.to_json_str().unwrap_or_default(),
            _ => value.to_display_string(),
        },
        _ => value.to_display_string(),
    }
}

fn yes_no(b: bool) -> String {
    if b { "Yes" } else { "No" }.to_string()
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::String(s) => !s.is_empty() && s.as_ref() != "false" && s.as_ref() != "0",
        _ => !value.is_empty(),
    }
}

// ---- choice-like -----------------------------------------------------------

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref ITEM_REF: Regex =
        Regex::new(r"\{\{\s*item\.([A-Za-z0-9_.]+)\s*\}\}").unwrap();
}

fn strip_html_tags(s: &str) -> String {
    HTML_TAG.replace_all(s, "").into_owned()
}

/// Looks up `value` in a `[{label, value}, ...]` option list.
fn option_label(options: &Value, value: &Value) -> Option<String> {
    let target = value.to_display_string();
    let found = options
        .as_array()
        .ok()?
        .iter()
        .find(|entry| entry["value"].to_display_string() == target)?;
    let label = found["label"].to_display_string();
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

fn radio_string(comp: &Component, value: &Value) -> String {
    option_label(comp.prop("values"), value).unwrap_or_else(|| value.to_display_string())
}

/// Value shape is `{optionValue: bool, ...}`; selected keys resolve through
/// the option list and join with ", ".
fn selectboxes_string(comp: &Component, value: &Value) -> String {
    let Ok(obj) = value.as_object() else {
        return value.to_display_string();
    };
    let selected: Vec<String> = obj
        .iter()
        .filter(|(_, chosen)| truthy(chosen))
        .map(|(key, _)| {
            let key_value = Value::from(key.as_ref());
            option_label(comp.prop("values"), &key_value).unwrap_or_else(|| key.to_string())
        })
        .collect();
    selected.join(", ")
}

fn select_string(comp: &Component, value: &Value, data_path: &str, meta: &RenderMetadata) -> String {
    let dynamic = matches!(
        comp.prop("dataSrc").as_str(),
        Some("url") | Some("resource") | Some("custom")
    );
    let cached = meta.select_data.get(data_path);

    if let Ok(items) = value.as_array() {
        let labels: Vec<String> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let item_cache = cached.map(|c| match c {
                    Value::Array(_) => &c[i],
                    other => other,
                });
                select_item_label(comp, item, item_cache, dynamic)
            })
            .collect();
        return labels.join(", ");
    }
    select_item_label(comp, value, cached, dynamic)
}

fn select_item_label(
    comp: &Component,
    value: &Value,
    cached: Option<&Value>,
    dynamic: bool,
) -> String {
    if !dynamic {
        if let Some(label) = option_label(&comp.prop("data")["values"], value) {
            return label;
        }
    }
    // Dynamically sourced options can only be resolved through the caller
    // supplied label cache, rendered via the component's item template.
    if let Some(item) = cached {
        if !item.is_empty() {
            let template = comp.prop_str("template").unwrap_or("{{ item.label }}");
            let stripped = strip_html_tags(template);
            let rendered = ITEM_REF
                .replace_all(&stripped, |caps: &regex::Captures| {
                    item.get_path(&caps[1]).to_display_string()
                })
                .trim()
                .to_string();
            if !rendered.is_empty() {
                return rendered;
            }
            let label = item["label"].to_display_string();
            if !label.is_empty() {
                return label;
            }
        }
    }
    value.to_display_string()
}

// ---- address ---------------------------------------------------------------

const MANUAL_ADDRESS_FIELDS: &[&str] = &["address1", "address2", "city", "state", "zip", "country"];

lazy_static! {
    static ref ADDRESS_REF: Regex =
        Regex::new(r"\{\{\s*address\.([A-Za-z0-9_.]+)\s*\}\}").unwrap();
}

pub fn address_in_manual_mode(value: &Value) -> bool {
    value["mode"].as_str() == Some("manual")
}

fn address_string(comp: &Component, value: &Value) -> String {
    if value.is_empty() {
        return String::new();
    }

    if address_in_manual_mode(value) {
        let addr = match value["address"] {
            Value::Object(_) => &value["address"],
            _ => value,
        };
        if let Some(template) = comp.prop_str("manualModeViewString") {
            let rendered = ADDRESS_REF
                .replace_all(&strip_html_tags(template), |caps: &regex::Captures| {
                    addr.get_path(&caps[1]).to_display_string()
                })
                .trim()
                .to_string();
            if !rendered.is_empty() {
                return rendered;
            }
        }
        let parts: Vec<String> = MANUAL_ADDRESS_FIELDS
            .iter()
            .map(|f| addr[*f].to_display_string())
            .filter(|s| !s.is_empty())
            .collect();
        return parts.join(", ");
    }

    // Provider mode: the display property depends on which geocoder produced
    // the value.
    let display = match comp.prop_str("provider") {
        Some("google") => &value["formatted_address"],
        Some("nominatim") => &value["display_name"],
        Some("azure") => &value["address"]["freeformAddress"],
        Some("custom") => {
            let prop = comp.prop_str("displayValueProperty").unwrap_or("");
            value.get_path(prop)
        }
        _ => &Value::Undefined,
    };
    if !display.is_empty() {
        return display.to_display_string();
    }
    for fallback in [
        &value["formatted_address"],
        &value["display_name"],
        &value["address"]["freeformAddress"],
    ] {
        if !fallback.is_empty() {
            return fallback.to_display_string();
        }
    }
    String::new()
}

// ---- date/time -------------------------------------------------------------

lazy_static! {
    static ref MOMENT_TOKEN: Regex = Regex::new(
        "YYYY|yyyy|MMMM|MMM|MM|Do|DD|dddd|ddd|dd|D|HH|hh|H|h|mm|m|ss|s|SSS|A|a|ZZ|Z|z"
    )
    .unwrap();
}

/// Translates Moment-style format tokens into a strftime pattern. Unknown
/// characters pass through as literals.
pub fn moment_to_strftime(fmt: &str) -> String {
    let escaped = fmt.replace('%', "%%");
    MOMENT_TOKEN
        .replace_all(&escaped, |caps: &regex::Captures| {
            match &caps[0] {
                "YYYY" | "yyyy" => "%Y",
                "MMMM" => "%B",
                "MMM" => "%b",
                "MM" => "%m",
                "Do" | "D" => "%-d",
                "DD" | "dd" => "%d",
                "dddd" => "%A",
                "ddd" => "%a",
                "HH" => "%H",
                "hh" => "%I",
                "H" => "%-H",
                "h" => "%-I",
                "mm" => "%M",
                "m" => "%-M",
                "ss" => "%S",
                "s" => "%-S",
                "SSS" => "%3f",
                "A" => "%p",
                "a" => "%P",
                "ZZ" => "%z",
                "Z" => "%:z",
                "z" => "%Z",
                other => other,
            }
            .to_string()
        })
        .into_owned()
}

enum ResolvedZone {
    Utc,
    Named(Tz),
    Local,
}

/// Timezone precedence: an explicit UTC setting, then the submission's
/// timezone when displaying in submission mode, then the component's
/// configured location, then the caller's timezone, then server local time.
fn resolve_zone(comp: &Component, meta: &RenderMetadata) -> ResolvedZone {
    let mode = comp.prop_str("displayInTimezone").unwrap_or("viewer");
    match mode {
        "utc" => return ResolvedZone::Utc,
        "submission" => {
            if let Some(tz) = meta
                .submission_timezone
                .as_deref()
                .and_then(|s| s.parse::<Tz>().ok())
            {
                return ResolvedZone::Named(tz);
            }
        }
        "location" => {
            if let Some(tz) = comp.prop_str("timezone").and_then(|s| s.parse::<Tz>().ok()) {
                return ResolvedZone::Named(tz);
            }
        }
        _ => {}
    }
    if let Some(tz) = meta.timezone.as_deref().and_then(|s| s.parse::<Tz>().ok()) {
        return ResolvedZone::Named(tz);
    }
    ResolvedZone::Local
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

fn datetime_string(comp: &Component, value: &Value, meta: &RenderMetadata) -> String {
    let raw = value.to_display_string();
    if raw.is_empty() {
        return raw;
    }
    let Some(dt) = parse_datetime(&raw) else {
        return raw;
    };
    let fmt = moment_to_strftime(comp.prop_str("format").unwrap_or("yyyy-MM-dd hh:mm a"));
    match resolve_zone(comp, meta) {
        ResolvedZone::Utc => dt.format(&fmt).to_string(),
        ResolvedZone::Named(tz) => dt.with_timezone(&tz).format(&fmt).to_string(),
        ResolvedZone::Local => dt.with_timezone(&chrono::Local).format(&fmt).to_string(),
    }
}

/// Formats a date value (RFC3339 or similar) for template output.
pub fn format_date_value(raw: &str, fmt: &str, meta: &RenderMetadata) -> String {
    let Some(dt) = parse_datetime(raw) else {
        return raw.to_string();
    };
    let strftime = moment_to_strftime(fmt);
    match meta.timezone.as_deref().and_then(|s| s.parse::<Tz>().ok()) {
        Some(tz) => dt.with_timezone(&tz).format(&strftime).to_string(),
        None => dt.format(&strftime).to_string(),
    }
}

// ---- currency --------------------------------------------------------------

fn currency_symbol(code: &str) -> Option<(&'static str, usize)> {
    match code {
        "USD" | "CAD" | "AUD" => Some(("$", 2)),
        "EUR" => Some(("€", 2)),
        "GBP" => Some(("£", 2)),
        "JPY" => Some(("¥", 0)),
        "INR" => Some(("₹", 2)),
        _ => None,
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let chars: Vec<char> = digits.chars().collect();
    for (i, ch) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*ch);
    }
    out
}

fn currency_string(comp: &Component, value: &Value) -> String {
    // An absent amount renders as empty, never as a zero amount.
    if value.is_empty() {
        return String::new();
    }
    let amount = match value {
        Value::Number(n) => *n,
        Value::String(s) => match s.parse::<f64>() {
            Ok(n) => n,
            Err(_) => return s.to_string(),
        },
        _ => return value.to_display_string(),
    };

    let code = comp.prop_str("currency").unwrap_or("USD");
    let (prefix, decimals, spaced) = match currency_symbol(code) {
        Some((symbol, decimals)) => (symbol.to_string(), decimals, false),
        None => (code.to_string(), 2, true),
    };

    let sign = if amount < 0.0 { "-" } else { "" };
    let formatted = format!("{:.*}", decimals, amount.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };
    let grouped = group_thousands(&int_part);
    let number = match frac_part {
        Some(f) => format!("{grouped}.{f}"),
        None => grouped,
    };
    if spaced {
        format!("{sign}{prefix} {number}")
    } else {
        format!("{sign}{prefix}{number}")
    }
}

// ---- files & surveys -------------------------------------------------------

fn file_links(doc: &mut HtmlDocument, value: &Value) -> NodeId {
    let container = doc.element("div", &[]);
    let files: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => vec![],
    };
    for (i, file) in files.iter().enumerate() {
        if i > 0 {
            doc.append_element(container, "br", &[]);
        }
        let name = match file["originalName"].as_str() {
            Some(n) => n.to_string(),
            None => file["name"].to_display_string(),
        };
        match file["url"].as_str() {
            Some(url) if !url.is_empty() => {
                let anchor = doc.append_element(container, "a", &[("href", url)]);
                doc.append_text(anchor, &name);
            }
            _ => doc.append_text(container, &name),
        }
    }
    container
}

fn survey_table(doc: &mut HtmlDocument, comp: &Component, value: &Value) -> NodeId {
    let table = doc.element(
        "table",
        &[("border", "1"), ("cellpadding", "5"), ("cellspacing", "0")],
    );
    if let Ok(questions) = comp.prop("questions").as_array() {
        for question in questions.iter() {
            let q_value = question["value"].to_display_string();
            let answer = &value[q_value.as_str()];
            let tr = doc.append_element(table, "tr", &[]);
            let th = doc.append_element(tr, "th", &[("style", "text-align:left;")]);
            doc.append_text(th, &question["label"].to_display_string());
            let td = doc.append_element(tr, "td", &[]);
            let answer_label = option_label(comp.prop("values"), answer)
                .unwrap_or_else(|| answer.to_display_string());
            doc.append_text(td, &answer_label);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Component;

    fn comp(json: &str) -> Component {
        Component::from_value(&Value::from_json_str(json).unwrap()).unwrap()
    }

    fn meta() -> RenderMetadata {
        RenderMetadata::default()
    }

    #[test]
    fn test_currency_usd() {
        let c = comp(r#"{"key": "amt", "type": "currency", "currency": "USD"}"#);
        assert_eq!(currency_string(&c, &Value::Number(19.5)), "$19.50");
        assert_eq!(currency_string(&c, &Value::Number(-1234.5)), "-$1,234.50");
        assert_eq!(currency_string(&c, &Value::Undefined), "");
    }

    #[test]
    fn test_currency_unknown_code() {
        let c = comp(r#"{"key": "amt", "type": "currency", "currency": "SEK"}"#);
        assert_eq!(currency_string(&c, &Value::Number(10.0)), "SEK 10.00");
    }

    #[test]
    fn test_address_provider_google() {
        let c = comp(r#"{"key": "addr", "type": "address", "provider": "google"}"#);
        let v = Value::from_json_str(r#"{"formatted_address": "1 Main St"}"#).unwrap();
        assert_eq!(address_string(&c, &v), "1 Main St");
    }

    #[test]
    fn test_address_manual_mode_joins_fields() {
        let c = comp(r#"{"key": "addr", "type": "address"}"#);
        let v = Value::from_json_str(
            r#"{"mode": "manual", "address": {"address1": "1 Main St", "city": "Springfield", "zip": "01101"}}"#,
        )
        .unwrap();
        assert_eq!(address_string(&c, &v), "1 Main St, Springfield, 01101");
    }

    #[test]
    fn test_checkbox_yes_no() {
        let c = comp(r#"{"key": "ok", "type": "checkbox"}"#);
        assert_eq!(scalar_string(&c, &Value::Bool(true), "ok", &meta()), "Yes");
        assert_eq!(scalar_string(&c, &Value::Bool(false), "ok", &meta()), "No");
    }

    #[test]
    fn test_radio_resolves_static_label() {
        let c = comp(
            r#"{"key": "r", "type": "radio", "values": [{"label": "First", "value": "one"}]}"#,
        );
        assert_eq!(radio_string(&c, &Value::from("one")), "First");
        assert_eq!(radio_string(&c, &Value::from("other")), "other");
    }

    #[test]
    fn test_selectboxes_joins_chosen() {
        let c = comp(
            r#"{"key": "s", "type": "selectboxes", "values": [
                {"label": "Red", "value": "r"}, {"label": "Blue", "value": "b"}]}"#,
        );
        let v = Value::from_json_str(r#"{"r": true, "b": false}"#).unwrap();
        assert_eq!(selectboxes_string(&c, &v), "Red");
    }

    #[test]
    fn test_select_dynamic_uses_label_cache() {
        let c = comp(
            r#"{"key": "city", "type": "select", "dataSrc": "url",
                "template": "<span>{{ item.name }}</span>"}"#,
        );
        let mut m = meta();
        m.select_data.insert(
            "city".to_string(),
            Value::from_json_str(r#"{"name": "Lisbon"}"#).unwrap(),
        );
        assert_eq!(select_string(&c, &Value::from("lis"), "city", &m), "Lisbon");
    }

    #[test]
    fn test_moment_translation() {
        assert_eq!(moment_to_strftime("yyyy-MM-dd"), "%Y-%m-%d");
        assert_eq!(moment_to_strftime("YYYY-MM-DD HH:mm"), "%Y-%m-%d %H:%M");
        assert_eq!(moment_to_strftime("hh:mm a"), "%I:%M %P");
    }

    #[test]
    fn test_datetime_formats_in_utc() {
        let c = comp(
            r#"{"key": "d", "type": "datetime", "format": "yyyy-MM-dd HH:mm",
                "displayInTimezone": "utc"}"#,
        );
        let v = Value::from("2024-03-01T12:30:00Z");
        assert_eq!(datetime_string(&c, &v, &meta()), "2024-03-01 12:30");
    }

    #[test]
    fn test_datetime_location_timezone() {
        let c = comp(
            r#"{"key": "d", "type": "datetime", "format": "HH:mm",
                "displayInTimezone": "location", "timezone": "America/New_York"}"#,
        );
        let v = Value::from("2024-07-01T12:00:00Z");
        // New York is UTC-4 in July.
        assert_eq!(datetime_string(&c, &v, &meta()), "08:00");
    }

    #[test]
    fn test_protected_marker() {
        let c = comp(r#"{"key": "pw", "type": "textfield", "protected": true}"#);
        let mut doc = HtmlDocument::new("div", &[]);
        match format_value(&mut doc, &c, &Value::from("secret"), "pw", &meta()) {
            CellContent::Text(s) => assert_eq!(s, PROTECTED_MARKER),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn test_multiple_values_join() {
        let c = comp(r#"{"key": "t", "type": "textfield", "multiple": true}"#);
        let v = Value::from(vec![Value::from("a"), Value::from("b")]);
        let mut doc = HtmlDocument::new("div", &[]);
        match format_value(&mut doc, &c, &v, "t", &meta()) {
            CellContent::Text(s) => assert_eq!(s, "a, b"),
            _ => panic!("expected text"),
        }
    }
}
