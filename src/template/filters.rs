// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Built-in filters and whitelisted helper functions.
//!
//! Filters apply through `value | name(args)`; helpers are the only callable
//! names in an expression. Both registries are fixed at startup; template
//! text can never extend them.

use crate::format::format_date_value;
use crate::render::RenderMetadata;
use crate::template::interp::TemplateContext;
use crate::value::Value;

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{bail, Result};
use chrono::{DateTime, Days, Months, Utc};
use lazy_static::lazy_static;

pub type FilterFcn = (
    fn(&Value, &[Value], &TemplateContext<'_>) -> Result<Value>,
    usize,
);
pub type HelperFcn = (fn(&[Value]) -> Result<Value>, usize);

#[rustfmt::skip]
lazy_static! {
    pub static ref FILTERS: HashMap<&'static str, FilterFcn> = {
        let mut m: HashMap<&'static str, FilterFcn> = HashMap::new();

        m.insert("isString", (is_string, 0));
        m.insert("isArray", (is_array, 0));
        m.insert("isObject", (is_object, 0));
        m.insert("date", (date, 1));
        m.insert("submissionTable", (submission_table, 0));
        m.insert("componentValue", (component_value, 0));
        m.insert("componentLabel", (component_label, 0));
        m.insert("upper", (upper_filter, 0));
        m.insert("lower", (lower_filter, 0));
        m.insert("trim", (trim_filter, 0));
        m.insert("join", (join_filter, 1));
        m.insert("default", (default_filter, 1));
        m.insert("mask", (mask_filter, 0));

        m
    };

    pub static ref HELPERS: HashMap<&'static str, HelperFcn> = {
        let mut m: HashMap<&'static str, HelperFcn> = HashMap::new();

        m.insert("concat", (concat, 8));
        m.insert("upper", (upper, 1));
        m.insert("lower", (lower, 1));
        m.insert("trim", (trim, 1));
        m.insert("replace", (replace, 3));
        m.insert("split", (split, 2));
        m.insert("join", (join, 2));
        m.insert("mask", (mask, 1));
        m.insert("dateAdd", (date_add, 3));
        m.insert("now", (now, 0));

        m
    };
}

pub fn ensure_max_args(fcn: &str, args: &[Value], max: usize) -> Result<()> {
    if args.len() > max {
        bail!("`{fcn}` expects at most {max} argument(s), got {}", args.len());
    }
    Ok(())
}

fn ensure_args_count(fcn: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        bail!("`{fcn}` expects {expected} argument(s), got {}", args.len());
    }
    Ok(())
}

fn ensure_string(fcn: &str, v: &Value) -> Result<Rc<str>> {
    match v {
        Value::String(s) => Ok(s.clone()),
        _ => bail!("`{fcn}` expects a string argument, got `{v}`"),
    }
}

fn ensure_number(fcn: &str, v: &Value) -> Result<f64> {
    match v {
        Value::Number(n) => Ok(*n),
        _ => bail!("`{fcn}` expects a numeric argument, got `{v}`"),
    }
}

// ---- type predicates -------------------------------------------------------

fn is_string(v: &Value, _args: &[Value], _ctx: &TemplateContext<'_>) -> Result<Value> {
    Ok(Value::Bool(matches!(v, Value::String(_))))
}

fn is_array(v: &Value, _args: &[Value], _ctx: &TemplateContext<'_>) -> Result<Value> {
    Ok(Value::Bool(matches!(v, Value::Array(_))))
}

fn is_object(v: &Value, _args: &[Value], _ctx: &TemplateContext<'_>) -> Result<Value> {
    Ok(Value::Bool(matches!(v, Value::Object(_))))
}

// ---- rendering-aware filters -----------------------------------------------

fn date(v: &Value, args: &[Value], ctx: &TemplateContext<'_>) -> Result<Value> {
    let raw = v.to_display_string();
    if raw.is_empty() {
        return Ok(Value::from(""));
    }
    let fmt = match args.first() {
        Some(f) => ensure_string("date", f)?.to_string(),
        None => "yyyy-MM-dd hh:mm a".to_string(),
    };
    let fallback = RenderMetadata::default();
    let meta = ctx.metadata.unwrap_or(&fallback);
    Ok(Value::from(format_date_value(&raw, &fmt, meta)))
}

/// Injects the pre-rendered submission table.
fn submission_table(_v: &Value, _args: &[Value], ctx: &TemplateContext<'_>) -> Result<Value> {
    Ok(Value::from(ctx.table_html.unwrap_or_default()))
}

/// Input is a component path; resolves to the component's value.
fn component_value(v: &Value, _args: &[Value], ctx: &TemplateContext<'_>) -> Result<Value> {
    let path = ensure_string("componentValue", v)?;
    let Some(root) = ctx.reflect else {
        return Ok(Value::Undefined);
    };
    Ok(match root.get_component(&path) {
        Some(inst) => inst.value().clone(),
        None => Value::Undefined,
    })
}

/// Input is a component path; resolves to the component's label.
fn component_label(v: &Value, _args: &[Value], ctx: &TemplateContext<'_>) -> Result<Value> {
    let path = ensure_string("componentLabel", v)?;
    let Some(root) = ctx.reflect else {
        return Ok(Value::Undefined);
    };
    Ok(match root.get_component(&path) {
        Some(inst) => Value::from(inst.label()),
        None => Value::Undefined,
    })
}

// ---- utility filters -------------------------------------------------------

fn upper_filter(v: &Value, _args: &[Value], _ctx: &TemplateContext<'_>) -> Result<Value> {
    Ok(Value::from(v.to_display_string().to_uppercase()))
}

fn lower_filter(v: &Value, _args: &[Value], _ctx: &TemplateContext<'_>) -> Result<Value> {
    Ok(Value::from(v.to_display_string().to_lowercase()))
}

fn trim_filter(v: &Value, _args: &[Value], _ctx: &TemplateContext<'_>) -> Result<Value> {
    Ok(Value::from(v.to_display_string().trim()))
}

fn join_filter(v: &Value, args: &[Value], _ctx: &TemplateContext<'_>) -> Result<Value> {
    let separator = match args.first() {
        Some(s) => ensure_string("join", s)?.to_string(),
        None => ", ".to_string(),
    };
    let items = match v.as_array() {
        Ok(items) => items,
        Err(_) => return Ok(Value::from(v.to_display_string())),
    };
    let joined = items
        .iter()
        .map(|item| item.to_display_string())
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::from(joined))
}

fn default_filter(v: &Value, args: &[Value], _ctx: &TemplateContext<'_>) -> Result<Value> {
    if v.is_empty() {
        Ok(args.first().cloned().unwrap_or(Value::Undefined))
    } else {
        Ok(v.clone())
    }
}

fn mask_filter(v: &Value, _args: &[Value], _ctx: &TemplateContext<'_>) -> Result<Value> {
    mask(&[v.clone()])
}

// ---- helpers ---------------------------------------------------------------

fn concat(args: &[Value]) -> Result<Value> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.to_display_string());
    }
    Ok(Value::from(out))
}

fn upper(args: &[Value]) -> Result<Value> {
    ensure_args_count("upper", args, 1)?;
    Ok(Value::from(
        ensure_string("upper", &args[0])?.to_uppercase(),
    ))
}

fn lower(args: &[Value]) -> Result<Value> {
    ensure_args_count("lower", args, 1)?;
    Ok(Value::from(
        ensure_string("lower", &args[0])?.to_lowercase(),
    ))
}

fn trim(args: &[Value]) -> Result<Value> {
    ensure_args_count("trim", args, 1)?;
    Ok(Value::from(ensure_string("trim", &args[0])?.trim()))
}

fn replace(args: &[Value]) -> Result<Value> {
    ensure_args_count("replace", args, 3)?;
    let s = ensure_string("replace", &args[0])?;
    let from = ensure_string("replace", &args[1])?;
    let to = ensure_string("replace", &args[2])?;
    Ok(Value::from(s.replace(from.as_ref(), to.as_ref())))
}

fn split(args: &[Value]) -> Result<Value> {
    ensure_args_count("split", args, 2)?;
    let s = ensure_string("split", &args[0])?;
    let separator = ensure_string("split", &args[1])?;
    let parts: Vec<Value> = s
        .split(separator.as_ref())
        .map(Value::from)
        .collect();
    Ok(Value::from(parts))
}

fn join(args: &[Value]) -> Result<Value> {
    ensure_args_count("join", args, 2)?;
    let items = match &args[0] {
        Value::Array(items) => items,
        other => bail!("`join` expects an array argument, got `{other}`"),
    };
    let separator = ensure_string("join", &args[1])?;
    let joined = items
        .iter()
        .map(|item| item.to_display_string())
        .collect::<Vec<_>>()
        .join(separator.as_ref());
    Ok(Value::from(joined))
}

/// Redacts all but the last four characters.
fn mask(args: &[Value]) -> Result<Value> {
    ensure_args_count("mask", args, 1)?;
    let s = args[0].to_display_string();
    let chars: Vec<char> = s.chars().collect();
    let keep = 4.min(chars.len());
    let masked: String = std::iter::repeat('*')
        .take(chars.len() - keep)
        .chain(chars[chars.len() - keep..].iter().copied())
        .collect();
    Ok(Value::from(masked))
}

fn date_add(args: &[Value]) -> Result<Value> {
    ensure_args_count("dateAdd", args, 3)?;
    let raw = ensure_string("dateAdd", &args[0])?;
    let amount = ensure_number("dateAdd", &args[1])? as i64;
    let unit = ensure_string("dateAdd", &args[2])?;

    let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) else {
        return Ok(Value::Undefined);
    };
    let dt = parsed.with_timezone(&Utc);

    let shifted = match unit.as_ref() {
        "years" | "year" => shift_months(dt, amount.saturating_mul(12)),
        "months" | "month" => shift_months(dt, amount),
        "days" | "day" => {
            if amount >= 0 {
                dt.checked_add_days(Days::new(amount as u64))
            } else {
                dt.checked_sub_days(Days::new(amount.unsigned_abs()))
            }
        }
        "hours" | "hour" => dt.checked_add_signed(chrono::Duration::hours(amount)),
        "minutes" | "minute" => dt.checked_add_signed(chrono::Duration::minutes(amount)),
        "seconds" | "second" => dt.checked_add_signed(chrono::Duration::seconds(amount)),
        other => bail!("`dateAdd` does not understand unit `{other}`"),
    };

    Ok(match shifted {
        Some(dt) => Value::from(dt.to_rfc3339()),
        None => Value::Undefined,
    })
}

fn shift_months(dt: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let months_u32: u32 = months.unsigned_abs().try_into().ok()?;
    if months >= 0 {
        dt.checked_add_months(Months::new(months_u32))
    } else {
        dt.checked_sub_months(Months::new(months_u32))
    }
}

fn now(_args: &[Value]) -> Result<Value> {
    Ok(Value::from(Utc::now().to_rfc3339()))
}
