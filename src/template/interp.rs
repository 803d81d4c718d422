// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tree-walking evaluation of compiled templates.
//!
//! Evaluation is sandboxed by construction: the only reachable names are the
//! context value and the fixed helper/filter registries, and every visited
//! node ticks the execution timer so runaway input hits the wall-clock
//! budget instead of the host.

use crate::error::TemplateError;
use crate::html::escape_html;
use crate::limits::ExecutionTimer;
use crate::reflect::Root;
use crate::render::RenderMetadata;
use crate::template::filters::{ensure_max_args, FILTERS, HELPERS};
use crate::template::parser::{BinOp, Expr, Segment, Template, UnaryOp};
use crate::value::Value;

/// Everything an evaluation may see. Each call builds its own context; no
/// state survives between jobs.
#[derive(Clone, Copy)]
pub struct TemplateContext<'a> {
    /// The interpolation namespace.
    pub data: &'a Value,
    /// Component introspection for `componentValue`/`componentLabel`.
    pub reflect: Option<&'a Root>,
    /// Pre-rendered submission table for `submissionTable`.
    pub table_html: Option<&'a str>,
    /// Language/timezone metadata for the `date` filter.
    pub metadata: Option<&'a RenderMetadata>,
}

impl<'a> TemplateContext<'a> {
    pub fn new(data: &'a Value) -> Self {
        Self {
            data,
            reflect: None,
            table_html: None,
            metadata: None,
        }
    }

    pub fn with_reflect(mut self, root: &'a Root) -> Self {
        self.reflect = Some(root);
        self
    }

    pub fn with_table_html(mut self, html: &'a str) -> Self {
        self.table_html = Some(html);
        self
    }

    pub fn with_metadata(mut self, meta: &'a RenderMetadata) -> Self {
        self.metadata = Some(meta);
        self
    }
}

/// Renders template segments. Interpolated output is entity-escaped at
/// insertion; literal text passes through untouched.
pub(crate) fn eval_template(
    template: &Template,
    ctx: &TemplateContext<'_>,
    timer: &mut ExecutionTimer,
) -> Result<String, TemplateError> {
    let mut out = String::new();
    for segment in &template.segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Output(expr) => {
                let value = eval_expr(expr, ctx, timer)?;
                out.push_str(&escape_html(&value.to_display_string()));
            }
        }
    }
    Ok(out)
}

pub(crate) fn eval_expr(
    expr: &Expr,
    ctx: &TemplateContext<'_>,
    timer: &mut ExecutionTimer,
) -> Result<Value, TemplateError> {
    timer.tick(1)?;

    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(name) => Ok(ctx.data[name.as_str()].clone()),
        Expr::Member(base, name) => {
            let base = eval_expr(base, ctx, timer)?;
            Ok(base[name.as_str()].clone())
        }
        Expr::Index(base, index) => {
            let base = eval_expr(base, ctx, timer)?;
            let index = eval_expr(index, ctx, timer)?;
            Ok(match &index {
                Value::Number(n) if *n >= 0.0 => base[*n as usize].clone(),
                Value::String(s) => base[s.as_ref()].clone(),
                _ => Value::Undefined,
            })
        }
        Expr::Call(name, args) => {
            let Some((f, max_args)) = HELPERS.get(name.as_str()) else {
                return Err(TemplateError::Runtime(format!(
                    "unknown function `{name}`"
                )));
            };
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, ctx, timer)?);
            }
            ensure_max_args(name, &values, *max_args)
                .and_then(|()| f(&values))
                .map_err(|e| TemplateError::Runtime(e.to_string()))
        }
        Expr::Unary(op, inner) => {
            let value = eval_expr(inner, ctx, timer)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                UnaryOp::Neg => match number_of(&value) {
                    Some(n) => Ok(Value::Number(-n)),
                    None => Err(TemplateError::Runtime(format!(
                        "cannot negate `{value}`"
                    ))),
                },
            }
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, ctx, timer),
        Expr::Filter(input, name, args) => {
            let Some((f, max_args)) = FILTERS.get(name.as_str()) else {
                return Err(TemplateError::Runtime(format!("unknown filter `{name}`")));
            };
            let input = eval_expr(input, ctx, timer)?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, ctx, timer)?);
            }
            ensure_max_args(name, &values, *max_args)
                .and_then(|()| f(&input, &values, ctx))
                .map_err(|e| TemplateError::Runtime(e.to_string()))
        }
    }
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &TemplateContext<'_>,
    timer: &mut ExecutionTimer,
) -> Result<Value, TemplateError> {
    // Logic operators short-circuit and yield the deciding operand.
    if matches!(op, BinOp::And | BinOp::Or) {
        let left = eval_expr(lhs, ctx, timer)?;
        let take_right = match op {
            BinOp::And => truthy(&left),
            _ => !truthy(&left),
        };
        return if take_right {
            eval_expr(rhs, ctx, timer)
        } else {
            Ok(left)
        };
    }

    let left = eval_expr(lhs, ctx, timer)?;
    let right = eval_expr(rhs, ctx, timer)?;

    match op {
        BinOp::Add => match (number_of(&left), number_of(&right)) {
            (Some(a), Some(b)) => Ok(Value::Number(a + b)),
            _ => Ok(Value::from(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            ))),
        },
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            let (Some(a), Some(b)) = (number_of(&left), number_of(&right)) else {
                return Err(TemplateError::Runtime(format!(
                    "arithmetic on non-numbers `{left}` and `{right}`"
                )));
            };
            Ok(match op {
                BinOp::Sub => Value::Number(a - b),
                BinOp::Mul => Value::Number(a * b),
                BinOp::Div if b == 0.0 => Value::Undefined,
                BinOp::Div => Value::Number(a / b),
                BinOp::Mod if b == 0.0 => Value::Undefined,
                _ => Value::Number(a % b),
            })
        }
        BinOp::Eq => Ok(Value::Bool(loose_eq(&left, &right))),
        BinOp::Ne => Ok(Value::Bool(!loose_eq(&left, &right))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (number_of(&left), number_of(&right)) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Some(
                    left.to_display_string()
                        .cmp(&right.to_display_string()),
                ),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (number_of(a), number_of(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn number_of(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
