// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Sandboxed evaluation of `{{ expression | filter(args) }}` templates.
//!
//! The pipeline is sanitize, compile, evaluate under a wall-clock budget,
//! then reverse the entity auto-escaping exactly once on the final string.
//! Evaluation can only reach the supplied context value and the fixed
//! helper/filter registries; there is no filesystem, network, process or
//! host-global access to leak.

mod filters;
mod interp;
mod lexer;
mod parser;
mod sanitize;

pub use interp::TemplateContext;
pub use parser::{parse_expression, parse_template, Template};
pub use sanitize::sanitize;

use crate::error::TemplateError;
use crate::limits::{ExecutionTimer, ExecutionTimerConfig};
use crate::value::Value;

use std::collections::BTreeMap;
use std::time::Duration;

/// Default per-evaluation wall-clock budget.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_millis(500);

/// The template evaluator. Stateless apart from its configured budget, so a
/// single instance can be reused across calls; every call binds its own
/// context and timer.
#[derive(Debug, Clone)]
pub struct Sandbox {
    budget: Option<ExecutionTimerConfig>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            budget: Some(ExecutionTimerConfig::new(DEFAULT_TIME_BUDGET)),
        }
    }

    pub fn with_budget(limit: Duration) -> Self {
        Self {
            budget: Some(ExecutionTimerConfig::new(limit)),
        }
    }

    /// No deadline. Only for trusted callers such as tests.
    pub fn unlimited() -> Self {
        Self { budget: None }
    }

    /// Renders a single template against the context. The returned string has
    /// been entity-unescaped exactly once, ready for inlining into an HTML
    /// body.
    pub fn render(
        &self,
        template: &str,
        ctx: &TemplateContext<'_>,
    ) -> Result<String, TemplateError> {
        let sanitized = sanitize::sanitize(template);
        let compiled = parser::parse_template(&sanitized)
            .map_err(|e| TemplateError::Syntax(e.to_string()))?;
        let mut timer = ExecutionTimer::new(self.budget);
        timer.start();
        let escaped = interp::eval_template(&compiled, ctx, &mut timer)?;
        Ok(crate::html::unescape_html(&escaped))
    }

    /// Evaluates a bare expression (no `{{ }}` delimiters) to a value.
    pub fn evaluate(
        &self,
        expression: &str,
        ctx: &TemplateContext<'_>,
    ) -> Result<Value, TemplateError> {
        if sanitize::is_hostile(expression) {
            log::warn!("refusing to evaluate host-escaping expression");
            return Ok(Value::Undefined);
        }
        let compiled = parser::parse_expression(expression)
            .map_err(|e| TemplateError::Syntax(e.to_string()))?;
        let mut timer = ExecutionTimer::new(self.budget);
        timer.start();
        interp::eval_expr(&compiled, ctx, &mut timer)
    }

    /// Renders a map of named template fields. Each field is evaluated
    /// independently: a syntax or runtime error degrades that field to
    /// `Null` (and is logged), while a timeout aborts the whole map.
    pub fn render_map(
        &self,
        fields: &BTreeMap<String, String>,
        ctx: &TemplateContext<'_>,
    ) -> Result<BTreeMap<String, Value>, TemplateError> {
        let mut out = BTreeMap::new();
        for (name, template) in fields {
            match self.render(template, ctx) {
                Ok(rendered) => {
                    out.insert(name.clone(), Value::from(rendered));
                }
                Err(e @ TemplateError::Timeout(_)) => return Err(e),
                Err(e) => {
                    log::warn!("template field `{name}` failed to evaluate: {e}");
                    out.insert(name.clone(), Value::Null);
                }
            }
        }
        Ok(out)
    }
}
