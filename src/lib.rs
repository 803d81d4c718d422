// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A fast, lightweight form submission renderer and sandboxed email template
//! evaluator.
//!
//! Given a declarative form schema and a submission record, `formail` walks
//! the two in lockstep and produces a nested-table HTML document of the
//! visible, data-bearing fields. Message templates — untrusted,
//! user-authored `{{ expression | filter }}` text — evaluate against that
//! rendering inside a sandboxed interpreter under a wall-clock budget:
//! hostile interpolations are neutralized to literal text, the only
//! reachable names are the bound context and fixed helper/filter registries,
//! and a blown budget surfaces as a fatal timeout.
//!
//! ```no_run
//! use formail::{Renderer, Sandbox, TemplateContext, Value};
//!
//! let form = Value::from_json_str(r#"{"components": [
//!     {"key": "name", "type": "textfield", "label": "Name"}
//! ]}"#)?;
//! let submission = Value::from_json_str(r#"{"data": {"name": "Ada"}}"#)?;
//!
//! let mut renderer = Renderer::new();
//! renderer.set_form(&form)?;
//! renderer.set_submission(&submission);
//! let table = renderer.render()?;
//!
//! let sandbox = Sandbox::new();
//! let params = Value::from_json_str(r#"{"data": {"name": "Ada"}}"#)?;
//! let subject = sandbox.render("New entry from {{ data.name }}", &TemplateContext::new(&params))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod conditional;
mod email;
mod error;
mod format;
mod html;
mod limits;
mod paths;
mod reflect;
mod render;
mod renderer;
mod schema;
mod template;
mod value;

pub use conditional::{ConditionalRecord, ConditionalSet};
pub use email::{
    build_email_params, EmailJob, EmailMessage, EmailSettings, MailTransport, Mailer, MailerHook,
    SendReport,
};
pub use error::{MailError, TemplateError, TransportError};
pub use format::PROTECTED_MARKER;
pub use html::{escape_html, unescape_html, HtmlDocument, NodeId};
pub use limits::{ExecutionTimer, ExecutionTimerConfig, LimitError};
pub use paths::ComponentPaths;
pub use reflect::{Instance, Root};
pub use render::{render_submission, RenderMetadata};
pub use renderer::Renderer;
pub use schema::{Component, ComponentKind, ModelKind};
pub use template::{Sandbox, TemplateContext, DEFAULT_TIME_BUDGET};
pub use value::Value;
