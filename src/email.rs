// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Message assembly and batched dispatch.
//!
//! A job carries a message whose string fields may contain template text,
//! plus the context value the templates evaluate against. Rendering happens
//! per job in the sandbox; sends are dispatched in fixed-size batches where
//! every job in a batch settles before the next batch starts, bounding the
//! number of in-flight transport calls. A failing job never cancels its
//! siblings; a vetoed send is a silent no-op.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::conditional::ConditionalSet;
use crate::error::{MailError, TransportError};
use crate::reflect::Root;
use crate::template::{Sandbox, TemplateContext};
use crate::value::Value;

/// The outbound message handed to a transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub transport: String,
    pub rendering_method: String,
}

/// Result of a settled send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    /// True when a hook vetoed the send and the message was discarded.
    pub skipped: bool,
    pub message_id: Option<String>,
}

impl SendReport {
    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            skipped: false,
            message_id: Some(message_id.into()),
        }
    }

    pub fn skipped() -> Self {
        Self {
            skipped: true,
            message_id: None,
        }
    }
}

/// The outbound transport abstraction. Implementations wrap SMTP or
/// API-based senders; this crate never talks to the network itself.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_mail(&self, message: &EmailMessage) -> Result<SendReport, TransportError>;
}

/// Project-level interception of the final rendered message.
pub trait MailerHook: Send + Sync {
    /// Returning `None` vetoes the send; the message is discarded silently.
    fn intercept(&self, message: EmailMessage) -> Option<EmailMessage> {
        Some(message)
    }
}

/// Transport/batching configuration, deserializable from project settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailSettings {
    pub from: String,
    pub transport: String,
    /// Jobs dispatched concurrently per batch.
    pub batch_size: usize,
    /// Wall-clock budget per template evaluation, in milliseconds.
    pub evaluate_timeout_ms: u64,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            from: "no-reply@example.com".to_string(),
            transport: "smtp".to_string(),
            batch_size: 100,
            evaluate_timeout_ms: 500,
        }
    }
}

/// One message to render and send.
#[derive(Debug, Clone)]
pub struct EmailJob {
    pub message: EmailMessage,
    /// The interpolation namespace for this job's templates.
    pub context: Value,
    /// Pre-rendered submission table, injected by the `submissionTable`
    /// filter.
    pub table_html: Option<String>,
}

const ALLOWED_REQUEST_FIELDS: &[&str] = &["user", "token", "params", "query"];
const ALLOWED_RESPONSE_FIELDS: &[&str] = &["token"];

/// Builds the interpolation namespace for message templates. The request and
/// response objects are projected through explicit allow-lists; nothing else
/// of the HTTP layer is visible to template authors.
pub fn build_email_params(
    form: &Value,
    submission: &Value,
    table_html: &str,
    req: &Value,
    res: &Value,
    settings: &Value,
) -> Value {
    let mut params = Value::new_object();
    let set = |params: &mut Value, key: &str, value: Value| {
        // Building a fresh object; the only failure mode is a non-object
        // root, which new_object precludes.
        let _ = params.set_path(key, value);
    };
    set(&mut params, "form", form.clone());
    set(&mut params, "submission", submission.clone());
    set(&mut params, "data", submission["data"].clone());
    set(&mut params, "content", Value::from(table_html));
    set(&mut params, "settings", settings.clone());
    set(&mut params, "req", project(req, ALLOWED_REQUEST_FIELDS));
    set(&mut params, "res", project(res, ALLOWED_RESPONSE_FIELDS));
    params
}

fn project(v: &Value, allowed: &[&str]) -> Value {
    let mut out = Value::new_object();
    for field in allowed {
        let slice = &v[*field];
        if !slice.is_undefined() {
            let _ = out.set_path(field, slice.clone());
        }
    }
    out
}

/// Renders and dispatches message jobs.
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    hook: Option<Arc<dyn MailerHook>>,
    settings: EmailSettings,
    sandbox: Sandbox,
}

impl Mailer {
    pub fn new(transport: Arc<dyn MailTransport>, settings: EmailSettings) -> Self {
        let sandbox = Sandbox::with_budget(Duration::from_millis(settings.evaluate_timeout_ms));
        Self {
            transport,
            hook: None,
            settings,
            sandbox,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn MailerHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn settings(&self) -> &EmailSettings {
        &self.settings
    }

    /// Renders a job's template fields into a concrete message and runs the
    /// hook. `Ok(None)` means the hook vetoed the send.
    fn prepare(&self, job: &EmailJob) -> Result<Option<EmailMessage>, MailError> {
        let form = &job.context["form"];
        let submission_data = &job.context["submission"]["data"];
        let root = match form {
            Value::Object(_) => {
                Root::new(form, submission_data, &ConditionalSet::default()).ok()
            }
            _ => None,
        };

        let mut ctx = TemplateContext::new(&job.context);
        if let Some(root) = &root {
            ctx = ctx.with_reflect(root);
        }
        if let Some(table) = &job.table_html {
            ctx = ctx.with_table_html(table);
        }

        let mut fields = BTreeMap::new();
        fields.insert("from".to_string(), job.message.from.clone());
        fields.insert("to".to_string(), job.message.to.clone());
        fields.insert("subject".to_string(), job.message.subject.clone());
        fields.insert("html".to_string(), job.message.html.clone());
        if let Some(cc) = &job.message.cc {
            fields.insert("cc".to_string(), cc.clone());
        }
        if let Some(bcc) = &job.message.bcc {
            fields.insert("bcc".to_string(), bcc.clone());
        }
        if let Some(reply_to) = &job.message.reply_to {
            fields.insert("replyTo".to_string(), reply_to.clone());
        }

        let rendered = self.sandbox.render_map(&fields, &ctx)?;

        let mut message = job.message.clone();
        apply_field(&mut message.from, rendered.get("from"));
        apply_field(&mut message.to, rendered.get("to"));
        apply_field(&mut message.subject, rendered.get("subject"));
        apply_field(&mut message.html, rendered.get("html"));
        if let Some(cc) = message.cc.as_mut() {
            apply_field(cc, rendered.get("cc"));
        }
        if let Some(bcc) = message.bcc.as_mut() {
            apply_field(bcc, rendered.get("bcc"));
        }
        if let Some(reply_to) = message.reply_to.as_mut() {
            apply_field(reply_to, rendered.get("replyTo"));
        }
        if message.transport.is_empty() {
            message.transport = self.settings.transport.clone();
        }
        if message.from.is_empty() {
            message.from = self.settings.from.clone();
        }

        match &self.hook {
            Some(hook) => Ok(hook.intercept(message)),
            None => Ok(Some(message)),
        }
    }

    /// Renders and sends a single job.
    pub async fn send(&self, job: &EmailJob) -> Result<SendReport, MailError> {
        match self.prepare(job)? {
            None => {
                log::debug!("send vetoed by hook, message discarded");
                Ok(SendReport::skipped())
            }
            Some(message) => self
                .transport
                .send_mail(&message)
                .await
                .map_err(MailError::from),
        }
    }

    /// Dispatches jobs in fixed-size batches. Within a batch every send runs
    /// concurrently and the batch settles before the next one starts. Each
    /// job resolves independently: a timeout or transport failure occupies
    /// that job's result slot without cancelling siblings, and nothing is
    /// retried.
    pub async fn send_all(&self, jobs: &[EmailJob]) -> Vec<Result<SendReport, MailError>> {
        let batch_size = self.settings.batch_size.max(1);
        let mut results = Vec::with_capacity(jobs.len());
        for batch in jobs.chunks(batch_size) {
            let dispatched: Vec<_> = batch
                .iter()
                .map(|job| {
                    let prepared = self.prepare(job);
                    let transport = Arc::clone(&self.transport);
                    async move {
                        match prepared? {
                            None => {
                                log::debug!("send vetoed by hook, message discarded");
                                Ok(SendReport::skipped())
                            }
                            Some(message) => transport
                                .send_mail(&message)
                                .await
                                .map_err(MailError::from),
                        }
                    }
                })
                .collect();
            results.extend(join_all(dispatched).await);
        }
        results
    }
}

fn apply_field(slot: &mut String, rendered: Option<&Value>) {
    match rendered {
        Some(Value::String(s)) => *slot = s.to_string(),
        Some(Value::Null) => slot.clear(),
        _ => {}
    }
}
