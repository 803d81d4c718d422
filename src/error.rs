// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::limits::LimitError;

use thiserror::Error;

/// Failures raised while evaluating untrusted template text.
///
/// `Timeout` is fatal for the whole job and must propagate to the caller;
/// syntax and runtime errors degrade to a null field when rendering a map of
/// named fields.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template evaluation timed out: {0}")]
    Timeout(#[from] LimitError),
    #[error("template syntax error: {0}")]
    Syntax(String),
    #[error("template evaluation failed: {0}")]
    Runtime(String),
}

impl TemplateError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TemplateError::Timeout(_))
    }
}

/// An outbound send failure, carried in the per-job slot of a batch report.
#[derive(Debug, Clone, Error)]
#[error("mail transport `{transport}` failed: {reason}")]
pub struct TransportError {
    pub transport: String,
    pub reason: String,
}

/// Per-job failure of a message send.
#[derive(Debug, Error)]
pub enum MailError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
