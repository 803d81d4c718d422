// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::conditional::ConditionalSet;
use crate::html::HtmlDocument;
use crate::reflect::Root;
use crate::render::{render_submission, RenderMetadata};
use crate::schema::Component;
use crate::value::Value;

/// The submission rendering engine.
///
/// Feed it a form definition, a submission and optional visibility verdicts
/// and metadata, then call [`Renderer::render`] for the nested-table HTML.
#[derive(Debug, Default)]
pub struct Renderer {
    form_raw: Option<Value>,
    form: Option<Component>,
    submission_data: Value,
    submission_timezone: Option<String>,
    submission_select_data: BTreeMap<String, Value>,
    conditionals: ConditionalSet,
    metadata: RenderMetadata,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            submission_data: Value::new_object(),
            ..Self::default()
        }
    }

    pub fn set_form(&mut self, form: &Value) -> Result<()> {
        self.form = Some(Component::form_from_value(form)?);
        self.form_raw = Some(form.clone());
        Ok(())
    }

    /// Accepts either a submission envelope (`{"data": ..., "metadata": ...}`)
    /// or a bare data object. Envelope metadata contributes the submission
    /// timezone and dynamically-resolved select labels.
    pub fn set_submission(&mut self, submission: &Value) {
        let data = &submission["data"];
        self.submission_data = match data {
            Value::Object(_) => data.clone(),
            _ => submission.clone(),
        };

        let metadata = &submission["metadata"];
        self.submission_timezone = metadata["timezone"].as_str().map(str::to_string);
        self.submission_select_data.clear();
        if let Ok(entries) = metadata["selectData"].as_object() {
            for (path, labels) in entries.iter() {
                self.submission_select_data
                    .insert(path.to_string(), labels.clone());
            }
        }
    }

    pub fn set_conditionals(&mut self, conditionals: ConditionalSet) {
        self.conditionals = conditionals;
    }

    pub fn set_metadata(&mut self, metadata: RenderMetadata) {
        self.metadata = metadata;
    }

    /// Renders to the final markup string.
    pub fn render(&self) -> Result<String> {
        Ok(self.render_document()?.to_html_string())
    }

    pub fn render_document(&self) -> Result<HtmlDocument> {
        let Some(form) = &self.form else {
            bail!("no form definition set");
        };
        let meta = self.effective_metadata();
        Ok(render_submission(
            form,
            &self.submission_data,
            &self.conditionals,
            &meta,
        ))
    }

    /// Builds the reflection graph for the current form and submission.
    pub fn reflect(&self) -> Result<Root> {
        let Some(form_raw) = &self.form_raw else {
            bail!("no form definition set");
        };
        Root::new(form_raw, &self.submission_data, &self.conditionals)
    }

    pub fn submission_data(&self) -> &Value {
        &self.submission_data
    }

    // Caller metadata wins; submission metadata fills the gaps.
    fn effective_metadata(&self) -> RenderMetadata {
        let mut meta = self.metadata.clone();
        if meta.submission_timezone.is_none() {
            meta.submission_timezone = self.submission_timezone.clone();
        }
        for (path, labels) in &self.submission_select_data {
            meta.select_data
                .entry(path.clone())
                .or_insert_with(|| labels.clone());
        }
        meta
    }
}
