// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Path-addressable object graph over a schema and its submission.
//!
//! [`Root`] walks the schema against submission data once, building an arena
//! of [`Instance`]s indexed by every path spelling a node answers to.
//! Template expressions use it for component-level introspection (labels,
//! contextual values, computed defaults) without re-walking the schema.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::Result;

use crate::conditional::ConditionalSet;
use crate::error::TemplateError;
use crate::paths::{self, ComponentPaths};
use crate::schema::{Component, ComponentKind, ModelKind};
use crate::template::{Sandbox, TemplateContext};
use crate::value::Value;

/// One data-bearing schema node paired with its slice of submission data.
#[derive(Debug, Clone)]
pub struct Instance {
    pub component: Component,
    pub paths: ComponentPaths,
    /// Row position when this node lives inside a repeated-row component.
    pub row_index: Option<usize>,
    data: Value,
    value: Value,
}

impl Instance {
    /// The contextual slice of submission data for this node: for a grid-row
    /// field this is only that row's record, not the whole array.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The node's own value within the submission.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn key(&self) -> &str {
        &self.component.key
    }

    pub fn label(&self) -> &str {
        if self.component.label.is_empty() {
            &self.component.key
        } else {
            &self.component.label
        }
    }
}

/// The instance arena plus its path map.
#[derive(Debug)]
pub struct Root {
    form_raw: Value,
    submission: Value,
    conditionals: ConditionalSet,
    instances: Vec<Instance>,
    map: BTreeMap<String, usize>,
    /// Registration order of map keys; the suffix fallback scans this so
    /// "first match wins" stays deterministic.
    order: Vec<String>,
    suffix_cache: RefCell<BTreeMap<String, Option<usize>>>,
}

impl Root {
    /// Builds the graph. `submission_data` is the data object of a
    /// submission, not the submission envelope.
    pub fn new(
        form_value: &Value,
        submission_data: &Value,
        conditionals: &ConditionalSet,
    ) -> Result<Root> {
        let form = Component::form_from_value(form_value)?;
        let mut root = Root {
            form_raw: form_value.clone(),
            submission: submission_data.clone(),
            conditionals: conditionals.clone(),
            instances: vec![],
            map: BTreeMap::new(),
            order: vec![],
            suffix_cache: RefCell::new(BTreeMap::new()),
        };
        let base = ComponentPaths::root();
        for child in form.child_components() {
            root.collect(child, &child_paths(&base, child), None);
        }
        Ok(root)
    }

    fn collect(&mut self, comp: &Component, cp: &ComponentPaths, row_index: Option<usize>) {
        if comp.render_skip() {
            for child in comp.child_components() {
                self.collect(child, &child_paths(cp, child), row_index);
            }
            return;
        }

        let value = self.submission.get_path(&cp.data_path).clone();
        let data = self
            .submission
            .get_path(paths::parent(&cp.data_path))
            .clone();
        let idx = self.instances.len();
        self.instances.push(Instance {
            component: comp.clone(),
            paths: cp.clone(),
            row_index,
            data,
            value: value.clone(),
        });
        for key in [
            &cp.local_path,
            &cp.full_path,
            &cp.data_path,
            &cp.local_data_path,
        ] {
            self.register(key, idx);
        }

        match comp.model() {
            ModelKind::Nested => {
                for child in comp.child_components() {
                    self.collect(child, &child_paths(cp, child), row_index);
                }
            }
            ModelKind::Array => {
                let count = value.as_array().map(|a| a.len()).unwrap_or(0);
                for i in 0..count {
                    let row_paths = cp.row(i);
                    for child in comp.child_components() {
                        self.collect(child, &child_paths(&row_paths, child), Some(i));
                    }
                }
            }
            // Map entries are user-keyed, address sub-fields duplicate the
            // parent's resolved value; neither contributes instances.
            _ => {}
        }
    }

    // First registration wins: colliding path spellings never displace an
    // earlier instance.
    fn register(&mut self, key: &str, idx: usize) {
        if key.is_empty() {
            return;
        }
        if !self.map.contains_key(key) {
            self.map.insert(key.to_string(), idx);
            self.order.push(key.to_string());
        }
    }

    /// Resolves a component by path: exact match first, then a fallback that
    /// matches the trailing segment of registered keys in registration order
    /// (first match wins), caching the resolution for future lookups.
    pub fn get_component(&self, path: &str) -> Option<&Instance> {
        if path.is_empty() {
            return None;
        }
        if let Some(&idx) = self.map.get(path) {
            return Some(&self.instances[idx]);
        }
        if let Some(cached) = self.suffix_cache.borrow().get(path) {
            return cached.map(|idx| &self.instances[idx]);
        }
        let suffix = format!(".{path}");
        let hit = self
            .order
            .iter()
            .find(|key| key.ends_with(&suffix))
            .map(|key| self.map[key]);
        self.suffix_cache
            .borrow_mut()
            .insert(path.to_string(), hit);
        hit.map(|idx| &self.instances[idx])
    }

    /// The value at this node's exact path in submission data.
    pub fn data_value(&self, inst: &Instance) -> Value {
        self.submission.get_path(&inst.paths.data_path).clone()
    }

    /// Writes through to the submission data. Sanctioned for expression side
    /// effects; rendering never depends on it.
    pub fn set_data_value(&mut self, path: &str, value: Value) -> Result<()> {
        let data_path = match self.get_component(path) {
            Some(inst) => inst.paths.data_path.clone(),
            None => path.to_string(),
        };
        self.submission.set_path(&data_path, value)
    }

    /// False when any conditional verdict hides this path or an ancestor of
    /// it, or the component itself is flagged hidden.
    pub fn visible(&self, inst: &Instance) -> bool {
        !inst.component.hidden
            && !self
                .conditionals
                .hidden_with_ancestors(&inst.paths.data_path)
            && !self
                .conditionals
                .hidden_with_ancestors(&inst.paths.local_path)
    }

    /// Parent instance, resolved by truncating trailing path segments.
    pub fn parent(&self, inst: &Instance) -> Option<&Instance> {
        let mut current = paths::parent(&inst.paths.data_path);
        while !current.is_empty() {
            let candidate = paths::strip_trailing_index(current);
            if let Some(&idx) = self.map.get(candidate) {
                return Some(&self.instances[idx]);
            }
            current = paths::parent(candidate);
        }
        None
    }

    pub fn submission_data(&self) -> &Value {
        &self.submission
    }

    pub fn form_value(&self) -> &Value {
        &self.form_raw
    }

    /// Evaluates the component's configured default-value expression in the
    /// sandbox, with a context restricted to the form, the component, the
    /// submission and this node's data slice. `Undefined` when the component
    /// declares no expression.
    pub fn custom_default_value(
        &self,
        inst: &Instance,
        sandbox: &Sandbox,
    ) -> Result<Value, TemplateError> {
        let Some(expr) = inst.component.prop_str("customDefaultValue") else {
            return Ok(Value::Undefined);
        };

        let mut submission = BTreeMap::new();
        submission.insert(Rc::from("data"), self.submission.clone());
        let mut config = BTreeMap::new();
        config.insert(Rc::from("server"), Value::Bool(true));
        let mut ctx = BTreeMap::new();
        ctx.insert(Rc::from("form"), self.form_raw.clone());
        ctx.insert(Rc::from("component"), inst.component.properties.clone());
        ctx.insert(Rc::from("submission"), Value::from(submission));
        ctx.insert(Rc::from("data"), inst.data.clone());
        ctx.insert(Rc::from("config"), Value::from(config));
        let data = Value::from(ctx);

        sandbox.evaluate(expr, &TemplateContext::new(&data))
    }
}

fn child_paths(parent: &ComponentPaths, comp: &Component) -> ComponentPaths {
    parent.child(
        &comp.key,
        comp.extends_data_path(),
        comp.kind == ComponentKind::Form,
    )
}
