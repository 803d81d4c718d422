// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::paths;
use crate::value::Value;

/// Visibility verdict for one component path, computed by form-logic rules
/// before rendering. Consulted, never mutated, by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalRecord {
    pub path: String,
    pub conditionally_hidden: bool,
}

/// The set of precomputed verdicts for a render pass.
#[derive(Debug, Clone, Default)]
pub struct ConditionalSet {
    records: Vec<ConditionalRecord>,
}

impl ConditionalSet {
    pub fn new(records: Vec<ConditionalRecord>) -> Self {
        Self { records }
    }

    /// Parses `[{"path": ..., "conditionallyHidden": ...}, ...]`.
    /// Entries without a path are ignored.
    pub fn from_value(v: &Value) -> Self {
        let mut records = vec![];
        if let Ok(items) = v.as_array() {
            for item in items.iter() {
                if let Some(path) = item["path"].as_str() {
                    records.push(ConditionalRecord {
                        path: path.to_string(),
                        conditionally_hidden: item["conditionallyHidden"]
                            .as_bool()
                            .unwrap_or(false),
                    });
                }
            }
        }
        Self { records }
    }

    pub fn push(&mut self, path: impl Into<String>, conditionally_hidden: bool) {
        self.records.push(ConditionalRecord {
            path: path.into(),
            conditionally_hidden,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact-path verdict.
    pub fn hidden(&self, path: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.conditionally_hidden && r.path == path)
    }

    /// True when the path itself or any ancestor path is marked hidden.
    pub fn hidden_with_ancestors(&self, path: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.conditionally_hidden && paths::is_under(path, &r.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_ancestor_lookup() {
        let mut set = ConditionalSet::default();
        set.push("panel.secret", true);
        set.push("panel.shown", false);

        assert!(set.hidden("panel.secret"));
        assert!(!set.hidden("panel.shown"));
        assert!(!set.hidden("panel"));
        assert!(set.hidden_with_ancestors("panel.secret.inner"));
        assert!(!set.hidden_with_ancestors("panel.shown.inner"));
    }

    #[test]
    fn test_from_value() {
        let v = Value::from_json_str(
            r#"[{"path": "a", "conditionallyHidden": true}, {"conditionallyHidden": true}]"#,
        )
        .unwrap();
        let set = ConditionalSet::from_value(&v);
        assert!(set.hidden("a"));
        assert!(!set.hidden("b"));
    }
}
