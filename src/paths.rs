// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Path bookkeeping for schema traversal.
//!
//! Components are addressed by dotted paths in which numeric segments index
//! into repeated-row data (`children.2.name`). Every node carries four
//! spellings at once: the schema-relative full path, the path local to the
//! nearest nested form, and the data-path variants of both (layout wrappers
//! appear in the full path but never in the data path).

/// The path spellings carried while walking a schema in lockstep with data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentPaths {
    /// Path local to the nearest enclosing nested form.
    pub local_path: String,
    /// Schema-relative path from the root, including layout keys.
    pub full_path: String,
    /// Position of this node's value within the submission data.
    pub data_path: String,
    /// Data path local to the nearest enclosing nested form.
    pub local_data_path: String,
}

impl ComponentPaths {
    pub fn root() -> Self {
        Self::default()
    }

    /// Descend into a child component. Layout-only wrappers extend the full
    /// path but are transparent to data; nested forms reset the local scope.
    pub fn child(&self, key: &str, extends_data: bool, resets_local: bool) -> Self {
        let full_path = join(&self.full_path, key);
        let (local_path, data_path, local_data_path) = if extends_data {
            (
                join(&self.local_path, key),
                join(&self.data_path, key),
                join(&self.local_data_path, key),
            )
        } else {
            (
                self.local_path.clone(),
                self.data_path.clone(),
                self.local_data_path.clone(),
            )
        };
        if resets_local {
            return Self {
                local_path: String::new(),
                full_path,
                data_path,
                local_data_path: String::new(),
            };
        }
        Self {
            local_path,
            full_path,
            data_path,
            local_data_path,
        }
    }

    /// Descend into row `index` of a repeated-row component.
    pub fn row(&self, index: usize) -> Self {
        let idx = index.to_string();
        Self {
            local_path: self.local_path.clone(),
            full_path: self.full_path.clone(),
            data_path: join(&self.data_path, &idx),
            local_data_path: join(&self.local_data_path, &idx),
        }
    }
}

pub fn join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else if segment.is_empty() {
        base.to_string()
    } else {
        format!("{base}.{segment}")
    }
}

/// Everything before the final `.` segment, or `""` for a single segment.
pub fn parent(path: &str) -> &str {
    match path.rfind('.') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

pub fn last_segment(path: &str) -> &str {
    match path.rfind('.') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Drops a trailing numeric row-index segment, if present.
pub fn strip_trailing_index(path: &str) -> &str {
    if last_segment(path).parse::<usize>().is_ok() {
        parent(path)
    } else {
        path
    }
}

/// True when `path` equals `prefix` or sits underneath it.
pub fn is_under(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    path == prefix || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'.'))
}

/// The repeated-row ancestor a cell path belongs to: its own key and the row
/// index are stripped (`grid.2.name` -> `grid`).
pub fn row_ancestor(data_path: &str) -> &str {
    strip_trailing_index(parent(data_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_paths() {
        let root = ComponentPaths::root();
        let panel = root.child("panel1", false, false);
        assert_eq!(panel.full_path, "panel1");
        assert_eq!(panel.data_path, "");

        let field = panel.child("name", true, false);
        assert_eq!(field.full_path, "panel1.name");
        assert_eq!(field.data_path, "name");
        assert_eq!(field.local_path, "name");
    }

    #[test]
    fn test_row_paths() {
        let grid = ComponentPaths::root().child("children", true, false);
        let cell = grid.row(1).child("age", true, false);
        assert_eq!(cell.data_path, "children.1.age");
        assert_eq!(cell.full_path, "children.age");
    }

    #[test]
    fn test_nested_form_resets_local() {
        let form = ComponentPaths::root()
            .child("outer", true, false)
            .child("child", true, true);
        assert_eq!(form.full_path, "outer.child");
        assert_eq!(form.local_path, "");
        let inner = form.child("inner", true, false);
        assert_eq!(inner.local_path, "inner");
        assert_eq!(inner.data_path, "outer.child.inner");
    }

    #[test]
    fn test_row_ancestor() {
        assert_eq!(row_ancestor("grid.2.name"), "grid");
        assert_eq!(row_ancestor("a.grid.0.name"), "a.grid");
        assert_eq!(row_ancestor("name"), "");
    }

    #[test]
    fn test_is_under() {
        assert!(is_under("a.b.c", "a.b"));
        assert!(is_under("a.b", "a.b"));
        assert!(!is_under("a.bc", "a.b"));
        assert!(is_under("anything", ""));
    }

    #[test]
    fn test_strip_trailing_index() {
        assert_eq!(strip_trailing_index("grid.2"), "grid");
        assert_eq!(strip_trailing_index("grid"), "grid");
        assert_eq!(strip_trailing_index("grid.x"), "grid.x");
    }
}
