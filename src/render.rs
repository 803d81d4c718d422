// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lockstep traversal of schema and submission data into nested table markup.
//!
//! The walker visits components in declaration order, resolves each node's
//! value through its data path and dispatches to the per-kind formatters.
//! Repeated-row components (grids, tag pads) establish an ancestor scope that
//! turns descendant emissions into cells of a synthetic row instead of
//! label/value rows; the scope is threaded down the recursion by value so it
//! resets on return without any external mutable state.
//!
//! Every emitted row, header and cell carries a synthetic id derived from the
//! component path. Emission checks for the id first, which makes re-visiting
//! a path a no-op rather than a duplicate.

use std::collections::BTreeMap;

use crate::conditional::ConditionalSet;
use crate::format::{address_in_manual_mode, format_value, CellContent};
use crate::html::{HtmlDocument, NodeId};
use crate::paths::{self, ComponentPaths};
use crate::schema::{Component, ComponentKind, ModelKind};
use crate::value::Value;

/// Caller-supplied context for a render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderMetadata {
    pub language: String,
    /// Viewer timezone, the fallback for date display.
    pub timezone: Option<String>,
    /// Timezone recorded when the submission was made.
    pub submission_timezone: Option<String>,
    /// Display labels for dynamically-sourced choice components, keyed by
    /// component data path. Must be supplied by the caller for any choice
    /// component whose options cannot be resolved during rendering.
    pub select_data: BTreeMap<String, Value>,
}

const TABLE_ATTRS: &[(&str, &str)] = &[
    ("border", "1"),
    ("cellpadding", "5"),
    ("cellspacing", "0"),
    ("style", "width:100%"),
];

const LABEL_STYLE: &str = "text-align:right;padding:5px 10px;";
const VALUE_STYLE: &str = "padding:5px 10px;";
const HEADER_STYLE: &str = "text-align:left;padding:5px 10px;";

/// Renders a submission into a nested-table document.
pub fn render_submission(
    form: &Component,
    data: &Value,
    conditionals: &ConditionalSet,
    meta: &RenderMetadata,
) -> HtmlDocument {
    let mut doc = HtmlDocument::new("table", TABLE_ATTRS);
    let walker = Walker {
        data,
        conditionals,
        meta,
    };
    let root_table = doc.root();
    let scope = AncestorScope::default();
    for child in form.child_components() {
        let cp = child_paths(&ComponentPaths::root(), child);
        walker.walk(&mut doc, root_table, child, &cp, &scope);
    }
    doc
}

fn child_paths(parent: &ComponentPaths, comp: &Component) -> ComponentPaths {
    parent.child(
        &comp.key,
        comp.extends_data_path(),
        comp.kind == ComponentKind::Form,
    )
}

fn id_for(p: &ComponentPaths) -> &str {
    if p.data_path.is_empty() {
        &p.full_path
    } else {
        &p.data_path
    }
}

fn label(comp: &Component) -> &str {
    if comp.label.is_empty() {
        &comp.key
    } else {
        &comp.label
    }
}

/// The repeated-row ancestor currently in scope. `table` is the synthetic
/// table rows and headers are emitted into.
#[derive(Debug, Clone)]
struct RowScope {
    id: String,
    table: NodeId,
    row_index: usize,
}

#[derive(Debug, Clone, Default)]
struct AncestorScope {
    grid: Option<RowScope>,
    /// Same mechanism for tag-indexed repeaters, which additionally prefix
    /// each row with a 1-based index cell.
    tag: Option<RowScope>,
}

struct Walker<'a> {
    data: &'a Value,
    conditionals: &'a ConditionalSet,
    meta: &'a RenderMetadata,
}

impl Walker<'_> {
    fn walk(
        &self,
        doc: &mut HtmlDocument,
        table: NodeId,
        comp: &Component,
        cp: &ComponentPaths,
        scope: &AncestorScope,
    ) {
        if comp.hidden {
            return;
        }
        // Visibility verdicts may be recorded under any path spelling.
        if self.conditionals.hidden(&cp.local_path)
            || self.conditionals.hidden(&cp.data_path)
            || self.conditionals.hidden(&cp.full_path)
        {
            return;
        }

        if comp.render_skip() {
            for child in comp.child_components() {
                let child_cp = child_paths(cp, child);
                self.walk(doc, table, child, &child_cp, scope);
            }
            return;
        }

        match comp.model() {
            ModelKind::Nested => self.walk_nested(doc, table, comp, cp, scope),
            ModelKind::Array => self.walk_rows(doc, table, comp, cp, scope),
            ModelKind::Map => self.walk_map(doc, table, comp, cp, scope),
            _ => {
                let value = self.data.get_path(&cp.data_path).clone();
                let content = format_value(doc, comp, &value, &cp.data_path, self.meta);
                self.place(doc, table, comp, cp, scope, content);

                if comp.kind == ComponentKind::Address {
                    // Sub-fields only carry their own values in manual entry
                    // mode; a provider-resolved address already contains them.
                    if address_in_manual_mode(&value) {
                        let addr_paths = cp.child("address", true, false);
                        for child in comp.child_components() {
                            let child_cp = child_paths(&addr_paths, child);
                            self.walk(doc, table, child, &child_cp, scope);
                        }
                    }
                }
            }
        }
    }

    fn walk_nested(
        &self,
        doc: &mut HtmlDocument,
        table: NodeId,
        comp: &Component,
        cp: &ComponentPaths,
        scope: &AncestorScope,
    ) {
        let row_id = format!("row-{}", id_for(cp));
        if doc.element_by_id(&row_id).is_some() {
            return;
        }
        let table_id = format!("table-{}", id_for(cp));
        let nested = doc.element(
            "table",
            &[
                ("id", table_id.as_str()),
                ("border", "1"),
                ("cellpadding", "5"),
                ("cellspacing", "0"),
            ],
        );
        for child in comp.child_components() {
            let child_cp = child_paths(cp, child);
            self.walk(doc, nested, child, &child_cp, scope);
        }
        self.place(doc, table, comp, cp, scope, CellContent::Node(nested));
    }

    fn walk_rows(
        &self,
        doc: &mut HtmlDocument,
        table: NodeId,
        comp: &Component,
        cp: &ComponentPaths,
        scope: &AncestorScope,
    ) {
        let row_id = format!("row-{}", id_for(cp));
        if doc.element_by_id(&row_id).is_some() {
            return;
        }

        let value = self.data.get_path(&cp.data_path);
        let empty = vec![];
        let records = match value.as_array() {
            Ok(items) => items,
            Err(_) => {
                if !value.is_empty() {
                    log::debug!(
                        "expected an array at `{}`, rendering as empty",
                        cp.data_path
                    );
                }
                &empty
            }
        };

        let grid_id = format!("grid-{}", id_for(cp));
        let grid_table = doc.element(
            "table",
            &[
                ("id", grid_id.as_str()),
                ("border", "1"),
                ("cellpadding", "5"),
                ("cellspacing", "0"),
            ],
        );

        for row_index in 0..records.len() {
            let row_paths = cp.row(row_index);
            let mut row_scope = scope.clone();
            let rs = RowScope {
                id: cp.data_path.clone(),
                table: grid_table,
                row_index,
            };
            if comp.is_tag_indexed() {
                row_scope.tag = Some(rs);
            } else {
                row_scope.grid = Some(rs);
            }
            for child in comp.child_components() {
                let child_cp = child_paths(&row_paths, child);
                self.walk(doc, grid_table, child, &child_cp, &row_scope);
            }
        }

        self.place(doc, table, comp, cp, scope, CellContent::Node(grid_table));
    }

    fn walk_map(
        &self,
        doc: &mut HtmlDocument,
        table: NodeId,
        comp: &Component,
        cp: &ComponentPaths,
        scope: &AncestorScope,
    ) {
        let row_id = format!("row-{}", id_for(cp));
        if doc.element_by_id(&row_id).is_some() {
            return;
        }
        let map_id = format!("map-{}", id_for(cp));
        let nested = doc.element(
            "table",
            &[
                ("id", map_id.as_str()),
                ("border", "1"),
                ("cellpadding", "5"),
                ("cellspacing", "0"),
            ],
        );
        let value = self.data.get_path(&cp.data_path);
        if let Ok(entries) = value.as_object() {
            // One generic label/value row per user-entered key.
            for (key, entry) in entries.iter() {
                let entry_row_id = format!("row-{}.{}", id_for(cp), key);
                if doc.element_by_id(&entry_row_id).is_some() {
                    continue;
                }
                let tr = doc.element("tr", &[("id", entry_row_id.as_str())]);
                let th = doc.append_element(tr, "th", &[("style", LABEL_STYLE)]);
                doc.append_text(th, key);
                let td = doc.append_element(tr, "td", &[("style", VALUE_STYLE)]);
                doc.append_text(td, &entry.to_display_string());
                doc.append(nested, tr);
            }
        }
        self.place(doc, table, comp, cp, scope, CellContent::Node(nested));
    }

    /// Emits content either as a cell of the enclosing synthetic row (when
    /// the nearest repeated-row ancestor is the immediate parent) or as a
    /// plain label/value row in the current table.
    fn place(
        &self,
        doc: &mut HtmlDocument,
        table: NodeId,
        comp: &Component,
        cp: &ComponentPaths,
        scope: &AncestorScope,
        content: CellContent,
    ) {
        if let Some(grid) = &scope.grid {
            if paths::row_ancestor(&cp.data_path) == grid.id {
                self.place_row_cell(doc, comp, cp, grid, false, content);
                return;
            }
        }
        if let Some(tag) = &scope.tag {
            if paths::row_ancestor(&cp.data_path) == tag.id {
                self.place_row_cell(doc, comp, cp, tag, true, content);
                return;
            }
        }

        let row_id = format!("row-{}", id_for(cp));
        if doc.element_by_id(&row_id).is_some() {
            return;
        }
        let tr = doc.element("tr", &[("id", row_id.as_str())]);
        let th = doc.append_element(tr, "th", &[("style", LABEL_STYLE)]);
        doc.append_text(th, label(comp));
        let td = doc.append_element(tr, "td", &[("style", VALUE_STYLE)]);
        match content {
            CellContent::Text(s) => doc.append_text(td, &s),
            CellContent::Node(n) => doc.append(td, n),
        }
        doc.append(table, tr);
    }

    fn place_row_cell(
        &self,
        doc: &mut HtmlDocument,
        comp: &Component,
        cp: &ComponentPaths,
        row: &RowScope,
        indexed: bool,
        content: CellContent,
    ) {
        // Header cell for this column, created the first time any record
        // populates it.
        let head_row_id = format!("gridhead-{}", row.id);
        let head_row = match doc.element_by_id(&head_row_id) {
            Some(n) => n,
            None => {
                let n = doc.element("tr", &[("id", head_row_id.as_str())]);
                doc.prepend(row.table, n);
                if indexed {
                    doc.append_element(n, "th", &[]);
                }
                n
            }
        };
        let head_cell_id = format!("gridhead-{}-{}", row.id, comp.key);
        if doc.element_by_id(&head_cell_id).is_none() {
            let th = doc.append_element(
                head_row,
                "th",
                &[("id", head_cell_id.as_str()), ("style", HEADER_STYLE)],
            );
            doc.append_text(th, label(comp));
        }

        // The record's synthetic row, created when its first cell arrives.
        let record_row_id = format!("gridrow-{}.{}", row.id, row.row_index);
        let record_row = match doc.element_by_id(&record_row_id) {
            Some(n) => n,
            None => {
                let n = doc.element("tr", &[("id", record_row_id.as_str())]);
                doc.append(row.table, n);
                if indexed {
                    let td = doc.append_element(n, "td", &[]);
                    doc.append_text(td, &format!("{}.", row.row_index + 1));
                }
                n
            }
        };

        let cell_id = format!("cell-{}", id_for(cp));
        if doc.element_by_id(&cell_id).is_some() {
            return;
        }
        let td = doc.append_element(
            record_row,
            "td",
            &[("id", cell_id.as_str()), ("style", VALUE_STYLE)],
        );
        match content {
            CellContent::Text(s) => doc.append_text(td, &s),
            CellContent::Node(n) => doc.append(td, n),
        }
    }
}
