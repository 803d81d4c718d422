// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Typed view over a declarative form schema.
//!
//! A schema arrives as raw JSON. Parsing lifts each node into a [`Component`]
//! with its structural flags and a [`ComponentKind`] tag so rendering can
//! dispatch on kind instead of re-inspecting loose maps. The raw definition
//! is retained in `properties` for the open-ended settings (formats, option
//! lists, provider names) that only some kinds interpret.

use crate::value::Value;

use anyhow::{bail, Result};

/// The component-type catalog. Unrecognized types parse as `Custom` and are
/// rendered (or skipped) based on their `input` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    // Text-like
    TextField,
    TextArea,
    Number,
    Password,
    Email,
    PhoneNumber,
    Tags,
    Url,
    Hidden,
    // Boolean-like
    Checkbox,
    Signature,
    // Choice-like
    Radio,
    Select,
    SelectBoxes,
    // Structured values
    Address,
    DateTime,
    Day,
    Time,
    Currency,
    File,
    Survey,
    // Keyed / repeated-row containers
    DataMap,
    DataGrid,
    EditGrid,
    Tagpad,
    // Nested data
    Container,
    Form,
    // Layout
    Columns,
    Column,
    Panel,
    Table,
    Tabs,
    Well,
    FieldSet,
    Content,
    HtmlElement,
    Button,
    Custom(String),
}

impl ComponentKind {
    pub fn from_type(type_name: &str) -> ComponentKind {
        use ComponentKind::*;
        match type_name {
            "textfield" => TextField,
            "textarea" => TextArea,
            "number" => Number,
            "password" => Password,
            "email" => Email,
            "phoneNumber" => PhoneNumber,
            "tags" => Tags,
            "url" => Url,
            "hidden" => Hidden,
            "checkbox" => Checkbox,
            "signature" => Signature,
            "radio" => Radio,
            "select" => Select,
            "selectboxes" => SelectBoxes,
            "address" => Address,
            "datetime" => DateTime,
            "day" => Day,
            "time" => Time,
            "currency" => Currency,
            "file" => File,
            "survey" => Survey,
            "datamap" => DataMap,
            "datagrid" => DataGrid,
            "editgrid" => EditGrid,
            "tagpad" => Tagpad,
            "container" => Container,
            "form" => Form,
            "columns" => Columns,
            "panel" => Panel,
            "table" => Table,
            "tabs" => Tabs,
            "well" => Well,
            "fieldset" => FieldSet,
            "content" => Content,
            "htmlelement" => HtmlElement,
            "button" => Button,
            other => Custom(other.to_string()),
        }
    }
}

/// How a component relates to submission data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Pure layout, transparent to data and invisible in output.
    None,
    /// Static text; nothing to render from data.
    Content,
    /// A single (possibly structured) value.
    Value,
    /// An ordered list of sub-records.
    Array,
    /// A user-keyed map of values.
    Map,
    /// A nested record with its own child components.
    Nested,
}

/// One node of the form schema tree.
#[derive(Debug, Clone)]
pub struct Component {
    pub key: String,
    pub label: String,
    pub type_name: String,
    pub kind: ComponentKind,
    pub hidden: bool,
    pub protected: bool,
    pub persistent: bool,
    pub multiple: bool,
    pub input: bool,
    pub components: Vec<Component>,
    /// Cells of a table layout, row-major.
    pub rows: Vec<Vec<Component>>,
    /// Columns of a columns layout, each a layout holder.
    pub columns: Vec<Component>,
    /// The raw definition, for kind-specific settings.
    pub properties: Value,
}

impl Component {
    /// Parses a single component definition.
    pub fn from_value(v: &Value) -> Result<Component> {
        if v.as_object().is_err() {
            bail!("component definition must be an object, got `{v}`");
        }
        let type_name = v["type"].as_str().unwrap_or("textfield").to_string();
        let kind = ComponentKind::from_type(&type_name);

        let mut components = vec![];
        if let Ok(children) = v["components"].as_array() {
            for child in children.iter() {
                components.push(Component::from_value(child)?);
            }
        }

        let mut columns = vec![];
        if let Ok(cols) = v["columns"].as_array() {
            for col in cols.iter() {
                columns.push(Component::layout_holder(ComponentKind::Column, col)?);
            }
        }

        let mut rows = vec![];
        if let Ok(table_rows) = v["rows"].as_array() {
            for row in table_rows.iter() {
                let mut cells = vec![];
                if let Ok(row_cells) = row.as_array() {
                    for cell in row_cells.iter() {
                        cells.push(Component::layout_holder(ComponentKind::Column, cell)?);
                    }
                }
                rows.push(cells);
            }
        }

        Ok(Component {
            key: v["key"].as_str().unwrap_or_default().to_string(),
            label: v["label"].as_str().unwrap_or_default().to_string(),
            type_name,
            kind,
            hidden: v["hidden"].as_bool().unwrap_or(false),
            protected: v["protected"].as_bool().unwrap_or(false),
            persistent: !matches!(v["persistent"], Value::Bool(false)),
            multiple: v["multiple"].as_bool().unwrap_or(false),
            input: v["input"].as_bool().unwrap_or(true),
            components,
            rows,
            columns,
            properties: v.clone(),
        })
    }

    /// Parses a whole form definition (`{"components": [...]}`), wrapping the
    /// top-level list in a root container.
    pub fn form_from_value(v: &Value) -> Result<Component> {
        let mut root = Component::layout_holder(ComponentKind::Form, v)?;
        root.key = v["key"].as_str().unwrap_or_default().to_string();
        root.label = v["title"].as_str().unwrap_or_default().to_string();
        Ok(root)
    }

    // Columns entries and table cells are positional holders without a type
    // of their own in the schema.
    fn layout_holder(kind: ComponentKind, v: &Value) -> Result<Component> {
        let mut components = vec![];
        if let Ok(children) = v["components"].as_array() {
            for child in children.iter() {
                components.push(Component::from_value(child)?);
            }
        }
        Ok(Component {
            key: String::new(),
            label: String::new(),
            type_name: String::new(),
            kind,
            hidden: false,
            protected: false,
            persistent: true,
            multiple: false,
            input: false,
            components,
            rows: vec![],
            columns: vec![],
            properties: v.clone(),
        })
    }

    pub fn model(&self) -> ModelKind {
        use ComponentKind::*;
        match &self.kind {
            Content | HtmlElement => ModelKind::Content,
            Columns | Column | Panel | Table | Tabs | Well | FieldSet | Button => ModelKind::None,
            DataGrid | EditGrid | Tagpad => ModelKind::Array,
            DataMap => ModelKind::Map,
            Container | Form => ModelKind::Nested,
            Custom(_) if !self.input => ModelKind::None,
            _ => ModelKind::Value,
        }
    }

    /// Layout and static-content nodes emit nothing themselves.
    pub fn render_skip(&self) -> bool {
        matches!(self.model(), ModelKind::None | ModelKind::Content)
    }

    /// Does this component's data extend the data path?
    pub fn extends_data_path(&self) -> bool {
        !matches!(self.model(), ModelKind::None | ModelKind::Content)
    }

    pub fn is_tag_indexed(&self) -> bool {
        self.kind == ComponentKind::Tagpad
    }

    /// All direct children regardless of which structural slot holds them.
    pub fn child_components(&self) -> impl Iterator<Item = &Component> {
        self.components
            .iter()
            .chain(self.columns.iter())
            .chain(self.rows.iter().flatten())
    }

    /// Raw property access into the original definition.
    pub fn prop(&self, name: &str) -> &Value {
        &self.properties[name]
    }

    pub fn prop_str(&self, name: &str) -> Option<&str> {
        self.properties[name].as_str()
    }

    pub fn prop_bool(&self, name: &str) -> bool {
        self.properties[name].as_bool().unwrap_or(false)
    }
}
