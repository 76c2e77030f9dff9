//! Form templates: sections, fields and visibility rules.
//!
//! Templates are data handed to the engine by a [`TemplateProvider`]. A field's
//! `type` string is decoded once into the [`FieldKind`] sum type; the engine
//! never dispatches on the raw string afterwards.
//!
//! ```
//! use fruitqa_engine::template::{FieldKind, Template};
//! use serde_json::json;
//!
//! let template: Template = serde_json::from_value(json!({
//!     "id": "REG.CKU.022",
//!     "title": "Atmósfera controlada",
//!     "version": "1.0",
//!     "sections": [{
//!         "key": "presiones",
//!         "title": "Presiones",
//!         "fields": [
//!             {"key": "matriz_presiones", "label": "Presiones", "type": "pressure_matrix"}
//!         ]
//!     }]
//! })).unwrap();
//!
//! let field = template.field("matriz_presiones").unwrap();
//! assert!(matches!(field.kind, FieldKind::PressureMatrix { .. }));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use fruitqa_path::get_path;
use fruitqa_util::{deep_equal, is_blank};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<FieldDependency>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "readOnly")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<FieldDependency>,
    #[serde(flatten)]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Date,
    Time,
    Boolean,
    Select {
        #[serde(default)]
        options: Vec<String>,
    },
    Multiselect {
        #[serde(default)]
        options: Vec<String>,
    },
    MeasureSeries {
        #[serde(default)]
        series_count: Option<u32>,
    },
    Textarea,
    File,
    Autocomplete {
        #[serde(default, rename = "dynamicOptions")]
        dynamic_options: Option<String>,
    },
    DynamicTable {
        #[serde(default)]
        columns: Vec<Column>,
        #[serde(default, rename = "initialRows")]
        initial_rows: Vec<Value>,
    },
    PressureMatrix {
        #[serde(default, rename = "initialRows")]
        initial_rows: Vec<Value>,
        #[serde(default, rename = "isWeightMode")]
        weight_mode: bool,
        #[serde(default, rename = "hideBrix")]
        hide_brix: bool,
        #[serde(default, rename = "showSummaryColumns")]
        show_summary_columns: bool,
    },
}

impl FieldKind {
    /// Whether the field holds a row collection.
    pub fn is_row_collection(&self) -> bool {
        matches!(self, FieldKind::DynamicTable { .. } | FieldKind::PressureMatrix { .. })
    }
}

/// A table column, declared in the template or generated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: ColumnKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclude_from_calc: bool,
}

impl Column {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            required: false,
            read_only: false,
            options: Vec::new(),
            exclude_from_calc: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    #[default]
    Text,
    Integer,
    Decimal,
    Date,
    Time,
    Boolean,
    Select,
    Multiselect,
    Textarea,
    Autocomplete,
    PressureButton,
    FindingsButton,
    #[serde(other)]
    Other,
}

/// Conditional visibility: visible when the watched value equals `value`,
/// or is one of its members when `value` is a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDependency {
    pub key: String,
    pub value: Value,
}

impl FieldDependency {
    pub fn is_satisfied(&self, data: &Value) -> bool {
        let Some(current) = get_path(data, &self.key) else {
            return false;
        };
        match &self.value {
            Value::Array(accepted) => accepted.iter().any(|v| deep_equal(v, current)),
            expected => deep_equal(expected, current),
        }
    }
}

fn satisfied(dependency: Option<&FieldDependency>, data: &Value) -> bool {
    dependency.map_or(true, |dep| dep.is_satisfied(data))
}

impl Template {
    pub fn from_json_str(src: &str) -> Result<Self> {
        Ok(serde_json::from_str(src)?)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.sections.iter().flat_map(|section| section.fields.iter())
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields().find(|field| field.key == key)
    }

    /// Whether `key` is rendered for `data`. Keys the template does not
    /// declare are always visible.
    pub fn is_field_visible(&self, key: &str, data: &Value) -> bool {
        for section in &self.sections {
            if let Some(field) = section.fields.iter().find(|f| f.key == key) {
                return satisfied(section.dependency.as_ref(), data)
                    && satisfied(field.dependency.as_ref(), data);
            }
        }
        true
    }

    /// Keys of the visible, editable, required fields of section `index`
    /// that hold no value. A hidden or missing section has nothing to report.
    pub fn validate_section(&self, index: usize, data: &Value) -> Vec<String> {
        let Some(section) = self.sections.get(index) else {
            return Vec::new();
        };
        if !satisfied(section.dependency.as_ref(), data) {
            return Vec::new();
        }
        section
            .fields
            .iter()
            .filter(|field| field.required && !field.read_only)
            .filter(|field| satisfied(field.dependency.as_ref(), data))
            .filter(|field| is_blank(get_path(data, &field.key)))
            .map(|field| field.key.clone())
            .collect()
    }
}

/// Source of templates by id.
pub trait TemplateProvider {
    fn get_template(&self, id: &str) -> Option<Arc<Template>>;
}

/// In-memory template store.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Arc<Template>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), Arc::new(template));
    }

    /// Load a single template or a list of templates from JSON.
    pub fn from_json_str(src: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(src)?;
        let templates: Vec<Template> = match value {
            Value::Array(_) => serde_json::from_value(value)?,
            other => vec![serde_json::from_value(other)?],
        };
        let mut registry = Self::new();
        for template in templates {
            registry.insert(template);
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateProvider for TemplateRegistry {
    fn get_template(&self, id: &str) -> Option<Arc<Template>> {
        self.templates.get(id).cloned()
    }
}
