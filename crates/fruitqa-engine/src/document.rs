//! The document store: one submission's answers plus its runtime column schemas.
//!
//! All writes go through [`Document::apply`], which skips a write whose value
//! already equals the stored one. That equality guard is what lets rules be
//! rerun on every pass without marking the document changed.

use std::collections::BTreeMap;

use fruitqa_path::{get_path, set_path, PathError};
use fruitqa_util::deep_equal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::template::Column;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default = "empty_object")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dynamic_schemas: BTreeMap<String, Vec<Column>>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Default for Document {
    fn default() -> Self {
        Self::new(empty_object())
    }
}

/// A single write produced by a rule or by the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Replace the value at a dot path.
    Set { path: String, value: Value },
    /// Replace (or with `None`, drop) the runtime columns of a table.
    Schema {
        table: String,
        columns: Option<Vec<Column>>,
    },
}

impl Patch {
    pub fn set(path: impl Into<String>, value: Value) -> Self {
        Patch::Set {
            path: path.into(),
            value,
        }
    }

    pub fn schema(table: impl Into<String>, columns: Option<Vec<Column>>) -> Self {
        Patch::Schema {
            table: table.into(),
            columns,
        }
    }

    /// The data path or table key the patch addresses.
    pub fn target(&self) -> &str {
        match self {
            Patch::Set { path, .. } => path,
            Patch::Schema { table, .. } => table,
        }
    }
}

impl Document {
    pub fn new(data: Value) -> Self {
        let data = if data.is_object() { data } else { empty_object() };
        Self {
            data,
            dynamic_schemas: BTreeMap::new(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.data, path)
    }

    /// Rows of the collection at `path`; empty when absent or not a list.
    pub fn rows(&self, path: &str) -> &[Value] {
        self.get(path)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn schema(&self, table: &str) -> Option<&[Column]> {
        self.dynamic_schemas.get(table).map(Vec::as_slice)
    }

    /// Apply a patch. Returns whether the document changed.
    pub fn apply(&mut self, patch: &Patch) -> Result<bool, PathError> {
        match patch {
            Patch::Set { path, value } => {
                if self.get(path).is_some_and(|current| deep_equal(current, value)) {
                    return Ok(false);
                }
                set_path(&mut self.data, path, value.clone())?;
                Ok(true)
            }
            Patch::Schema { table, columns } => match columns {
                Some(columns) => {
                    if self.schema(table) == Some(columns.as_slice()) {
                        return Ok(false);
                    }
                    self.dynamic_schemas.insert(table.clone(), columns.clone());
                    Ok(true)
                }
                None => Ok(self.dynamic_schemas.remove(table).is_some()),
            },
        }
    }
}
