//! Derived-field rules and the per-template rule registry.
//!
//! A rule reads the snapshot and the live document through a [`RuleCtx`] and
//! returns the patches it wants written. Rules never mutate the document
//! themselves; the driver applies their patches in declaration order, so a
//! rule may consume what an earlier rule of the same pass produced.

pub mod catalog;
pub mod percent;
pub mod stats;
pub mod tables;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use fruitqa_path::get_path;
use fruitqa_util::{deep_equal, RowIdSource};
use serde_json::Value;

use crate::config::EngineOptions;
use crate::document::Patch;
use crate::template::Column;

pub use catalog::{all_profiles, standard_registry};

/// Everything a rule may look at during one evaluation.
pub struct RuleCtx<'a> {
    /// Document state as of the last processed change.
    pub prev: &'a Value,
    /// Live document data, including writes of earlier rules in this pass.
    pub data: &'a Value,
    pub schemas: &'a BTreeMap<String, Vec<Column>>,
    pub options: &'a EngineOptions,
    /// Source of ids for rows a rule creates.
    pub ids: &'a mut dyn RowIdSource,
}

impl<'a> RuleCtx<'a> {
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        get_path(self.data, path)
    }

    pub fn get_prev(&self, path: &str) -> Option<&'a Value> {
        get_path(self.prev, path)
    }

    /// Rows at `path`, or `None` when the path does not hold a list.
    pub fn rows(&self, path: &str) -> Option<&'a [Value]> {
        self.get(path).and_then(Value::as_array).map(Vec::as_slice)
    }

    pub fn prev_rows(&self, path: &str) -> Option<&'a [Value]> {
        self.get_prev(path).and_then(Value::as_array).map(Vec::as_slice)
    }
}

/// A derived-field computation registered for a template.
///
/// Writes are mirrored into the snapshot cell by cell, so a rule may rewrite
/// a whole table without hiding the user's edits in it from later rules.
/// Rows a write moves to a new position count as processed there; a rule
/// that reorders a table belongs after the rules that detect edits in it.
pub trait Rule: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Field key whose visibility gates the rule; `None` always runs.
    fn target(&self) -> Option<&str> {
        None
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch>;
}

pub type RuleSet = Vec<Arc<dyn Rule>>;

/// Where a template keeps its plant and season header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPaths {
    pub planta: String,
    pub temporada: String,
}

impl Default for HeaderPaths {
    fn default() -> Self {
        Self {
            planta: "planta".to_string(),
            temporada: "temporada".to_string(),
        }
    }
}

/// Rules plus seeding information for one template.
#[derive(Debug, Clone, Default)]
pub struct TemplateProfile {
    pub rules: RuleSet,
    pub header: HeaderPaths,
    /// Values written when a new document is started, after the header.
    pub defaults: Vec<(String, Value)>,
}

pub type RuleRegistry = HashMap<String, Arc<TemplateProfile>>;

/// Push a write of `value` to `path` unless the document already holds it.
pub fn set_if_changed(out: &mut Vec<Patch>, data: &Value, path: &str, value: Value) {
    let unchanged = get_path(data, path).is_some_and(|current| deep_equal(current, &value));
    if !unchanged {
        out.push(Patch::set(path, value));
    }
}

/// Push a write of the whole collection at `path` when any row differs.
pub fn set_rows_if_changed(out: &mut Vec<Patch>, data: &Value, path: &str, rows: Vec<Value>) {
    set_if_changed(out, data, path, Value::Array(rows))
}

pub fn cell_path(table: &str, row: usize, column: &str) -> String {
    format!("{table}.{row}.{column}")
}

/// `prefix1 ..= prefixN` column keys, e.g. `l1..l30`.
pub fn numbered(prefix: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{prefix}{i}")).collect()
}
