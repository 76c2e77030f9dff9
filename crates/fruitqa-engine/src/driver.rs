//! The recalculation driver.
//!
//! After every mutation the driver runs a template's ordered rule list over
//! the document. Patches are applied as they come, and the cells each applied
//! write changed are also copied into the snapshot, so a later rule never
//! mistakes an engine write for a user edit. Cells a whole-table write leaves
//! as they were keep their snapshot value, so a user edit in that table is
//! still seen by later rules. At the end of a pass the snapshot becomes a
//! full copy of the document.
//!
//! Passes repeat until one writes nothing or [`EngineOptions::max_passes`] is
//! reached. Because every rule is a function of the document plus the
//! snapshot, and writes are guarded by equality, the second pass over an
//! unchanged document writes nothing.

use fruitqa_path::{get, get_mut, parse_path, set, PathError};
use fruitqa_util::{deep_equal, RowIdSource};
use log::{debug, trace, warn};
use serde_json::Value;

use crate::config::EngineOptions;
use crate::document::{Document, Patch};
use crate::error::{EngineError, Result};
use crate::rules::{RuleCtx, TemplateProfile};
use crate::template::Template;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriverState {
    #[default]
    Idle,
    Snapshotting,
    RunningRules,
    WritingResults,
}

/// What one recalculation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub passes: usize,
    /// Patches that changed the document.
    pub writes: usize,
    /// Rule evaluations that produced at least one change.
    pub rules_fired: usize,
}

#[derive(Debug, Default)]
pub struct Driver {
    state: DriverState,
}

impl Driver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Bring `doc` to a fixed point of `profile`'s rules.
    ///
    /// `prev` is the snapshot taken after the last processed change; on
    /// return it equals `doc.data`.
    pub fn run(
        &mut self,
        doc: &mut Document,
        prev: &mut Value,
        profile: &TemplateProfile,
        template: &Template,
        options: &EngineOptions,
        ids: &mut dyn RowIdSource,
    ) -> Result<PassReport> {
        if self.state != DriverState::Idle {
            return Err(EngineError::Reentrant);
        }
        let mut report = PassReport::default();
        let max_passes = options.max_passes.max(1);

        while report.passes < max_passes {
            report.passes += 1;
            self.state = DriverState::RunningRules;
            let mut pass_writes = 0;

            for rule in &profile.rules {
                if let Some(target) = rule.target() {
                    if !template.is_field_visible(target, &doc.data) {
                        trace!("{}: skipped, {target} is hidden", rule.name());
                        continue;
                    }
                }
                let patches = {
                    let mut ctx = RuleCtx {
                        prev: &*prev,
                        data: &doc.data,
                        schemas: &doc.dynamic_schemas,
                        options,
                        ids: &mut *ids,
                    };
                    rule.apply(&mut ctx)
                };
                if patches.is_empty() {
                    continue;
                }

                self.state = DriverState::WritingResults;
                let mut applied = 0;
                for patch in &patches {
                    let before = match patch {
                        Patch::Set { path, .. } => doc.get(path).cloned(),
                        Patch::Schema { .. } => None,
                    };
                    match doc.apply(patch) {
                        Ok(true) => {
                            applied += 1;
                            debug!("{} wrote {}", rule.name(), patch.target());
                            if let Patch::Set { path, value } = patch {
                                mirror_write(prev, &doc.data, path, before.as_ref(), value);
                            }
                        }
                        Ok(false) => {}
                        Err(err) => warn!("{}: write to {} skipped: {err}", rule.name(), patch.target()),
                    }
                }
                if applied > 0 {
                    report.rules_fired += 1;
                }
                pass_writes += applied;
                self.state = DriverState::RunningRules;
            }

            self.state = DriverState::Snapshotting;
            *prev = doc.data.clone();
            report.writes += pass_writes;
            trace!("pass {}: {pass_writes} write(s)", report.passes);

            if pass_writes == 0 {
                break;
            }
            if report.passes == max_passes {
                warn!("pass limit of {max_passes} reached with {pass_writes} write(s) in the last pass");
            }
        }

        self.state = DriverState::Idle;
        Ok(report)
    }
}

/// Copy into the snapshot the parts of `after` that differ from `before`,
/// the value the write replaced.
fn mirror_write(prev: &mut Value, data: &Value, path: &str, before: Option<&Value>, after: &Value) {
    match (before, after) {
        (Some(Value::Object(old)), Value::Object(new)) => {
            for (key, value) in new {
                let old_value = old.get(key);
                if !old_value.is_some_and(|v| deep_equal(v, value)) {
                    mirror_write(prev, data, &format!("{path}.{key}"), old_value, value);
                }
            }
        }
        (Some(Value::Array(old)), Value::Array(new)) => {
            for (i, value) in new.iter().enumerate() {
                let old_value = old.get(i);
                if !old_value.is_some_and(|v| deep_equal(v, value)) {
                    mirror_write(prev, data, &format!("{path}.{i}"), old_value, value);
                }
            }
        }
        _ => {
            if let Err(err) = write_snapshot(prev, data, path, after.clone()) {
                warn!("snapshot not updated at {path}: {err}");
            }
        }
    }
}

/// Set a snapshot value, first growing snapshot arrays with `null` rows up
/// to the index being written. Arrays grow only as far as the document's
/// own arrays at the same path.
fn write_snapshot(prev: &mut Value, data: &Value, path: &str, value: Value) -> std::result::Result<(), PathError> {
    let steps = parse_path(path);
    for i in 1..steps.len() {
        let Some(Value::Array(rows)) = get(data, &steps[..i]) else {
            continue;
        };
        let Some(idx) = steps[i].parse::<usize>().ok().filter(|idx| *idx < rows.len()) else {
            break;
        };
        if !get(prev, &steps[..i]).is_some_and(Value::is_array) {
            set(prev, &steps[..i], Value::Array(Vec::new()))?;
        }
        if let Some(Value::Array(snapshot_rows)) = get_mut(prev, &steps[..i]) {
            if snapshot_rows.len() < idx {
                snapshot_rows.resize(idx, Value::Null);
            }
        }
    }
    set(prev, &steps, value)
}
