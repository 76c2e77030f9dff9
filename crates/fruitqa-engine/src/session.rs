//! Editing sessions: starting, loading, editing and finalizing a submission.
//!
//! A [`Session`] owns one submission while it is open for editing. Every
//! mutation goes through the session, which applies the write and then runs
//! the template's rules to a fixed point before returning. Once finalized
//! (or when loaded in a status other than `Borrador`) the session is
//! read-only and every mutation fails with [`EngineError::Detached`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fruitqa_path::{get_mut, parse_path, set_path, validate_path};
use fruitqa_util::{RandomRowIds, RowIdSource};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{EngineOptions, GlobalSettings};
use crate::document::{Document, Patch};
use crate::driver::{Driver, PassReport};
use crate::error::{EngineError, Result};
use crate::persistence::{FinalizeOutcome, FinalizePayload, Persistence, Submitter, TemplateRef};
use crate::row::{backfill_row_ids, new_row};
use crate::rules::{standard_registry, RuleRegistry, TemplateProfile};
use crate::template::{Column, FieldKind, Template, TemplateProvider};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormStatus {
    #[default]
    Borrador,
    Ingresado,
}

/// A stored submission: the document plus its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub id: String,
    pub template_id: String,
    #[serde(default)]
    pub status: FormStatus,
    #[serde(flatten)]
    pub document: Document,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub planta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
}

impl Submission {
    pub fn new(template_id: impl Into<String>, document: Document) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            template_id: template_id.into(),
            status: FormStatus::Borrador,
            document,
            created_at: now,
            updated_at: now,
            submitted_by: None,
            planta: String::new(),
            custom_name: None,
        }
    }
}

/// A catalogue choice of variety and the group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarietyOption {
    pub variedad: String,
    pub grupo: String,
}

/// Entry point: templates, rule profiles and options.
pub struct Engine<P: TemplateProvider> {
    templates: P,
    registry: RuleRegistry,
    options: EngineOptions,
}

impl<P: TemplateProvider> Engine<P> {
    /// An engine with the standard rule catalogue and default options.
    pub fn new(templates: P) -> Self {
        Self {
            templates,
            registry: standard_registry(),
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn resolve(&self, template_id: &str) -> Result<(Arc<Template>, Arc<TemplateProfile>)> {
        let template = self
            .templates
            .get_template(template_id)
            .ok_or_else(|| EngineError::UnknownTemplate(template_id.to_string()))?;
        let profile = self.registry.get(template_id).cloned().unwrap_or_default();
        Ok((template, profile))
    }

    /// Start a new draft of `template_id`.
    pub fn start(&self, template_id: &str) -> Result<Session> {
        self.start_with_ids(template_id, Box::new(RandomRowIds))
    }

    pub fn start_with_ids(&self, template_id: &str, mut ids: Box<dyn RowIdSource + Send>) -> Result<Session> {
        let (template, profile) = self.resolve(template_id)?;
        let planta = self.options.settings.formatted_planta();

        let mut data = Value::Object(Map::new());
        set_path(&mut data, &profile.header.planta, Value::String(planta.clone()))?;
        set_path(
            &mut data,
            &profile.header.temporada,
            Value::String(self.options.settings.temporada.clone()),
        )?;
        for (path, value) in &profile.defaults {
            set_path(&mut data, path, value.clone())?;
        }
        for field in template.fields() {
            let (rows, matrix) = match &field.kind {
                FieldKind::DynamicTable { initial_rows, .. } => (initial_rows, false),
                FieldKind::PressureMatrix { initial_rows, .. } => (initial_rows, true),
                _ => continue,
            };
            if rows.is_empty() {
                continue;
            }
            let hydrated = rows.iter().map(|row| hydrate_row(row, matrix, ids.as_mut())).collect();
            set_path(&mut data, &field.key, Value::Array(hydrated))?;
        }

        let mut submission = Submission::new(template_id, Document::new(data));
        submission.planta = planta;
        info!("started {template_id} draft");
        let mut session = Session::open(template, profile, self.options.clone(), submission, ids);
        session.dirty = true;
        session.recalculate()?;
        Ok(session)
    }

    /// Open a stored submission. Drafts are recalculated and editable; any
    /// other status opens read-only.
    pub fn load(&self, submission: Submission) -> Result<Session> {
        self.load_with_ids(submission, Box::new(RandomRowIds))
    }

    pub fn load_with_ids(&self, mut submission: Submission, mut ids: Box<dyn RowIdSource + Send>) -> Result<Session> {
        let (template, profile) = self.resolve(&submission.template_id)?;
        let mut filled = 0;
        for field in template.fields().filter(|field| field.kind.is_row_collection()) {
            if let Some(Value::Array(rows)) = get_mut(&mut submission.document.data, &parse_path(&field.key)) {
                filled += backfill_row_ids(rows, ids.as_mut());
            }
        }
        if filled > 0 {
            debug!("backfilled {filled} row id(s) in {}", submission.template_id);
        }

        let editable = submission.status == FormStatus::Borrador;
        let mut session = Session::open(template, profile, self.options.clone(), submission, ids);
        if editable {
            session.recalculate()?;
        } else {
            session.detached = true;
        }
        Ok(session)
    }
}

/// A fresh copy of a template row with a new id; matrix rows start without samples.
fn hydrate_row(row: &Value, matrix: bool, ids: &mut dyn RowIdSource) -> Value {
    let mut cells = row.as_object().cloned().unwrap_or_default();
    if matrix {
        cells.insert("detalles".to_string(), Value::Array(Vec::new()));
    }
    new_row(ids, cells)
}

/// One submission open for editing.
pub struct Session {
    template: Arc<Template>,
    profile: Arc<TemplateProfile>,
    options: EngineOptions,
    submission: Submission,
    prev: Value,
    driver: Driver,
    ids: Box<dyn RowIdSource + Send>,
    dirty: bool,
    detached: bool,
}

impl Session {
    fn open(
        template: Arc<Template>,
        profile: Arc<TemplateProfile>,
        options: EngineOptions,
        submission: Submission,
        ids: Box<dyn RowIdSource + Send>,
    ) -> Self {
        let prev = submission.document.data.clone();
        Self {
            template,
            profile,
            options,
            submission,
            prev,
            driver: Driver::new(),
            ids,
            dirty: false,
            detached: false,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub fn document(&self) -> &Document {
        &self.submission.document
    }

    pub fn data(&self) -> &Value {
        &self.submission.document.data
    }

    /// State as of the last processed change.
    pub fn snapshot(&self) -> &Value {
        &self.prev
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_editable(&self) -> bool {
        !self.detached
    }

    pub fn into_submission(self) -> Submission {
        self.submission
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.detached {
            Err(EngineError::Detached)
        } else {
            Ok(())
        }
    }

    /// Write a user value and recalculate.
    pub fn set_field(&mut self, path: &str, value: Value) -> Result<PassReport> {
        self.ensure_editable()?;
        validate_path(path)?;
        if self.submission.document.apply(&Patch::set(path, value))? {
            self.dirty = true;
        }
        self.recalculate()
    }

    /// Run the template's rules to a fixed point.
    pub fn recalculate(&mut self) -> Result<PassReport> {
        self.ensure_editable()?;
        let report = self.driver.run(
            &mut self.submission.document,
            &mut self.prev,
            &self.profile,
            &self.template,
            &self.options,
            self.ids.as_mut(),
        )?;
        if report.writes > 0 {
            debug!(
                "{}: {} write(s) in {} pass(es)",
                self.template.id, report.writes, report.passes
            );
        }
        Ok(report)
    }

    /// Rewrite the header's plant and season from the global settings.
    ///
    /// This is bookkeeping, not an edit: the session does not become dirty.
    pub fn apply_settings(&mut self, settings: &GlobalSettings) -> Result<PassReport> {
        self.ensure_editable()?;
        let planta = settings.formatted_planta();
        let header = &self.profile.header;
        let patches = [
            Patch::set(header.planta.clone(), Value::String(planta.clone())),
            Patch::set(header.temporada.clone(), Value::String(settings.temporada.clone())),
        ];
        let mut changed = false;
        for patch in &patches {
            changed |= self.submission.document.apply(patch)?;
        }
        self.submission.planta = planta;
        self.options.settings = settings.clone();
        if !changed {
            return Ok(PassReport::default());
        }
        self.recalculate()
    }

    /// Replace (or with `None`, drop) the runtime columns of a table.
    pub fn set_schema(&mut self, table: &str, columns: Option<Vec<Column>>) -> Result<PassReport> {
        self.ensure_editable()?;
        if self.submission.document.apply(&Patch::schema(table, columns))? {
            self.dirty = true;
        }
        self.recalculate()
    }

    /// Write a catalogue variety and its group in one mutation.
    pub fn select_variety(&mut self, option: &VarietyOption, variety_path: &str, group_path: &str) -> Result<PassReport> {
        self.ensure_editable()?;
        validate_path(variety_path)?;
        validate_path(group_path)?;
        let doc = &mut self.submission.document;
        let mut changed = doc.apply(&Patch::set(variety_path, Value::String(option.variedad.clone())))?;
        changed |= doc.apply(&Patch::set(group_path, Value::String(option.grupo.clone())))?;
        if changed {
            self.dirty = true;
        }
        self.recalculate()
    }

    /// Keys of the missing required fields of section `index`.
    pub fn validate_section(&self, index: usize) -> Vec<String> {
        self.template.validate_section(index, self.data())
    }

    /// Stamp and return the draft for storage.
    pub fn save_draft(&mut self, custom_name: Option<&str>) -> Result<Submission> {
        self.ensure_editable()?;
        if let Some(name) = custom_name {
            self.submission.custom_name = Some(name.to_string());
        }
        self.submission.updated_at = Utc::now();
        self.dirty = false;
        Ok(self.submission.clone())
    }

    /// Hand the submission to `store` as `Ingresado`.
    ///
    /// The session detaches only when the store accepts the submission; a
    /// rejected or failed hand-off leaves the draft open and unchanged.
    pub fn finalize(&mut self, store: &mut dyn Persistence, user: &Submitter) -> Result<FinalizeOutcome> {
        self.ensure_editable()?;
        let mut submission = self.submission.clone();
        submission.status = FormStatus::Ingresado;
        submission.updated_at = Utc::now();
        submission.submitted_by = Some(user.id.clone());

        let payload = FinalizePayload {
            submission,
            template: TemplateRef {
                title: self.template.title.clone(),
                version: self.template.version.clone(),
            },
            user: user.clone(),
        };
        let outcome = store.finalize(&payload)?;
        if outcome.ok {
            self.submission = payload.submission;
            if !outcome.submission_id.is_empty() {
                self.submission.id = outcome.submission_id.clone();
            }
            self.dirty = false;
            self.detached = true;
            info!(
                "{} finalized as {} ({:?})",
                self.template.id, self.submission.id, outcome.health_status
            );
        }
        Ok(outcome)
    }
}
