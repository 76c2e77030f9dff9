//! Core of the `form-recalc` binary.
//!
//! Reads a template, optional engine options and a batch of edits, replays
//! the edits through a session and returns the resulting document.

use serde::Deserialize;
use serde_json::Value;

use fruitqa_util::SequentialRowIds;

use crate::config::EngineOptions;
use crate::document::Document;
use crate::error::Result;
use crate::session::{Engine, Submission};
use crate::template::{Template, TemplateRegistry};

// ── Input ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RecalcInput {
    /// Existing draft data; a new draft is started when absent.
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    edits: Vec<Edit>,
}

#[derive(Debug, Deserialize)]
struct Edit {
    path: String,
    value: Value,
}

// ── form-recalc ───────────────────────────────────────────────────────────

/// Replay `input` (`{"data"?, "edits": [{"path", "value"}]}`) against the
/// template and return the document as pretty JSON.
pub fn run_recalc(template_json: &str, options_toml: Option<&str>, input: &str) -> Result<String> {
    let template = Template::from_json_str(template_json)?;
    let template_id = template.id.clone();
    let options = match options_toml {
        Some(src) => EngineOptions::from_toml_str(src)?,
        None => EngineOptions::default(),
    };
    let input: RecalcInput = serde_json::from_str(input)?;

    let mut templates = TemplateRegistry::new();
    templates.insert(template);
    let engine = Engine::new(templates).with_options(options);
    let ids = Box::new(SequentialRowIds::default());

    let mut session = match input.data {
        Some(data) => engine.load_with_ids(Submission::new(template_id, Document::new(data)), ids)?,
        None => engine.start_with_ids(&template_id, ids)?,
    };
    for edit in input.edits {
        session.set_field(&edit.path, edit.value)?;
    }
    Ok(serde_json::to_string_pretty(session.document())?)
}
