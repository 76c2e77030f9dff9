//! Derived-field engine for fruit-packing QA submissions.
//!
//! # Overview
//!
//! A submission is a nested JSON document edited field by field. After every
//! edit the engine recomputes the fields derived from it (averages, totals,
//! unit counts stored as percentages, rows mirrored between tables) by
//! running the template's rules to a fixed point.
//!
//! # Example
//!
//! ```
//! use fruitqa_engine::{Engine, Template, TemplateRegistry};
//! use fruitqa_util::SequentialRowIds;
//! use serde_json::json;
//!
//! let mut templates = TemplateRegistry::new();
//! templates.insert(Template::from_json_str(
//!     r#"{"id": "REG.CKU.015", "title": "Proyección", "sections": []}"#,
//! ).unwrap());
//!
//! let engine = Engine::new(templates);
//! let mut session = engine
//!     .start_with_ids("REG.CKU.015", Box::new(SequentialRowIds::default()))
//!     .unwrap();
//!
//! // 5 damaged fruits in the default sample of 50
//! session
//!     .set_field("danos_defectos", json!([{"leve_unidades": 5, "grave_unidades": ""}]))
//!     .unwrap();
//! assert_eq!(session.data()["danos_defectos"][0]["leve_pct"], json!(10));
//! ```

pub mod aggregate;
pub mod change;
pub mod config;
pub mod document;
pub mod driver;
pub mod error;
pub mod persistence;
pub mod recalc_cli;
pub mod reconcile;
pub mod row;
pub mod rules;
pub mod session;
pub mod sync;
pub mod template;

// Re-export the core public API
pub use config::{EngineOptions, GlobalSettings};
pub use document::{Document, Patch};
pub use driver::{Driver, DriverState, PassReport};
pub use error::{EngineError, Result};
pub use persistence::{
    FinalizeOutcome, FinalizePayload, HealthStatus, Persistence, PersistenceError, Submitter, TemplateRef,
};
pub use rules::{standard_registry, Rule, RuleCtx, RuleRegistry, TemplateProfile};
pub use session::{Engine, FormStatus, Session, Submission, VarietyOption};
pub use template::{Column, ColumnKind, Field, FieldKind, Template, TemplateProvider, TemplateRegistry};
