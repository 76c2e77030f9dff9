use fruitqa_path::PathError;
use thiserror::Error;

use crate::persistence::PersistenceError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("document mutated while a recalculation pass is running")]
    Reentrant,

    #[error("session is detached or read-only")]
    Detached,

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid engine configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
