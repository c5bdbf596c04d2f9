//! Crate-wide error type

use thiserror::Error;

use crate::templates::loader::LoadError;
use crate::templates::store::StoreError;
use crate::triggers::propagate::TriggerError;

#[derive(Error, Debug)]
pub enum GravenError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Map error: {0}")]
    MapError(String),
}

pub type Result<T> = std::result::Result<T, GravenError>;
