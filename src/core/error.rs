use thiserror::Error;

use crate::core::types::UnitId;

#[derive(Error, Debug)]
pub enum TacticsError {
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    #[error("Unit destroyed: {0}")]
    UnitDestroyed(UnitId),

    #[error("Target already destroyed: {0}")]
    TargetDestroyed(UnitId),

    #[error("Insufficient ammunition: need {needed}, have {available}")]
    InsufficientAmmunition { needed: u32, available: u32 },

    #[error("Interrupted: {0}")]
    Interrupted(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Visual sink error: {0}")]
    Visual(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TacticsError>;
