//! Error types for the engine, its store and its configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::TopicStatus;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("No study plan for student '{0}'")]
    PlanNotFound(String),

    #[error("Topic '{topic}' is not part of the plan for student '{student}'")]
    TopicNotInPlan { student: String, topic: String },

    /// Internal invariant violation: a mastery value escaped [0, 1].
    #[error("Mastery probability out of range: {0}")]
    InvalidProbability(f64),

    #[error("Topic '{topic}' cannot move from {from} to {to}")]
    InvalidTransition {
        topic: String,
        from: TopicStatus,
        to: TopicStatus,
    },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
