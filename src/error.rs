use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the scoring pipeline.
///
/// Missing or partial student data is not an error; aggregation falls back to
/// zero defaults instead.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Model file not found at {}. Please train the model first.", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Invalid student_id {0:?} (must be an integer)")]
    InvalidStudentId(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl ScoringError {
    /// Machine-readable category reported in failure payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::ModelNotFound(_) => "model_not_found",
            ScoringError::InvalidStudentId(_) => "invalid_student_id",
            ScoringError::Model(_) | ScoringError::Json(_) => "model",
            ScoringError::Data(_) | ScoringError::Csv(_) => "data",
            ScoringError::Database(_) => "database",
            ScoringError::Io(_) => "io",
            ScoringError::Other(_) => "internal",
        }
    }
}

pub type Result<T, E = ScoringError> = std::result::Result<T, E>;
