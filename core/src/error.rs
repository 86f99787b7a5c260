use crate::classifier::{Classification, ClassifierError};
use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Classification failed: {0}")]
    Classification(#[from] ClassifierError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Classification succeeded but the complaint could not be stored.
    /// The classification travels with the error so callers can still show it.
    #[error("Complaint was classified but not stored: {source}")]
    Unpersisted {
        classification: Classification,
        #[source]
        source: Box<DeskError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse error taxonomy reported at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    Classification,
    Internal,
}

impl DeskError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DeskError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DeskError::Validation(_) => ErrorKind::Validation,
            DeskError::NotFound { .. } => ErrorKind::NotFound,
            DeskError::Forbidden(_) => ErrorKind::Forbidden,
            DeskError::Conflict(_) => ErrorKind::Conflict,
            DeskError::Classification(_) => ErrorKind::Classification,
            DeskError::Database(e) if is_constraint_violation(e) => ErrorKind::Conflict,
            DeskError::Database(_)
            | DeskError::Serialization(_)
            | DeskError::Unpersisted { .. }
            | DeskError::Other(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-shaped status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            DeskError::Classification(e) => e.status_code(),
            _ => match self.kind() {
                ErrorKind::Validation => 400,
                ErrorKind::NotFound => 404,
                ErrorKind::Forbidden => 403,
                ErrorKind::Conflict => 409,
                ErrorKind::Classification => 400,
                ErrorKind::Internal => 500,
            },
        }
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::ConstraintViolation
    )
}

pub type DeskResult<T> = Result<T, DeskError>;
