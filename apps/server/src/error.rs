//! Crate-wide error type
//!
//! Every store-facing failure carries the [`Stage`] it happened in, so a failed
//! bulk call can be diagnosed ("chunk 3 at offset 4000 of a bulk update") without
//! digging into driver internals.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Where a store interaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BeginTransaction,
    BulkCopy,
    ChunkInsert { chunk: usize, offset: usize },
    ChunkUpdate { chunk: usize, offset: usize },
    Commit,
    Count,
    SearchPage,
    Fetch,
    Insert,
    Update,
    Upsert,
    Delete,
    SoftDelete,
    Ping,
    Migrate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::BeginTransaction => f.write_str("begin transaction"),
            Stage::BulkCopy => f.write_str("bulk copy"),
            Stage::ChunkInsert { chunk, offset } => {
                write!(f, "chunk insert (chunk {chunk}, offset {offset})")
            }
            Stage::ChunkUpdate { chunk, offset } => {
                write!(f, "chunk update (chunk {chunk}, offset {offset})")
            }
            Stage::Commit => f.write_str("commit"),
            Stage::Count => f.write_str("count query"),
            Stage::SearchPage => f.write_str("search page query"),
            Stage::Fetch => f.write_str("fetch"),
            Stage::Insert => f.write_str("insert"),
            Stage::Update => f.write_str("update"),
            Stage::Upsert => f.write_str("upsert"),
            Stage::Delete => f.write_str("delete"),
            Stage::SoftDelete => f.write_str("soft delete"),
            Stage::Ping => f.write_str("ping"),
            Stage::Migrate => f.write_str("migrate"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Integrity constraint violation reported by the store (SQLSTATE class 23).
    #[error("Conflict during {stage}: {message}")]
    Conflict {
        stage: Stage,
        code: String,
        constraint: Option<String>,
        message: String,
    },

    /// Connectivity, timeout, or any other non-constraint store failure.
    #[error("Store failure during {stage}: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: sqlx::Error,
    },

    #[error("Cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify a driver error raised while executing `stage`.
    pub fn store(stage: Stage, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            // Class 22: a value the column cannot hold.
            if code.starts_with("22") {
                return Error::InvalidInput(format!("{stage}: {}", db_err.message()));
            }
            if code.starts_with("23") {
                return Error::Conflict {
                    stage,
                    constraint: db_err.constraint().map(str::to_string),
                    message: db_err.message().to_string(),
                    code,
                };
            }
        }
        Error::Store { stage, source: err }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Conflict { stage, .. }
            | Error::Store { stage, .. }
            | Error::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::NotFound { .. } => "not_found",
            Error::Conflict { .. } => "conflict",
            Error::Store { .. } => "store_unavailable",
            Error::Cancelled { .. } => "cancelled",
            Error::Unauthorized(_) => "unauthorized",
            Error::Config(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Store { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Cancelled { .. } => StatusCode::REQUEST_TIMEOUT,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::InvalidInput(errors.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, stage = ?self.stage(), "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        // Driver detail stays in the logs; clients get the stage only.
        let message = match &self {
            Error::Store { stage, .. } => format!("Store unavailable during {stage}"),
            Error::Config(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let mut body = json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        });
        if let Some(stage) = self.stage() {
            body["error"]["stage"] = json!(stage.to_string());
        }
        if let Error::Conflict {
            constraint: Some(constraint),
            ..
        } = &self
        {
            body["error"]["constraint"] = json!(constraint);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_renders_chunk_position() {
        let stage = Stage::ChunkUpdate {
            chunk: 2,
            offset: 4000,
        };
        assert_eq!(stage.to_string(), "chunk update (chunk 2, offset 4000)");
    }

    #[test]
    fn store_errors_keep_their_stage() {
        let err = Error::store(Stage::Commit, sqlx::Error::PoolTimedOut);
        assert!(matches!(err, Error::Store { stage: Stage::Commit, .. }));
        assert_eq!(err.stage(), Some(Stage::Commit));
        assert!(!err.is_conflict());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn taxonomy_maps_to_distinct_statuses() {
        assert_eq!(
            Error::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::not_found("Product", 1).status_code(),
            StatusCode::NOT_FOUND
        );
        let conflict = Error::Conflict {
            stage: Stage::BulkCopy,
            code: "23505".into(),
            constraint: Some("products_pkey".into()),
            message: "duplicate key".into(),
        };
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            Error::Cancelled {
                stage: Stage::Commit
            }
            .status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
    }
}
