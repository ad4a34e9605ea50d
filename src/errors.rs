use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors (connectivity or query failure).
    DatabaseError(sqlx::Error),
    /// The identifier does not match any row.
    NotFound(String),
    /// Missing or empty required input.
    BadRequest(String),
    /// An update payload carried no allow-listed field.
    NothingToUpdate,
    /// Error interacting with an external API (text generation).
    ExternalApiError(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Returns the innermost error, skipping any context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Status code the error maps to at the HTTP boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::NothingToUpdate => StatusCode::BAD_REQUEST,
            AppError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            AppError::WithContext { source, .. } => source.status(),
        }
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NothingToUpdate => write!(f, "No fields to update"),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Client errors carry their message verbatim; server-side failures are logged with
    /// their cause and answered with a generic message.
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error de base de datos".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NothingToUpdate => (
                StatusCode::BAD_REQUEST,
                "No hay campos para actualizar".to_string(),
            ),
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Error en servicio externo".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error interno del servidor".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                if source.status().is_server_error() {
                    tracing::error!("Error with context: {} -> {}", context, source);
                } else {
                    tracing::debug!("{} -> {}", context, source);
                }
                return source.into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    /// Converts a `sqlx::Error` into an `AppError`.
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    /// Malformed or mistyped request bodies are the client's fault.
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Cuerpo JSON inválido: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    /// Ids that do not parse as an integer are rejected before any lookup.
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(format!("Identificador inválido: {}", rejection.body_text()))
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::BadRequest("Falta campo nombres".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NothingToUpdate.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DatabaseError(sqlx::Error::PoolTimedOut).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::ExternalApiError("down".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_context_keeps_source_status() {
        let err: Result<(), AppError> = Err(AppError::NotFound("Simulación no encontrada".into()));
        let wrapped = err.context("updating credit simulation").unwrap_err();

        assert_eq!(wrapped.status(), StatusCode::NOT_FOUND);
        assert!(wrapped.to_string().starts_with("updating credit simulation: "));
    }

    #[test]
    fn test_sqlx_context_wraps_database_error() {
        let err: Result<(), sqlx::Error> = Err(sqlx::Error::RowNotFound);
        let wrapped = err.with_context(|| "listing contacts".to_string()).unwrap_err();

        assert!(matches!(wrapped.root(), AppError::DatabaseError(_)));
        assert_eq!(wrapped.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_response_status_matches_variant() {
        let response = AppError::NotFound("No existe".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::WithContext {
            source: Box::new(AppError::NothingToUpdate),
            context: "patching worksheet".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
