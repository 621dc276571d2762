use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use std::time::Duration;

use crate::models::Feature;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// The language model could not be reached or answered with a transport-level failure.
    ModelUnavailable(String),
    /// The language model did not answer within the configured bound.
    Timeout(Duration),
    /// Sanitized model output is not a JSON object.
    DecodeError {
        /// Feature whose pipeline produced the text.
        feature: Feature,
        /// Text exactly as returned by the model.
        raw: String,
        /// Text after sanitization, as handed to the JSON parser.
        cleaned: String,
        /// Parser message.
        reason: String,
    },
    /// Decoded model output lacks a required field or has the wrong shape.
    ValidationError {
        /// Feature whose schema was checked.
        feature: Feature,
        /// What was missing or mistyped.
        reason: String,
    },
    /// Resource not found error.
    NotFound(String),
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Writing an analysis record failed.
    PersistenceError(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Unauthorized access error.
    Unauthorized(String),
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

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ModelUnavailable(msg) => write!(f, "Language model unavailable: {}", msg),
            AppError::Timeout(after) => {
                write!(f, "Language model timed out after {}s", after.as_secs_f64())
            }
            AppError::DecodeError {
                feature, reason, ..
            } => write!(f, "Failed to decode {} response: {}", feature.as_str(), reason),
            AppError::ValidationError { feature, reason } => {
                write!(f, "Invalid {} response: {}", feature.as_str(), reason)
            }
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::PersistenceError(msg) => write!(f, "Persistence error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Innermost error, skipping any context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// HTTP status that best describes the error.
    pub fn status_code(&self) -> StatusCode {
        match self.root() {
            AppError::ModelUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::DecodeError { .. } | AppError::ValidationError { .. } => {
                StatusCode::BAD_GATEWAY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::DatabaseError(_)
            | AppError::PersistenceError(_)
            | AppError::InternalError(_)
            | AppError::WithContext { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller of `feature`.
    ///
    /// Model text, SQL errors and internal details never leave the process; they are
    /// written to the log by [`AppError::log`] instead.
    pub fn user_message(&self, feature: Feature) -> String {
        match self.root() {
            AppError::DecodeError { .. } | AppError::ValidationError { .. } => {
                feature.parse_failure_message().to_string()
            }
            _ => self.caller_message(feature.process_failure_message()),
        }
    }

    /// Message safe to show for an operation that does not involve the model.
    ///
    /// Not-found, bad-request and unauthorized errors keep their own message; everything
    /// else becomes `fallback`.
    pub fn caller_message(&self, fallback: &str) -> String {
        match self.root() {
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            _ => fallback.to_string(),
        }
    }

    /// Logs the error with the level and diagnostics appropriate to its kind.
    pub fn log(&self, feature: Feature) {
        if let AppError::WithContext { context, .. } = self {
            tracing::debug!("{} failed with context: {}", feature.as_str(), context);
        }

        match self.root() {
            AppError::ModelUnavailable(msg) => {
                tracing::error!("{}: language model unavailable: {}", feature.as_str(), msg);
            }
            AppError::Timeout(after) => {
                tracing::error!(
                    "{}: language model timed out after {:?}",
                    feature.as_str(),
                    after
                );
            }
            AppError::DecodeError {
                raw,
                cleaned,
                reason,
                ..
            } => {
                tracing::error!("{}: parse error: {}", feature.as_str(), reason);
                tracing::error!("{}: raw response: {}", feature.as_str(), raw);
                tracing::error!("{}: cleaned response: {}", feature.as_str(), cleaned);
            }
            AppError::ValidationError { reason, .. } => {
                tracing::error!("{}: invalid response structure: {}", feature.as_str(), reason);
            }
            AppError::NotFound(msg) => tracing::info!("{}: not found: {}", feature.as_str(), msg),
            AppError::BadRequest(msg) => {
                tracing::info!("{}: bad request: {}", feature.as_str(), msg)
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("{}: unauthorized: {}", feature.as_str(), msg)
            }
            AppError::DatabaseError(e) => {
                tracing::error!("{}: database error: {:?}", feature.as_str(), e)
            }
            AppError::PersistenceError(msg) => {
                tracing::error!("{}: persistence error: {}", feature.as_str(), msg)
            }
            AppError::InternalError(msg) => {
                tracing::error!("{}: internal error: {}", feature.as_str(), msg)
            }
            AppError::WithContext { .. } => {}
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into the `{ success: false, error }` envelope.
    ///
    /// Feature handlers build their own envelope through `ActionResult`; this path serves
    /// requests that fail before a feature is known.
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self.root() {
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            other => {
                tracing::error!("Request failed: {}", other);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ModelUnavailable(err.to_string())
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
