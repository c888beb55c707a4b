//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Process configuration errors (env, tenants file, host patterns).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("tenants file {path}: {message}")]
    TenantsFile { path: String, message: String },
    #[error("invalid tenant entry: {0}")]
    TenantEntry(String),
    #[error("invalid host pattern {pattern}: {source}")]
    HostPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised while routing a subdomain to its database.
#[derive(Error, Debug)]
pub enum TenantError {
    /// Fallback tenant missing or its URI is empty. Not retryable.
    #[error("tenant configuration: {0}")]
    Configuration(String),
    /// Only raised under `UnknownTenantPolicy::Reject`.
    #[error("tenant not found: {0}")]
    NotFound(String),
    #[error("tenant inactive: {0}")]
    Inactive(String),
    #[error("tenant {subdomain}: invalid connection uri: {source}")]
    InvalidUri {
        subdomain: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("tenant {subdomain}: pool creation timed out after {seconds}s")]
    CreateTimeout { subdomain: String, seconds: u64 },
    #[error("tenant {subdomain}: {source}")]
    Connection {
        subdomain: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("tenant {subdomain}: timed out waiting for a pooled connection")]
    AcquisitionTimeout { subdomain: String },
}

impl TenantError {
    /// Attach the subdomain to a driver error raised while using a tenant pool.
    pub fn from_driver(subdomain: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => TenantError::AcquisitionTimeout {
                subdomain: subdomain.to_string(),
            },
            source => TenantError::Connection {
                subdomain: subdomain.to_string(),
                source,
            },
        }
    }

    /// Transient failures the caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TenantError::Connection { .. }
                | TenantError::AcquisitionTimeout { .. }
                | TenantError::CreateTimeout { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tenant(#[from] TenantError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Tenant(e) => match e {
                TenantError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "tenant_config_error"),
                TenantError::NotFound(_) => (StatusCode::NOT_FOUND, "tenant_not_found"),
                TenantError::Inactive(_) => (StatusCode::FORBIDDEN, "tenant_inactive"),
                TenantError::InvalidUri { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "tenant_config_error"),
                TenantError::CreateTimeout { .. } => (StatusCode::SERVICE_UNAVAILABLE, "tenant_unavailable"),
                TenantError::Connection { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
                TenantError::AcquisitionTimeout { .. } => (StatusCode::SERVICE_UNAVAILABLE, "pool_timeout"),
            },
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
