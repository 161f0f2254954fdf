use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::*;

use sqlite::StorageError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Login failed. Try again.")]
    LoginFailed,
    #[error("{0}")]
    AlreadyRegistered(String),
    #[error("Internal Server Error")]
    Template(#[from] tera::Error),
    #[error("Internal Server Error")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        match value.downcast_ref::<StorageError>() {
            Some(StorageError::AlreadyRegistered(_)) => Self::AlreadyRegistered(value.to_string()),
            None => Self::Internal(value),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::LoginFailed => StatusCode::UNAUTHORIZED,
            AppError::AlreadyRegistered(_) => StatusCode::CONFLICT,
            AppError::Template(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Template(e) => warn!("template: {:?}", e),
            AppError::Internal(e) => warn!("internal: {:?}", e),
            _ => info!("{}", self),
        }

        (self.status(), self.to_string()).into_response()
    }
}
