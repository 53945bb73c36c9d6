use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be read (bad JSON, bad path, missing fields).
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Error response body. `message` is what the client shows to the user.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, detail) = match &self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            ApiError::Engine(e @ EngineError::Validation(_)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Dados do agendamento inválidos.".to_string(),
                Some(e.to_string()),
            ),
            ApiError::Engine(e @ EngineError::LimitExceeded(_)) => (
                StatusCode::BAD_REQUEST,
                "LIMIT_EXCEEDED",
                "Limite excedido.".to_string(),
                Some(e.to_string()),
            ),
            ApiError::Engine(e @ EngineError::Conflict { .. }) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                "Horário indisponível para a data escolhida.".to_string(),
                Some(e.to_string()),
            ),
            ApiError::Engine(e @ EngineError::NotFound(_)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Agendamento não encontrado.".to_string(),
                Some(e.to_string()),
            ),
            ApiError::Engine(e @ EngineError::Unavailable(_)) => {
                tracing::error!("storage failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UNAVAILABLE",
                    "Erro interno do sistema.".to_string(),
                    None,
                )
            }
        };

        if let ApiError::Engine(e) = &self
            && e.is_user_error()
        {
            tracing::debug!("request rejected: {e}");
        }

        let body = ErrorResponse {
            message,
            code,
            detail,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
