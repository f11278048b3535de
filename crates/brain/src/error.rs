// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the Brain orchestrator service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Top-level error type for the Brain service.
///
/// Mirrors the taxonomy in the design notes: transport/validation failures
/// from downstream services, configuration failures fatal at startup, and
/// pipeline failures local to one scan session.
#[derive(Debug, thiserror::Error)]
pub enum BrainError {
    #[error("request to {url} failed: {cause}")]
    Transport { url: String, status: Option<u16>, cause: String },

    #[error("response from {url} failed validation: {cause}")]
    Validation { url: String, cause: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("scan pipeline failed: {0}")]
    Pipeline(String),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl BrainError {
    pub fn transport(url: impl Into<String>, status: Option<u16>, cause: impl ToString) -> Self {
        Self::Transport { url: url.into(), status, cause: cause.to_string() }
    }

    pub fn validation(url: impl Into<String>, cause: impl ToString) -> Self {
        Self::Validation { url: url.into(), cause: cause.to_string() }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TRANSPORT_FAILURE",
            Self::Validation { .. } => "VALIDATION_FAILURE",
            Self::Config(_) => "CONFIG_FAILURE",
            Self::Pipeline(_) => "PIPELINE_FAILURE",
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Transport { .. } | Self::Validation { .. } => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

impl IntoResponse for BrainError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = ErrorResponse { error: ErrorBody { code: self.code(), message: self.to_string() } };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
