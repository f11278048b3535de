// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the Brain orchestrator service.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::BrainError;
use crate::orchestrator::BrainOrchestrator;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Deserialize)]
pub struct ManualScanRequest {
    pub weight_grams: f64,
}

#[derive(Debug, Serialize)]
pub struct ManualScanResponse {
    pub status: &'static str,
}

/// `POST /trigger-scan` — bypasses the state machine entirely and returns
/// as soon as the scan task is accepted, before it completes (spec.md §6).
pub async fn trigger_scan(
    State(orchestrator): State<Arc<BrainOrchestrator>>,
    Json(payload): Json<ManualScanRequest>,
) -> Result<impl IntoResponse, BrainError> {
    if payload.weight_grams <= 0.0 {
        return Err(BrainError::BadRequest("weight_grams must be > 0".to_owned()));
    }
    orchestrator.trigger_scan(payload.weight_grams).await;
    Ok(Json(ManualScanResponse { status: "accepted" }))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
