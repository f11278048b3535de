// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the Brain orchestrator service.

pub mod http;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::orchestrator::BrainOrchestrator;

/// Build the axum `Router` exposing the health and manual-scan endpoints.
pub fn build_router(orchestrator: Arc<BrainOrchestrator>) -> Router {
    Router::new()
        .route("/healthz", get(http::healthz))
        .route("/trigger-scan", post(http::trigger_scan))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}
