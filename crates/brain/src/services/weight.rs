// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Weight service client (spec.md §4.3, §6).

use async_trait::async_trait;
use serde::Deserialize;

use super::base::ServiceClient;
use crate::error::BrainError;
use crate::models::WeightReading;

#[derive(Debug, Deserialize)]
struct WeightReadingWire {
    grams: f64,
}

/// Polled by the orchestrator's weight loop to drive the state machine.
#[async_trait]
pub trait WeightService: Send + Sync {
    async fn read(&self) -> Result<WeightReading, BrainError>;
    async fn close(&self);
}

pub struct WeightServiceClient {
    inner: ServiceClient,
}

impl WeightServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { inner: ServiceClient::new(base_url) }
    }
}

#[async_trait]
impl WeightService for WeightServiceClient {
    async fn read(&self) -> Result<WeightReading, BrainError> {
        let url = format!("{}/read", self.inner.base_url());
        let body = self.inner.post_json("/read", &serde_json::json!({})).await?;
        let wire: WeightReadingWire = serde_json::from_value(body)
            .map_err(|e| BrainError::validation(&url, format!("malformed weight reading: {e}")))?;
        tracing::debug!(grams = wire.grams, "weight reading");
        Ok(WeightReading::now(wire.grams))
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
#[path = "weight_tests.rs"]
mod tests;
