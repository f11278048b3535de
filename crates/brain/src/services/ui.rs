// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UI service client (spec.md §4.3, §6).

use async_trait::async_trait;

use super::base::ServiceClient;
use crate::error::BrainError;
use crate::models::ScanResult;

#[async_trait]
pub trait ResultPublisher: Send + Sync {
    async fn publish(&self, result: &ScanResult) -> Result<(), BrainError>;
    async fn close(&self);
}

pub struct UiServiceClient {
    inner: ServiceClient,
}

impl UiServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { inner: ServiceClient::new(base_url) }
    }
}

#[async_trait]
impl ResultPublisher for UiServiceClient {
    async fn publish(&self, result: &ScanResult) -> Result<(), BrainError> {
        self.inner.post_json("/update", result).await?;
        tracing::info!(session_id = %result.session_id, "UI update sent");
        Ok(())
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
#[path = "ui_tests.rs"]
mod tests;
