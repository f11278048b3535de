// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Main server / downstream-integration client (spec.md §4.3, §6).

use async_trait::async_trait;

use super::base::ServiceClient;
use super::ui::ResultPublisher;
use crate::error::BrainError;
use crate::models::ScanResult;

pub struct MainServerClient {
    inner: ServiceClient,
}

impl MainServerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { inner: ServiceClient::new(base_url) }
    }
}

#[async_trait]
impl ResultPublisher for MainServerClient {
    async fn publish(&self, result: &ScanResult) -> Result<(), BrainError> {
        self.inner.post_json("/ingest", result).await?;
        tracing::info!(session_id = %result.session_id, "main server update sent");
        Ok(())
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
#[path = "main_server_tests.rs"]
mod tests;
