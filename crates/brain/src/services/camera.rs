// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Camera service client (spec.md §4.3, §6).

use async_trait::async_trait;

use super::base::ServiceClient;
use crate::error::BrainError;
use crate::models::CameraCaptureResponse;

#[async_trait]
pub trait CameraService: Send + Sync {
    /// Requests a capture at `resolution_px x resolution_px` (spec.md §4.4
    /// step 2: `P = fruit_detector_primary_imgsz`).
    async fn capture(&self, resolution_px: u32) -> Result<CameraCaptureResponse, BrainError>;
    async fn fetch_binary(&self, location: &str) -> Result<Vec<u8>, BrainError>;
    async fn close(&self);
}

pub struct CameraServiceClient {
    inner: ServiceClient,
}

impl CameraServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { inner: ServiceClient::new(base_url) }
    }
}

#[async_trait]
impl CameraService for CameraServiceClient {
    async fn capture(&self, resolution_px: u32) -> Result<CameraCaptureResponse, BrainError> {
        let url = format!("{}/capture", self.inner.base_url());
        let resolution = format!("{resolution_px}x{resolution_px}");
        let body = self.inner.post_json("/capture", &serde_json::json!({ "resolution": resolution })).await?;
        let capture: CameraCaptureResponse = serde_json::from_value(body)
            .map_err(|e| BrainError::validation(&url, format!("malformed capture response: {e}")))?;
        tracing::info!(image_id = %capture.image_id, timestamp = %capture.timestamp, "captured image");
        Ok(capture)
    }

    async fn fetch_binary(&self, location: &str) -> Result<Vec<u8>, BrainError> {
        let bytes = self.inner.get_binary(location).await?;
        tracing::info!(location, size = bytes.len(), "fetched image bytes");
        Ok(bytes)
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
