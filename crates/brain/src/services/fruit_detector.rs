// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fruit detector client (spec.md §4.2, §4.3, §6).

use async_trait::async_trait;

use super::base::ServiceClient;
use crate::error::BrainError;
use crate::models::FruitDetections;

#[async_trait]
pub trait FruitDetectorService: Send + Sync {
    /// Uploads the full captured image and returns detections at the given
    /// inference size (primary or fallback, per spec.md §4.2).
    async fn detect(&self, image_id: &str, image_bytes: Vec<u8>, imgsz: u32) -> Result<FruitDetections, BrainError>;
    async fn close(&self);
}

pub struct FruitDetectorClient {
    inner: ServiceClient,
}

impl FruitDetectorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { inner: ServiceClient::new(base_url) }
    }
}

#[async_trait]
impl FruitDetectorService for FruitDetectorClient {
    async fn detect(&self, image_id: &str, image_bytes: Vec<u8>, imgsz: u32) -> Result<FruitDetections, BrainError> {
        let url = format!("{}/detect-fruits", self.inner.base_url());
        let imgsz_str = imgsz.to_string();
        let body = self
            .inner
            .post_multipart(
                "/detect-fruits",
                "file",
                "full.jpg",
                image_bytes,
                &[("image_id", image_id), ("imgsz", &imgsz_str)],
            )
            .await?;
        let detections: FruitDetections = serde_json::from_value(body)
            .map_err(|e| BrainError::validation(&url, format!("malformed fruit detections: {e}")))?;
        tracing::info!(image_id, imgsz, count = detections.fruits.len(), "fruit detector response");
        Ok(detections)
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
#[path = "fruit_detector_tests.rs"]
mod tests;
