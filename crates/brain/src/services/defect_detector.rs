// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Defect detector client (spec.md §4.2, §4.3, §6).

use async_trait::async_trait;

use super::base::ServiceClient;
use crate::error::BrainError;
use crate::models::DefectDetectionResult;

/// Below this confidence a defect is logged but never dropped — filtering
/// decisions live in the scan pipeline, not the client.
const LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;

#[async_trait]
pub trait DefectDetectorService: Send + Sync {
    async fn detect(
        &self,
        image_id: &str,
        fruit_id: &str,
        crop_bytes: Vec<u8>,
        filename: &str,
    ) -> Result<DefectDetectionResult, BrainError>;
    async fn close(&self);
}

pub struct DefectDetectorClient {
    inner: ServiceClient,
}

impl DefectDetectorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { inner: ServiceClient::new(base_url) }
    }
}

#[async_trait]
impl DefectDetectorService for DefectDetectorClient {
    async fn detect(
        &self,
        image_id: &str,
        fruit_id: &str,
        crop_bytes: Vec<u8>,
        filename: &str,
    ) -> Result<DefectDetectionResult, BrainError> {
        tracing::debug!(fruit_id, size = crop_bytes.len(), "sending crop to defect detector");
        let url = format!("{}/detect-defects", self.inner.base_url());
        let body = self
            .inner
            .post_multipart(
                "/detect-defects",
                "image",
                filename,
                crop_bytes,
                &[("image_id", image_id), ("fruit_id", fruit_id)],
            )
            .await?;
        let result: DefectDetectionResult = serde_json::from_value(body)
            .map_err(|e| BrainError::validation(&url, format!("malformed defect result: {e}")))?;

        tracing::info!(fruit_id, image_id, count = result.defects.len(), "defect detector response");

        if !result.defects.is_empty() {
            let low_confidence: Vec<_> =
                result.defects.iter().filter(|d| d.confidence < LOW_CONFIDENCE_THRESHOLD).collect();
            if !low_confidence.is_empty() {
                tracing::warn!(
                    fruit_id,
                    low_confidence = low_confidence.len(),
                    "low confidence defects detected"
                );
            }
        }

        Ok(result)
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
#[path = "defect_detector_tests.rs"]
mod tests;
