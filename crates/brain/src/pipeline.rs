// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan pipeline: capture, detect, filter, crop, and publish (spec.md §4.2).

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::BrainError;
use crate::image_ops::ImageCropper;
use crate::models::{FruitDetection, FruitSummary, ScanResult, WeightReading};
use crate::services::{CameraService, DefectDetectorService, FruitDetectorService, ResultPublisher};

/// Coordinates one full scan end to end.
///
/// Holds no mutable state of its own — every field is an `Arc` to a shared,
/// interior-mutable client, so the pipeline can be invoked concurrently for
/// overlapping scan sessions without synchronization here.
pub struct ScanPipeline {
    settings: Settings,
    camera: Arc<dyn CameraService>,
    fruit_detector: Arc<dyn FruitDetectorService>,
    defect_detector: Arc<dyn DefectDetectorService>,
    ui: Arc<dyn ResultPublisher>,
    main_server: Arc<dyn ResultPublisher>,
}

impl ScanPipeline {
    pub fn new(
        settings: Settings,
        camera: Arc<dyn CameraService>,
        fruit_detector: Arc<dyn FruitDetectorService>,
        defect_detector: Arc<dyn DefectDetectorService>,
        ui: Arc<dyn ResultPublisher>,
        main_server: Arc<dyn ResultPublisher>,
    ) -> Self {
        Self { settings, camera, fruit_detector, defect_detector, ui, main_server }
    }

    /// Closes every downstream client this pipeline holds. Called once by
    /// the orchestrator during shutdown, after all inflight scans finish.
    pub async fn close_clients(&self) {
        self.camera.close().await;
        self.fruit_detector.close().await;
        self.defect_detector.close().await;
        self.ui.close().await;
        self.main_server.close().await;
    }

    /// Runs one scan for a single stable weight reading, publishing the
    /// result to the UI (and optionally the main server) on success.
    pub async fn execute_scan(&self, reading: WeightReading) -> Result<ScanResult, BrainError> {
        let session_id = Uuid::new_v4().to_string();
        tracing::info!(session_id, weight = reading.grams, "starting scan");

        let primary_imgsz = self.settings.fruit_detector_primary_imgsz;
        let capture = self.camera.capture(primary_imgsz).await?;
        let location = capture.resolved_location().ok_or_else(|| {
            BrainError::validation(&self.settings.camera_service_url, "capture response has no image path or url")
        })?;
        let image_bytes = self.camera.fetch_binary(location).await?;

        let cropper = Arc::new(ImageCropper::new(&image_bytes)?);
        let (width, height) = cropper.size();
        let image_area = (width as f64) * (height as f64);
        let raw_detections =
            self.fruit_detector.detect(&capture.image_id, image_bytes.clone(), primary_imgsz).await?.fruits;

        let after_bbox_filter = self.filter_by_bbox_area(&raw_detections, image_area, &capture.image_id);
        let mut filtered = self.filter_by_class_threshold(&after_bbox_filter, &capture.image_id);

        if let Some(reason) = self.should_fallback(&filtered, &raw_detections, reading.grams, &capture.image_id) {
            tracing::info!(image_id = %capture.image_id, reason, "triggering fallback detection");
            let fallback_imgsz = self.settings.fruit_detector_fallback_imgsz;
            let raw_fallback =
                self.fruit_detector.detect(&capture.image_id, image_bytes.clone(), fallback_imgsz).await?.fruits;
            let after_bbox_filter = self.filter_by_bbox_area(&raw_fallback, image_area, &capture.image_id);
            filtered = self.filter_by_class_threshold(&after_bbox_filter, &capture.image_id);

            if filtered.is_empty() {
                tracing::warn!(
                    image_id = %capture.image_id,
                    weight = reading.grams,
                    session_id,
                    "no fruits detected even after fallback"
                );
            }
        }

        let fruits = self.analyze_fruits(Arc::clone(&cropper), filtered, &capture.image_id).await;

        let result = ScanResult {
            session_id: session_id.clone(),
            image_id: capture.image_id.clone(),
            timestamp: Utc::now(),
            weight_grams: reading.grams,
            fruits,
        };

        self.publish(&result).await?;
        tracing::info!(session_id, fruits = result.fruits.len(), "finished scan");
        Ok(result)
    }

    async fn publish(&self, result: &ScanResult) -> Result<(), BrainError> {
        if self.settings.enable_main_server_publish {
            let (ui, main_server) = tokio::join!(self.ui.publish(result), self.main_server.publish(result));
            ui?;
            main_server?;
        } else {
            tracing::debug!(session_id = %result.session_id, "main server publish disabled; skipping");
            self.ui.publish(result).await?;
        }
        Ok(())
    }

    /// Fans out one crop + defect-detect pair per surviving detection.
    /// A single fruit's defect-detector failure degrades to an empty defect
    /// list rather than failing the whole scan (spec.md §4.2).
    async fn analyze_fruits(
        &self,
        cropper: Arc<ImageCropper>,
        detections: Vec<FruitDetection>,
        image_id: &str,
    ) -> Vec<FruitSummary> {
        if detections.is_empty() {
            return Vec::new();
        }

        let handles: Vec<_> = detections
            .into_iter()
            .map(|detection| {
                let cropper = Arc::clone(&cropper);
                let defect_detector = Arc::clone(&self.defect_detector);
                let image_id = image_id.to_owned();
                tokio::spawn(async move {
                    let bbox = detection.bbox;
                    let crop_cropper = Arc::clone(&cropper);
                    let crop_bytes = tokio::task::spawn_blocking(move || crop_cropper.crop(&bbox))
                        .await
                        .map_err(|e| BrainError::Pipeline(format!("crop task panicked: {e}")))??;

                    let filename = format!("{}.jpg", detection.fruit_id);
                    let defects = match defect_detector
                        .detect(&image_id, &detection.fruit_id, crop_bytes, &filename)
                        .await
                    {
                        Ok(result) => result.defects,
                        Err(e) => {
                            tracing::error!(fruit_id = %detection.fruit_id, error = %e, "defect analysis failed");
                            Vec::new()
                        }
                    };

                    Ok::<FruitSummary, BrainError>(FruitSummary {
                        fruit_id: detection.fruit_id,
                        fruit_class: detection.fruit_class,
                        confidence: detection.confidence,
                        bbox: detection.bbox,
                        defects,
                    })
                })
            })
            .collect();

        let finished = futures_util::future::join_all(handles).await;
        let mut summaries = Vec::with_capacity(finished.len());
        for outcome in finished {
            match outcome {
                Ok(Ok(summary)) => summaries.push(summary),
                Ok(Err(e)) => tracing::error!(error = %e, "fruit analysis task failed"),
                Err(e) => tracing::error!(error = %e, "fruit analysis task panicked"),
            }
        }
        summaries
    }

    fn filter_by_bbox_area(
        &self,
        detections: &[FruitDetection],
        image_area: f64,
        image_id: &str,
    ) -> Vec<FruitDetection> {
        if detections.is_empty() {
            return Vec::new();
        }
        let min_area_ratio = self.settings.fruit_detector_min_bbox_area_ratio;
        let min_area = image_area * min_area_ratio;

        let mut valid = Vec::new();
        for detection in detections {
            let bbox_area = detection.bbox.area();
            if bbox_area >= min_area {
                valid.push(detection.clone());
            } else if self.settings.log_discarded_detections_detail {
                let ratio = if image_area > 0.0 { bbox_area / image_area } else { 0.0 };
                tracing::info!(
                    image_id,
                    fruit_id = %detection.fruit_id,
                    class = %detection.fruit_class,
                    bbox_area,
                    area_ratio = ratio,
                    min_area_ratio,
                    "fruit dropped due to small bbox area"
                );
            }
        }
        tracing::debug!(image_id, passed = valid.len(), total = detections.len(), "bbox area filtering");
        valid
    }

    fn filter_by_class_threshold(&self, detections: &[FruitDetection], image_id: &str) -> Vec<FruitDetection> {
        if detections.is_empty() {
            return Vec::new();
        }
        let thresholds = self.settings.fruit_class_thresholds();
        let fallback_threshold = self.settings.fruit_detector_confidence_guard;

        let mut valid = Vec::new();
        for detection in detections {
            let threshold = thresholds.get(&detection.fruit_class).copied().unwrap_or(fallback_threshold);
            if detection.confidence >= threshold {
                valid.push(detection.clone());
            } else if self.settings.log_discarded_detections_detail {
                tracing::info!(
                    image_id,
                    fruit_id = %detection.fruit_id,
                    class = %detection.fruit_class,
                    confidence = detection.confidence,
                    threshold,
                    "fruit dropped due to low class-specific confidence"
                );
            }
        }
        tracing::debug!(image_id, passed = valid.len(), total = detections.len(), "class threshold filtering");
        valid
    }

    /// Decides whether the primary detection pass needs a fallback retry at
    /// a different inference size (spec.md §4.2, three independent
    /// conditions evaluated in order).
    fn should_fallback(
        &self,
        filtered: &[FruitDetection],
        raw_detections: &[FruitDetection],
        weight_grams: f64,
        image_id: &str,
    ) -> Option<&'static str> {
        let min_weight = self.settings.min_fruit_weight;
        let confidence_guard = self.settings.fruit_detector_confidence_guard;
        let expected_weight_per_fruit = self.settings.fruit_expected_weight_per_fruit;

        if weight_grams >= min_weight && filtered.is_empty() {
            return Some("weight_indicates_fruit_but_no_detections");
        }

        if !raw_detections.is_empty() && raw_detections.iter().all(|d| d.confidence < confidence_guard) {
            return Some("all_detections_below_confidence_guard");
        }

        if weight_grams >= min_weight && expected_weight_per_fruit > 0.0 {
            let expected_count = (weight_grams / expected_weight_per_fruit) as i64;
            let actual_count = filtered.len() as i64;
            if expected_count >= 2 && actual_count < expected_count - 1 {
                tracing::debug!(image_id, weight_grams, expected_count, actual_count, "weight-based fruit count mismatch");
                return Some("expected_more_fruits_by_weight");
            }
        }

        None
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
