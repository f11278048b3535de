// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fakes for the scan pipeline and orchestrator tests.
//!
//! Mirrors the adapter crate's fake pattern: record calls, return
//! pre-programmed responses, no network I/O.
#![cfg(any(test, feature = "test-support"))]

use std::sync::Mutex;

use async_trait::async_trait;

use super::camera::CameraService;
use super::defect_detector::DefectDetectorService;
use super::fruit_detector::FruitDetectorService;
use super::ui::ResultPublisher;
use super::weight::WeightService;
use crate::error::BrainError;
use crate::models::{CameraCaptureResponse, DefectDetectionResult, FruitDetections, ScanResult, WeightReading};

#[derive(Default)]
pub struct FakeWeightService {
    readings: Mutex<Vec<WeightReading>>,
}

impl FakeWeightService {
    pub fn new(readings: Vec<WeightReading>) -> Self {
        let mut readings = readings;
        readings.reverse();
        Self { readings: Mutex::new(readings) }
    }
}

#[async_trait]
impl WeightService for FakeWeightService {
    async fn read(&self) -> Result<WeightReading, BrainError> {
        self.readings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .ok_or_else(|| BrainError::transport("fake://weight", None, "no more readings queued"))
    }

    async fn close(&self) {}
}

pub struct FakeCameraService {
    pub capture_response: CameraCaptureResponse,
    pub image_bytes: Vec<u8>,
}

#[async_trait]
impl CameraService for FakeCameraService {
    async fn capture(&self, _resolution_px: u32) -> Result<CameraCaptureResponse, BrainError> {
        Ok(self.capture_response.clone())
    }

    async fn fetch_binary(&self, _location: &str) -> Result<Vec<u8>, BrainError> {
        Ok(self.image_bytes.clone())
    }

    async fn close(&self) {}
}

pub struct FakeFruitDetectorService {
    pub responses_by_imgsz: Mutex<std::collections::HashMap<u32, FruitDetections>>,
}

impl FakeFruitDetectorService {
    pub fn new(responses_by_imgsz: std::collections::HashMap<u32, FruitDetections>) -> Self {
        Self { responses_by_imgsz: Mutex::new(responses_by_imgsz) }
    }
}

#[async_trait]
impl FruitDetectorService for FakeFruitDetectorService {
    async fn detect(&self, _image_id: &str, _image_bytes: Vec<u8>, imgsz: u32) -> Result<FruitDetections, BrainError> {
        self.responses_by_imgsz
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&imgsz)
            .cloned()
            .ok_or_else(|| BrainError::transport("fake://fruit-detector", None, format!("no response for imgsz={imgsz}")))
    }

    async fn close(&self) {}
}

pub struct FakeDefectDetectorService {
    pub result: DefectDetectionResult,
    pub fail: bool,
}

impl Default for FakeDefectDetectorService {
    fn default() -> Self {
        Self {
            result: DefectDetectionResult { image_id: String::new(), fruit_id: String::new(), defects: Vec::new() },
            fail: false,
        }
    }
}

#[async_trait]
impl DefectDetectorService for FakeDefectDetectorService {
    async fn detect(
        &self,
        _image_id: &str,
        fruit_id: &str,
        _crop_bytes: Vec<u8>,
        _filename: &str,
    ) -> Result<DefectDetectionResult, BrainError> {
        if self.fail {
            return Err(BrainError::transport("fake://defect-detector", None, "forced failure"));
        }
        Ok(DefectDetectionResult {
            image_id: self.result.image_id.clone(),
            fruit_id: fruit_id.to_owned(),
            defects: self.result.defects.clone(),
        })
    }

    async fn close(&self) {}
}

#[derive(Default)]
pub struct FakePublisher {
    pub published: Mutex<Vec<ScanResult>>,
    pub fail: bool,
}

#[async_trait]
impl ResultPublisher for FakePublisher {
    async fn publish(&self, result: &ScanResult) -> Result<(), BrainError> {
        if self.fail {
            return Err(BrainError::transport("fake://publisher", None, "forced failure"));
        }
        self.published.lock().unwrap_or_else(|e| e.into_inner()).push(result.clone());
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
#[path = "fakes_tests.rs"]
mod tests;
