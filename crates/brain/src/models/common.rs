// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model (spec.md §3).

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

/// A single weight sample from the weight service.
///
/// `timestamp` is a monotonic [`Instant`] assigned when the reading is
/// received, not the wall-clock stamp the weight service reports — interval
/// math in the state machine needs a monotonic clock, and mixing wall clock
/// with monotonic arithmetic is the exact ambiguity the design notes call
/// out to resolve rather than guess at.
#[derive(Debug, Clone, Copy)]
pub struct WeightReading {
    pub grams: f64,
    pub timestamp: Instant,
}

impl WeightReading {
    /// Build a reading, clamping negative weights to zero (the wire contract
    /// guarantees `grams >= 0`, but defensive construction keeps the
    /// invariant true for manually constructed readings too).
    pub fn new(grams: f64, timestamp: Instant) -> Self {
        Self { grams: grams.max(0.0), timestamp }
    }

    pub fn now(grams: f64) -> Self {
        Self::new(grams, Instant::now())
    }
}

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self { x_min, y_min, x_max, y_max }
    }

    pub fn width(&self) -> f64 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Pixel rectangle with fractional coordinates truncated toward zero,
    /// as `[x_min, y_min, x_max, y_max)`.
    pub fn as_pixel_rect(&self) -> (u32, u32, u32, u32) {
        (self.x_min as u32, self.y_min as u32, self.x_max as u32, self.y_max as u32)
    }
}

/// Accepts either a 4-element sequence `[x_min, y_min, x_max, y_max]` or an
/// object with those keys (spec.md §6).
impl<'de> Deserialize<'de> for BoundingBox {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BBoxVisitor;

        impl<'de> Visitor<'de> for BBoxVisitor {
            type Value = BoundingBox;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 4-element sequence or an object with x_min/y_min/x_max/y_max")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let x_min = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &"4 elements"))?;
                let y_min = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &"4 elements"))?;
                let x_max = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &"4 elements"))?;
                let y_max = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(3, &"4 elements"))?;
                if seq.next_element::<f64>()?.is_some() {
                    return Err(de::Error::invalid_length(5, &"4 elements"));
                }
                Ok(BoundingBox { x_min, y_min, x_max, y_max })
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut x_min = None;
                let mut y_min = None;
                let mut x_max = None;
                let mut y_max = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "x_min" => x_min = Some(map.next_value()?),
                        "y_min" => y_min = Some(map.next_value()?),
                        "x_max" => x_max = Some(map.next_value()?),
                        "y_max" => y_max = Some(map.next_value()?),
                        _ => {
                            let _: serde::de::IgnoredAny = map.next_value()?;
                        }
                    }
                }
                Ok(BoundingBox {
                    x_min: x_min.ok_or_else(|| de::Error::missing_field("x_min"))?,
                    y_min: y_min.ok_or_else(|| de::Error::missing_field("y_min"))?,
                    x_max: x_max.ok_or_else(|| de::Error::missing_field("x_max"))?,
                    y_max: y_max.ok_or_else(|| de::Error::missing_field("y_max"))?,
                })
            }
        }

        deserializer.deserialize_any(BBoxVisitor)
    }
}

/// A single fruit detection from the fruit detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FruitDetection {
    pub fruit_id: String,
    #[serde(rename = "class")]
    pub fruit_class: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Wrapper for a fruit-detector response.
#[derive(Debug, Clone, Deserialize)]
pub struct FruitDetections {
    pub image_id: String,
    pub fruits: Vec<FruitDetection>,
}

/// Optional segmentation polygon attached to a defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DefectMask {
    #[serde(default)]
    pub polygon: Vec<(f64, f64)>,
}

/// A single detected defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectInfo {
    #[serde(rename = "type")]
    pub defect_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub segmentation: Option<DefectMask>,
}

/// Defect-detector response for one fruit crop.
#[derive(Debug, Clone, Deserialize)]
pub struct DefectDetectionResult {
    pub image_id: String,
    pub fruit_id: String,
    pub defects: Vec<DefectInfo>,
}

/// Camera capture metadata. At least one of `image_path`/`image_url` must be
/// present (enforced by [`CameraCaptureResponse::resolved_location`]).
#[derive(Debug, Clone, Deserialize)]
pub struct CameraCaptureResponse {
    pub image_id: String,
    #[serde(default, alias = "image_url_or_path")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CameraCaptureResponse {
    /// Returns the path (preferred) or URL to fetch binary image data from.
    pub fn resolved_location(&self) -> Option<&str> {
        self.image_path.as_deref().or(self.image_url.as_deref())
    }
}

/// Scan state-machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "ACTIVE")]
    Active,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("IDLE"),
            Self::Active => f.write_str("ACTIVE"),
        }
    }
}

/// State transition recorded by one [`ScanDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    #[serde(rename = "IDLE->ACTIVE")]
    IdleToActive,
    #[serde(rename = "ACTIVE->IDLE")]
    ActiveToIdle,
    #[serde(rename = "NONE")]
    None,
}

/// Outcome of feeding one reading into the weight state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDecision {
    pub state: ScanState,
    pub scan_requested: bool,
    pub transition: Transition,
}

impl ScanDecision {
    pub fn no_decision(state: ScanState) -> Self {
        Self { state, scan_requested: false, transition: Transition::None }
    }
}

/// One fruit's final published entry: detection fields plus its defects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FruitSummary {
    pub fruit_id: String,
    pub fruit_class: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub defects: Vec<DefectInfo>,
}

/// Final payload forwarded to the UI and (optionally) the main server.
///
/// `fruits` order reflects completion order of the per-fruit defect
/// fan-out, not detection order — callers must not depend on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub session_id: String,
    pub image_id: String,
    pub timestamp: DateTime<Utc>,
    pub weight_grams: f64,
    pub fruits: Vec<FruitSummary>,
}

#[cfg(test)]
#[path = "common_tests.rs"]
mod tests;
