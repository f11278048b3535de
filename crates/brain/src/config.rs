// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration for the Brain service (spec.md §6).

use std::collections::HashMap;
use std::time::Duration;

use crate::error::BrainError;

/// Settings sourced from CLI flags layered over environment variables.
///
/// Injected as a value rather than read globally, so the state machine and
/// pipeline stay testable against synthetic configs (design notes, §9).
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "brain", about = "Fruit-inspection station orchestrator")]
pub struct Settings {
    /// Deployment environment, informational only.
    #[arg(long, default_value = "dev", env = "APP_ENV")]
    pub app_env: String,

    /// Log verbosity passed to the tracing `EnvFilter` default.
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Host to bind the HTTP server on.
    #[arg(long, default_value = "0.0.0.0", env = "BRAIN_HOST")]
    pub host: String,

    /// Port to bind the HTTP server on.
    #[arg(long, default_value_t = 8000, env = "BRAIN_PORT")]
    pub port: u16,

    #[arg(long, default_value = "http://localhost:8100", env = "WEIGHT_SERVICE_URL")]
    pub weight_service_url: String,

    #[arg(long, default_value = "http://localhost:8200", env = "CAMERA_SERVICE_URL")]
    pub camera_service_url: String,

    #[arg(long, default_value = "http://localhost:8300", env = "FRUIT_DETECTOR_URL")]
    pub fruit_detector_url: String,

    #[arg(long, default_value = "http://localhost:8400", env = "DEFECT_DETECTOR_URL")]
    pub defect_detector_url: String,

    #[arg(long, default_value = "http://localhost:8500", env = "UI_SERVICE_URL")]
    pub ui_service_url: String,

    #[arg(long, default_value = "http://localhost:8600", env = "MAIN_SERVER_URL")]
    pub main_server_url: String,

    #[arg(long, default_value_t = false, env = "ENABLE_MAIN_SERVER_PUBLISH")]
    pub enable_main_server_publish: bool,

    #[arg(long, default_value_t = true, env = "ENABLE_WEIGHT_POLLING")]
    pub enable_weight_polling: bool,

    #[arg(long, default_value_t = 30.0, env = "MIN_FRUIT_WEIGHT")]
    pub min_fruit_weight: f64,

    #[arg(long, default_value_t = 20.0, env = "SIGNIFICANT_DELTA")]
    pub significant_delta: f64,

    #[arg(long, default_value_t = 5.0, env = "WEIGHT_NOISE_EPSILON")]
    pub weight_noise_epsilon: f64,

    #[arg(long, default_value_t = 400, env = "STABLE_WINDOW_MS")]
    pub stable_window_ms: u64,

    #[arg(long, default_value_t = 2_000, env = "MIN_SCAN_INTERVAL_MS")]
    pub min_scan_interval_ms: u64,

    #[arg(long, default_value_t = 150, env = "WEIGHT_POLL_INTERVAL_MS")]
    pub weight_poll_interval_ms: u64,

    #[arg(long, default_value_t = 320, env = "FRUIT_DETECTOR_PRIMARY_IMGSZ")]
    pub fruit_detector_primary_imgsz: u32,

    #[arg(long, default_value_t = 416, env = "FRUIT_DETECTOR_FALLBACK_IMGSZ")]
    pub fruit_detector_fallback_imgsz: u32,

    #[arg(long, default_value_t = 0.30, env = "FRUIT_DETECTOR_CONFIDENCE_GUARD")]
    pub fruit_detector_confidence_guard: f64,

    #[arg(long, default_value_t = 0.001, env = "FRUIT_DETECTOR_MIN_BBOX_AREA_RATIO")]
    pub fruit_detector_min_bbox_area_ratio: f64,

    #[arg(long, default_value_t = 100.0, env = "FRUIT_EXPECTED_WEIGHT_PER_FRUIT")]
    pub fruit_expected_weight_per_fruit: f64,

    /// Per-class confidence thresholds as `class=threshold` pairs.
    #[arg(long = "fruit-class-threshold", value_parser = parse_class_threshold)]
    pub fruit_class_thresholds_raw: Vec<(String, f64)>,

    #[arg(long, default_value_t = false, env = "LOG_DISCARDED_DETECTIONS_DETAIL")]
    pub log_discarded_detections_detail: bool,
}

fn parse_class_threshold(raw: &str) -> Result<(String, f64), String> {
    let (class, threshold) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `class=threshold`, got `{raw}`"))?;
    let threshold: f64 = threshold.parse().map_err(|_| format!("invalid threshold in `{raw}`"))?;
    Ok((class.to_owned(), threshold))
}

impl Settings {
    /// Per-class confidence thresholds, falling back to the documented
    /// defaults when none were supplied on the command line.
    pub fn fruit_class_thresholds(&self) -> HashMap<String, f64> {
        if self.fruit_class_thresholds_raw.is_empty() {
            HashMap::from([
                ("apple".to_owned(), 0.55),
                ("banana".to_owned(), 0.40),
                ("tomato".to_owned(), 0.60),
            ])
        } else {
            self.fruit_class_thresholds_raw.iter().cloned().collect()
        }
    }

    pub fn weight_poll_interval(&self) -> Duration {
        Duration::from_millis(self.weight_poll_interval_ms)
    }

    pub fn stable_window(&self) -> Duration {
        Duration::from_millis(self.stable_window_ms)
    }

    pub fn min_scan_interval(&self) -> Duration {
        Duration::from_millis(self.min_scan_interval_ms)
    }

    /// Validate ranges documented in spec.md §6. Violations are fatal at
    /// startup (`ConfigFailure`).
    pub fn validate(&self) -> Result<(), BrainError> {
        let in_unit_range = |name: &str, value: f64| -> Result<(), BrainError> {
            if !(0.0..=1.0).contains(&value) {
                return Err(BrainError::Config(format!("{name} must be within [0, 1], got {value}")));
            }
            Ok(())
        };
        in_unit_range("fruit_detector_confidence_guard", self.fruit_detector_confidence_guard)?;
        in_unit_range("fruit_detector_min_bbox_area_ratio", self.fruit_detector_min_bbox_area_ratio)?;

        if self.fruit_expected_weight_per_fruit <= 0.0 {
            return Err(BrainError::Config(
                "fruit_expected_weight_per_fruit must be > 0".to_owned(),
            ));
        }
        if self.min_fruit_weight < 0.0 {
            return Err(BrainError::Config("min_fruit_weight must be >= 0".to_owned()));
        }
        for (class, threshold) in &self.fruit_class_thresholds_raw {
            in_unit_range(&format!("fruit_class_thresholds[{class}]"), *threshold)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
