// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Weight-driven state machine coordinating scan triggers (spec.md §4.1).

use std::collections::VecDeque;
use std::time::Instant;

use crate::config::Settings;
use crate::models::{ScanDecision, ScanState, Transition, WeightReading};

/// Encapsulates weight-based event logic with explicit transitions.
///
/// Not safe for concurrent `process` calls — only the weight-poll task may
/// drive it (spec.md §5). Manual scans bypass it entirely.
pub struct WeightStateMachine {
    min_fruit_weight: f64,
    significant_delta: f64,
    weight_noise_epsilon: f64,
    stable_window: std::time::Duration,
    min_scan_interval: std::time::Duration,

    state: ScanState,
    window: VecDeque<WeightReading>,
    last_scan_at: Option<Instant>,
    last_scan_weight: f64,
}

impl WeightStateMachine {
    pub fn new(settings: &Settings) -> Self {
        Self {
            min_fruit_weight: settings.min_fruit_weight,
            significant_delta: settings.significant_delta,
            weight_noise_epsilon: settings.weight_noise_epsilon,
            stable_window: settings.stable_window(),
            min_scan_interval: settings.min_scan_interval(),
            state: ScanState::Idle,
            window: VecDeque::new(),
            last_scan_at: None,
            last_scan_weight: 0.0,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Feed a new reading and return the resulting decision.
    pub fn process(&mut self, reading: WeightReading) -> ScanDecision {
        self.window.push_back(reading);
        self.prune_window(reading.timestamp);

        let Some(stable_weight) = self.stable_weight() else {
            return ScanDecision::no_decision(self.state);
        };

        let mut transition = Transition::None;
        let mut scan_requested = false;

        match self.state {
            ScanState::Idle if stable_weight >= self.min_fruit_weight => {
                self.state = ScanState::Active;
                transition = Transition::IdleToActive;
                scan_requested = self.mark_scan_if_allowed(stable_weight, reading.timestamp);
            }
            ScanState::Idle => {}
            ScanState::Active => {
                if stable_weight < self.min_fruit_weight {
                    self.state = ScanState::Idle;
                    transition = Transition::ActiveToIdle;
                } else if self.is_significant_delta(stable_weight)
                    && self.interval_ok(reading.timestamp)
                {
                    self.last_scan_at = Some(reading.timestamp);
                    self.last_scan_weight = stable_weight;
                    scan_requested = true;
                }
            }
        }

        ScanDecision { state: self.state, scan_requested, transition }
    }

    fn prune_window(&mut self, now: Instant) {
        while let Some(front) = self.window.front() {
            if now.saturating_duration_since(front.timestamp) > self.stable_window {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Arithmetic mean of the window, defined only when it holds >= 2
    /// readings and its range is within `weight_noise_epsilon`.
    fn stable_weight(&self) -> Option<f64> {
        if self.window.len() < 2 {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for reading in &self.window {
            min = min.min(reading.grams);
            max = max.max(reading.grams);
            sum += reading.grams;
        }
        if max - min > self.weight_noise_epsilon {
            return None;
        }
        Some(sum / self.window.len() as f64)
    }

    fn is_significant_delta(&self, weight: f64) -> bool {
        (weight - self.last_scan_weight).abs() >= self.significant_delta
    }

    fn interval_ok(&self, now: Instant) -> bool {
        match self.last_scan_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_scan_interval,
        }
    }

    fn mark_scan_if_allowed(&mut self, weight: f64, now: Instant) -> bool {
        if self.interval_ok(now) {
            self.last_scan_at = Some(now);
            self.last_scan_weight = weight;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod tests;
