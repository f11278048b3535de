// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level coordinator wiring the weight poll loop to scan execution
//! (spec.md §4.1, §5).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Settings;
use crate::models::WeightReading;
use crate::pipeline::ScanPipeline;
use crate::services::{CameraService, DefectDetectorService, FruitDetectorService, ResultPublisher, WeightService};
use crate::state_machine::WeightStateMachine;

/// Coordinates the background weight poll loop and manual scan requests.
///
/// Manual scans bypass the state machine entirely (spec.md §5's documented
/// current contract): they spawn [`ScanPipeline::execute_scan`] directly
/// into the inflight set and never touch `last_scan_at`/`last_scan_weight`,
/// so a manual trigger has no effect on when the next weight-driven scan is
/// allowed to fire.
pub struct BrainOrchestrator {
    settings: Settings,
    weight_client: Arc<dyn WeightService>,
    pipeline: Arc<ScanPipeline>,
    state_machine: Mutex<WeightStateMachine>,
    inflight: Mutex<HashMap<String, JoinHandle<()>>>,
    cancel: CancellationToken,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
}

impl BrainOrchestrator {
    pub fn new(
        settings: Settings,
        weight_client: Arc<dyn WeightService>,
        camera: Arc<dyn CameraService>,
        fruit_detector: Arc<dyn FruitDetectorService>,
        defect_detector: Arc<dyn DefectDetectorService>,
        ui: Arc<dyn ResultPublisher>,
        main_server: Arc<dyn ResultPublisher>,
    ) -> Self {
        let state_machine = WeightStateMachine::new(&settings);
        let pipeline =
            Arc::new(ScanPipeline::new(settings.clone(), camera, fruit_detector, defect_detector, ui, main_server));
        Self {
            settings,
            weight_client,
            pipeline,
            state_machine: Mutex::new(state_machine),
            inflight: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            poll_handle: Mutex::new(None),
        }
    }

    /// Starts the background weight poll loop, unless disabled in config.
    pub async fn start(self: &Arc<Self>) {
        tracing::info!("starting brain orchestrator");
        if !self.settings.enable_weight_polling {
            tracing::warn!("weight polling disabled via settings; rely on manual scans");
            return;
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.poll_weight_loop().await });
        *self.poll_handle.lock().await = Some(handle);
    }

    /// Stops the poll loop, awaits inflight scans, and closes every
    /// downstream client. Safe to call more than once.
    pub async fn shutdown(&self) {
        tracing::info!("stopping brain orchestrator");
        self.cancel.cancel();

        if let Some(handle) = self.poll_handle.lock().await.take() {
            let _ = handle.await;
        }

        let handles: Vec<_> = self.inflight.lock().await.drain().map(|(_, handle)| handle).collect();
        for handle in handles {
            let _ = handle.await;
        }

        self.pipeline.close_clients().await;
        self.weight_client.close().await;
    }

    /// Spawns a scan directly from the supplied weight and returns once the
    /// task is accepted, bypassing the state machine's debounce and
    /// rate-limit gates entirely (spec.md §5's documented current contract:
    /// a manual scan never touches `last_scan_at`/`last_scan_weight`).
    ///
    /// Mirrors `/trigger-scan`'s documented contract of returning before the
    /// scan completes (spec.md §6) — callers observe the outcome via the UI
    /// publish, not this call's return.
    pub async fn trigger_scan(self: &Arc<Self>, grams: f64) {
        let reading = WeightReading::now(grams);
        self.spawn_scan(reading).await;
    }

    async fn poll_weight_loop(self: Arc<Self>) {
        let poll_interval = self.settings.weight_poll_interval();
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let sleep_for = match self.weight_client.read().await {
                Ok(reading) => {
                    let decision = self.state_machine.lock().await.process(reading);
                    if decision.scan_requested {
                        self.spawn_scan(reading).await;
                    }
                    poll_interval
                }
                Err(e) => {
                    tracing::error!(error = %e, "weight polling failed");
                    poll_interval * 2
                }
            };

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    async fn spawn_scan(self: &Arc<Self>, reading: WeightReading) {
        let session_id = Uuid::new_v4().to_string();
        let pipeline = Arc::clone(&self.pipeline);
        let this = Arc::clone(self);
        let task_session_id = session_id.clone();

        // Hold the lock across the spawn so the task's own completion-time
        // `remove` (which also locks `inflight`) cannot run before this
        // `insert` registers it — otherwise a fast scan on a multi-threaded
        // runtime can remove a not-yet-inserted key and strand its handle.
        let mut inflight = self.inflight.lock().await;
        let handle = tokio::spawn(async move {
            if let Err(e) = pipeline.execute_scan(reading).await {
                tracing::error!(session_id = %task_session_id, error = %e, "scan failed");
            }
            this.inflight.lock().await.remove(&task_session_id);
        });
        inflight.insert(session_id, handle);
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
