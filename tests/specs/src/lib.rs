// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end acceptance tests against the real `brain`
//! binary, driven over HTTP with wiremock standing in for the six
//! downstream services (spec.md §8).

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `brain` binary.
pub fn brain_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("brain")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Downstream service URLs a [`BrainProcess`] is wired to, one per client
/// the orchestrator owns (spec.md §4.3).
pub struct Downstreams<'a> {
    pub weight_url: &'a str,
    pub camera_url: &'a str,
    pub fruit_detector_url: &'a str,
    pub defect_detector_url: &'a str,
    pub ui_url: &'a str,
    pub main_server_url: &'a str,
}

/// A running `brain` process, killed on drop.
pub struct BrainProcess {
    child: Child,
    port: u16,
}

impl BrainProcess {
    /// Spawn `brain` with weight polling disabled, pointed at the given
    /// downstream mock servers. Manual scans via `/trigger-scan` are the
    /// only way to drive a scan in this mode.
    pub fn start_manual(downstreams: &Downstreams<'_>) -> anyhow::Result<Self> {
        Self::spawn(downstreams, false)
    }

    /// Spawn `brain` with weight polling enabled, so readings from the
    /// mocked weight service drive scans through the state machine.
    pub fn start_polling(downstreams: &Downstreams<'_>) -> anyhow::Result<Self> {
        Self::spawn(downstreams, true)
    }

    fn spawn(downstreams: &Downstreams<'_>, enable_weight_polling: bool) -> anyhow::Result<Self> {
        let binary = brain_binary();
        anyhow::ensure!(binary.exists(), "brain binary not found at {}", binary.display());

        let port = free_port()?;
        let child = Command::new(&binary)
            .env("BRAIN_HOST", "127.0.0.1")
            .env("BRAIN_PORT", port.to_string())
            .env("LOG_LEVEL", "warn")
            .env("WEIGHT_SERVICE_URL", downstreams.weight_url)
            .env("CAMERA_SERVICE_URL", downstreams.camera_url)
            .env("FRUIT_DETECTOR_URL", downstreams.fruit_detector_url)
            .env("DEFECT_DETECTOR_URL", downstreams.defect_detector_url)
            .env("UI_SERVICE_URL", downstreams.ui_url)
            .env("MAIN_SERVER_URL", downstreams.main_server_url)
            .env("ENABLE_WEIGHT_POLLING", enable_weight_polling.to_string())
            .env("WEIGHT_POLL_INTERVAL_MS", "20")
            .env("MIN_SCAN_INTERVAL_MS", "50")
            .env("STABLE_WINDOW_MS", "40")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Poll `/healthz` until it answers, or fail after `timeout`.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/healthz", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("brain did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for BrainProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
