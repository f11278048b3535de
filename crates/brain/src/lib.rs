// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Brain: orchestrator for the fruit-inspection station.

pub mod config;
pub mod error;
pub mod image_ops;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod services;
pub mod state_machine;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::orchestrator::BrainOrchestrator;
use crate::services::{CameraServiceClient, DefectDetectorClient, FruitDetectorClient, MainServerClient, ResultPublisher, UiServiceClient, WeightServiceClient};
use crate::transport::build_router;

/// Run the Brain service until shutdown.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    settings.validate()?;

    let addr = format!("{}:{}", settings.host, settings.port);
    let shutdown = CancellationToken::new();

    let weight_client = Arc::new(WeightServiceClient::new(settings.weight_service_url.clone()));
    let camera_client = Arc::new(CameraServiceClient::new(settings.camera_service_url.clone()));
    let fruit_detector = Arc::new(FruitDetectorClient::new(settings.fruit_detector_url.clone()));
    let defect_detector = Arc::new(DefectDetectorClient::new(settings.defect_detector_url.clone()));
    let ui_client: Arc<dyn ResultPublisher> = Arc::new(UiServiceClient::new(settings.ui_service_url.clone()));
    let main_server_client: Arc<dyn ResultPublisher> =
        Arc::new(MainServerClient::new(settings.main_server_url.clone()));

    let orchestrator = Arc::new(BrainOrchestrator::new(
        settings.clone(),
        weight_client,
        camera_client,
        fruit_detector,
        defect_detector,
        ui_client,
        main_server_client,
    ));

    orchestrator.start().await;

    let router = build_router(Arc::clone(&orchestrator));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("brain listening on {addr}");

    let shutdown_signal = {
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        }
    };

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal).await?;

    orchestrator.shutdown().await;
    Ok(())
}
