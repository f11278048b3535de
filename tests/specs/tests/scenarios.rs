// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end acceptance tests driving the real `brain` binary against
//! wiremock stand-ins for its six downstream services (spec.md §8).

use std::time::Duration;

use brain::models::ScanResult;
use brain_specs::{BrainProcess, Downstreams};
use image::{ImageBuffer, Rgb};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 255) as u8, (y % 255) as u8, 128])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    buffer.write_to(&mut out, image::ImageFormat::Jpeg).expect("encode sample jpeg");
    out.into_inner()
}

/// Matches a multipart request whose raw body contains `needle` as a byte
/// subsequence — `body_string_contains` assumes valid UTF-8, which a
/// multipart body carrying binary JPEG bytes is not.
struct BodyContains(&'static [u8]);

impl wiremock::Match for BodyContains {
    fn matches(&self, request: &Request) -> bool {
        request.body.windows(self.0.len()).any(|window| window == self.0)
    }
}

async fn mount_camera(server: &MockServer, image_bytes: &[u8]) {
    Mock::given(method("POST"))
        .and(path("/capture"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_id": "img-1",
            "image_path": "/images/img-1.jpg",
            "timestamp": "2026-01-01T00:00:00Z",
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/img-1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(image_bytes.to_vec()))
        .mount(server)
        .await;
}

/// *Fallback on empty-after-filter* (spec.md §8 scenario 5): the primary
/// pass finds one low-confidence apple that the class-threshold filter
/// drops, weight evidence says there should be a fruit, so the pipeline
/// retries at the fallback `imgsz` and publishes what that pass finds.
#[tokio::test]
async fn fallback_triggers_when_primary_filters_to_empty() {
    let weight = MockServer::start().await;
    let camera = MockServer::start().await;
    let fruit_detector = MockServer::start().await;
    let defect_detector = MockServer::start().await;
    let ui = MockServer::start().await;
    let main_server = MockServer::start().await;

    mount_camera(&camera, &sample_jpeg(300, 300)).await;

    Mock::given(method("POST"))
        .and(path("/detect-fruits"))
        .and(BodyContains(b"320"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_id": "img-1",
            "fruits": [{
                "fruit_id": "f1",
                "class": "apple",
                "confidence": 0.10,
                "bbox": {"x_min": 10.0, "y_min": 10.0, "x_max": 60.0, "y_max": 60.0},
            }],
        })))
        .mount(&fruit_detector)
        .await;
    Mock::given(method("POST"))
        .and(path("/detect-fruits"))
        .and(BodyContains(b"416"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_id": "img-1",
            "fruits": [{
                "fruit_id": "f2",
                "class": "apple",
                "confidence": 0.90,
                "bbox": {"x_min": 10.0, "y_min": 10.0, "x_max": 60.0, "y_max": 60.0},
            }],
        })))
        .mount(&fruit_detector)
        .await;

    Mock::given(method("POST"))
        .and(path("/detect-defects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_id": "img-1",
            "fruit_id": "f2",
            "defects": [{"type": "bruise", "confidence": 0.4}],
        })))
        .mount(&defect_detector)
        .await;

    Mock::given(method("POST")).and(path("/update")).respond_with(ResponseTemplate::new(200)).mount(&ui).await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&main_server)
        .await;

    let downstreams = Downstreams {
        weight_url: &weight.uri(),
        camera_url: &camera.uri(),
        fruit_detector_url: &fruit_detector.uri(),
        defect_detector_url: &defect_detector.uri(),
        ui_url: &ui.uri(),
        main_server_url: &main_server.uri(),
    };
    let brain = BrainProcess::start_manual(&downstreams).expect("spawn brain");
    brain.wait_healthy(Duration::from_secs(5)).await.expect("brain becomes healthy");

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/trigger-scan", brain.base_url()))
        .json(&json!({"weight_grams": 120.0}))
        .send()
        .await
        .expect("trigger-scan succeeds");
    assert!(response.status().is_success());

    wait_for_requests(&ui, 1, Duration::from_secs(5)).await;

    let ui_requests = ui.received_requests().await.expect("ui received requests");
    let update: ScanResult = serde_json::from_slice(&ui_requests[0].body).expect("update is a ScanResult");
    assert_eq!(update.fruits.len(), 1, "fallback result must replace the primary set, not union with it");
    assert_eq!(update.fruits[0].fruit_id, "f2");
    assert_eq!(update.fruits[0].defects[0].defect_type, "bruise");
}

/// *Per-fruit failure isolation* (spec.md §8 scenario 6): two detections
/// survive filtering; the defect detector fails for one of them. Expect
/// both fruits published, the failing one with an empty defect list.
#[tokio::test]
async fn per_fruit_defect_failure_does_not_void_the_batch() {
    let weight = MockServer::start().await;
    let camera = MockServer::start().await;
    let fruit_detector = MockServer::start().await;
    let defect_detector = MockServer::start().await;
    let ui = MockServer::start().await;
    let main_server = MockServer::start().await;

    mount_camera(&camera, &sample_jpeg(300, 300)).await;

    Mock::given(method("POST"))
        .and(path("/detect-fruits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_id": "img-1",
            "fruits": [
                {
                    "fruit_id": "fruit-1",
                    "class": "apple",
                    "confidence": 0.95,
                    "bbox": {"x_min": 10.0, "y_min": 10.0, "x_max": 60.0, "y_max": 60.0},
                },
                {
                    "fruit_id": "fruit-2",
                    "class": "apple",
                    "confidence": 0.92,
                    "bbox": {"x_min": 120.0, "y_min": 120.0, "x_max": 170.0, "y_max": 170.0},
                },
            ],
        })))
        .mount(&fruit_detector)
        .await;

    Mock::given(method("POST"))
        .and(path("/detect-defects"))
        .and(BodyContains(b"fruit-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_id": "img-1",
            "fruit_id": "fruit-1",
            "defects": [{"type": "bruise", "confidence": 0.5}],
        })))
        .mount(&defect_detector)
        .await;
    Mock::given(method("POST"))
        .and(path("/detect-defects"))
        .and(BodyContains(b"fruit-2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&defect_detector)
        .await;

    Mock::given(method("POST")).and(path("/update")).respond_with(ResponseTemplate::new(200)).mount(&ui).await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&main_server)
        .await;

    let downstreams = Downstreams {
        weight_url: &weight.uri(),
        camera_url: &camera.uri(),
        fruit_detector_url: &fruit_detector.uri(),
        defect_detector_url: &defect_detector.uri(),
        ui_url: &ui.uri(),
        main_server_url: &main_server.uri(),
    };
    let brain = BrainProcess::start_manual(&downstreams).expect("spawn brain");
    brain.wait_healthy(Duration::from_secs(5)).await.expect("brain becomes healthy");

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/trigger-scan", brain.base_url()))
        .json(&json!({"weight_grams": 150.0}))
        .send()
        .await
        .expect("trigger-scan succeeds");
    assert!(response.status().is_success());

    wait_for_requests(&ui, 1, Duration::from_secs(5)).await;

    let ui_requests = ui.received_requests().await.expect("ui received requests");
    let update: ScanResult = serde_json::from_slice(&ui_requests[0].body).expect("update is a ScanResult");
    assert_eq!(update.fruits.len(), 2);

    let by_id = |id: &str| update.fruits.iter().find(|f| f.fruit_id == id).expect("fruit present");
    assert_eq!(by_id("fruit-1").defects.len(), 1);
    assert!(by_id("fruit-2").defects.is_empty());
}

/// *One publish per session* (spec.md §8 testable property): `/trigger-scan`
/// returns before the scan completes, and exactly one `/update` call
/// follows once it does.
#[tokio::test]
async fn trigger_scan_returns_before_publish_then_publishes_exactly_once() {
    let weight = MockServer::start().await;
    let camera = MockServer::start().await;
    let fruit_detector = MockServer::start().await;
    let defect_detector = MockServer::start().await;
    let ui = MockServer::start().await;
    let main_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/images/img-1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(sample_jpeg(200, 200)))
        .mount(&camera)
        .await;
    Mock::given(method("POST"))
        .and(path("/capture"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)).set_body_json(json!({
            "image_id": "img-1",
            "image_path": "/images/img-1.jpg",
            "timestamp": "2026-01-01T00:00:00Z",
        })))
        .mount(&camera)
        .await;
    Mock::given(method("POST"))
        .and(path("/detect-fruits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"image_id": "img-1", "fruits": []})))
        .mount(&fruit_detector)
        .await;
    Mock::given(method("POST")).and(path("/update")).respond_with(ResponseTemplate::new(200)).mount(&ui).await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&main_server)
        .await;

    let downstreams = Downstreams {
        weight_url: &weight.uri(),
        camera_url: &camera.uri(),
        fruit_detector_url: &fruit_detector.uri(),
        defect_detector_url: &defect_detector.uri(),
        ui_url: &ui.uri(),
        main_server_url: &main_server.uri(),
    };
    let brain = BrainProcess::start_manual(&downstreams).expect("spawn brain");
    brain.wait_healthy(Duration::from_secs(5)).await.expect("brain becomes healthy");

    let client = reqwest::Client::new();
    let started = tokio::time::Instant::now();
    let response = client
        .post(format!("{}/trigger-scan", brain.base_url()))
        .json(&json!({"weight_grams": 10.0}))
        .send()
        .await
        .expect("trigger-scan succeeds");
    assert!(response.status().is_success());
    assert!(started.elapsed() < Duration::from_millis(250), "trigger-scan must return before the slow capture call");
    assert!(ui.received_requests().await.expect("requests").is_empty());

    wait_for_requests(&ui, 1, Duration::from_secs(5)).await;
    assert_eq!(ui.received_requests().await.expect("requests").len(), 1);
}

async fn wait_for_requests(server: &MockServer, count: usize, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let received = server.received_requests().await.expect("received_requests");
        if received.len() >= count {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("{} did not receive {count} request(s) within {timeout:?}", server.uri());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
