// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Delegation API Contract Tests
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`:
//! status codes, the weights-cover-hosts contract, and the response
//! shape of a successful decision.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use cortex::application::services::{compute_registry, SchedulingPipeline};
use cortex::infrastructure::extractors::HostCapacityFeature;
use cortex::infrastructure::metrics::MetricsService;
use cortex::infrastructure::repositories::SqliteFeatureStore;
use cortex::presentation::{router, ApiState, PipelineSet};
use cortex_domain::repositories::KnowledgeStore;
use cortex_domain::{PipelineConfig, StepConfig};

async fn test_state() -> Arc<ApiState> {
    let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
    store.register::<HostCapacityFeature>().await.unwrap();
    store
        .replace_all(&[
            HostCapacityFeature {
                host: "h1".to_string(),
                total_memory_mb: 1024,
                memory_free_mb: 1024,
                total_vcpus: 1,
                vcpus_free: 1,
                total_disk_gb: 100,
                disk_free_gb: 100,
            },
            HostCapacityFeature {
                host: "h2".to_string(),
                total_memory_mb: 2048,
                memory_free_mb: 2048,
                total_vcpus: 2,
                vcpus_free: 2,
                total_disk_gb: 200,
                disk_free_gb: 200,
            },
        ])
        .await
        .unwrap();

    let config = PipelineConfig::new(
        "default",
        vec![StepConfig::new("binpacking")
            .with_option("ramLowerBound", (-1024.0).into())
            .with_option("ramUpperBound", 0.0.into())
            .with_option("ramActivationLowerBound", 0.0.into())
            .with_option("ramActivationUpperBound", 1.0.into())
            .with_option("cpuLowerBound", (-1.0).into())
            .with_option("cpuUpperBound", 0.0.into())
            .with_option("cpuActivationLowerBound", 0.0.into())
            .with_option("cpuActivationUpperBound", 1.0.into())
            .with_option("diskLowerBound", (-100.0).into())
            .with_option("diskUpperBound", 0.0.into())
            .with_option("diskActivationLowerBound", 0.0.into())
            .with_option("diskActivationUpperBound", 1.0.into())],
    )
    .unwrap();

    let registry = compute_registry().unwrap();
    let store_dyn: Arc<dyn KnowledgeStore> = store;
    let mut nova = PipelineSet::new();
    nova.insert(
        SchedulingPipeline::build(&config, &registry, store_dyn, None)
            .await
            .unwrap(),
    );

    Arc::new(ApiState {
        nova,
        manila: PipelineSet::new(),
        cinder: PipelineSet::new(),
        machines: PipelineSet::new(),
        pods: PipelineSet::new(),
        metrics: Arc::new(MetricsService::new().unwrap()),
    })
}

fn nova_body(hosts: &[&str], weights: Value) -> String {
    json!({
        "spec": {"data": {
            "flavor": {"id": "f-1", "memoryMB": 2048, "vcpus": 2, "rootDiskGB": 200},
            "projectID": "p-1",
        }},
        "context": {"data": {"requestId": "req-api"}},
        "hosts": hosts.iter().map(|h| json!({"computeHost": h})).collect::<Vec<_>>(),
        "weights": weights,
    })
    .to_string()
}

async fn post_nova(body: String) -> (StatusCode, Value) {
    let app = router(test_state().await);
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/scheduler/nova")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_successful_decision_orders_hosts() {
    let (status, body) = post_nova(nova_body(&["h1", "h2"], json!({"h1": 0.0, "h2": 0.0}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hosts"], json!(["h2", "h1"]));
}

#[tokio::test]
async fn test_absent_weights_seed_to_zero() {
    let (status, body) = post_nova(nova_body(&["h1", "h2"], json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hosts"], json!(["h2", "h1"]));
}

/// Canonical weights-mismatch: a weight for a host that is not a
/// candidate is rejected before any step runs.
#[tokio::test]
async fn test_weight_for_unknown_host_is_400() {
    let (status, body) = post_nova(nova_body(&["h1"], json!({"unknown": 1.0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("weight assigned to unknown host"));
}

#[tokio::test]
async fn test_partial_weights_are_400() {
    let (status, _) = post_nova(nova_body(&["h1", "h2"], json!({"h1": 1.0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let (status, body) = post_nova("{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("malformed request"));
}

#[tokio::test]
async fn test_unknown_pipeline_override_is_400() {
    let mut request: Value = serde_json::from_str(&nova_body(&["h1", "h2"], json!({}))).unwrap();
    request["pipeline"] = json!("no_such_pipeline");
    let (status, body) = post_nova(request.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no_such_pipeline"));
}

#[tokio::test]
async fn test_get_on_scheduler_route_is_405() {
    let app = router(test_state().await);
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/scheduler/nova")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_up_and_metrics_endpoints() {
    let app = router(test_state().await);
    let response = app
        .oneshot(Request::builder().uri("/up").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let app = router(test_state().await);
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
