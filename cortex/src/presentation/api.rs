// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduling Delegation API
//!
//! Thin HTTP adapters: each handler unmarshals one domain's canonical
//! JSON document into the domain request type, enforces the
//! weights-cover-hosts contract, runs the selected pipeline, and
//! marshals the ordered host list back out.
//!
//! ## Status codes
//!
//! - `200` - decision produced, body `{ "hosts": [...] }` in scheduling
//!   order
//! - `400` - malformed JSON, hosts/weights disagreement, or an unknown
//!   pipeline name
//! - `405` - non-POST on a scheduling route (axum method routing)
//! - `500` - internal pipeline failure (cache unavailable, malformed
//!   feature row); no decision is produced

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use cortex_domain::{
    ComputeFlags, ComputeRequest, ComputeSpec, Flavor, HostCandidate, MachineRequest, MachineSpec,
    PlacementRequest, PodRequest, PodSpec, SchedulerError, ShareRequest, ShareSpec, VolumeRequest, VolumeSpec,
};

use crate::application::services::SchedulingPipeline;
use crate::infrastructure::metrics::MetricsService;

/// Named pipelines of one scheduling domain; `default` serves requests
/// without an override.
pub struct PipelineSet<R: PlacementRequest + 'static> {
    pipelines: HashMap<String, Arc<SchedulingPipeline<R>>>,
}

impl<R: PlacementRequest + 'static> PipelineSet<R> {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    pub fn insert(&mut self, pipeline: SchedulingPipeline<R>) {
        self.pipelines
            .insert(pipeline.name().to_string(), Arc::new(pipeline));
    }

    /// Resolves the pipeline for a request, honoring the override.
    pub fn select(&self, name: Option<&str>) -> Result<&Arc<SchedulingPipeline<R>>, SchedulerError> {
        let name = name.unwrap_or("default");
        self.pipelines
            .get(name)
            .ok_or_else(|| SchedulerError::PipelineNotFound(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl<R: PlacementRequest + 'static> Default for PipelineSet<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state of the delegation API.
pub struct ApiState {
    pub nova: PipelineSet<ComputeRequest>,
    pub manila: PipelineSet<ShareRequest>,
    pub cinder: PipelineSet<VolumeRequest>,
    pub machines: PipelineSet<MachineRequest>,
    pub pods: PipelineSet<PodRequest>,
    pub metrics: Arc<MetricsService>,
}

/// Builds the delegation router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/scheduler/nova", post(nova_handler))
        .route("/scheduler/manila", post(manila_handler))
        .route("/scheduler/cinder", post(cinder_handler))
        .route("/scheduler/machines", post(machines_handler))
        .route("/scheduler/pods", post(pods_handler))
        .route("/metrics", get(metrics_handler))
        .route("/up", get(up_handler))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct SchedulerResponse {
    hosts: Vec<String>,
}

fn error_response(err: &SchedulerError) -> Response {
    let status = if err.is_caller_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn malformed_request(err: &serde_json::Error) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": format!("malformed request: {}", err) })),
    )
        .into_response()
}

/// Shared handler tail: contract validation, pipeline selection, run.
async fn schedule<R: PlacementRequest + 'static>(set: &PipelineSet<R>, request: R) -> Response {
    if let Err(e) = request.validate() {
        return error_response(&e);
    }
    let pipeline = match set.select(request.pipeline_override()) {
        Ok(pipeline) => pipeline,
        Err(e) => return error_response(&e),
    };
    match pipeline.run(&request).await {
        Ok(result) => (
            StatusCode::OK,
            Json(SchedulerResponse {
                hosts: result.ordered_hosts,
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

fn request_id(explicit: Option<String>) -> String {
    explicit.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

// ---------------------------------------------------------------------------
// Nova (compute)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct NovaRequestDto {
    spec: DataEnvelope<NovaSpecDto>,
    #[serde(default)]
    context: Option<DataEnvelope<NovaContextDto>>,
    hosts: Vec<NovaHostDto>,
    #[serde(default)]
    weights: HashMap<String, f64>,
    #[serde(default)]
    rebuild: bool,
    #[serde(default)]
    resize: bool,
    #[serde(default)]
    live: bool,
    #[serde(default)]
    vmware: bool,
    #[serde(default)]
    reservation: bool,
    #[serde(default)]
    pipeline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NovaSpecDto {
    flavor: NovaFlavorDto,
    #[serde(rename = "projectID")]
    project_id: String,
    #[serde(rename = "numInstances", default = "default_num_instances")]
    num_instances: u32,
    #[serde(rename = "availabilityZone", default)]
    availability_zone: Option<String>,
    #[serde(rename = "schedulerHints", default)]
    scheduler_hints: HashMap<String, serde_json::Value>,
    #[serde(rename = "imageMeta", default)]
    image_meta: Option<serde_json::Value>,
    #[serde(rename = "forceHosts", default)]
    force_hosts: Option<Vec<String>>,
    #[serde(rename = "ignoreHosts", default)]
    ignore_hosts: Option<Vec<String>>,
}

fn default_num_instances() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct NovaFlavorDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "memoryMB")]
    memory_mb: u64,
    vcpus: u64,
    #[serde(rename = "rootDiskGB")]
    root_disk_gb: u64,
    #[serde(rename = "extraSpecs", default)]
    extra_specs: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct NovaContextDto {
    #[serde(rename = "requestId", default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NovaHostDto {
    #[serde(rename = "computeHost")]
    compute_host: String,
    #[serde(rename = "hypervisorHostname", default)]
    hypervisor_hostname: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl NovaRequestDto {
    fn into_request(self) -> ComputeRequest {
        let spec = self.spec.data;
        ComputeRequest {
            request_id: request_id(self.context.and_then(|c| c.data.request_id)),
            spec: ComputeSpec {
                flavor: Flavor {
                    id: spec.flavor.id,
                    name: spec.flavor.name,
                    memory_mb: spec.flavor.memory_mb,
                    vcpus: spec.flavor.vcpus,
                    root_disk_gb: spec.flavor.root_disk_gb,
                    extra_specs: spec.flavor.extra_specs,
                },
                project_id: spec.project_id,
                num_instances: spec.num_instances,
                availability_zone: spec.availability_zone,
                scheduler_hints: spec.scheduler_hints,
                image_meta: spec.image_meta,
                force_hosts: spec.force_hosts,
                ignore_hosts: spec.ignore_hosts,
            },
            flags: ComputeFlags {
                rebuild: self.rebuild,
                resize: self.resize,
                live: self.live,
                vmware: self.vmware,
                reservation: self.reservation,
            },
            candidates: self
                .hosts
                .into_iter()
                .map(|h| HostCandidate {
                    host: h.compute_host,
                    service_host: h.hypervisor_hostname,
                    status: h.status,
                })
                .collect(),
            weights: self.weights,
            pipeline: self.pipeline,
        }
    }
}

async fn nova_handler(State(state): State<Arc<ApiState>>, body: Bytes) -> Response {
    let dto: NovaRequestDto = match serde_json::from_slice(&body) {
        Ok(dto) => dto,
        Err(e) => return malformed_request(&e),
    };
    schedule(&state.nova, dto.into_request()).await
}

// ---------------------------------------------------------------------------
// Manila (shares)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ManilaRequestDto {
    spec: DataEnvelope<ManilaSpecDto>,
    #[serde(default)]
    context: Option<DataEnvelope<NovaContextDto>>,
    hosts: Vec<ManilaHostDto>,
    #[serde(default)]
    weights: HashMap<String, f64>,
    #[serde(default)]
    pipeline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManilaSpecDto {
    #[serde(rename = "projectID")]
    project_id: String,
    #[serde(rename = "sizeGB")]
    size_gb: u64,
    #[serde(rename = "shareProto", default)]
    share_proto: Option<String>,
    #[serde(rename = "shareType", default)]
    share_type: Option<String>,
    #[serde(rename = "availabilityZone", default)]
    availability_zone: Option<String>,
    #[serde(rename = "shareProperties", default)]
    share_properties: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ManilaHostDto {
    #[serde(rename = "shareHost")]
    share_host: String,
    #[serde(default)]
    status: Option<String>,
}

impl ManilaRequestDto {
    fn into_request(self) -> ShareRequest {
        let spec = self.spec.data;
        ShareRequest {
            request_id: request_id(self.context.and_then(|c| c.data.request_id)),
            spec: ShareSpec {
                project_id: spec.project_id,
                size_gb: spec.size_gb,
                share_proto: spec.share_proto,
                share_type: spec.share_type,
                availability_zone: spec.availability_zone,
                share_properties: spec.share_properties,
            },
            candidates: self
                .hosts
                .into_iter()
                .map(|h| HostCandidate {
                    host: h.share_host,
                    service_host: None,
                    status: h.status,
                })
                .collect(),
            weights: self.weights,
            pipeline: self.pipeline,
        }
    }
}

async fn manila_handler(State(state): State<Arc<ApiState>>, body: Bytes) -> Response {
    let dto: ManilaRequestDto = match serde_json::from_slice(&body) {
        Ok(dto) => dto,
        Err(e) => return malformed_request(&e),
    };
    schedule(&state.manila, dto.into_request()).await
}

// ---------------------------------------------------------------------------
// Cinder (volumes)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CinderRequestDto {
    spec: DataEnvelope<CinderSpecDto>,
    #[serde(default)]
    context: Option<DataEnvelope<NovaContextDto>>,
    hosts: Vec<CinderHostDto>,
    #[serde(default)]
    weights: HashMap<String, f64>,
    #[serde(default)]
    pipeline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CinderSpecDto {
    #[serde(rename = "projectID")]
    project_id: String,
    #[serde(rename = "sizeGB")]
    size_gb: u64,
    #[serde(rename = "volumeType", default)]
    volume_type: Option<String>,
    #[serde(rename = "availabilityZone", default)]
    availability_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CinderHostDto {
    #[serde(rename = "volumeHost")]
    volume_host: String,
    #[serde(default)]
    status: Option<String>,
}

impl CinderRequestDto {
    fn into_request(self) -> VolumeRequest {
        let spec = self.spec.data;
        VolumeRequest {
            request_id: request_id(self.context.and_then(|c| c.data.request_id)),
            spec: VolumeSpec {
                project_id: spec.project_id,
                size_gb: spec.size_gb,
                volume_type: spec.volume_type,
                availability_zone: spec.availability_zone,
            },
            candidates: self
                .hosts
                .into_iter()
                .map(|h| HostCandidate {
                    host: h.volume_host,
                    service_host: None,
                    status: h.status,
                })
                .collect(),
            weights: self.weights,
            pipeline: self.pipeline,
        }
    }
}

async fn cinder_handler(State(state): State<Arc<ApiState>>, body: Bytes) -> Response {
    let dto: CinderRequestDto = match serde_json::from_slice(&body) {
        Ok(dto) => dto,
        Err(e) => return malformed_request(&e),
    };
    schedule(&state.cinder, dto.into_request()).await
}

// ---------------------------------------------------------------------------
// Machines and pods
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MachineRequestDto {
    #[serde(default)]
    spec: Option<DataEnvelope<MachineSpecDto>>,
    #[serde(default)]
    context: Option<DataEnvelope<NovaContextDto>>,
    hosts: Vec<MachineHostDto>,
    #[serde(default)]
    weights: HashMap<String, f64>,
    #[serde(default)]
    pipeline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MachineSpecDto {
    #[serde(rename = "machineClass", default)]
    machine_class: Option<String>,
    #[serde(default)]
    pools: Vec<String>,
    #[serde(rename = "availabilityZone", default)]
    availability_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MachineHostDto {
    pool: String,
    #[serde(default)]
    status: Option<String>,
}

impl MachineRequestDto {
    fn into_request(self) -> MachineRequest {
        MachineRequest {
            request_id: request_id(self.context.and_then(|c| c.data.request_id)),
            spec: self.spec.map(|s| MachineSpec {
                machine_class: s.data.machine_class,
                pools: s.data.pools,
                availability_zone: s.data.availability_zone,
            }),
            candidates: self
                .hosts
                .into_iter()
                .map(|h| HostCandidate {
                    host: h.pool,
                    service_host: None,
                    status: h.status,
                })
                .collect(),
            weights: self.weights,
            pipeline: self.pipeline,
        }
    }
}

async fn machines_handler(State(state): State<Arc<ApiState>>, body: Bytes) -> Response {
    let dto: MachineRequestDto = match serde_json::from_slice(&body) {
        Ok(dto) => dto,
        Err(e) => return malformed_request(&e),
    };
    schedule(&state.machines, dto.into_request()).await
}

#[derive(Debug, Deserialize)]
struct PodRequestDto {
    #[serde(default)]
    spec: Option<DataEnvelope<PodSpecDto>>,
    #[serde(default)]
    context: Option<DataEnvelope<NovaContextDto>>,
    hosts: Vec<PodHostDto>,
    #[serde(default)]
    weights: HashMap<String, f64>,
    #[serde(default)]
    pipeline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PodSpecDto {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(rename = "cpuRequestMillis", default)]
    cpu_request_millis: Option<u64>,
    #[serde(rename = "memoryRequestMB", default)]
    memory_request_mb: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PodHostDto {
    node: String,
    #[serde(default)]
    status: Option<String>,
}

impl PodRequestDto {
    fn into_request(self) -> PodRequest {
        PodRequest {
            request_id: request_id(self.context.and_then(|c| c.data.request_id)),
            spec: self.spec.map(|s| PodSpec {
                namespace: s.data.namespace,
                labels: s.data.labels,
                cpu_request_millis: s.data.cpu_request_millis,
                memory_request_mb: s.data.memory_request_mb,
            }),
            candidates: self
                .hosts
                .into_iter()
                .map(|h| HostCandidate {
                    host: h.node,
                    service_host: None,
                    status: h.status,
                })
                .collect(),
            weights: self.weights,
            pipeline: self.pipeline,
        }
    }
}

async fn pods_handler(State(state): State<Arc<ApiState>>, body: Bytes) -> Response {
    let dto: PodRequestDto = match serde_json::from_slice(&body) {
        Ok(dto) => dto,
        Err(e) => return malformed_request(&e),
    };
    schedule(&state.pods, dto.into_request()).await
}

// ---------------------------------------------------------------------------
// Observability endpoints
// ---------------------------------------------------------------------------

async fn metrics_handler(State(state): State<Arc<ApiState>>) -> Response {
    encode_metrics(&state.metrics)
}

async fn up_handler() -> &'static str {
    "OK"
}

fn encode_metrics(metrics: &MetricsService) -> Response {
    match metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Router exposing only `/metrics` and `/up`, for daemons that do not
/// serve scheduling requests (the KPI exporter).
pub fn observability_router(metrics: Arc<MetricsService>) -> Router {
    Router::new()
        .route(
            "/metrics",
            get(move || {
                let metrics = metrics.clone();
                async move { encode_metrics(&metrics) }
            }),
        )
        .route("/up", get(up_handler))
}
