// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cortex CLI
//!
//! One binary, one subcommand per daemon:
//!
//! - `migrate` - run schema migrations on the cache and exit
//! - `syncer` - ingest cloud inventory and telemetry, fire triggers
//! - `extractor` - run the trigger-driven feature extractor pool
//! - `scheduler` - serve the scheduling delegation API
//! - `descheduler` - run descheduling cycles on a timer
//! - `kpis` - export knowledge KPIs to prometheus
//!
//! Exit 0 on clean shutdown; sysexits-style non-zero codes on
//! configuration or init failure.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use cortex_bootstrap::signals::{self, PlatformSignalHandler};
use cortex_bootstrap::{ExitCode, ShutdownCoordinator};
use cortex_domain::services::DataSource;
use cortex_domain::{PlacementRequest, SchedulerError};

use cortex::application::services::{
    compute_registry, machine_registry, pod_registry, share_registry, volume_registry, DeschedulerOptions,
    DeschedulerPipeline, ExtractorRuntime, KpiService, SchedulingPipeline, StepRegistry, Syncer,
};
use cortex::infrastructure::config::{CortexConfig, MqttConfig, PipelineEntry, StepEntry};
use cortex::infrastructure::descheduler::{DrainContendedHostsStep, DrainOverloadedHostsStep, NovaWorkloadMover};
use cortex::infrastructure::extractors::{build_extractors, register_feature_tables};
use cortex::infrastructure::logging::init_tracing;
use cortex::infrastructure::messaging::{MemoryTriggerBus, MqttTriggerBus, TriggerBus};
use cortex::infrastructure::metrics::MetricsService;
use cortex::infrastructure::repositories::{schema, SqliteDecisionStore, SqliteFeatureStore};
use cortex::presentation::{observability_router, router, ApiState, PipelineSet};

#[derive(Parser)]
#[command(name = "cortex")]
#[command(about = "Cortex - scheduling decision engine for OpenStack-like clouds")]
#[command(version)]
struct Cli {
    /// Path to the configuration file (defaults to ./cortex.{yaml,toml})
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run schema migrations on the cache and exit
    Migrate,
    /// Run the data-source syncer daemon
    Syncer,
    /// Run the feature extractor daemon
    Extractor,
    /// Run the scheduler API daemon
    Scheduler,
    /// Run the descheduler daemon
    Descheduler,
    /// Run the KPI exporter daemon
    Kpis,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!("{}", e);
            exit_code_for(&e)
        }
    };
    std::process::exit(code.as_i32());
}

fn exit_code_for(err: &SchedulerError) -> ExitCode {
    match err {
        SchedulerError::InvalidConfiguration(_) | SchedulerError::UnknownStep(_) | SchedulerError::ValidationError(_) => {
            ExitCode::DataError
        }
        SchedulerError::CacheError(_) | SchedulerError::DatabaseError(_) | SchedulerError::BusError(_) => {
            ExitCode::Unavailable
        }
        SchedulerError::IoError(_) => ExitCode::IoError,
        SchedulerError::Fatal(_) | SchedulerError::InternalError(_) => ExitCode::Software,
        _ => ExitCode::Error,
    }
}

async fn run(cli: Cli) -> Result<(), SchedulerError> {
    let config = CortexConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Migrate => migrate(&config).await,
        Commands::Syncer => syncer_daemon(&config).await,
        Commands::Extractor => extractor_daemon(&config).await,
        Commands::Scheduler => scheduler_daemon(&config).await,
        Commands::Descheduler => descheduler_daemon(&config).await,
        Commands::Kpis => kpis_daemon(&config).await,
    }
}

/// Spawns the signal handler wired to a fresh shutdown coordinator.
fn shutdown_coordinator() -> ShutdownCoordinator {
    let coordinator = ShutdownCoordinator::default();
    let trigger = coordinator.clone();
    tokio::spawn(async move {
        signals::drive_shutdown(PlatformSignalHandler::new(), &trigger).await;
    });
    coordinator
}

async fn open_store(config: &CortexConfig) -> Result<Arc<SqliteFeatureStore>, SchedulerError> {
    let pool = schema::initialize_database(&config.database.url)
        .await
        .map_err(|e| SchedulerError::fatal(format!("cannot open cache {}: {}", config.database.url, e)))?;
    Ok(Arc::new(SqliteFeatureStore::new(pool)))
}

fn build_bus(mqtt: &MqttConfig, coordinator: &ShutdownCoordinator) -> Arc<dyn TriggerBus> {
    if mqtt.enabled {
        Arc::new(MqttTriggerBus::connect(
            &mqtt.host,
            mqtt.port,
            &mqtt.client_id,
            coordinator.token(),
        ))
    } else {
        warn!("MQTT disabled; using the in-process trigger bus");
        Arc::new(MemoryTriggerBus::new())
    }
}

async fn migrate(config: &CortexConfig) -> Result<(), SchedulerError> {
    let store = open_store(config).await?;
    register_feature_tables(&store).await?;
    info!("schema migrations applied to {}", config.database.url);
    Ok(())
}

async fn syncer_daemon(config: &CortexConfig) -> Result<(), SchedulerError> {
    let store = open_store(config).await?;
    let coordinator = shutdown_coordinator();
    let bus = build_bus(&config.mqtt, &coordinator);
    let metrics = Arc::new(MetricsService::new()?);

    let mut sources: Vec<Arc<dyn DataSource>> = Vec::new();
    if let Some(url) = &config.sync.compute_url {
        sources.push(Arc::new(cortex::infrastructure::sync::HypervisorSource::new(
            store.pool().clone(),
            url.clone(),
        )));
        sources.push(Arc::new(cortex::infrastructure::sync::ServerSource::new(
            store.pool().clone(),
            url.clone(),
        )));
    }
    if let Some(url) = &config.sync.telemetry_url {
        sources.push(Arc::new(cortex::infrastructure::sync::TelemetrySource::new(
            store.pool().clone(),
            url.clone(),
        )));
    }
    if sources.is_empty() {
        return Err(SchedulerError::invalid_config(
            "syncer needs at least one of sync.compute_url / sync.telemetry_url",
        ));
    }

    let syncer = Syncer::new(
        sources,
        bus,
        Duration::from_secs(config.sync.interval_secs),
        Some(metrics),
    );
    let subsystem = coordinator.register("syncer");
    syncer.run(subsystem.token()).await;
    drop(subsystem);
    coordinator.wait_for_drain().await;
    Ok(())
}

async fn extractor_daemon(config: &CortexConfig) -> Result<(), SchedulerError> {
    let store = open_store(config).await?;
    let coordinator = shutdown_coordinator();
    let bus = build_bus(&config.mqtt, &coordinator);
    let metrics = Arc::new(MetricsService::new()?);

    let extractors = build_extractors(&store, config.extractor.enabled.as_deref());
    let runtime = ExtractorRuntime::new(extractors, bus, config.extractor.parallelism, Some(metrics));
    let subsystem = coordinator.register("extractor-runtime");
    runtime.run(subsystem.token()).await?;
    drop(subsystem);
    coordinator.wait_for_drain().await;
    Ok(())
}

async fn build_pipeline_set<R: PlacementRequest + 'static>(
    entries: &[PipelineEntry],
    fallback: PipelineEntry,
    registry: &StepRegistry<R>,
    store: &Arc<SqliteFeatureStore>,
    metrics: &Arc<MetricsService>,
) -> Result<PipelineSet<R>, SchedulerError> {
    let mut set = PipelineSet::new();
    let entries: Vec<&PipelineEntry> = if entries.is_empty() {
        vec![&fallback]
    } else {
        entries.iter().collect()
    };
    for entry in entries {
        let pipeline_config = entry.to_pipeline_config()?;
        let store: Arc<dyn cortex_domain::repositories::KnowledgeStore> = store.clone();
        set.insert(SchedulingPipeline::build(&pipeline_config, registry, store, Some(metrics.clone())).await?);
    }
    Ok(set)
}

/// Fallback pipeline for domains without explicit configuration.
fn generic_default_pipeline(steps: &[&str]) -> PipelineEntry {
    PipelineEntry {
        name: "default".to_string(),
        steps: steps
            .iter()
            .map(|name| StepEntry {
                name: (*name).to_string(),
                options: Default::default(),
            })
            .collect(),
        tracing: false,
    }
}

async fn scheduler_daemon(config: &CortexConfig) -> Result<(), SchedulerError> {
    let store = open_store(config).await?;
    register_feature_tables(&store).await?;
    let metrics = Arc::new(MetricsService::new()?);

    let nova = build_pipeline_set(
        &config.scheduler.nova,
        CortexConfig::default_nova_pipeline(),
        &compute_registry()?,
        &store,
        &metrics,
    )
    .await?;
    let manila = build_pipeline_set(
        &config.scheduler.manila,
        generic_default_pipeline(&["avoid_overloaded_cpu", "avoid_overloaded_memory"]),
        &share_registry()?,
        &store,
        &metrics,
    )
    .await?;
    let cinder = build_pipeline_set(
        &config.scheduler.cinder,
        generic_default_pipeline(&["avoid_overloaded_cpu", "avoid_overloaded_memory"]),
        &volume_registry()?,
        &store,
        &metrics,
    )
    .await?;
    let machines = build_pipeline_set(
        &config.scheduler.machines,
        generic_default_pipeline(&["avoid_contended_hosts"]),
        &machine_registry()?,
        &store,
        &metrics,
    )
    .await?;
    let pods = build_pipeline_set(
        &config.scheduler.pods,
        generic_default_pipeline(&["avoid_contended_hosts"]),
        &pod_registry()?,
        &store,
        &metrics,
    )
    .await?;

    let state = Arc::new(ApiState {
        nova,
        manila,
        cinder,
        machines,
        pods,
        metrics,
    });

    let coordinator = shutdown_coordinator();
    let subsystem = coordinator.register("scheduler-api");
    let token = subsystem.token();
    let listener = tokio::net::TcpListener::bind(&config.api.bind)
        .await
        .map_err(|e| SchedulerError::fatal(format!("cannot bind {}: {}", config.api.bind, e)))?;
    info!(bind = %config.api.bind, "scheduler API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(|e| SchedulerError::IoError(format!("scheduler API failed: {}", e)))?;
    drop(subsystem);
    coordinator.wait_for_drain().await;
    Ok(())
}

async fn descheduler_daemon(config: &CortexConfig) -> Result<(), SchedulerError> {
    let store = open_store(config).await?;
    register_feature_tables(&store).await?;
    let metrics = Arc::new(MetricsService::new()?);
    let repository = Arc::new(SqliteDecisionStore::new(store.pool().clone()));

    let options = DeschedulerOptions {
        interval: Duration::from_secs(config.descheduler.interval_secs),
        dry_run: config.descheduler.dry_run,
        workload_timeout: Duration::from_secs(config.descheduler.workload_timeout_secs),
        history_window: config.descheduler.history_window,
        ..DeschedulerOptions::default()
    };

    let compute_url = match (&config.sync.compute_url, options.dry_run) {
        (Some(url), _) => url.clone(),
        (None, true) => String::new(),
        (None, false) => {
            return Err(SchedulerError::invalid_config(
                "descheduler needs sync.compute_url unless dry_run is set",
            ))
        }
    };
    let mover = Arc::new(NovaWorkloadMover::new(compute_url));

    let mut overloaded = DrainOverloadedHostsStep::new(store.clone());
    cortex_domain::services::DecisionStep::init(&mut overloaded, Default::default()).await?;
    let mut contended = DrainContendedHostsStep::new(store.clone());
    cortex_domain::services::DecisionStep::init(&mut contended, Default::default()).await?;

    let pipeline = DeschedulerPipeline::new(
        vec![Box::new(overloaded), Box::new(contended)],
        mover,
        repository,
        options,
        Some(metrics),
    );

    let coordinator = shutdown_coordinator();
    let subsystem = coordinator.register("descheduler");
    pipeline.run_forever(subsystem.token()).await;
    drop(subsystem);
    coordinator.wait_for_drain().await;
    Ok(())
}

async fn kpis_daemon(config: &CortexConfig) -> Result<(), SchedulerError> {
    let store = open_store(config).await?;
    register_feature_tables(&store).await?;
    let metrics = Arc::new(MetricsService::new()?);

    let coordinator = shutdown_coordinator();

    let service = KpiService::new(store, metrics.clone(), Duration::from_secs(config.kpis.interval_secs));
    let sampler_subsystem = coordinator.register("kpi-sampler");
    let sampler = tokio::spawn(async move {
        service.run(sampler_subsystem.token()).await;
        drop(sampler_subsystem);
    });

    let exporter = coordinator.register("kpi-exporter");
    let exporter_token = exporter.token();
    let listener = tokio::net::TcpListener::bind(&config.kpis.bind)
        .await
        .map_err(|e| SchedulerError::fatal(format!("cannot bind {}: {}", config.kpis.bind, e)))?;
    info!(bind = %config.kpis.bind, "KPI exporter listening");

    axum::serve(listener, observability_router(metrics))
        .with_graceful_shutdown(async move { exporter_token.cancelled().await })
        .await
        .map_err(|e| SchedulerError::IoError(format!("KPI exporter failed: {}", e)))?;
    drop(exporter);

    let _ = sampler.await;
    coordinator.wait_for_drain().await;
    Ok(())
}
