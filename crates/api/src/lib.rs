//! Volta API Server
//!
//! Serves the live readings ring as chunked JSON, a small visualization page,
//! health and Prometheus metrics, while the sampler runs on its own thread.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use ring_buffer::RingBuffer;
use sampler::{MonotonicClock, RmsAccumulator, Sampler, SamplerStats, SineSource};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod error;
pub mod rate_limit;
pub mod routes;
pub mod settings;

pub use error::{ApiError, ServerError};
pub use settings::{BufferConfig, LogConfig, ServerConfig, VoltaConfig};

/// Application state shared across handlers
pub struct AppState {
    /// Ring written by the sampler thread
    pub buffer: Arc<RingBuffer>,
    pub sampler_stats: Arc<SamplerStats>,
    /// Snapshot bodies currently alive
    pub active_snapshots: Arc<AtomicUsize>,
    /// Bytes offered to the serializer per body chunk
    pub chunk_size: usize,
    pub device_name: String,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Prometheus exporter, when installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        buffer: Arc<RingBuffer>,
        sampler_stats: Arc<SamplerStats>,
        config: &VoltaConfig,
    ) -> Self {
        Self {
            buffer,
            sampler_stats,
            active_snapshots: Arc::new(AtomicUsize::new(0)),
            chunk_size: config.server.chunk_size,
            device_name: config.device_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<PrometheusHandle>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Number of snapshot requests still holding state
    pub fn active_snapshots(&self) -> usize {
        self.active_snapshots.load(Ordering::Relaxed)
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::index::get_index))
        .route("/readings", get(routes::readings::get_readings))
        .route("/api/v1/health", get(routes::health::get_health))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Prometheus scrape handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Initialize logging
pub fn init_logging(config: &LogConfig) -> Result<(), ServerError> {
    let level: Level = config
        .level
        .parse()
        .map_err(|e| ServerError::Logging(format!("{}: {e}", config.level)))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.map_err(|e| ServerError::Logging(e.to_string()))
}

/// Start the sampler thread and serve HTTP until Ctrl-C
pub async fn run_server(config: VoltaConfig) -> Result<(), ServerError> {
    config.validate()?;

    // Installed before the sampler so its metric handles bind to this recorder
    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus exporter unavailable: {}", e);
            None
        }
    };

    let buffer = Arc::new(RingBuffer::try_new(config.buffer.capacity)?);
    let source = SineSource::new(
        config.source.clone(),
        config.accumulator.resolution,
        config.sampler.sample_period(),
    );
    let sampler = Sampler::new(
        config.sampler.clone(),
        config.accumulator.clone(),
        RmsAccumulator::default(),
        source,
        MonotonicClock::new(config.sampler.spin_margin()),
        Arc::clone(&buffer),
    )?;
    let stats = sampler.stats();
    let mut sampler = sampler.spawn()?;

    let state = Arc::new(AppState::new(buffer, stats, &config).with_metrics(metrics));
    let mut app = create_router(state);
    if config.rate_limit.enabled {
        let governor = rate_limit::create_governor_config(&config.rate_limit)?;
        app = app.layer(GovernorLayer { config: governor });
    }

    info!("Starting API server on {}", config.server.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    sampler.stop();
    served?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
