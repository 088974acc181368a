//! Health Route

use axum::{extract::State, Json};
use ring_buffer::Reading;
use sampler::SamplerStatsSnapshot;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `warming_up` until every ring slot holds a measured reading
    pub status: String,
    pub device: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub buffer: BufferStatus,
    pub sampler: SamplerStatsSnapshot,
    pub active_snapshots: usize,
}

/// Ring buffer status
#[derive(Debug, Serialize)]
pub struct BufferStatus {
    pub capacity: usize,
    pub cursor: usize,
    pub total_written: u64,
    pub primed: bool,
    pub newest: Reading,
}

/// GET /api/v1/health
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let buffer = &state.buffer;
    let primed = buffer.is_primed();

    Json(HealthResponse {
        status: if primed { "healthy" } else { "warming_up" }.to_string(),
        device: state.device_name.clone(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        buffer: BufferStatus {
            capacity: buffer.capacity(),
            cursor: buffer.snapshot_end(),
            total_written: buffer.total_written(),
            primed,
            newest: buffer.newest(),
        },
        sampler: state.sampler_stats.snapshot(),
        active_snapshots: state.active_snapshots(),
    })
}
