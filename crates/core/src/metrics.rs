use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::domain::execution::{ExecutionId, ExecutionStatus};

/// Telemetry snapshot captured at execution milestones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub tokens_used: u64,
    pub cost: f64,
    pub duration_ms: u64,
    pub status: ExecutionStatus,
}

impl ExecutionMetrics {
    /// Zeroed snapshot for a freshly started execution.
    pub fn at_start() -> Self {
        Self { tokens_used: 0, cost: 0.0, duration_ms: 0, status: ExecutionStatus::Running }
    }
}

/// Fire-and-forget telemetry. Sink failures must never fail the operation
/// that produced the metrics.
pub trait MetricsSink: Send + Sync {
    fn record(&self, execution_id: &ExecutionId, metrics: ExecutionMetrics);
}

#[derive(Clone, Default)]
pub struct InMemoryMetricsSink {
    records: Arc<Mutex<Vec<(ExecutionId, ExecutionMetrics)>>>,
}

impl InMemoryMetricsSink {
    pub fn records(&self) -> Vec<(ExecutionId, ExecutionMetrics)> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record(&self, execution_id: &ExecutionId, metrics: ExecutionMetrics) {
        match self.records.lock() {
            Ok(mut records) => records.push((execution_id.clone(), metrics)),
            Err(poisoned) => poisoned.into_inner().push((execution_id.clone(), metrics)),
        }
    }
}

/// Sink that emits telemetry as structured log events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record(&self, execution_id: &ExecutionId, metrics: ExecutionMetrics) {
        tracing::info!(
            execution_id = %execution_id,
            tokens_used = metrics.tokens_used,
            cost = metrics.cost,
            duration_ms = metrics.duration_ms,
            status = metrics.status.as_str(),
            "execution metrics recorded"
        );
    }
}
