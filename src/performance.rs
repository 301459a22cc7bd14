//! Per-request timing and outcome records, kept in a bounded in-memory buffer.
//!
//! One `PerformanceRecorder` is owned by the caller and shared (via `Arc`) with
//! every analyzer that should report into it. Appends take a short mutex; reads
//! clone a snapshot so aggregation never holds the lock while computing.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DEFAULT_METRICS_CAPACITY;
use crate::pipeline::analysis::{AnalysisSource, ErrorType, ScreeningPhase};

/// One finalized pipeline execution. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub request_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub phase: ScreeningPhase,
    pub answers_count: usize,
    /// `None` when the request never reached an analysis path (input rejected).
    pub source: Option<AnalysisSource>,
    pub success: bool,
    pub error_type: Option<ErrorType>,
}

/// Aggregate over the current buffer contents. Rates are 0.0..=1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_requests: usize,
    pub average_duration_ms: f64,
    pub success_rate: f64,
    pub ai_usage_rate: f64,
    pub cache_hit_rate: f64,
    pub fallback_rate: f64,
}

/// Bounded FIFO buffer of `PerformanceMetrics`, safe under concurrent writers.
pub struct PerformanceRecorder {
    capacity: usize,
    buffer: Mutex<VecDeque<PerformanceMetrics>>,
}

impl PerformanceRecorder {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Start timing one execution.
    pub fn start(
        &self,
        request_id: Uuid,
        phase: ScreeningPhase,
        answers_count: usize,
    ) -> PerformanceTimer<'_> {
        PerformanceTimer {
            recorder: self,
            request_id,
            phase,
            answers_count,
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Records are appended whole, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<PerformanceMetrics>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record, evicting the oldest once capacity is reached.
    fn record(&self, metrics: PerformanceMetrics) {
        let mut buf = self.lock();
        while buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(metrics);
    }

    /// Copy of the buffer, oldest first.
    pub fn snapshot(&self) -> Vec<PerformanceMetrics> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute aggregate rates over the current buffer.
    pub fn summary(&self) -> PerformanceSummary {
        summarize(&self.snapshot())
    }
}

impl Default for PerformanceRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_METRICS_CAPACITY)
    }
}

/// Aggregate a set of records. Empty input yields all zeros.
pub fn summarize(records: &[PerformanceMetrics]) -> PerformanceSummary {
    let total = records.len();
    if total == 0 {
        return PerformanceSummary::default();
    }

    let ratio = |count: usize| count as f64 / total as f64;
    let count_source = |source: AnalysisSource| {
        records.iter().filter(|r| r.source == Some(source)).count()
    };

    let total_duration: u64 = records.iter().map(|r| r.duration_ms).sum();

    PerformanceSummary {
        total_requests: total,
        average_duration_ms: total_duration as f64 / total as f64,
        success_rate: ratio(records.iter().filter(|r| r.success).count()),
        ai_usage_rate: ratio(count_source(AnalysisSource::Ai)),
        cache_hit_rate: ratio(count_source(AnalysisSource::Cache)),
        fallback_rate: ratio(count_source(AnalysisSource::RuleBased)),
    }
}

/// Handle returned by [`PerformanceRecorder::start`]. Consumed on completion,
/// so every execution is recorded at most once.
pub struct PerformanceTimer<'a> {
    recorder: &'a PerformanceRecorder,
    request_id: Uuid,
    phase: ScreeningPhase,
    answers_count: usize,
    start_time: DateTime<Utc>,
    started: Instant,
}

impl PerformanceTimer<'_> {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Finalize an execution that produced a result.
    pub fn end(
        self,
        source: AnalysisSource,
        success: bool,
        error_type: Option<ErrorType>,
    ) -> PerformanceMetrics {
        self.finish(Some(source), success, error_type)
    }

    /// Finalize an execution that was rejected before any analysis path ran.
    pub fn fail(self, error_type: ErrorType) -> PerformanceMetrics {
        self.finish(None, false, Some(error_type))
    }

    fn finish(
        self,
        source: Option<AnalysisSource>,
        success: bool,
        error_type: Option<ErrorType>,
    ) -> PerformanceMetrics {
        let metrics = PerformanceMetrics {
            request_id: self.request_id,
            start_time: self.start_time,
            end_time: Utc::now(),
            duration_ms: self.started.elapsed().as_millis() as u64,
            phase: self.phase,
            answers_count: self.answers_count,
            source,
            success,
            error_type,
        };
        self.recorder.record(metrics.clone());
        metrics
    }
}
