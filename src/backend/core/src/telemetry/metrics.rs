//! Metrics for resolutions, authorization decisions, errors and management
//! operation latency.
//!
//! Everything goes through the `metrics` facade; the host process installs
//! whichever recorder it exports with. Without a recorder the calls are no-ops.
//!
//! # Example
//!
//! ```rust,no_run
//! use portal_access::telemetry::metrics::{DecisionMetrics, OperationTimer};
//!
//! DecisionMetrics::record("access_user", true);
//!
//! let timer = OperationTimer::start("create_managed_user");
//! // ... do the work ...
//! timer.finish("ok");
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::sync::Once;
use std::time::Instant;

pub const RESOLUTIONS_TOTAL: &str = "portal_access_resolutions_total";
pub const DECISIONS_TOTAL: &str = "portal_access_decisions_total";
pub const ERRORS_TOTAL: &str = "portal_access_errors_total";
pub const OPERATION_DURATION_SECONDS: &str = "portal_access_operation_duration_seconds";

static DESCRIBE: Once = Once::new();

/// Register metric descriptions with the installed recorder. Idempotent.
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            RESOLUTIONS_TOTAL,
            "Assignment tree resolutions by outcome (resolved or error code)"
        );
        describe_counter!(
            DECISIONS_TOTAL,
            "Authorization gate decisions by operation and outcome"
        );
        describe_counter!(ERRORS_TOTAL, "Errors raised by code, kind and severity");
        describe_histogram!(
            OPERATION_DURATION_SECONDS,
            "Management operation latency in seconds"
        );
    });
}

/// Outcomes of the assignment resolver.
pub struct ResolutionMetrics;

impl ResolutionMetrics {
    pub fn record(outcome: &str) {
        counter!(RESOLUTIONS_TOTAL, "outcome" => outcome.to_string()).increment(1);
    }
}

/// Allow/deny counts of the authorization gate.
pub struct DecisionMetrics;

impl DecisionMetrics {
    pub fn record(operation: &'static str, allowed: bool) {
        let outcome = if allowed { "allow" } else { "deny" };
        counter!(
            DECISIONS_TOTAL,
            "operation" => operation,
            "outcome" => outcome,
        )
        .increment(1);
    }
}

/// Error counter for tracking errors by code.
pub struct ErrorCounter;

impl ErrorCounter {
    pub fn increment(code: &str, kind: &str, severity: &str) {
        counter!(
            ERRORS_TOTAL,
            "code" => code.to_string(),
            "kind" => kind.to_string(),
            "severity" => severity.to_string(),
        )
        .increment(1);
    }
}

/// Times one management operation.
///
/// Call [`finish`](Self::finish) with the outcome; a timer dropped without
/// finishing (the future was cancelled) is recorded
/// as `aborted`.
pub struct OperationTimer {
    start: Instant,
    operation: &'static str,
    finished: bool,
}

impl OperationTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
            finished: false,
        }
    }

    pub fn finish(mut self, outcome: &str) {
        self.record(outcome);
        self.finished = true;
    }

    /// Record `ok` or the error code of `result`, then pass it through.
    pub fn observe<T>(self, result: crate::error::Result<T>) -> crate::error::Result<T> {
        match &result {
            Ok(_) => self.finish("ok"),
            Err(e) => self.finish(&e.code().to_string()),
        }
        result
    }

    fn record(&self, outcome: &str) {
        histogram!(
            OPERATION_DURATION_SECONDS,
            "operation" => self.operation,
            "outcome" => outcome.to_string(),
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.finished {
            self.record("aborted");
        }
    }
}
