//! Prometheus metrics for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total requests processed
    pub requests_total: AtomicU64,
    /// Requests answered with a result
    pub requests_success: AtomicU64,
    /// Requests answered with an error
    pub requests_failed: AtomicU64,
    /// Requests rejected for arriving out of sequence
    pub protocol_errors: AtomicU64,
    /// Tool calls
    pub tool_calls: AtomicU64,
    /// Sessions opened since startup
    pub sessions_opened: AtomicU64,
    /// Active sessions
    pub active_sessions: AtomicU64,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Increment requests total.
    pub fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment successful requests.
    pub fn inc_success(&self) {
        self.requests_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed requests.
    pub fn inc_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment sequencing failures.
    pub fn inc_protocol_errors(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment tool calls.
    pub fn inc_tool_calls(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a newly opened session.
    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed session.
    pub fn session_closed(&self) {
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Get all metrics as a snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"# HELP portainer_mcp_requests_total Total number of requests
# TYPE portainer_mcp_requests_total counter
portainer_mcp_requests_total {}

# HELP portainer_mcp_requests_success Requests answered with a result
# TYPE portainer_mcp_requests_success counter
portainer_mcp_requests_success {}

# HELP portainer_mcp_requests_failed Requests answered with an error
# TYPE portainer_mcp_requests_failed counter
portainer_mcp_requests_failed {}

# HELP portainer_mcp_protocol_errors Requests received before initialize
# TYPE portainer_mcp_protocol_errors counter
portainer_mcp_protocol_errors {}

# HELP portainer_mcp_tool_calls Tool calls count
# TYPE portainer_mcp_tool_calls counter
portainer_mcp_tool_calls {}

# HELP portainer_mcp_sessions_opened Sessions opened since startup
# TYPE portainer_mcp_sessions_opened counter
portainer_mcp_sessions_opened {}

# HELP portainer_mcp_active_sessions Active SSE sessions
# TYPE portainer_mcp_active_sessions gauge
portainer_mcp_active_sessions {}
"#,
            s.requests_total,
            s.requests_success,
            s.requests_failed,
            s.protocol_errors,
            s.tool_calls,
            s.sessions_opened,
            s.active_sessions
        )
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_success: u64,
    pub requests_failed: u64,
    pub protocol_errors: u64,
    pub tool_calls: u64,
    pub sessions_opened: u64,
    pub active_sessions: u64,
}

/// Timer for measuring durations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
