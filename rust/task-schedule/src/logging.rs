//! Structured logging helpers for remote round trips.
//!
//! Daemon requests and queue reads block for as long as the remote side takes,
//! so every one of them is timed and logged with the schedule or job it
//! concerns.

use std::time::Instant;

/// Operation timer for a single remote call.
///
/// Logs the start at debug level and the outcome with its duration when
/// finished.
///
/// # Examples
///
/// ```rust,ignore
/// use task_schedule::logging::OpTimer;
///
/// let timer = OpTimer::new("daemon", "submit", "TS000001");
/// let result = transport.send(&request).await;
/// timer.finish_with_result(result.as_ref());
/// ```
#[derive(Debug)]
pub struct OpTimer {
    /// Remote component (e.g., "daemon", "queue").
    component: &'static str,
    /// Operation being performed (e.g., "submit", "read_status").
    operation: &'static str,
    /// Schedule id or job handle the call concerns.
    target: String,
    start: Instant,
}

impl OpTimer {
    #[must_use]
    pub fn new(component: &'static str, operation: &'static str, target: impl Into<String>) -> Self {
        let target = target.into();

        tracing::debug!(
            component,
            operation,
            target = %target,
            "Remote call started"
        );

        Self {
            component,
            operation,
            target,
            start: Instant::now(),
        }
    }

    /// Finishes the timer, logging success at info and failure at warn.
    pub fn finish_with_result<T, E: std::fmt::Display>(self, result: Result<&T, &E>) {
        let duration_ms = self.start.elapsed().as_millis();

        match result {
            Ok(_) => {
                tracing::info!(
                    component = self.component,
                    operation = self.operation,
                    target = %self.target,
                    duration_ms = duration_ms,
                    "Remote call completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    component = self.component,
                    operation = self.operation,
                    target = %self.target,
                    duration_ms = duration_ms,
                    error = %e,
                    "Remote call failed"
                );
            }
        }
    }
}
