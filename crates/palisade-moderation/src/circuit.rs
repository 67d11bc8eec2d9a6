//! Circuit breaker for the moderation endpoint.
//!
//! ## State machine
//!
//! ```text
//!   Closed ──(threshold consecutive failures)──> Open
//!   Open ──(cooldown elapsed)──> HalfOpen
//!   HalfOpen ──(success)──> Closed
//!   HalfOpen ──(failure)──> Open
//! ```
//!
//! While open, calls are refused with [`ClientError::CircuitOpen`] and the
//! caller falls straight through to its fallback verdict.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ClientError;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation; calls pass through.
    Closed,
    /// Tripped; calls are refused until the cooldown elapses.
    Open,
    /// Cooldown elapsed; a trial call is in flight.
    HalfOpen,
}

/// Observable counters for the circuit breaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CircuitMetrics {
    /// Times the circuit tripped open.
    pub trips: u64,
    /// Calls refused while open.
    pub rejected_calls: u64,
    /// Trial calls allowed from the half-open state.
    pub probes_attempted: u64,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    metrics: CircuitMetrics,
}

/// Consecutive-failure circuit breaker.
///
/// A threshold of zero disables the breaker entirely; it then never
/// refuses a call.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    /// Creates a breaker that opens after `threshold` consecutive
    /// failures and stays open for `cooldown`.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                metrics: CircuitMetrics::default(),
            }),
        }
    }

    /// Checks whether a call may proceed.
    ///
    /// An open circuit whose cooldown has elapsed transitions to half-open
    /// and admits the call as a trial.
    pub fn check(&self) -> Result<(), ClientError> {
        if self.threshold == 0 {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    inner.metrics.probes_attempted += 1;
                    tracing::debug!("moderation circuit half-open, allowing trial call");
                    Ok(())
                } else {
                    inner.metrics.rejected_calls += 1;
                    Err(ClientError::CircuitOpen)
                }
            }
        }
    }

    /// Records a successful call, closing the circuit.
    pub fn record_success(&self) {
        if self.threshold == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!("moderation circuit closed after successful call");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    /// Records a failed call, possibly tripping the circuit.
    pub fn record_failure(&self) {
        if self.threshold == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let tripped = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.consecutive_failures >= self.threshold,
            CircuitState::Open => false,
        };
        if tripped {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.metrics.trips += 1;
            tracing::warn!(
                consecutive_failures = inner.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "moderation circuit opened"
            );
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Returns a snapshot of the counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.inner.lock().metrics
    }
}
