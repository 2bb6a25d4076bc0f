//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast (or fall back)
//! - Half-Open: a single trial request tests whether the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold since the last close
//! Open → Half-Open: first request at or after next_attempt_time
//! Half-Open → Closed: any completed request succeeds
//! Half-Open → Open: trial fails (failure_count is still over threshold)
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single trial in Half-Open; concurrent callers are rejected until it resolves
//! - Operations run on their own task, which records the outcome exactly once
//!   even when the caller is dropped; after a timeout it keeps running so a
//!   late success can still close a half-open circuit
//! - All transitions happen under one mutex that is never held across an await

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{CircuitBreakerConfig, ValidationError};
use crate::observability::metrics;
use crate::resilience::clock::Clock;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cumulative request counters. Only ever increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerMetrics {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub successful_requests: u64,
    pub circuit_open_count: u64,
}

impl BreakerMetrics {
    /// Failed share of all requests, in percent (0 when nothing ran yet).
    pub fn failure_rate_percent(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64 * 100.0
    }
}

/// Point-in-time copy of a breaker's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Unix milliseconds.
    pub last_failure_time: Option<u64>,
    /// Unix milliseconds.
    pub next_attempt_time: Option<u64>,
    pub metrics: BreakerMetrics,
}

/// Periodic record sent to the observability sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerReport {
    pub backend: String,
    pub state: CircuitState,
    pub failure_rate_percent: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub successful_requests: u64,
    pub circuit_open_count: u64,
}

impl BreakerReport {
    fn new(backend: &str, snapshot: &BreakerSnapshot) -> Self {
        let rate = snapshot.metrics.failure_rate_percent();
        Self {
            backend: backend.to_string(),
            state: snapshot.state,
            failure_rate_percent: (rate * 100.0).round() / 100.0,
            total_requests: snapshot.metrics.total_requests,
            failed_requests: snapshot.metrics.failed_requests,
            successful_requests: snapshot.metrics.successful_requests,
            circuit_open_count: snapshot.metrics.circuit_open_count,
        }
    }

    /// Write the report to the log and the metrics registry.
    pub fn emit(&self) {
        tracing::info!(
            backend = %self.backend,
            state = %self.state,
            failure_rate_percent = self.failure_rate_percent,
            total_requests = self.total_requests,
            failed_requests = self.failed_requests,
            successful_requests = self.successful_requests,
            circuit_open_count = self.circuit_open_count,
            "Circuit breaker metrics"
        );
        metrics::record_breaker_report(self);
    }
}

/// Errors produced by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker is OPEN for {backend}")]
    CircuitOpen { backend: String },

    #[error("operation timeout after {timeout_ms}ms for {backend}")]
    Timeout { backend: String, timeout_ms: u64 },

    #[error("operation for {backend} aborted before completing")]
    Aborted { backend: String },

    #[error("{0}")]
    Backend(E),
}

impl<E> BreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BreakerError::CircuitOpen { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<u64>,
    next_attempt_time: Option<u64>,
    trial_in_flight: bool,
    metrics: BreakerMetrics,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            next_attempt_time: None,
            trial_in_flight: false,
            metrics: BreakerMetrics::default(),
        }
    }

    fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            last_failure_time: self.last_failure_time,
            next_attempt_time: self.next_attempt_time,
            metrics: self.metrics,
        }
    }

    fn reject(&mut self) {
        self.metrics.total_requests += 1;
        self.metrics.failed_requests += 1;
        self.metrics.circuit_open_count += 1;
    }

    /// Returns true when this success closed the circuit.
    fn settle_success(&mut self) -> bool {
        self.success_count = self.success_count.saturating_add(1);
        if self.state != CircuitState::HalfOpen {
            return false;
        }
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_failure_time = None;
        self.next_attempt_time = None;
        self.trial_in_flight = false;
        true
    }
}

/// Outcome handed from the call task back to the caller, together with the
/// breaker state right after it was recorded.
type Settled<T, E> = Result<T, (BreakerError<E>, CircuitState)>;

enum Admission {
    Proceed,
    Rejected,
}

#[derive(Debug)]
struct BreakerCore {
    identity: String,
    config: CircuitBreakerConfig,
    clock: Clock,
    state: Mutex<BreakerState>,
}

impl BreakerCore {
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // Transitions cannot panic midway, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> Admission {
        let now = self.clock.now_millis();
        let mut s = self.lock();
        let current = s.state;

        match current {
            CircuitState::Closed => Admission::Proceed,
            CircuitState::Open => {
                if s.next_attempt_time.is_some_and(|at| now >= at) {
                    s.state = CircuitState::HalfOpen;
                    s.success_count = 0;
                    s.trial_in_flight = true;
                    drop(s);

                    tracing::info!(backend = %self.identity, "Circuit breaker transitioning to HALF_OPEN");
                    metrics::record_breaker_transition(&self.identity, CircuitState::HalfOpen);
                    Admission::Proceed
                } else {
                    s.reject();
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen if s.trial_in_flight => {
                s.reject();
                Admission::Rejected
            }
            CircuitState::HalfOpen => {
                s.trial_in_flight = true;
                Admission::Proceed
            }
        }
    }

    fn on_success(&self) {
        let closed = {
            let mut s = self.lock();
            s.metrics.total_requests += 1;
            s.metrics.successful_requests += 1;
            s.settle_success()
        };

        if closed {
            self.log_closed();
        }
    }

    /// A success that arrived after the call already timed out. The call was
    /// counted as a failure then, so only the state machine sees it.
    fn on_late_success(&self) {
        let closed = self.lock().settle_success();

        tracing::debug!(backend = %self.identity, "Late success recorded after timeout");
        if closed {
            self.log_closed();
        }
    }

    /// Record a failure and return the resulting state.
    fn on_failure(&self) -> CircuitState {
        let now = self.clock.now_millis();
        let (state, opened, failures) = {
            let mut s = self.lock();
            s.metrics.total_requests += 1;
            s.metrics.failed_requests += 1;
            s.failure_count = s.failure_count.saturating_add(1);
            s.last_failure_time = Some(now);

            let mut opened = false;
            if s.failure_count >= self.config.failure_threshold {
                opened = s.state != CircuitState::Open;
                s.state = CircuitState::Open;
                s.next_attempt_time = Some(now.saturating_add(self.config.reset_timeout_ms));
                s.trial_in_flight = false;
            }
            (s.state, opened, s.failure_count)
        };

        if opened {
            tracing::error!(
                backend = %self.identity,
                failures,
                reset_timeout_ms = self.config.reset_timeout_ms,
                "Circuit breaker transitioning to OPEN"
            );
            metrics::record_breaker_transition(&self.identity, CircuitState::Open);
        }
        state
    }

    fn log_closed(&self) {
        tracing::info!(backend = %self.identity, "Circuit breaker transitioning to CLOSED");
        metrics::record_breaker_transition(&self.identity, CircuitState::Closed);
    }
}

/// Per-backend circuit breaker. Cloning yields another handle to the same breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    core: Arc<BreakerCore>,
}

impl CircuitBreaker {
    /// Create a breaker for `identity`, validating `config`.
    pub fn new(identity: impl Into<String>, config: CircuitBreakerConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            core: Arc::new(BreakerCore {
                identity: identity.into(),
                config,
                clock: Clock::new(),
                state: Mutex::new(BreakerState::new()),
            }),
        })
    }

    pub fn identity(&self) -> &str {
        &self.core.identity
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.core.config
    }

    /// True when both handles refer to the same breaker.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Run `operation` under the circuit policy.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.run(operation, None::<fn() -> std::future::Ready<T>>).await
    }

    /// Run `operation` under the circuit policy, answering with `fallback`
    /// whenever the circuit is (or just became) open.
    pub async fn execute_with_fallback<T, E, F, Fut, Fb, FbFut>(
        &self,
        operation: F,
        fallback: Fb,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        Fb: FnOnce() -> FbFut,
        FbFut: Future<Output = T>,
    {
        self.run(operation, Some(fallback)).await
    }

    async fn run<T, E, F, Fut, Fb, FbFut>(
        &self,
        operation: F,
        fallback: Option<Fb>,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        Fb: FnOnce() -> FbFut,
        FbFut: Future<Output = T>,
    {
        if let Admission::Rejected = self.core.admit() {
            metrics::record_breaker_rejection(&self.core.identity);
            return match fallback {
                Some(fallback) => {
                    tracing::warn!(backend = %self.core.identity, "Circuit breaker OPEN, using fallback");
                    Ok(fallback().await)
                }
                None => Err(BreakerError::CircuitOpen {
                    backend: self.core.identity.clone(),
                }),
            };
        }

        let settled = match self.spawn_call(operation()).await {
            Ok(settled) => settled,
            // The call task was torn down with the runtime; nothing was recorded.
            Err(_) => {
                return Err(BreakerError::Aborted {
                    backend: self.core.identity.clone(),
                })
            }
        };

        match settled {
            Ok(value) => Ok(value),
            Err((err, state)) => match fallback {
                Some(fallback) if state == CircuitState::Open => {
                    tracing::warn!(
                        backend = %self.core.identity,
                        error = %err,
                        "Operation failed, using fallback"
                    );
                    Ok(fallback().await)
                }
                _ => Err(err),
            },
        }
    }

    /// Run `operation` on its own task, which records the outcome before
    /// handing it back. The caller going away does not stop the recording.
    fn spawn_call<T, E, Fut>(&self, operation: Fut) -> oneshot::Receiver<Settled<T, E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let core = Arc::clone(&self.core);

        tokio::spawn(async move {
            let timeout_ms = core.config.timeout_ms;
            let operation = AssertUnwindSafe(operation).catch_unwind();
            tokio::pin!(operation);

            let settled = match time::timeout(core.config.timeout(), &mut operation).await {
                Ok(Ok(Ok(value))) => {
                    core.on_success();
                    Ok(value)
                }
                Ok(Ok(Err(err))) => Err((BreakerError::Backend(err), core.on_failure())),
                Ok(Err(_panic)) => {
                    tracing::error!(backend = %core.identity, "Operation panicked");
                    let err = BreakerError::Aborted {
                        backend: core.identity.clone(),
                    };
                    Err((err, core.on_failure()))
                }
                Err(_) => {
                    tracing::warn!(backend = %core.identity, timeout_ms, "Operation timed out");
                    let err = BreakerError::Timeout {
                        backend: core.identity.clone(),
                        timeout_ms,
                    };
                    let state = core.on_failure();
                    let _ = tx.send(Err((err, state)));

                    // Already counted as a failure; only a late success still matters.
                    if let Ok(Ok(_)) = operation.await {
                        core.on_late_success();
                    }
                    return;
                }
            };

            if tx.send(settled).is_err() {
                tracing::debug!(backend = %core.identity, "Caller gone before outcome was delivered");
            }
        });

        rx
    }

    /// Immutable copy of the current state and counters.
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.core.lock().snapshot()
    }

    /// Force the breaker closed. Cumulative metrics are kept.
    pub fn reset(&self) {
        {
            let mut s = self.core.lock();
            s.state = CircuitState::Closed;
            s.failure_count = 0;
            s.success_count = 0;
            s.last_failure_time = None;
            s.next_attempt_time = None;
            s.trial_in_flight = false;
        }
        tracing::info!(backend = %self.core.identity, "Circuit breaker manually reset");
    }

    /// Metrics record for the observability sink.
    pub fn report(&self) -> BreakerReport {
        BreakerReport::new(&self.core.identity, &self.snapshot())
    }

    /// Emit a [`BreakerReport`] every monitoring period until shutdown.
    pub fn spawn_monitor(&self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        self.spawn_monitor_with(shutdown, |report| report.emit())
    }

    /// Hand a [`BreakerReport`] to `sink` every monitoring period until
    /// shutdown. The first report comes one period after the call.
    pub fn spawn_monitor_with<S>(&self, mut shutdown: broadcast::Receiver<()>, mut sink: S) -> JoinHandle<()>
    where
        S: FnMut(BreakerReport) + Send + 'static,
    {
        let breaker = self.clone();
        let period = self.core.config.monitoring_period();

        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => sink(breaker.report()),
                    _ = shutdown.recv() => {
                        tracing::debug!(backend = %breaker.identity(), "Circuit breaker monitor stopping");
                        break;
                    }
                }
            }
        })
    }
}
