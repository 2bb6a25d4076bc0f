//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → registry.rs (look up the backend's breaker)
//!     → circuit_breaker.rs (admit or reject, enforce per-call timeout)
//!     → On failure: count toward threshold, open circuit, serve fallback
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - One breaker per backend identity, shared by every caller
//! - No retries: a failed call is reported, not repeated
//! - Timestamps come from clock.rs so tests can drive them with paused time

pub mod circuit_breaker;
pub mod clock;
pub mod registry;

pub use circuit_breaker::{
    BreakerError, BreakerMetrics, BreakerReport, BreakerSnapshot, CircuitBreaker, CircuitState,
};
pub use registry::{BreakerRegistry, RegistryError};
