//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Matched service name + request
//!     → dispatcher.rs (look up target, fetch breaker from registry)
//!     → upstream.rs (rebase request onto the service URL)
//!     → CircuitBreaker::execute_with_fallback
//!         ├─ success → backend response, unchanged
//!         ├─ open    → 503 fallback, backend not contacted
//!         └─ failure → 503 error response
//! ```
//!
//! # Design Decisions
//! - One pooled client for all services
//! - 4xx responses pass through and do not count as failures
//! - 5xx responses, transport errors and timeouts count as failures

pub mod dispatcher;
pub mod upstream;

pub use dispatcher::Dispatcher;
pub use upstream::{HttpClient, UpstreamClient, UpstreamError};
