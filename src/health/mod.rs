//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health or periodic timer (active.rs)
//!     → aggregator.rs (probe all services concurrently)
//!     → probe.rs (GET <service url><path> with its own timeout)
//!     → pair each result with the service's breaker snapshot
//!     → OverallHealth (OK when every service is UP)
//! ```
//!
//! # Design Decisions
//! - Health is observation only; probes never feed circuit breakers
//! - Health state is per-service, rolled up to one gateway status
//! - The latest report is cached for readers that must not block

pub mod active;
pub mod aggregator;
pub mod probe;

pub use active::HealthMonitor;
pub use aggregator::{HealthAggregator, OverallHealth, OverallStatus, ServiceHealth, ServiceStatus};
pub use probe::ProbeOutcome;
