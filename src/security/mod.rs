//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client request budget)
//!     → body size limit (tower-http, configured in http/server.rs)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Clients are keyed by peer IP; forwarding headers are not trusted
//! - Rejections use the same JSON error body as other gateway errors

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiter};
