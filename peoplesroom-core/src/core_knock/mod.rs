//! Knock Workflow
//!
//! Time-boxed entry requests: creation (rate limited), fixed-TTL expiry
//! (lazy on read plus a background sweep), and owner resolution with an
//! optional promotion to a standing access-list rule.

pub mod knock;
pub mod rate_limiter;

pub use knock::{Knock, KnockBoard, KnockError, KnockStatus, MAX_MESSAGE_CHARS};
pub use rate_limiter::{KnockRateLimiter, RateLimiterConfig};
