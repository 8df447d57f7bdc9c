//! Session/Presence Tracking
//!
//! Owner occupancy periods and the live visitor set. One active session
//! per owner; owner exit evicts everyone.

pub mod session;

pub use session::{OwnerSession, SessionError, Visitor};
