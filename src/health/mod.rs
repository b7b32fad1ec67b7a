//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Per-service timer
//!     → Probe backend health path
//!     → Update state.rs
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy
//!     Threshold on the way down, immediate recovery on the way up
//!
//! Dispatcher:
//!     Reads the same HealthFlag; never takes a lock for it
//! ```
//!
//! # Design Decisions
//! - Health state is per-service
//! - State transitions require consecutive failures
//! - The prober is the only writer of a service's flag

pub mod active;
pub mod state;

pub use active::{ProbeOutcome, Prober};
pub use state::{HealthFlag, HealthState, HealthTracker, Transition};
