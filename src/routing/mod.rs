//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query)
//!     → router.rs (health gate)
//!     → matcher.rs (prefix match, optional strip)
//!     → Forwarder, or a 503 / 404 answered locally
//! ```
//!
//! # Design Decisions
//! - Rules are compiled when a service is added, immutable afterwards
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same prefix

pub mod matcher;
pub mod router;

pub use matcher::PathRules;
pub use router::{dispatch, route, DispatchError};
