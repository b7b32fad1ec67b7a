//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs, startup.rs):
//!     Load config → Validate → Build manager → Bind admin API → Add services
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop admin API → Manager teardown → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One process-wide broadcast plus one stop channel per service
//! - Background tasks are owned and counted (tasks.rs), never detached

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod tasks;

pub use shutdown::{stop_channel, Shutdown, StopHandle, StopSignal};
pub use tasks::{TaskGuard, TaskTracker};
