//! Service health state machine.
//!
//! # States
//! - Healthy: service receives traffic
//! - Unhealthy: requests are rejected with 503 before reaching the backend
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy → Healthy: first successful probe
//! ```
//!
//! # Design Decisions
//! - New services start Healthy
//! - Recovery is asymmetric: one success is enough
//! - The shared flag is a lone atomic; the failure counter is private to the prober

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Health state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn is_healthy(self) -> bool {
        self == HealthState::Healthy
    }
}

impl From<bool> for HealthState {
    fn from(healthy: bool) -> Self {
        if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        }
    }
}

/// Shared health flag read by the dispatcher and written by the prober.
#[derive(Debug, Clone)]
pub struct HealthFlag(Arc<AtomicBool>);

impl HealthFlag {
    /// A flag that starts healthy.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_healthy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Store a new state, returning the previous one.
    pub fn set(&self, state: HealthState) -> HealthState {
        self.0.swap(state.is_healthy(), Ordering::AcqRel).into()
    }
}

impl Default for HealthFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// A state change produced by a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameUnhealthy { failures: u32 },
    Recovered,
}

/// Consecutive-failure tracker driving a `HealthFlag`.
#[derive(Debug)]
pub struct HealthTracker {
    flag: HealthFlag,
    threshold: u32,
    consecutive_failures: u32,
}

impl HealthTracker {
    pub fn new(flag: HealthFlag, threshold: u32) -> Self {
        Self {
            flag,
            threshold: threshold.max(1),
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_healthy(&self) -> bool {
        self.flag.is_healthy()
    }

    /// Report a successful probe.
    pub fn record_success(&mut self) -> Option<Transition> {
        self.consecutive_failures = 0;
        match self.flag.set(HealthState::Healthy) {
            HealthState::Unhealthy => Some(Transition::Recovered),
            HealthState::Healthy => None,
        }
    }

    /// Report a failed probe.
    pub fn record_failure(&mut self) -> Option<Transition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures < self.threshold {
            return None;
        }
        match self.flag.set(HealthState::Unhealthy) {
            HealthState::Healthy => Some(Transition::BecameUnhealthy {
                failures: self.consecutive_failures,
            }),
            HealthState::Unhealthy => None,
        }
    }

    pub fn record(&mut self, success: bool) -> Option<Transition> {
        if success {
            self.record_success()
        } else {
            self.record_failure()
        }
    }
}
