// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Timing policy for the radio controller.
//!
//! Controls how long a transition may stay pending, how long the tuner is
//! given to settle after power-up and how often a running scan is polled.

use std::time::Duration;

use crate::request::RequestKind;

/// Station buffer size of a full scan.
pub const DEFAULT_MAX_STATIONS: usize = 50;

/// Timeouts and delays applied by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingPolicy {
    /// Budget of a start transition.
    pub start_timeout: Duration,
    /// Budget of a reset transition.
    pub reset_timeout: Duration,
    /// Budget of every other transition.
    pub property_timeout: Duration,
    /// Pause between enabling RDS and configuring the band.
    pub settle_delay: Duration,
    /// Delay between entering the scanning state and polling search status.
    pub scan_poll_interval: Duration,
    /// Number of stations after which a full scan ends.
    pub max_stations: usize,
}

impl TimingPolicy {
    /// Timings matching the tuner's documented behavior.
    pub fn default_tuner() -> Self {
        Self {
            start_timeout: Duration::from_millis(5000),
            reset_timeout: Duration::from_millis(5000),
            property_timeout: Duration::from_millis(2000),
            settle_delay: Duration::from_millis(500),
            scan_poll_interval: Duration::from_millis(100),
            max_stations: DEFAULT_MAX_STATIONS,
        }
    }

    /// Budget for the transition started by `kind`.
    pub fn timeout_for(&self, kind: &RequestKind) -> Duration {
        match kind {
            RequestKind::Start { .. } => self.start_timeout,
            RequestKind::Reset => self.reset_timeout,
            _ => self.property_timeout,
        }
    }
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self::default_tuner()
    }
}
