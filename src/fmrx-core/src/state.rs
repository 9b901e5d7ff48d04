// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

use crate::controller::machine::OperatingState;
use crate::radio::freq::{Band, Freq};

/// Threshold applied after every successful start.
pub const DEFAULT_THRESHOLD: u32 = 500;

/// A station found by a full scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub freq: Freq,
    pub signal: u8,
}

/// Radio attributes shared with readers. Only action completion hooks
/// mutate these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioAttributes {
    pub band: Band,
    /// Last known tuned frequency, `None` until tuned.
    pub frequency: Option<Freq>,
    pub threshold: u32,
    pub force_mono: bool,
    pub signal_strength: Option<u8>,
    pub stereo: bool,
    pub auto_af_switch: bool,
    pub auto_ta_switch: bool,
    /// Stations collected by the current or last full scan.
    pub stations: Vec<Station>,
}

impl Default for RadioAttributes {
    fn default() -> Self {
        Self {
            band: Band::default(),
            frequency: None,
            threshold: DEFAULT_THRESHOLD,
            force_mono: false,
            signal_strength: None,
            stereo: false,
            auto_af_switch: false,
            auto_ta_switch: false,
            stations: Vec::new(),
        }
    }
}

impl RadioAttributes {
    /// Values right after the tuner has been (re)started on `band`.
    pub fn reset_for_start(&mut self, band: Band) {
        self.band = band;
        self.frequency = None;
        self.threshold = DEFAULT_THRESHOLD;
        self.force_mono = false;
        self.signal_strength = None;
        self.stereo = false;
    }

    pub fn is_tuned_to_valid_channel(&self) -> bool {
        self.frequency.is_some_and(|freq| self.band.is_valid(freq))
    }
}

/// Consistent view of the radio published after every processed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RadioSnapshot {
    /// Externally reported operating state.
    pub state: OperatingState,
    /// Transition in flight, reported as its source state except while starting.
    pub activity: OperatingState,
    /// Name of the request whose action is executing.
    pub pending: Option<&'static str>,
    pub attributes: RadioAttributes,
}

impl Default for RadioSnapshot {
    fn default() -> Self {
        Self {
            state: OperatingState::Invalid,
            activity: OperatingState::Invalid,
            pending: None,
            attributes: RadioAttributes::default(),
        }
    }
}
