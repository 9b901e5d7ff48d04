// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::radio::freq::{Band, Freq};

/// Which scan the radio is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    Up,
    Down,
    Full,
}

/// Direction reported with a single-station scan result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanDirection {
    Up,
    Down,
}

/// Client intent, or an internal scan bookkeeping step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Start { band: Band },
    Reset,
    Pause,
    Resume,
    SetFrequency(Freq),
    ScanUp,
    ScanDown,
    FullScan,
    StopScan,
    SetThreshold(u32),
    SetForceMono(bool),
    SetAutoAfSwitch(bool),
    SetAutoTaSwitch(bool),
    /// Read back search status while scanning.
    PollScan(ScanMode),
    /// Continue a full scan from the next channel.
    ScanStep,
    /// Report scan results and tune to the final frequency.
    ScanDone { mode: ScanMode, aborted: bool },
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Reset => "reset",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::SetFrequency(_) => "set-frequency",
            Self::ScanUp => "scan-up",
            Self::ScanDown => "scan-down",
            Self::FullScan => "full-scan",
            Self::StopScan => "stop-scan",
            Self::SetThreshold(_) => "set-threshold",
            Self::SetForceMono(_) => "set-force-mono",
            Self::SetAutoAfSwitch(_) => "set-auto-af-switch",
            Self::SetAutoTaSwitch(_) => "set-auto-ta-switch",
            Self::PollScan(_) => "poll-scan",
            Self::ScanStep => "scan-step",
            Self::ScanDone { .. } => "scan-done",
        }
    }

    /// Scan mode started by this request, if it starts one.
    pub fn scan_mode(&self) -> Option<ScanMode> {
        match self {
            Self::ScanUp => Some(ScanMode::Up),
            Self::ScanDown => Some(ScanMode::Down),
            Self::FullScan => Some(ScanMode::Full),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Correlates a submitted request with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Request as seen by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioRequest {
    /// `None` for follow-ups generated inside the machine.
    pub id: Option<RequestId>,
    pub kind: RequestKind,
}

impl RadioRequest {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            id: Some(RequestId::next()),
            kind,
        }
    }

    pub fn internal(kind: RequestKind) -> Self {
        Self { id: None, kind }
    }
}

/// Final report for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestOutcome {
    /// Every command succeeded.
    Done,
    /// Aborted without error; the radio returned to where it was.
    Cancelled,
    /// Rejected by the hardware; the radio returned to where it was.
    Failed,
    /// Protocol violation; the radio is in the error state.
    Error,
    /// No response in time; the radio is in the error state.
    TimedOut,
    /// Legal in the current state but nothing to do.
    Ignored,
    /// Not accepted in the current state.
    NotHandled,
}

impl RequestOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Done | Self::Ignored)
    }
}

/// Request sent to the tuner task.
#[derive(Debug)]
pub struct TunerRequest {
    pub request: RadioRequest,
    pub respond_to: Option<oneshot::Sender<RequestOutcome>>,
}
