// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Client operations reduced to ordered command sequences.
//!
//! An [`Action`] runs its commands one at a time: the next command is only
//! issued once the previous one has been confirmed by its callback. The
//! completion hook runs exactly once, when the status first becomes terminal.

use serde::Serialize;
use tracing::debug;

use crate::radio::freq::{Band, Freq};
use crate::request::{RadioRequest, RequestKind, ScanMode};
use crate::state::{RadioAttributes, Station};
use crate::tuner::{Command, CommandOutcome, ExecContext, Reading, TunerCallback};

/// Lifecycle of an action. Moves `Idle -> Running -> terminal` and never
/// leaves a terminal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionStatus {
    Idle,
    Running,
    Done,
    Cancel,
    Fail,
    Error,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancel | Self::Fail | Self::Error)
    }
}

impl From<CommandOutcome> for ActionStatus {
    fn from(outcome: CommandOutcome) -> Self {
        match outcome {
            CommandOutcome::Success => Self::Running,
            CommandOutcome::Cancel => Self::Cancel,
            CommandOutcome::Fail => Self::Fail,
            CommandOutcome::Error => Self::Error,
        }
    }
}

/// Side effect applied to the shared attributes when the action ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionHook {
    None,
    /// Defaults restored after a successful start on `band`.
    Started { band: Band },
    FrequencySet(Freq),
    ThresholdSet(u32),
    ForceMonoSet(bool),
    AutoAfSwitchSet(bool),
    AutoTaSwitchSet(bool),
    /// Empties the station list before the first poll of a full scan.
    FullScanStarted,
    /// Consumes the readings of a scan poll and schedules the next step.
    ScanPolled { mode: ScanMode, capacity: usize },
    /// Finishes the scan as aborted.
    ScanStopped { mode: ScanMode },
}

/// Everything an action touches while it runs.
pub struct ActionContext<'a> {
    pub exec: ExecContext<'a>,
    pub attrs: &'a mut RadioAttributes,
    /// Requests emitted by completion hooks, processed once the machine is stable.
    pub followups: Vec<RadioRequest>,
}

impl<'a> ActionContext<'a> {
    pub fn new(exec: ExecContext<'a>, attrs: &'a mut RadioAttributes) -> Self {
        Self {
            exec,
            attrs,
            followups: Vec::new(),
        }
    }
}

/// One accepted request and the commands that implement it.
#[derive(Debug, Clone)]
pub struct Action {
    kind: RequestKind,
    commands: Vec<Command>,
    index: usize,
    status: ActionStatus,
    hook: CompletionHook,
}

impl Action {
    pub fn new(kind: RequestKind, commands: Vec<Command>, hook: CompletionHook) -> Self {
        Self {
            kind,
            commands,
            index: 0,
            status: ActionStatus::Idle,
            hook,
        }
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn status(&self) -> ActionStatus {
        self.status
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn hook(&self) -> &CompletionHook {
        &self.hook
    }

    /// Index of the command waiting for its callback.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Issue the first command. An empty action is done immediately.
    pub fn execute(&mut self, ctx: &mut ActionContext<'_>) {
        if self.status != ActionStatus::Idle {
            return;
        }
        if self.commands.is_empty() {
            self.set_status(ActionStatus::Done, ctx);
            return;
        }
        self.index = 0;
        self.status = ActionStatus::Running;
        let outcome = self.commands[0].execute(&mut ctx.exec);
        self.set_status(outcome.into(), ctx);
    }

    /// Feed a hardware callback to the command currently waiting.
    pub fn callback(&mut self, callback: &TunerCallback, ctx: &mut ActionContext<'_>) {
        if self.status != ActionStatus::Running {
            debug!(
                "{} ignores callback in status {:?}",
                self.kind.name(),
                self.status
            );
            return;
        }
        let band = ctx.attrs.band;
        let outcome = self.commands[self.index].on_callback(callback, &band);
        if outcome != CommandOutcome::Success {
            self.set_status(outcome.into(), ctx);
            return;
        }
        if self.index + 1 >= self.commands.len() {
            self.set_status(ActionStatus::Done, ctx);
            return;
        }
        self.index += 1;
        let outcome = self.commands[self.index].execute(&mut ctx.exec);
        self.set_status(outcome.into(), ctx);
    }

    /// Force a terminal status from outside, e.g. on timeout.
    pub fn abort(&mut self, status: ActionStatus, ctx: &mut ActionContext<'_>) {
        if status.is_terminal() {
            self.set_status(status, ctx);
        }
    }

    fn set_status(&mut self, status: ActionStatus, ctx: &mut ActionContext<'_>) {
        if self.status.is_terminal() || status == self.status {
            return;
        }
        debug!("{} status {:?} -> {:?}", self.kind.name(), self.status, status);
        self.status = status;
        if status.is_terminal() {
            self.run_hook(ctx);
        }
    }

    fn reading<T>(&self, pick: impl Fn(Reading) -> Option<T>) -> Option<T> {
        self.commands
            .iter()
            .filter_map(Command::reading)
            .find_map(pick)
    }

    fn run_hook(&self, ctx: &mut ActionContext<'_>) {
        let attrs = &mut *ctx.attrs;
        match (&self.hook, self.status) {
            (CompletionHook::Started { band }, ActionStatus::Done) => attrs.reset_for_start(*band),
            (CompletionHook::FrequencySet(freq), ActionStatus::Done) => {
                attrs.frequency = Some(*freq)
            }
            (CompletionHook::ThresholdSet(threshold), ActionStatus::Done) => {
                attrs.threshold = *threshold
            }
            (CompletionHook::ForceMonoSet(mono), ActionStatus::Done) => attrs.force_mono = *mono,
            (CompletionHook::AutoAfSwitchSet(on), ActionStatus::Done) => attrs.auto_af_switch = *on,
            (CompletionHook::AutoTaSwitchSet(on), ActionStatus::Done) => attrs.auto_ta_switch = *on,
            (CompletionHook::FullScanStarted, ActionStatus::Done) => attrs.stations.clear(),
            (CompletionHook::ScanPolled { mode, capacity }, ActionStatus::Done) => {
                if let Some(stereo) = self.reading(|r| match r {
                    Reading::ScanStatus { stereo } => Some(stereo),
                    _ => None,
                }) {
                    attrs.stereo = stereo;
                }
                let freq = self.reading(|r| match r {
                    Reading::Frequency(freq) => Some(freq),
                    _ => None,
                });
                let signal = self.reading(|r| match r {
                    Reading::Signal(signal) => Some(signal),
                    _ => None,
                });
                if freq.is_some() {
                    attrs.frequency = freq;
                }
                if signal.is_some() {
                    attrs.signal_strength = signal;
                }
                let next = match (mode, freq, signal) {
                    (ScanMode::Full, Some(freq), Some(signal)) => {
                        attrs.stations.push(Station { freq, signal });
                        // Nothing left above the top channel to search.
                        let at_band_edge = attrs.band.next_channel(freq).is_none();
                        if attrs.stations.len() >= *capacity || at_band_edge {
                            RequestKind::ScanDone {
                                mode: *mode,
                                aborted: false,
                            }
                        } else {
                            RequestKind::ScanStep
                        }
                    }
                    _ => RequestKind::ScanDone {
                        mode: *mode,
                        aborted: false,
                    },
                };
                ctx.followups.push(RadioRequest::internal(next));
            }
            (CompletionHook::ScanPolled { mode, .. }, ActionStatus::Fail) => {
                ctx.followups.push(RadioRequest::internal(RequestKind::ScanDone {
                    mode: *mode,
                    aborted: false,
                }));
            }
            (CompletionHook::ScanStopped { mode }, ActionStatus::Done) => {
                ctx.followups.push(RadioRequest::internal(RequestKind::ScanDone {
                    mode: *mode,
                    aborted: true,
                }));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuner::command::tests::{read_ack, write_ack, RecordingTransport};
    use crate::tuner::registers::{REG_AUDIO_CTRL, REG_FLAG, REG_FREQ, REG_RSSI};

    fn run<F>(attrs: &mut RadioAttributes, f: F) -> (RecordingTransport, Vec<RadioRequest>)
    where
        F: FnOnce(&mut ActionContext<'_>),
    {
        let mut transport = RecordingTransport::default();
        let followups = {
            let mut ctx = ActionContext::new(ExecContext::new(&mut transport), attrs);
            f(&mut ctx);
            ctx.followups
        };
        (transport, followups)
    }

    fn freq_bytes(khz: u32) -> [u8; 2] {
        Freq::new(khz).to_register().to_le_bytes()
    }

    #[test]
    fn test_empty_action_is_done_on_execute() {
        let mut attrs = RadioAttributes::default();
        let mut action = Action::new(
            RequestKind::SetThreshold(300),
            vec![],
            CompletionHook::ThresholdSet(300),
        );
        run(&mut attrs, |ctx| action.execute(ctx));
        assert_eq!(action.status(), ActionStatus::Done);
        assert_eq!(attrs.threshold, 300);
    }

    #[test]
    fn test_commands_chain_on_success() {
        let mut attrs = RadioAttributes::default();
        let mut action = Action::new(
            RequestKind::SetFrequency(Freq::new(99_900)),
            vec![
                Command::write_freq(Freq::new(99_900)),
                Command::write(0x09, 0x01),
            ],
            CompletionHook::FrequencySet(Freq::new(99_900)),
        );
        let (transport, _) = run(&mut attrs, |ctx| {
            action.execute(ctx);
            assert_eq!(action.status(), ActionStatus::Running);
            assert_eq!(ctx.attrs.frequency, None);
            action.callback(&write_ack(REG_FREQ), ctx);
            assert_eq!(action.index(), 1);
            assert_eq!(action.status(), ActionStatus::Running);
            action.callback(&write_ack(0x09), ctx);
        });
        assert_eq!(action.status(), ActionStatus::Done);
        assert_eq!(attrs.frequency, Some(Freq::new(99_900)));
        assert_eq!(transport.sent.len(), 2);
    }

    #[test]
    fn test_hook_runs_once_and_status_is_monotonic() {
        let mut attrs = RadioAttributes::default();
        let mut action = Action::new(
            RequestKind::SetForceMono(true),
            vec![Command::write(REG_AUDIO_CTRL, 0)],
            CompletionHook::ForceMonoSet(true),
        );
        run(&mut attrs, |ctx| {
            action.execute(ctx);
            action.callback(&write_ack(REG_AUDIO_CTRL), ctx);
            assert!(ctx.attrs.force_mono);
            ctx.attrs.force_mono = false;
            action.callback(&write_ack(REG_AUDIO_CTRL), ctx);
            action.abort(ActionStatus::Error, ctx);
        });
        assert_eq!(action.status(), ActionStatus::Done);
        assert!(!attrs.force_mono);
    }

    #[test]
    fn test_mismatched_opcode_is_error() {
        let mut attrs = RadioAttributes::default();
        let mut action = Action::new(
            RequestKind::Pause,
            vec![Command::write(REG_AUDIO_CTRL, 0x63)],
            CompletionHook::None,
        );
        run(&mut attrs, |ctx| {
            action.execute(ctx);
            action.callback(&TunerCallback::vendor(0x1234, [0, REG_AUDIO_CTRL, 0]), ctx);
        });
        assert_eq!(action.status(), ActionStatus::Error);
    }

    #[test]
    fn test_refused_first_command_is_error() {
        let mut attrs = RadioAttributes::default();
        let mut action = Action::new(RequestKind::Reset, vec![Command::disable()], CompletionHook::None);
        let mut transport = RecordingTransport {
            refuse: true,
            ..Default::default()
        };
        let mut ctx = ActionContext::new(ExecContext::new(&mut transport), &mut attrs);
        action.execute(&mut ctx);
        assert_eq!(action.status(), ActionStatus::Error);
    }

    fn poll_action(mode: ScanMode, capacity: usize) -> Action {
        Action::new(
            RequestKind::PollScan(mode),
            vec![
                Command::poll_status(),
                Command::read_frequency(),
                Command::read_signal(),
            ],
            CompletionHook::ScanPolled { mode, capacity },
        )
    }

    #[test]
    fn test_poll_not_finished_cancels_without_followup() {
        let mut attrs = RadioAttributes::default();
        let mut action = poll_action(ScanMode::Up, 50);
        let (_, followups) = run(&mut attrs, |ctx| {
            action.execute(ctx);
            action.callback(&read_ack(REG_FLAG, &[0, 0]), ctx);
        });
        assert_eq!(action.status(), ActionStatus::Cancel);
        assert!(followups.is_empty());
    }

    #[test]
    fn test_full_scan_poll_appends_station_and_steps() {
        let mut attrs = RadioAttributes::default();
        let mut action = poll_action(ScanMode::Full, 50);
        let (_, followups) = run(&mut attrs, |ctx| {
            action.execute(ctx);
            action.callback(&read_ack(REG_FLAG, &[0x41, 0]), ctx);
            action.callback(&read_ack(REG_FREQ, &freq_bytes(88_100)), ctx);
            action.callback(&read_ack(REG_RSSI, &[33]), ctx);
        });
        assert_eq!(action.status(), ActionStatus::Done);
        assert_eq!(
            attrs.stations,
            vec![Station {
                freq: Freq::new(88_100),
                signal: 33
            }]
        );
        assert!(attrs.stereo);
        assert_eq!(followups, vec![RadioRequest::internal(RequestKind::ScanStep)]);
    }

    #[test]
    fn test_full_scan_poll_stops_at_capacity() {
        let mut attrs = RadioAttributes::default();
        let mut action = poll_action(ScanMode::Full, 1);
        let (_, followups) = run(&mut attrs, |ctx| {
            action.execute(ctx);
            action.callback(&read_ack(REG_FLAG, &[0x01, 0]), ctx);
            action.callback(&read_ack(REG_FREQ, &freq_bytes(90_000)), ctx);
            action.callback(&read_ack(REG_RSSI, &[20]), ctx);
        });
        assert_eq!(
            followups,
            vec![RadioRequest::internal(RequestKind::ScanDone {
                mode: ScanMode::Full,
                aborted: false
            })]
        );
    }

    #[test]
    fn test_full_scan_poll_on_top_channel_finishes_scan() {
        let mut attrs = RadioAttributes::default();
        let mut action = poll_action(ScanMode::Full, 50);
        let (_, followups) = run(&mut attrs, |ctx| {
            action.execute(ctx);
            action.callback(&read_ack(REG_FLAG, &[0x01, 0]), ctx);
            action.callback(&read_ack(REG_FREQ, &freq_bytes(108_000)), ctx);
            action.callback(&read_ack(REG_RSSI, &[70]), ctx);
        });
        assert_eq!(action.status(), ActionStatus::Done);
        assert_eq!(attrs.stations.len(), 1);
        assert_eq!(
            followups,
            vec![RadioRequest::internal(RequestKind::ScanDone {
                mode: ScanMode::Full,
                aborted: false
            })]
        );
    }

    #[test]
    fn test_poll_failure_finishes_scan() {
        let mut attrs = RadioAttributes::default();
        let mut action = poll_action(ScanMode::Down, 50);
        let (_, followups) = run(&mut attrs, |ctx| {
            action.execute(ctx);
            action.callback(&read_ack(REG_FLAG, &[0x03, 0]), ctx);
        });
        assert_eq!(action.status(), ActionStatus::Fail);
        assert_eq!(
            followups,
            vec![RadioRequest::internal(RequestKind::ScanDone {
                mode: ScanMode::Down,
                aborted: false
            })]
        );
    }
}
