// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Maps requests to the command sequences that implement them.

use tracing::warn;

use crate::request::{RequestKind, ScanDirection, ScanMode};
use crate::state::RadioAttributes;
use crate::tuner::registers::{
    audio_ctrl, fm_ctrl, search_ctrl, REG_AUDIO_CTRL, REG_FM_CTRL, REG_RDS_SYSTEM,
    REG_SEARCH_CTRL, REG_SEARCH_TUNE_MODE, RDS_SYSTEM_FM, RDS_SYSTEM_OFF, RDS_SYSTEM_RDS,
    SEARCH_TUNE_AUTO_SEARCH, SEARCH_TUNE_PRESET, SEARCH_TUNE_TERMINATE,
};
use crate::tuner::Command;

use super::action::{Action, CompletionHook};
use super::events::Notification;
use super::policies::TimingPolicy;

/// Action plus notifications that are due as soon as it starts.
#[derive(Debug, Clone)]
pub struct BuiltAction {
    pub action: Action,
    pub notices: Vec<Notification>,
}

impl From<Action> for BuiltAction {
    fn from(action: Action) -> Self {
        Self {
            action,
            notices: Vec::new(),
        }
    }
}

/// Builds actions from requests and the current radio attributes.
#[derive(Debug, Clone, Default)]
pub struct ActionFactory {
    timing: TimingPolicy,
}

impl ActionFactory {
    pub fn new(timing: TimingPolicy) -> Self {
        Self { timing }
    }

    /// Returns `None` when the request carries parameters the radio cannot use,
    /// or when it stops a scan that is not running.
    pub fn build(
        &self,
        kind: &RequestKind,
        attrs: &RadioAttributes,
        scan_mode: Option<ScanMode>,
    ) -> Option<BuiltAction> {
        let band = attrs.band;
        let action = match kind {
            RequestKind::Start { band } => Action::new(
                kind.clone(),
                vec![
                    Command::enable(),
                    Command::write(REG_RDS_SYSTEM, RDS_SYSTEM_RDS | RDS_SYSTEM_FM),
                    Command::delay(self.timing.settle_delay),
                    Command::write(REG_FM_CTRL, fm_ctrl(band, false)),
                    Command::write(REG_AUDIO_CTRL, audio_ctrl(false)),
                ],
                CompletionHook::Started { band: *band },
            ),
            RequestKind::Reset => Action::new(
                kind.clone(),
                vec![
                    Command::write(REG_RDS_SYSTEM, RDS_SYSTEM_OFF),
                    Command::disable(),
                ],
                CompletionHook::None,
            ),
            RequestKind::Pause => Action::new(
                kind.clone(),
                vec![Command::write(REG_AUDIO_CTRL, audio_ctrl(true))],
                CompletionHook::None,
            ),
            RequestKind::Resume => Action::new(
                kind.clone(),
                vec![Command::write(REG_AUDIO_CTRL, audio_ctrl(false))],
                CompletionHook::None,
            ),
            RequestKind::SetFrequency(freq) => {
                if !band.is_valid(*freq) {
                    warn!("{} is not a channel of the active band", freq);
                    return None;
                }
                Action::new(
                    kind.clone(),
                    vec![
                        Command::write_freq(*freq),
                        Command::write(REG_SEARCH_TUNE_MODE, SEARCH_TUNE_PRESET),
                    ],
                    CompletionHook::FrequencySet(*freq),
                )
            }
            RequestKind::SetThreshold(threshold) => Action::new(
                kind.clone(),
                vec![],
                CompletionHook::ThresholdSet(*threshold),
            ),
            RequestKind::SetForceMono(mono) => Action::new(
                kind.clone(),
                vec![Command::write(REG_FM_CTRL, fm_ctrl(&band, *mono))],
                CompletionHook::ForceMonoSet(*mono),
            ),
            RequestKind::SetAutoAfSwitch(on) => {
                Action::new(kind.clone(), vec![], CompletionHook::AutoAfSwitchSet(*on))
            }
            RequestKind::SetAutoTaSwitch(on) => {
                Action::new(kind.clone(), vec![], CompletionHook::AutoTaSwitchSet(*on))
            }
            RequestKind::ScanUp | RequestKind::ScanDown => Action::new(
                kind.clone(),
                vec![
                    Command::write(
                        REG_SEARCH_CTRL,
                        search_ctrl(*kind == RequestKind::ScanUp, attrs.threshold),
                    ),
                    Command::write(REG_SEARCH_TUNE_MODE, SEARCH_TUNE_AUTO_SEARCH),
                ],
                CompletionHook::None,
            ),
            RequestKind::FullScan => Action::new(
                kind.clone(),
                vec![
                    Command::write_freq(band.min),
                    Command::write(REG_SEARCH_CTRL, search_ctrl(true, attrs.threshold)),
                    Command::write(REG_SEARCH_TUNE_MODE, SEARCH_TUNE_AUTO_SEARCH),
                ],
                CompletionHook::FullScanStarted,
            ),
            RequestKind::ScanStep => {
                let from = attrs.frequency.unwrap_or(band.min);
                let next = band.next_channel(from)?;
                Action::new(
                    kind.clone(),
                    vec![
                        Command::write_freq(next),
                        Command::write(REG_SEARCH_CTRL, search_ctrl(true, attrs.threshold)),
                        Command::write(REG_SEARCH_TUNE_MODE, SEARCH_TUNE_AUTO_SEARCH),
                    ],
                    CompletionHook::None,
                )
            }
            RequestKind::PollScan(mode) => Action::new(
                kind.clone(),
                vec![
                    Command::poll_status(),
                    Command::read_frequency(),
                    Command::read_signal(),
                ],
                CompletionHook::ScanPolled {
                    mode: *mode,
                    capacity: self.timing.max_stations,
                },
            ),
            RequestKind::StopScan => {
                let mode = scan_mode?;
                Action::new(
                    kind.clone(),
                    vec![Command::write(REG_SEARCH_TUNE_MODE, SEARCH_TUNE_TERMINATE)],
                    CompletionHook::ScanStopped { mode },
                )
            }
            RequestKind::ScanDone { mode, aborted } => {
                return Some(self.scan_done(kind, *mode, *aborted, attrs));
            }
        };
        Some(action.into())
    }

    fn scan_done(
        &self,
        kind: &RequestKind,
        mode: ScanMode,
        aborted: bool,
        attrs: &RadioAttributes,
    ) -> BuiltAction {
        let notice = match mode {
            ScanMode::Full => Notification::FullScanResult {
                frequencies: attrs.stations.iter().map(|s| s.freq).collect(),
                signals: attrs.stations.iter().map(|s| s.signal).collect(),
                aborted,
            },
            ScanMode::Up | ScanMode::Down => Notification::ScanResult {
                frequency: attrs.frequency,
                signal: attrs.signal_strength,
                direction: if mode == ScanMode::Up {
                    ScanDirection::Up
                } else {
                    ScanDirection::Down
                },
                aborted,
            },
        };
        let commands = match attrs.frequency {
            Some(freq) => vec![
                Command::write_freq(freq),
                Command::write(REG_SEARCH_TUNE_MODE, SEARCH_TUNE_PRESET),
            ],
            None => vec![],
        };
        BuiltAction {
            action: Action::new(kind.clone(), commands, CompletionHook::None),
            notices: vec![notice],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::freq::{Band, Freq};
    use crate::state::Station;
    use crate::tuner::registers::{REG_FREQ, REG_SEARCH_CTRL};

    fn factory() -> ActionFactory {
        ActionFactory::new(TimingPolicy::default())
    }

    fn build(kind: RequestKind, attrs: &RadioAttributes) -> BuiltAction {
        factory()
            .build(&kind, attrs, Some(ScanMode::Up))
            .expect("action")
    }

    #[test]
    fn test_start_sequence() {
        let built = build(
            RequestKind::Start {
                band: Band::europe_us(),
            },
            &RadioAttributes::default(),
        );
        let cmds = built.action.commands();
        assert_eq!(cmds.len(), 5);
        assert_eq!(cmds[0], Command::enable());
        assert_eq!(
            cmds[1],
            Command::write(REG_RDS_SYSTEM, RDS_SYSTEM_RDS | RDS_SYSTEM_FM)
        );
        assert!(matches!(cmds[2], Command::Delay { .. }));
        assert_eq!(cmds[3], Command::write(REG_FM_CTRL, 0x06));
        assert_eq!(cmds[4], Command::write(REG_AUDIO_CTRL, 0x61));
        assert!(built.notices.is_empty());
    }

    #[test]
    fn test_set_frequency_writes_register_then_preset() {
        let built = build(
            RequestKind::SetFrequency(Freq::new(100_000)),
            &RadioAttributes::default(),
        );
        assert_eq!(
            built.action.commands(),
            &[
                Command::Write {
                    register: REG_FREQ,
                    value: vec![0xa0, 0x8c],
                },
                Command::write(REG_SEARCH_TUNE_MODE, SEARCH_TUNE_PRESET),
            ]
        );
    }

    #[test]
    fn test_set_frequency_off_grid_is_refused() {
        let attrs = RadioAttributes::default();
        assert!(factory()
            .build(&RequestKind::SetFrequency(Freq::new(99_999)), &attrs, None)
            .is_none());
    }

    #[test]
    fn test_scan_down_uses_threshold() {
        let attrs = RadioAttributes {
            threshold: 300,
            ..Default::default()
        };
        let built = build(RequestKind::ScanDown, &attrs);
        assert_eq!(built.action.commands()[0], Command::write(REG_SEARCH_CTRL, 80));
    }

    #[test]
    fn test_threshold_and_switches_have_no_commands() {
        let attrs = RadioAttributes::default();
        for kind in [
            RequestKind::SetThreshold(200),
            RequestKind::SetAutoAfSwitch(true),
            RequestKind::SetAutoTaSwitch(false),
        ] {
            assert!(build(kind, &attrs).action.commands().is_empty());
        }
    }

    #[test]
    fn test_stop_scan_needs_a_scan() {
        let attrs = RadioAttributes::default();
        assert!(factory()
            .build(&RequestKind::StopScan, &attrs, None)
            .is_none());
        let built = factory()
            .build(&RequestKind::StopScan, &attrs, Some(ScanMode::Full))
            .expect("action");
        assert_eq!(
            built.action.hook(),
            &CompletionHook::ScanStopped {
                mode: ScanMode::Full
            }
        );
    }

    #[test]
    fn test_scan_step_moves_one_channel_up() {
        let attrs = RadioAttributes {
            frequency: Some(Freq::new(95_000)),
            ..Default::default()
        };
        let built = build(RequestKind::ScanStep, &attrs);
        assert_eq!(built.action.commands()[0], Command::write_freq(Freq::new(95_100)));
    }

    #[test]
    fn test_scan_step_past_top_channel_is_refused() {
        let attrs = RadioAttributes {
            frequency: Some(Freq::new(108_000)),
            ..Default::default()
        };
        assert!(factory()
            .build(&RequestKind::ScanStep, &attrs, Some(ScanMode::Full))
            .is_none());
    }

    #[test]
    fn test_full_scan_done_reports_stations_in_order() {
        let attrs = RadioAttributes {
            frequency: Some(Freq::new(91_000)),
            stations: vec![
                Station {
                    freq: Freq::new(88_000),
                    signal: 10,
                },
                Station {
                    freq: Freq::new(91_000),
                    signal: 30,
                },
            ],
            ..Default::default()
        };
        let built = build(
            RequestKind::ScanDone {
                mode: ScanMode::Full,
                aborted: true,
            },
            &attrs,
        );
        assert_eq!(
            built.notices,
            vec![Notification::FullScanResult {
                frequencies: vec![Freq::new(88_000), Freq::new(91_000)],
                signals: vec![10, 30],
                aborted: true,
            }]
        );
        assert_eq!(built.action.commands().len(), 2);
    }

    #[test]
    fn test_scan_done_without_frequency_has_no_commands() {
        let built = build(
            RequestKind::ScanDone {
                mode: ScanMode::Down,
                aborted: false,
            },
            &RadioAttributes::default(),
        );
        assert!(built.action.commands().is_empty());
        assert_eq!(
            built.notices,
            vec![Notification::ScanResult {
                frequency: None,
                signal: None,
                direction: ScanDirection::Down,
                aborted: false,
            }]
        );
    }
}
