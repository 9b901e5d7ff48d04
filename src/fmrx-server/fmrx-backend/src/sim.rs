// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated tuner chip for development and testing.
//!
//! Models the register file, a fixed list of receivable stations and the
//! search/tune engine. Every accepted request is answered with the same
//! callback shape the real driver produces. No hardware required.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use fmrx_core::radio::freq::{Band, Freq};
use fmrx_core::tuner::registers::{
    ACCESS_READ, ACCESS_WRITE, FLAG_SEARCH_TUNE_FAIL, FLAG_SEARCH_TUNE_FINISHED,
    FLAG_STEREO_ACTIVE, FM_CTRL_BAND_JAPAN, OPCODE_REGISTER_ACCESS,
    OPCODE_REGISTER_ACCESS_COMPLETE, REG_FLAG, REG_FM_CTRL, REG_FREQ, REG_RSSI,
    REG_SEARCH_CTRL, REG_SEARCH_TUNE_MODE, SEARCH_CTRL_LEVEL_MASK, SEARCH_CTRL_UP,
    SEARCH_TUNE_AUTO_SEARCH, SEARCH_TUNE_PRESET, SEARCH_TUNE_TERMINATE,
};
use fmrx_core::tuner::{TunerCallback, TunerTransport};

/// RSSI reported where no station transmits.
const NOISE_FLOOR: u8 = 8;
const REGISTER_COUNT: usize = 0x20;

/// A transmitter the simulated chip can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStation {
    pub khz: u32,
    pub rssi: u8,
    #[serde(default)]
    pub stereo: bool,
}

/// Settings of the simulated chip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub stations: Vec<SimStation>,
    /// Delay before each response is delivered, in milliseconds.
    pub latency_ms: u64,
    /// Status reads answered with "still searching" after a search starts.
    pub search_polls: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            stations: vec![
                SimStation {
                    khz: 88_100,
                    rssi: 45,
                    stereo: true,
                },
                SimStation {
                    khz: 91_500,
                    rssi: 30,
                    stereo: false,
                },
                SimStation {
                    khz: 95_800,
                    rssi: 62,
                    stereo: true,
                },
                SimStation {
                    khz: 101_100,
                    rssi: 40,
                    stereo: true,
                },
                SimStation {
                    khz: 104_300,
                    rssi: 25,
                    stereo: false,
                },
            ],
            latency_ms: 0,
            search_polls: 1,
        }
    }
}

/// Register-level model of the tuner, without any I/O.
#[derive(Debug, Clone)]
pub struct SimChip {
    stations: Vec<SimStation>,
    search_polls: u32,
    powered: bool,
    registers: [u16; REGISTER_COUNT],
    tuned: Freq,
    /// FREQ was written since the last tune; a search then starts on it.
    freq_written: bool,
    flags: u16,
    busy_reads: u32,
}

impl SimChip {
    pub fn new(config: &SimConfig) -> Self {
        let mut stations = config.stations.clone();
        stations.sort_by_key(|s| s.khz);
        Self {
            stations,
            search_polls: config.search_polls,
            powered: false,
            registers: [0; REGISTER_COUNT],
            tuned: Band::europe_us().min,
            freq_written: false,
            flags: 0,
            busy_reads: 0,
        }
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    pub fn tuned(&self) -> Freq {
        self.tuned
    }

    pub fn power(&mut self, on: bool) -> TunerCallback {
        self.powered = on;
        if !on {
            self.registers = [0; REGISTER_COUNT];
            self.flags = 0;
            self.busy_reads = 0;
        }
        TunerCallback::power(on)
    }

    /// Handle one vendor command. `None` means the chip refuses it.
    pub fn command(&mut self, opcode: u8, payload: &[u8]) -> Option<TunerCallback> {
        if !self.powered || opcode != OPCODE_REGISTER_ACCESS {
            return None;
        }
        match payload {
            [register, ACCESS_WRITE, value @ ..] if !value.is_empty() && value.len() <= 2 => {
                let register = *register;
                let mut bytes = [0u8; 2];
                bytes[..value.len()].copy_from_slice(value);
                self.write(register, u16::from_le_bytes(bytes))?;
                Some(TunerCallback::vendor(
                    OPCODE_REGISTER_ACCESS_COMPLETE,
                    [0, register, ACCESS_WRITE],
                ))
            }
            [register, ACCESS_READ, len] if (1..=2).contains(len) => {
                let value = self.read(*register)?;
                let mut response = vec![0, *register, ACCESS_READ];
                response.extend_from_slice(&value.to_le_bytes()[..usize::from(*len)]);
                Some(TunerCallback::vendor(
                    OPCODE_REGISTER_ACCESS_COMPLETE,
                    response,
                ))
            }
            _ => None,
        }
    }

    fn write(&mut self, register: u8, value: u16) -> Option<()> {
        let slot = self.registers.get_mut(usize::from(register))?;
        *slot = value;
        match register {
            REG_FREQ => self.freq_written = true,
            REG_SEARCH_TUNE_MODE => self.search_tune(value as u8),
            _ => {}
        }
        Some(())
    }

    fn read(&mut self, register: u8) -> Option<u16> {
        match register {
            REG_FREQ => Some(self.tuned.to_register()),
            REG_RSSI => Some(u16::from(self.rssi_at(self.tuned))),
            REG_FLAG if self.busy_reads > 0 => {
                self.busy_reads -= 1;
                Some(0)
            }
            REG_FLAG => Some(self.flags),
            _ => self.registers.get(usize::from(register)).copied(),
        }
    }

    fn band(&self) -> Band {
        if self.registers[usize::from(REG_FM_CTRL)] as u8 & FM_CTRL_BAND_JAPAN != 0 {
            Band::japan()
        } else {
            Band::europe_us()
        }
    }

    fn station_at(&self, freq: Freq) -> Option<&SimStation> {
        self.stations.iter().find(|s| s.khz == freq.khz)
    }

    fn rssi_at(&self, freq: Freq) -> u8 {
        self.station_at(freq).map_or(NOISE_FLOOR, |s| s.rssi)
    }

    fn stereo_flag(&self, freq: Freq) -> u16 {
        match self.station_at(freq) {
            Some(station) if station.stereo => FLAG_STEREO_ACTIVE,
            _ => 0,
        }
    }

    fn search_tune(&mut self, mode: u8) {
        match mode {
            SEARCH_TUNE_PRESET => {
                self.tuned = Freq::from_register(self.registers[usize::from(REG_FREQ)]);
                self.freq_written = false;
                self.flags = FLAG_SEARCH_TUNE_FINISHED | self.stereo_flag(self.tuned);
                self.busy_reads = 0;
            }
            SEARCH_TUNE_AUTO_SEARCH => {
                let ctrl = self.registers[usize::from(REG_SEARCH_CTRL)] as u8;
                let up = ctrl & SEARCH_CTRL_UP != 0;
                let level = ctrl & SEARCH_CTRL_LEVEL_MASK;
                let band = self.band();
                let (start, inclusive) = if self.freq_written {
                    (Freq::from_register(self.registers[usize::from(REG_FREQ)]), true)
                } else {
                    (self.tuned, false)
                };
                self.freq_written = false;

                let in_range = |s: &&SimStation| {
                    let ahead = if up {
                        s.khz > start.khz || (inclusive && s.khz == start.khz)
                    } else {
                        s.khz < start.khz || (inclusive && s.khz == start.khz)
                    };
                    ahead && s.rssi >= level && s.khz >= band.min.khz && s.khz <= band.max.khz
                };
                let found = if up {
                    self.stations.iter().find(in_range)
                } else {
                    self.stations.iter().rev().find(in_range)
                }
                .copied();

                match found {
                    Some(station) => {
                        debug!("sim: search stopped on {}", Freq::new(station.khz));
                        self.tuned = Freq::new(station.khz);
                        self.flags = FLAG_SEARCH_TUNE_FINISHED | self.stereo_flag(self.tuned);
                    }
                    None => {
                        self.tuned = if up { band.max } else { band.min };
                        self.flags = FLAG_SEARCH_TUNE_FINISHED | FLAG_SEARCH_TUNE_FAIL;
                    }
                }
                self.busy_reads = self.search_polls;
            }
            SEARCH_TUNE_TERMINATE => {
                self.flags = FLAG_SEARCH_TUNE_FINISHED;
                self.busy_reads = 0;
            }
            other => warn!("sim: unknown search/tune mode {:#04x}", other),
        }
    }
}

/// Transport answering through the tuner task's callback channel.
pub struct SimTuner {
    chip: SimChip,
    latency: Duration,
    callbacks: mpsc::UnboundedSender<TunerCallback>,
}

impl SimTuner {
    pub fn new(config: SimConfig, callbacks: mpsc::UnboundedSender<TunerCallback>) -> Self {
        Self {
            chip: SimChip::new(&config),
            latency: Duration::from_millis(config.latency_ms),
            callbacks,
        }
    }

    fn respond(&self, callback: TunerCallback) -> bool {
        if self.latency.is_zero() {
            return self.callbacks.send(callback).is_ok();
        }
        let callbacks = self.callbacks.clone();
        let latency = self.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let _ = callbacks.send(callback);
        });
        true
    }
}

impl TunerTransport for SimTuner {
    fn enable(&mut self) -> bool {
        let callback = self.chip.power(true);
        self.respond(callback)
    }

    fn disable(&mut self) -> bool {
        let callback = self.chip.power(false);
        self.respond(callback)
    }

    fn execute_command(&mut self, opcode: u8, payload: &[u8]) -> bool {
        match self.chip.command(opcode, payload) {
            Some(callback) => self.respond(callback),
            None if !self.chip.powered() => {
                warn!("sim: command {:02x} while powered down", opcode);
                false
            }
            None => {
                warn!("sim: refused {:02x} {:02x?}", opcode, payload);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmrx_core::tuner::registers::{search_ctrl, REG_AUDIO_CTRL};

    fn powered_chip() -> SimChip {
        let mut chip = SimChip::new(&SimConfig {
            search_polls: 0,
            ..SimConfig::default()
        });
        chip.power(true);
        chip
    }

    fn write(chip: &mut SimChip, register: u8, value: &[u8]) -> TunerCallback {
        let mut payload = vec![register, ACCESS_WRITE];
        payload.extend_from_slice(value);
        chip.command(OPCODE_REGISTER_ACCESS, &payload).unwrap()
    }

    fn read(chip: &mut SimChip, register: u8, len: u8) -> Vec<u8> {
        match chip
            .command(OPCODE_REGISTER_ACCESS, &[register, ACCESS_READ, len])
            .unwrap()
        {
            TunerCallback::Vendor { payload, .. } => payload[3..].to_vec(),
            other => panic!("unexpected {:?}", other),
        }
    }

    fn flags(chip: &mut SimChip) -> u16 {
        let data = read(chip, REG_FLAG, 2);
        u16::from_le_bytes([data[0], data[1]])
    }

    #[test]
    fn test_refuses_when_powered_down() {
        let mut chip = SimChip::new(&SimConfig::default());
        assert!(chip
            .command(OPCODE_REGISTER_ACCESS, &[REG_AUDIO_CTRL, ACCESS_WRITE, 0x61])
            .is_none());
    }

    #[test]
    fn test_write_ack_echoes_register() {
        let mut chip = powered_chip();
        assert_eq!(
            write(&mut chip, REG_AUDIO_CTRL, &[0x61]),
            TunerCallback::vendor(OPCODE_REGISTER_ACCESS_COMPLETE, [0, REG_AUDIO_CTRL, 0])
        );
        assert_eq!(read(&mut chip, REG_AUDIO_CTRL, 1), vec![0x61]);
    }

    #[test]
    fn test_preset_tunes_written_frequency() {
        let mut chip = powered_chip();
        write(&mut chip, REG_FREQ, &Freq::new(95_800).to_register().to_le_bytes());
        write(&mut chip, REG_SEARCH_TUNE_MODE, &[SEARCH_TUNE_PRESET]);

        assert_eq!(chip.tuned(), Freq::new(95_800));
        assert_eq!(read(&mut chip, REG_RSSI, 1), vec![62]);
        assert_eq!(flags(&mut chip), FLAG_SEARCH_TUNE_FINISHED | FLAG_STEREO_ACTIVE);
    }

    #[test]
    fn test_search_up_skips_weak_stations() {
        let mut chip = powered_chip();
        write(&mut chip, REG_FREQ, &Freq::new(91_000).to_register().to_le_bytes());
        write(&mut chip, REG_SEARCH_TUNE_MODE, &[SEARCH_TUNE_PRESET]);

        // Threshold 700 stops at RSSI 40 and above.
        write(&mut chip, REG_SEARCH_CTRL, &[search_ctrl(true, 700)]);
        write(&mut chip, REG_SEARCH_TUNE_MODE, &[SEARCH_TUNE_AUTO_SEARCH]);

        assert_eq!(chip.tuned(), Freq::new(95_800));
        assert_eq!(flags(&mut chip) & FLAG_SEARCH_TUNE_FAIL, 0);
    }

    #[test]
    fn test_search_down_hits_band_edge() {
        let mut chip = powered_chip();
        write(&mut chip, REG_FREQ, &Freq::new(88_100).to_register().to_le_bytes());
        write(&mut chip, REG_SEARCH_TUNE_MODE, &[SEARCH_TUNE_PRESET]);

        write(&mut chip, REG_SEARCH_CTRL, &[search_ctrl(false, 500)]);
        write(&mut chip, REG_SEARCH_TUNE_MODE, &[SEARCH_TUNE_AUTO_SEARCH]);

        assert_eq!(chip.tuned(), Band::europe_us().min);
        assert_eq!(
            flags(&mut chip),
            FLAG_SEARCH_TUNE_FINISHED | FLAG_SEARCH_TUNE_FAIL
        );
    }

    #[test]
    fn test_search_from_written_frequency_is_inclusive() {
        let mut chip = powered_chip();
        write(&mut chip, REG_FREQ, &Freq::new(88_100).to_register().to_le_bytes());
        write(&mut chip, REG_SEARCH_CTRL, &[search_ctrl(true, 1000)]);
        write(&mut chip, REG_SEARCH_TUNE_MODE, &[SEARCH_TUNE_AUTO_SEARCH]);

        assert_eq!(chip.tuned(), Freq::new(88_100));
    }

    #[test]
    fn test_search_reports_busy_first() {
        let mut chip = SimChip::new(&SimConfig {
            search_polls: 2,
            ..SimConfig::default()
        });
        chip.power(true);
        write(&mut chip, REG_SEARCH_CTRL, &[search_ctrl(true, 1000)]);
        write(&mut chip, REG_SEARCH_TUNE_MODE, &[SEARCH_TUNE_AUTO_SEARCH]);

        assert_eq!(flags(&mut chip), 0);
        assert_eq!(flags(&mut chip), 0);
        assert_ne!(flags(&mut chip) & FLAG_SEARCH_TUNE_FINISHED, 0);
    }

    #[test]
    fn test_malformed_payload_is_refused() {
        let mut chip = powered_chip();
        assert!(chip
            .command(OPCODE_REGISTER_ACCESS, &[REG_FREQ, ACCESS_READ, 3])
            .is_none());
        assert!(chip.command(0x16, &[REG_FREQ, ACCESS_READ, 2]).is_none());
    }

    #[tokio::test]
    async fn test_delayed_responses() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tuner = SimTuner::new(
            SimConfig {
                latency_ms: 5,
                ..SimConfig::default()
            },
            tx,
        );

        assert!(tuner.enable());
        assert!(rx.try_recv().is_err());
        assert_eq!(rx.recv().await, Some(TunerCallback::power(true)));
    }

    #[test]
    fn test_commands_follow_power() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tuner = SimTuner::new(SimConfig::default(), tx);
        let payload = [REG_AUDIO_CTRL, ACCESS_WRITE, 0x61];

        assert!(!tuner.chip.powered());
        assert!(!tuner.execute_command(OPCODE_REGISTER_ACCESS, &payload));

        assert!(tuner.enable());
        assert!(tuner.chip.powered());
        assert!(tuner.execute_command(OPCODE_REGISTER_ACCESS, &payload));

        assert!(tuner.disable());
        assert!(!tuner.chip.powered());
        assert!(!tuner.execute_command(OPCODE_REGISTER_ACCESS, &payload));

        assert_eq!(rx.try_recv().ok(), Some(TunerCallback::power(true)));
        assert!(rx.try_recv().is_ok());
        assert_eq!(rx.try_recv().ok(), Some(TunerCallback::power(false)));
        assert!(rx.try_recv().is_err());
    }
}
