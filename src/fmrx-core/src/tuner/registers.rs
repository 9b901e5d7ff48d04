// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Tuner register map and bit fields used by the control sequences.

use crate::radio::freq::{Band, BandRegion};

/// Vendor opcode for register access.
pub const OPCODE_REGISTER_ACCESS: u8 = 0x15;
/// Opcode reported in the completion event of a register access.
pub const OPCODE_REGISTER_ACCESS_COMPLETE: u16 = 0xfc00 | OPCODE_REGISTER_ACCESS as u16;

pub const ACCESS_WRITE: u8 = 0x00;
pub const ACCESS_READ: u8 = 0x01;

/// FM enable, RDS enable.
pub const REG_RDS_SYSTEM: u8 = 0x00;
/// Band select, mono/stereo blend, mono/stereo select.
pub const REG_FM_CTRL: u8 = 0x01;
/// Mute, volume, de-emphasis, routing.
pub const REG_AUDIO_CTRL: u8 = 0x05;
/// Search stop level and direction.
pub const REG_SEARCH_CTRL: u8 = 0x07;
/// Search/tune mode and stop.
pub const REG_SEARCH_TUNE_MODE: u8 = 0x09;
/// Tuned frequency, 16 bit little endian.
pub const REG_FREQ: u8 = 0x0a;
/// Received signal strength.
pub const REG_RSSI: u8 = 0x0f;
/// FM and RDS flags, 16 bit little endian.
pub const REG_FLAG: u8 = 0x12;

pub const RDS_SYSTEM_OFF: u8 = 0x00;
pub const RDS_SYSTEM_FM: u8 = 0x01;
pub const RDS_SYSTEM_RDS: u8 = 0x02;

pub const FM_CTRL_BAND_EUROPE_US: u8 = 0x00;
pub const FM_CTRL_BAND_JAPAN: u8 = 0x01;
pub const FM_CTRL_MANUAL: u8 = 0x00;
pub const FM_CTRL_AUTO: u8 = 0x02;
pub const FM_CTRL_MONO: u8 = 0x00;
pub const FM_CTRL_STEREO: u8 = 0x04;

pub const AUDIO_CTRL_RF_MUTE_ENABLE: u8 = 0x01;
pub const AUDIO_CTRL_MANUAL_MUTE_ON: u8 = 0x02;
pub const AUDIO_CTRL_ROUTE_I2S_ENABLE: u8 = 0x20;
pub const AUDIO_CTRL_DEMPH_75US: u8 = 0x40;

pub const SEARCH_CTRL_UP: u8 = 0x80;
pub const SEARCH_CTRL_DOWN: u8 = 0x00;
pub const SEARCH_CTRL_LEVEL_MASK: u8 = 0x7f;

pub const SEARCH_TUNE_TERMINATE: u8 = 0x00;
pub const SEARCH_TUNE_PRESET: u8 = 0x01;
pub const SEARCH_TUNE_AUTO_SEARCH: u8 = 0x02;

pub const FLAG_SEARCH_TUNE_FINISHED: u16 = 0x0001;
pub const FLAG_SEARCH_TUNE_FAIL: u16 = 0x0002;
pub const FLAG_STEREO_ACTIVE: u16 = 0x0040;

pub fn band_bits(band: &Band) -> u8 {
    match band.region {
        BandRegion::EuropeUs => FM_CTRL_BAND_EUROPE_US,
        BandRegion::Japan => FM_CTRL_BAND_JAPAN,
    }
}

/// FM_CTRL value for the band with either forced mono or automatic stereo.
pub fn fm_ctrl(band: &Band, force_mono: bool) -> u8 {
    let mode = if force_mono {
        FM_CTRL_MANUAL | FM_CTRL_MONO
    } else {
        FM_CTRL_AUTO | FM_CTRL_STEREO
    };
    band_bits(band) | mode
}

/// AUDIO_CTRL value used while the receiver is running.
pub fn audio_ctrl(muted: bool) -> u8 {
    let base = AUDIO_CTRL_RF_MUTE_ENABLE | AUDIO_CTRL_ROUTE_I2S_ENABLE | AUDIO_CTRL_DEMPH_75US;
    if muted {
        base | AUDIO_CTRL_MANUAL_MUTE_ON
    } else {
        base
    }
}

/// Search stop level (RSSI) derived from the user threshold.
pub fn threshold_to_rssi(threshold: u32) -> u8 {
    110u32.saturating_sub(threshold / 10) as u8
}

/// SEARCH_CTRL value for an automatic search.
pub fn search_ctrl(up: bool, threshold: u32) -> u8 {
    let direction = if up { SEARCH_CTRL_UP } else { SEARCH_CTRL_DOWN };
    direction | (threshold_to_rssi(threshold) & SEARCH_CTRL_LEVEL_MASK)
}
