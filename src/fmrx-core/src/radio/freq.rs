// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Offset between the broadcast frequency and the tuner's frequency register (kHz).
const HW_FREQ_OFFSET_KHZ: u32 = 64_000;

/// Frequency wrapper (kHz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Freq {
    pub khz: u32,
}

impl Freq {
    #[must_use]
    pub fn new(khz: u32) -> Self {
        Self { khz }
    }

    /// Value programmed into the frequency register.
    ///
    /// Frequencies below the register offset clamp to zero.
    #[must_use]
    pub fn to_register(self) -> u16 {
        self.khz.saturating_sub(HW_FREQ_OFFSET_KHZ).min(u32::from(u16::MAX)) as u16
    }

    #[must_use]
    pub fn from_register(raw: u16) -> Self {
        Self {
            khz: u32::from(raw) + HW_FREQ_OFFSET_KHZ,
        }
    }
}

impl fmt::Display for Freq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03} MHz", self.khz / 1000, self.khz % 1000)
    }
}

/// Regional band plan, selects the band bit of the tuner control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandRegion {
    EuropeUs,
    Japan,
}

/// Receivable FM band: inclusive limits and channel spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub min: Freq,
    pub max: Freq,
    pub spacing_khz: u32,
    pub region: BandRegion,
}

impl Band {
    /// 87.5 - 108 MHz in 100 kHz steps.
    pub fn europe_us() -> Self {
        Self {
            min: Freq::new(87_500),
            max: Freq::new(108_000),
            spacing_khz: 100,
            region: BandRegion::EuropeUs,
        }
    }

    /// 87.9 - 107.9 MHz in 200 kHz steps.
    pub fn us() -> Self {
        Self {
            min: Freq::new(87_900),
            max: Freq::new(107_900),
            spacing_khz: 200,
            region: BandRegion::EuropeUs,
        }
    }

    /// 76 - 90 MHz in 100 kHz steps.
    pub fn japan() -> Self {
        Self {
            min: Freq::new(76_000),
            max: Freq::new(90_000),
            spacing_khz: 100,
            region: BandRegion::Japan,
        }
    }

    /// Whether `freq` lies inside the band and on its channel grid.
    pub fn is_valid(&self, freq: Freq) -> bool {
        freq >= self.min
            && freq <= self.max
            && self.spacing_khz > 0
            && (freq.khz - self.min.khz) % self.spacing_khz == 0
    }

    /// Round a raw frequency to the nearest channel of this band.
    ///
    /// Returns `None` when the rounded channel falls outside the band.
    pub fn snap(&self, raw: Freq) -> Option<Freq> {
        if self.spacing_khz == 0 || raw.khz + self.spacing_khz / 2 < self.min.khz {
            return None;
        }
        let steps = (raw.khz + self.spacing_khz / 2 - self.min.khz) / self.spacing_khz;
        let snapped = Freq::new(self.min.khz + steps * self.spacing_khz);
        self.is_valid(snapped).then_some(snapped)
    }

    /// The next channel above `freq`, if it is still inside the band.
    pub fn next_channel(&self, freq: Freq) -> Option<Freq> {
        let next = Freq::new(freq.khz + self.spacing_khz);
        (next <= self.max).then_some(next)
    }

    /// Number of channels in the band.
    pub fn channel_count(&self) -> u32 {
        if self.spacing_khz == 0 {
            return 0;
        }
        (self.max.khz - self.min.khz) / self.spacing_khz + 1
    }
}

impl Default for Band {
    fn default() -> Self {
        Self::europe_us()
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "europe-us" | "europe" | "eu" => Ok(Self::europe_us()),
            "us" => Ok(Self::us()),
            "japan" | "jp" => Ok(Self::japan()),
            other => Err(format!("unknown band preset '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_conversion() {
        assert_eq!(Freq::new(100_000).to_register(), 36_000);
        assert_eq!(Freq::from_register(36_000), Freq::new(100_000));
        assert_eq!(Freq::new(1_000).to_register(), 0);
    }

    #[test]
    fn test_snap_to_grid() {
        let band = Band::europe_us();
        assert_eq!(band.snap(Freq::new(100_049)), Some(Freq::new(100_000)));
        assert_eq!(band.snap(Freq::new(100_050)), Some(Freq::new(100_100)));
        assert_eq!(band.snap(Freq::new(87_460)), Some(Freq::new(87_500)));
    }

    #[test]
    fn test_snap_outside_band() {
        let band = Band::europe_us();
        assert_eq!(band.snap(Freq::new(108_100)), None);
        assert_eq!(band.snap(Freq::new(70_000)), None);

        let us = Band::us();
        assert_eq!(us.snap(Freq::new(88_000)), Some(Freq::new(88_100)));
    }

    #[test]
    fn test_validity_and_steps() {
        let band = Band::japan();
        assert!(band.is_valid(Freq::new(76_000)));
        assert!(band.is_valid(Freq::new(90_000)));
        assert!(!band.is_valid(Freq::new(76_050)));
        assert_eq!(band.next_channel(Freq::new(89_900)), Some(Freq::new(90_000)));
        assert_eq!(band.next_channel(Freq::new(90_000)), None);
        assert_eq!(band.channel_count(), 141);
    }

    #[test]
    fn test_parse_presets() {
        assert_eq!("Europe_US".parse::<Band>(), Ok(Band::europe_us()));
        assert_eq!("japan".parse::<Band>(), Ok(Band::japan()));
        assert!("mars".parse::<Band>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Freq::new(101_100).to_string(), "101.100 MHz");
    }
}
