// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for fmrx-server.
//!
//! Config is loaded from the `[fmrx-server]` section of `fmrx.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./fmrx.toml`
//! 3. `~/.config/fmrx/fmrx.toml`
//! 4. `/etc/fmrx/fmrx.toml`

use std::time::Duration;

use serde::{Deserialize, Serialize};

use fmrx_app::ConfigFile;
use fmrx_backend::{SimConfig, SimStation};
use fmrx_core::controller::policies::{TimingPolicy, DEFAULT_MAX_STATIONS};
use fmrx_core::Band;

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Tuner backend selection
    pub tuner: TunerConfig,
    /// Timeouts and scan pacing
    pub timing: TimingConfig,
    /// Simulated chip, used when `tuner.backend = "sim"`
    pub sim: SimConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Tuner backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Registered transport name (e.g. "sim")
    pub backend: String,
    /// Band preset started on boot ("europe-us", "us", "japan")
    pub band: String,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            backend: "sim".to_string(),
            band: "europe-us".to_string(),
        }
    }
}

/// Timing budgets, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub start_timeout_ms: u64,
    pub reset_timeout_ms: u64,
    pub property_timeout_ms: u64,
    /// Settle delay inside the start sequence
    pub settle_delay_ms: u64,
    /// Interval between search status polls while scanning
    pub scan_poll_interval_ms: u64,
    /// Stations collected before a full scan stops
    pub max_stations: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let policy = TimingPolicy::default_tuner();
        Self {
            start_timeout_ms: millis(policy.start_timeout),
            reset_timeout_ms: millis(policy.reset_timeout),
            property_timeout_ms: millis(policy.property_timeout),
            settle_delay_ms: millis(policy.settle_delay),
            scan_poll_interval_ms: millis(policy.scan_poll_interval),
            max_stations: policy.max_stations,
        }
    }
}

impl TimingConfig {
    pub fn to_policy(&self) -> TimingPolicy {
        TimingPolicy {
            start_timeout: Duration::from_millis(self.start_timeout_ms),
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            property_timeout: Duration::from_millis(self.property_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            scan_poll_interval: Duration::from_millis(self.scan_poll_interval_ms),
            max_stations: self.max_stations,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl ServerConfig {
    /// Validate the loaded configuration.
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.tuner.backend.trim().is_empty() {
            return Err("[tuner].backend must not be empty".to_string());
        }
        let band = self.band()?;

        let timing = &self.timing;
        if timing.start_timeout_ms == 0 {
            return Err("[timing].start_timeout_ms must be > 0".to_string());
        }
        if timing.reset_timeout_ms == 0 {
            return Err("[timing].reset_timeout_ms must be > 0".to_string());
        }
        if timing.property_timeout_ms == 0 {
            return Err("[timing].property_timeout_ms must be > 0".to_string());
        }
        if timing.settle_delay_ms >= timing.start_timeout_ms {
            return Err(
                "[timing].settle_delay_ms must be shorter than [timing].start_timeout_ms"
                    .to_string(),
            );
        }
        if timing.scan_poll_interval_ms == 0 {
            return Err("[timing].scan_poll_interval_ms must be > 0".to_string());
        }
        if timing.max_stations == 0 {
            return Err("[timing].max_stations must be > 0".to_string());
        }
        let channels = band.channel_count();
        if timing.max_stations > channels as usize {
            return Err(format!(
                "[timing].max_stations {} exceeds the {} channels of band {}",
                timing.max_stations, channels, self.tuner.band
            ));
        }

        for (idx, station) in self.sim.stations.iter().enumerate() {
            if station.khz == 0 {
                return Err(format!("[[sim.stations]] entry {} has khz = 0", idx));
            }
        }
        Ok(())
    }

    /// Resolve the configured band preset.
    pub fn band(&self) -> Result<Band, String> {
        self.tuner
            .band
            .parse::<Band>()
            .map_err(|e| format!("[tuner].band: {}", e))
    }

    /// Generate an example configuration in `fmrx.toml` layout.
    pub fn example_combined_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "fmrx-server")]
            inner: ServerConfig,
        }
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            tuner: TunerConfig::default(),
            timing: TimingConfig {
                max_stations: DEFAULT_MAX_STATIONS,
                ..TimingConfig::default()
            },
            sim: SimConfig {
                stations: vec![
                    SimStation {
                        khz: 94_000,
                        rssi: 50,
                        stereo: true,
                    },
                    SimStation {
                        khz: 102_400,
                        rssi: 35,
                        stereo: false,
                    },
                ],
                latency_ms: 20,
                search_polls: 2,
            },
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "fmrx-server"
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.tuner.backend, "sim");
        assert_eq!(config.band().unwrap(), Band::europe_us());
        assert_eq!(config.timing.to_policy(), TimingPolicy::default_tuner());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[tuner]
backend = "sim"
band = "japan"

[timing]
property_timeout_ms = 750
max_stations = 8

[sim]
latency_ms = 5

[[sim.stations]]
khz = 80000
rssi = 33
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.band().unwrap(), Band::japan());

        let policy = config.timing.to_policy();
        assert_eq!(policy.property_timeout, Duration::from_millis(750));
        assert_eq!(policy.start_timeout, Duration::from_millis(5000));
        assert_eq!(policy.max_stations, 8);

        assert_eq!(config.sim.latency_ms, 5);
        assert_eq!(config.sim.stations.len(), 1);
        assert!(!config.sim.stations[0].stereo);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_combined_file_section() {
        let toml_str = "[fmrx-server.tuner]\nband = \"us\"\n";
        let config = ServerConfig::load_from_str(toml_str).unwrap();
        assert_eq!(config.band().unwrap(), Band::us());
        assert_eq!(config.tuner.backend, "sim");
    }

    #[test]
    fn test_example_round_trips() {
        let example = ServerConfig::example_combined_toml();
        assert!(example.contains("fmrx-server"));
        let config = ServerConfig::load_from_str(&example).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.sim.stations.len(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.general.log_level = Some("loud".to_string());
        assert!(config.validate().unwrap_err().contains("log_level"));

        let mut config = ServerConfig::default();
        config.tuner.band = "mars".to_string();
        assert!(config.validate().unwrap_err().contains("[tuner].band"));

        let mut config = ServerConfig::default();
        config.timing.scan_poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.timing.settle_delay_ms = config.timing.start_timeout_ms;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.timing.max_stations = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.tuner.backend = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_caps_stations_at_band_channels() {
        let mut config = ServerConfig::default();
        config.tuner.band = "japan".to_string();
        config.timing.max_stations = 141;
        assert!(config.validate().is_ok());

        config.timing.max_stations = 142;
        let err = config.validate().unwrap_err();
        assert!(err.contains("exceeds the 141 channels"));
    }
}
