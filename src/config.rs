/*
 *  Copyright (C) 2026 the project contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path, path::PathBuf};

/// Size, in bytes, of one TWCC feedback packet on the wire. Used to derive
/// the send-rate bounds for the bitrate-adaptive interval.
pub const TWCC_REPORT_SIZE_BYTES: u32 = 68;

/// Sentinel interval returned by [`crate::proxy::Proxy::time_until_next_process`]
/// when periodic feedback is disabled.
pub const NO_PERIODIC_FEEDBACK_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Initial send interval before the first `on_bitrate_changed` call.
    #[serde(default = "ProxyConfig::default_interval_ms")]
    pub default_interval_ms: i64,
    #[serde(default = "ProxyConfig::default_min_interval_ms")]
    pub min_interval_ms: i64,
    #[serde(default = "ProxyConfig::default_max_interval_ms")]
    pub max_interval_ms: i64,
    /// Fraction of observed bitrate the feedback stream itself is allowed
    /// to occupy. Default `0.05` (5%).
    #[serde(default = "ProxyConfig::default_bandwidth_fraction")]
    pub bandwidth_fraction: f64,
    /// Minimum age, in ms, an arrival must reach before it is eligible for
    /// culling once its reporting window has closed.
    #[serde(default = "ProxyConfig::default_back_window_ms")]
    pub back_window_ms: i64,
    #[serde(default = "ProxyConfig::default_bwe_feedback_duration_ms")]
    pub bwe_feedback_duration_ms: i64,
    #[serde(default = "ProxyConfig::default_redis_update_duration_ms")]
    pub redis_update_duration_ms: i64,
    #[serde(default = "ProxyConfig::default_telemetry_retries")]
    pub telemetry_retries: u32,
    #[serde(default)]
    pub onnx_model_path: Option<PathBuf>,
    #[serde(default = "ProxyConfig::default_redis_ip")]
    pub redis_ip: String,
    #[serde(default = "ProxyConfig::default_redis_port")]
    pub redis_port: u16,
    #[serde(default)]
    pub redis_sid: String,
}

impl ProxyConfig {
    fn default_interval_ms() -> i64 {
        100
    }

    fn default_min_interval_ms() -> i64 {
        50
    }

    fn default_max_interval_ms() -> i64 {
        250
    }

    fn default_bandwidth_fraction() -> f64 {
        0.05
    }

    fn default_back_window_ms() -> i64 {
        500
    }

    fn default_bwe_feedback_duration_ms() -> i64 {
        200
    }

    fn default_redis_update_duration_ms() -> i64 {
        1000
    }

    fn default_telemetry_retries() -> u32 {
        3
    }

    fn default_redis_ip() -> String {
        "127.0.0.1".to_string()
    }

    fn default_redis_port() -> u16 {
        6379
    }

    /// Load configuration from a YAML file on disk.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Minimum feedback send rate, in bits/second, implied by `max_interval_ms`.
    pub fn min_rate_bps(&self) -> f64 {
        TWCC_REPORT_SIZE_BYTES as f64 * 8.0 * 1000.0 / self.max_interval_ms as f64
    }

    /// Maximum feedback send rate, in bits/second, implied by `min_interval_ms`.
    pub fn max_rate_bps(&self) -> f64 {
        TWCC_REPORT_SIZE_BYTES as f64 * 8.0 * 1000.0 / self.min_interval_ms as f64
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: Self::default_interval_ms(),
            min_interval_ms: Self::default_min_interval_ms(),
            max_interval_ms: Self::default_max_interval_ms(),
            bandwidth_fraction: Self::default_bandwidth_fraction(),
            back_window_ms: Self::default_back_window_ms(),
            bwe_feedback_duration_ms: Self::default_bwe_feedback_duration_ms(),
            redis_update_duration_ms: Self::default_redis_update_duration_ms(),
            telemetry_retries: Self::default_telemetry_retries(),
            onnx_model_path: None,
            redis_ip: Self::default_redis_ip(),
            redis_port: Self::default_redis_port(),
            redis_sid: String::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rate_bounds_match_scenario_seven() {
        let config = ProxyConfig::default();
        assert!((config.min_rate_bps() - 2176.0).abs() < 1e-6);
        assert!((config.max_rate_bps() - 10880.0).abs() < 1e-6);
    }
}
