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

//! Decides when periodic feedback is due and maintains the bitrate-adaptive
//! send interval. Holds no collaborator handles: it is pure
//! bookkeeping, driven by the Proxy under its single lock.

use crate::config::ProxyConfig;

#[derive(Debug)]
pub struct FeedbackScheduler {
    send_interval_ms: i64,
    periodic_enabled: bool,
    last_process_ms: Option<i64>,
    feedback_counter: u8,
}

impl FeedbackScheduler {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            send_interval_ms: config.default_interval_ms,
            periodic_enabled: true,
            last_process_ms: None,
            feedback_counter: 0,
        }
    }

    pub fn send_interval_ms(&self) -> i64 {
        self.send_interval_ms
    }

    pub fn set_periodic_enabled(&mut self, enabled: bool) {
        self.periodic_enabled = enabled;
    }

    pub fn periodic_enabled(&self) -> bool {
        self.periodic_enabled
    }

    /// Next feedback-sequence-number value, advancing the wrapping counter.
    pub fn next_feedback_counter(&mut self) -> u8 {
        let current = self.feedback_counter;
        self.feedback_counter = self.feedback_counter.wrapping_add(1);
        current
    }

    /// `time_until_next_process`: the disabled-periodic-feedback
    /// sentinel is [`crate::config::NO_PERIODIC_FEEDBACK_INTERVAL_MS`].
    pub fn time_until_next_process(&self, now_ms: i64) -> i64 {
        if !self.periodic_enabled {
            return crate::config::NO_PERIODIC_FEEDBACK_INTERVAL_MS;
        }
        match self.last_process_ms {
            None => 0,
            Some(last) => (last + self.send_interval_ms - now_ms).max(0),
        }
    }

    /// `process` bookkeeping: records the new `last_process` deadline.
    /// Periodic emission itself lives in [`super::emit_periodic_feedback`].
    pub fn mark_processed(&mut self, now_ms: i64) {
        self.last_process_ms = Some(now_ms);
    }

    /// `on_bitrate_changed`: recompute the adaptive send interval
    /// from the observed bitrate, clamped to the configured rate bounds.
    pub fn on_bitrate_changed(&mut self, bitrate_bps: f64, config: &ProxyConfig) {
        let min_rate = config.min_rate_bps();
        let max_rate = config.max_rate_bps();
        let target_rate = (bitrate_bps * config.bandwidth_fraction).clamp(min_rate, max_rate);

        let report_size_bits = crate::config::TWCC_REPORT_SIZE_BYTES as f64 * 8.0;
        self.send_interval_ms = (report_size_bits * 1000.0 / target_rate).round() as i64;
    }
}
