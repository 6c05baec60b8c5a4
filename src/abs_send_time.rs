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

//! Converts the 24-bit 6.18 fixed-point absolute-send-time header
//! extension to a millisecond timestamp, tracking wrap cycles of the
//! 24-bit field.

/// The 24-bit field covers `2^6 = 64` seconds before wrapping.
const SECONDS_PER_CYCLE: f64 = 64.0;
/// `2^18`: the fixed-point scale of the field (6 integer bits, 18 fractional).
const FIXED_POINT_SCALE: f64 = 262_144.0;

#[derive(Debug)]
pub struct AbsSendTimeTracker {
    /// `-1` means uninitialized; otherwise the number of 24-bit wraps observed.
    cycles: i32,
    max_abs_send_time: u32,
}

impl Default for AbsSendTimeTracker {
    fn default() -> Self {
        Self {
            cycles: -1,
            max_abs_send_time: 0,
        }
    }
}

impl AbsSendTimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one 24-bit absolute-send-time sample (only the low 24 bits are
    /// meaningful) and return the unwrapped millisecond timestamp.
    pub fn convert(&mut self, abs_send_time: u32) -> u32 {
        if self.cycles < 0 {
            self.max_abs_send_time = abs_send_time;
            self.cycles = 0;
        } else {
            // Shifted into the high byte so the sign bit of the wrapping
            // subtraction lands exactly where the 24-bit field would wrap.
            let delta = (abs_send_time << 8).wrapping_sub(self.max_abs_send_time << 8) as i32;

            if delta >= 0 {
                if abs_send_time < self.max_abs_send_time {
                    self.cycles += 1;
                }
                self.max_abs_send_time = abs_send_time;
            }
            // delta < 0: out-of-order send time, state left unchanged.
        }

        let seconds = abs_send_time as f64 / FIXED_POINT_SCALE + SECONDS_PER_CYCLE * self.cycles as f64;
        (seconds * 1000.0).round() as u32
    }
}
