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

//! The bandwidth-estimate predictor: consulted per packet, its latest
//! estimate is echoed back to the sender at a throttled cadence. The
//! predictor's own implementation (e.g. an ONNX model) is entirely
//! external; this crate depends only on the trait.

/// Per-packet observation fed to the predictor.
#[derive(Debug, Clone, Copy)]
pub struct PredictorObservation {
    pub payload_type: u8,
    pub seq: i64,
    pub send_time_ms: i64,
    pub ssrc: u32,
    pub padding_len: u32,
    pub header_len: u32,
    pub arrival_ms: i64,
    pub payload_size: u32,
    /// `-1` when unknown, matching the external contract's sentinel.
    pub loss_count: i64,
    /// `-1` when unknown, matching the external contract's sentinel.
    pub rtt_ms: i64,
}

/// Pluggable bandwidth predictor. No inheritance: a single small trait,
/// substituted by fakes in tests.
pub trait Predictor: Send {
    fn on_received(&mut self, observation: PredictorObservation);
    fn get_bwe_estimate(&self) -> f32;
}

/// Wire payload for the BWE sendback application packet. Endianness across
/// sender and receiver isn't otherwise constrained; this crate fixes it to
/// little-endian and documents it here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BweMessage {
    pub pacing_rate: f32,
    pub padding_rate: f32,
    pub target_rate: f32,
    pub timestamp_ms: i64,
}

impl BweMessage {
    pub const WIRE_SIZE: usize = 4 + 4 + 4 + 8;

    pub fn for_estimate(estimate: f32, timestamp_ms: i64) -> Self {
        Self {
            pacing_rate: estimate,
            padding_rate: estimate,
            target_rate: estimate,
            timestamp_ms,
        }
    }

    /// Encode as little-endian bytes: `pacing_rate, padding_rate,
    /// target_rate, timestamp_ms`, in that field order.
    pub fn to_le_bytes(self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0..4].copy_from_slice(&self.pacing_rate.to_le_bytes());
        out[4..8].copy_from_slice(&self.padding_rate.to_le_bytes());
        out[8..12].copy_from_slice(&self.target_rate.to_le_bytes());
        out[12..20].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        out
    }
}
