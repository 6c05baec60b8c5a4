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

//! Receiver-side transport-wide congestion control feedback engine.
//!
//! Observes arriving media packets carrying a transport sequence number
//! extension, keeps a bounded sliding record of arrival times, and emits
//! transport feedback reports back to the sender on a bitrate-adaptive
//! schedule or on explicit request. Alongside feedback it throttles two
//! side streams: a bandwidth-estimate echo produced by a pluggable
//! [`predictor::Predictor`], and a per-packet row pushed to a
//! [`telemetry::TelemetryStore`].

pub mod abs_send_time;
pub mod arrival_map;
pub mod clock;
pub mod config;
pub mod error;
pub mod feedback;
pub mod predictor;
pub mod proxy;
pub mod sequence;
pub mod telemetry;
pub mod wire;

pub use config::ProxyConfig;
pub use error::{ProxyError, ProxyResult};
pub use proxy::Proxy;
