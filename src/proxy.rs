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

//! The Proxy: the single entry point arriving media packets and
//! the periodic scheduler both call through. All mutable state lives
//! behind one [`std::sync::Mutex`], matching the coarse-lock contract in
//! the concurrency contract exactly — no lock striping, no sharding by SSRC.

use crate::abs_send_time::AbsSendTimeTracker;
use crate::arrival_map::{ArrivalMap, ArrivalOutcome, FeedbackRequest};
use crate::clock::Clock;
use crate::config::ProxyConfig;
use crate::feedback;
use crate::feedback::scheduler::FeedbackScheduler;
use crate::predictor::{BweMessage, Predictor, PredictorObservation};
use crate::sequence::SequenceUnwrapper;
use crate::telemetry::{SaveOutcome, TelemetryRow, TelemetryStore};
use crate::wire::{FeedbackSender, PacketHeader, TransportFeedbackPacket};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, instrument, warn};

/// Name/sub-type constants for the BWE sendback application packet.
/// Fixed per deployment; both sides must agree on them out of band.
pub const BWE_APPLICATION_SUB_TYPE: u8 = 1;
pub const BWE_APPLICATION_NAME: [u8; 4] = *b"BWEF";

struct ProxyState {
    arrival_map: ArrivalMap,
    sequence_unwrapper: SequenceUnwrapper,
    abs_send_time_tracker: AbsSendTimeTracker,
    scheduler: FeedbackScheduler,
    predictor: Option<Box<dyn Predictor>>,
    telemetry: Box<dyn TelemetryStore>,
    media_ssrc: u32,
    last_bwe_sendback_ms: Option<i64>,
    last_redis_save_ms: Option<i64>,
    logged_missing_sequence_extension: bool,
}

/// Receiver-side transport feedback engine. Owns the arrival map,
/// unwrappers, scheduler, predictor, and telemetry store; holds only
/// non-owning handles to the clock, feedback sender, and packet factory,
/// whose lifetimes must strictly exceed the Proxy's.
pub struct Proxy {
    state: Mutex<ProxyState>,
    clock: Arc<dyn Clock>,
    sender: Arc<dyn FeedbackSender>,
    packet_factory: Box<dyn Fn() -> Box<dyn TransportFeedbackPacket> + Send + Sync>,
    config: ProxyConfig,
}

impl Proxy {
    /// Build a Proxy. `predictor_init` is run once; a failure is
    /// logged and the Proxy continues with BWE sendback suppressed rather
    /// than failing construction outright.
    pub fn new(
        config: ProxyConfig,
        clock: Arc<dyn Clock>,
        sender: Arc<dyn FeedbackSender>,
        packet_factory: Box<dyn Fn() -> Box<dyn TransportFeedbackPacket> + Send + Sync>,
        telemetry: Box<dyn TelemetryStore>,
        predictor_init: impl FnOnce() -> Result<Box<dyn Predictor>, String>,
    ) -> Self {
        let predictor = match predictor_init() {
            Ok(predictor) => Some(predictor),
            Err(reason) => {
                error!(reason, "predictor initialization failed, BWE sendback suppressed");
                None
            }
        };

        let scheduler = FeedbackScheduler::new(&config);

        Self {
            state: Mutex::new(ProxyState {
                arrival_map: ArrivalMap::new(),
                sequence_unwrapper: SequenceUnwrapper::new(),
                abs_send_time_tracker: AbsSendTimeTracker::new(),
                scheduler,
                predictor,
                telemetry,
                media_ssrc: 0,
                last_bwe_sendback_ms: None,
                last_redis_save_ms: None,
                logged_missing_sequence_extension: false,
            }),
            clock,
            sender,
            packet_factory,
            config,
        }
    }

    /// `incoming_packet`: unwraps the sequence number, records the
    /// arrival, forwards the observation to the predictor, throttles the
    /// BWE sendback and telemetry flush, and honors an explicit per-packet
    /// feedback request if present. The predictor must see this packet's
    /// observation before the BWE throttle queries its estimate, so the
    /// sendback reflects the packet that triggered it rather than the
    /// previous one.
    #[instrument(skip(self, header), fields(ssrc = header.ssrc))]
    pub fn incoming_packet(
        &self,
        header: PacketHeader,
        arrival_ms: i64,
        payload_size: u32,
        feedback_req: Option<FeedbackRequest>,
    ) {
        let Some(seq_wire) = header.transport_sequence else {
            let mut state = self.state.lock().expect("mutex poisoned");
            if !state.logged_missing_sequence_extension {
                warn!("packet missing transport sequence number extension; dropping");
                state.logged_missing_sequence_extension = true;
            }
            return;
        };

        if !(0..=(i64::MAX / 1000)).contains(&arrival_ms) {
            warn!(arrival_ms, "arrival time out of range, dropping packet");
            return;
        }

        let mut state = self.state.lock().expect("mutex poisoned");
        state.media_ssrc = header.ssrc;

        let seq = state.sequence_unwrapper.unwrap(seq_wire);
        let send_time_ms = match header.abs_send_time {
            Some(raw) => state.abs_send_time_tracker.convert(raw) as i64,
            None => 0,
        };
        let periodic_enabled = state.scheduler.periodic_enabled();
        let outcome = state.arrival_map.record_arrival(
            seq,
            arrival_ms,
            self.config.back_window_ms,
            periodic_enabled,
        );
        match outcome {
            ArrivalOutcome::Inserted => debug!(seq, arrival_ms, "recorded arrival"),
            ArrivalOutcome::Duplicate => debug!(seq, "duplicate arrival ignored"),
        }

        if let Some(predictor) = state.predictor.as_mut() {
            predictor.on_received(PredictorObservation {
                payload_type: header.payload_type,
                seq,
                send_time_ms,
                ssrc: header.ssrc,
                padding_len: header.padding_len,
                header_len: header.header_len,
                arrival_ms,
                payload_size,
                loss_count: -1,
                rtt_ms: -1,
            });
        }

        self.run_bwe_throttle(&mut state, arrival_ms);
        self.run_telemetry(&mut state, seq, arrival_ms, payload_size);

        if let Some(req) = feedback_req {
            let media_ssrc = state.media_ssrc;
            feedback::emit_feedback_on_request(
                &mut state.arrival_map,
                &mut state.scheduler,
                media_ssrc,
                seq,
                req,
                self.sender.as_ref(),
                || (self.packet_factory)(),
            );
        }
    }

    fn run_bwe_throttle(&self, state: &mut ProxyState, now_ms: i64) {
        let due = match state.last_bwe_sendback_ms {
            None => true,
            Some(last) => now_ms - last > self.config.bwe_feedback_duration_ms,
        };
        if !due {
            return;
        }

        let Some(predictor) = state.predictor.as_ref() else {
            return;
        };

        let estimate = predictor.get_bwe_estimate();
        let message = BweMessage::for_estimate(estimate, now_ms);
        self.sender.send_application_packet(
            BWE_APPLICATION_SUB_TYPE,
            BWE_APPLICATION_NAME,
            &message.to_le_bytes(),
        );
        state.last_bwe_sendback_ms = Some(now_ms);
        debug!(estimate, "sent BWE sendback");
    }

    fn run_telemetry(&self, state: &mut ProxyState, seq: i64, arrival_ms: i64, payload_size: u32) {
        state.telemetry.collect(TelemetryRow {
            seq,
            ssrc: state.media_ssrc,
            arrival_ms,
            payload_size,
        });

        let due = match state.last_redis_save_ms {
            None => true,
            Some(last) => arrival_ms - last > self.config.redis_update_duration_ms,
        };
        if !due {
            return;
        }

        state.last_redis_save_ms = Some(arrival_ms);
        self.flush_telemetry_with_retries(state);
    }

    #[instrument(skip(self, state))]
    fn flush_telemetry_with_retries(&self, state: &mut ProxyState) {
        for attempt in 0..self.config.telemetry_retries {
            match state.telemetry.save() {
                SaveOutcome::Ok => return,
                SaveOutcome::ConnectError => {
                    warn!(attempt, "telemetry connect error, reconnecting");
                    let _ = state.telemetry.connect(&self.config.redis_ip, self.config.redis_port);
                }
                SaveOutcome::SessionError | SaveOutcome::TypeError => {
                    warn!(attempt, "telemetry session/type error, reconfiguring");
                    let _ = state.telemetry.set_config(&self.config.redis_sid, "twcc");
                }
                SaveOutcome::Other => {
                    warn!(attempt, "telemetry save failed for an unspecified reason");
                }
            }
        }
        error!("telemetry flush retries exhausted, dropping buffered rows");
    }

    /// `time_until_next_process`: milliseconds until `process` is
    /// next due, or the 24h sentinel when periodic feedback is disabled.
    pub fn time_until_next_process(&self) -> i64 {
        let state = self.state.lock().expect("mutex poisoned");
        state.scheduler.time_until_next_process(self.clock.time_in_ms())
    }

    /// `process`: records the new deadline and emits all due
    /// periodic feedback packets.
    #[instrument(skip(self))]
    pub fn process(&self) {
        let now_ms = self.clock.time_in_ms();
        let mut state = self.state.lock().expect("mutex poisoned");
        state.scheduler.mark_processed(now_ms);
        let media_ssrc = state.media_ssrc;
        feedback::emit_periodic_feedback(
            &mut state.arrival_map,
            &mut state.scheduler,
            media_ssrc,
            self.sender.as_ref(),
            || (self.packet_factory)(),
        );
    }

    /// `on_bitrate_changed`: recompute the adaptive send interval.
    pub fn on_bitrate_changed(&self, bitrate_bps: f64) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.scheduler.on_bitrate_changed(bitrate_bps, &self.config);
    }

    /// The currently active periodic send interval, in milliseconds.
    pub fn send_interval_ms(&self) -> i64 {
        let state = self.state.lock().expect("mutex poisoned");
        state.scheduler.send_interval_ms()
    }

    /// Enable or disable periodic feedback emission.
    pub fn set_send_periodic_feedback(&self, enabled: bool) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.scheduler.set_periodic_enabled(enabled);
    }

    /// Explicit, schedule-bypassing feedback request.
    pub fn send_feedback_on_request(&self, seq: i64, request: FeedbackRequest) {
        let mut state = self.state.lock().expect("mutex poisoned");
        let media_ssrc = state.media_ssrc;
        feedback::emit_feedback_on_request(
            &mut state.arrival_map,
            &mut state.scheduler,
            media_ssrc,
            seq,
            request,
            self.sender.as_ref(),
            || (self.packet_factory)(),
        );
    }

    /// The predictor's current bandwidth estimate, or `None` if the
    /// predictor failed to initialize.
    pub fn latest_estimate(&self) -> Option<f32> {
        let state = self.state.lock().expect("mutex poisoned");
        state.predictor.as_ref().map(|p| p.get_bwe_estimate())
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.telemetry.close();
        }
    }
}
