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

//! End-to-end scenarios driving a [`Proxy`] through fake collaborators.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use twcc_feedback_engine::arrival_map::FeedbackRequest;
use twcc_feedback_engine::clock::Clock;
use twcc_feedback_engine::predictor::{BweMessage, Predictor, PredictorObservation};
use twcc_feedback_engine::telemetry::NullTelemetryStore;
use twcc_feedback_engine::wire::{FeedbackSender, PacketHeader, TransportFeedbackPacket};
use twcc_feedback_engine::{Proxy, ProxyConfig};

struct FakeClock(AtomicI64);

impl FakeClock {
    fn new(start_ms: i64) -> Self {
        Self(AtomicI64::new(start_ms))
    }

    fn set(&self, now_ms: i64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn time_in_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default, Clone)]
struct RecordedPacket {
    media_ssrc: u32,
    base_seq: u16,
    base_time_us: i64,
    entries: Vec<(u16, i64)>,
}

#[derive(Debug, Default)]
struct FakePacket {
    media_ssrc: u32,
    base_seq: u16,
    base_time_us: i64,
    entries: Vec<(u16, i64)>,
    capacity: usize,
}

impl FakePacket {
    fn unbounded() -> Self {
        Self {
            capacity: usize::MAX,
            ..Default::default()
        }
    }
}

impl TransportFeedbackPacket for FakePacket {
    fn set_media_ssrc(&mut self, ssrc: u32) {
        self.media_ssrc = ssrc;
    }

    fn set_base(&mut self, seq: u16, base_time_us: i64) {
        self.base_seq = seq;
        self.base_time_us = base_time_us;
    }

    fn set_feedback_sequence_number(&mut self, _counter: u8) {}

    fn add_received_packet(&mut self, seq: u16, arrival_us: i64) -> bool {
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.push((seq, arrival_us));
        true
    }
}

#[derive(Default)]
struct RecordingSender {
    transport: Mutex<Vec<RecordedPacket>>,
    application: Mutex<Vec<Vec<u8>>>,
}

impl FeedbackSender for RecordingSender {
    fn send_transport_feedback(&self, packet: &dyn TransportFeedbackPacket) {
        let packet = (packet as &dyn std::any::Any)
            .downcast_ref::<FakePacket>()
            .expect("test sender only ever receives FakePacket");
        self.transport.lock().unwrap().push(RecordedPacket {
            media_ssrc: packet.media_ssrc,
            base_seq: packet.base_seq,
            base_time_us: packet.base_time_us,
            entries: packet.entries.clone(),
        });
    }

    fn send_application_packet(&self, _sub_type: u8, _name: [u8; 4], payload: &[u8]) {
        self.application.lock().unwrap().push(payload.to_vec());
    }
}

#[derive(Default)]
struct ConstantPredictor;

impl Predictor for ConstantPredictor {
    fn on_received(&mut self, _observation: PredictorObservation) {}

    fn get_bwe_estimate(&self) -> f32 {
        1_000.0
    }
}

struct RecordingPredictor {
    observations: Arc<Mutex<Vec<PredictorObservation>>>,
}

impl Predictor for RecordingPredictor {
    fn on_received(&mut self, observation: PredictorObservation) {
        self.observations.lock().unwrap().push(observation);
    }

    fn get_bwe_estimate(&self) -> f32 {
        0.0
    }
}

fn header(seq: u16) -> PacketHeader {
    PacketHeader {
        ssrc: 42,
        payload_type: 111,
        transport_sequence: Some(seq),
        abs_send_time: None,
        padding_len: 0,
        header_len: 12,
    }
}

fn build_proxy(config: ProxyConfig, clock: Arc<FakeClock>, sender: Arc<RecordingSender>) -> Proxy {
    Proxy::new(
        config,
        clock,
        sender,
        Box::new(|| Box::new(FakePacket::unbounded()) as Box<dyn TransportFeedbackPacket>),
        Box::new(NullTelemetryStore::default()),
        || Ok(Box::new(ConstantPredictor) as Box<dyn Predictor>),
    )
}

#[test]
fn scenario_1_basic_periodic() {
    let clock = Arc::new(FakeClock::new(1000));
    let sender = Arc::new(RecordingSender::default());
    let config = ProxyConfig {
        default_interval_ms: 100,
        back_window_ms: 500,
        ..ProxyConfig::default()
    };
    let proxy = build_proxy(config, clock.clone(), sender.clone());

    for (seq, arrival_ms) in [(10u16, 1000i64), (11, 1010), (12, 1020)] {
        clock.set(arrival_ms);
        proxy.incoming_packet(header(seq), arrival_ms, 1200, None);
    }

    clock.set(1100);
    proxy.process();

    let packets = sender.transport.lock().unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].base_seq, 10);
    assert_eq!(packets[0].base_time_us, 1_000_000);
    assert_eq!(
        packets[0].entries,
        vec![(10, 1_000_000), (11, 1_010_000), (12, 1_020_000)]
    );
}

#[test]
fn scenario_2_reordering_lowers_window_and_is_retransmitted() {
    let clock = Arc::new(FakeClock::new(1000));
    let sender = Arc::new(RecordingSender::default());
    let config = ProxyConfig {
        default_interval_ms: 100,
        back_window_ms: 500,
        ..ProxyConfig::default()
    };
    let proxy = build_proxy(config, clock.clone(), sender.clone());

    for (seq, arrival_ms) in [(10u16, 1000i64), (11, 1010), (12, 1020)] {
        clock.set(arrival_ms);
        proxy.incoming_packet(header(seq), arrival_ms, 1200, None);
    }
    clock.set(1100);
    proxy.process();

    clock.set(1030);
    proxy.incoming_packet(header(9), 1030, 1200, None);

    clock.set(1200);
    proxy.process();

    let packets = sender.transport.lock().unwrap();
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[1].base_seq, 9);
    assert_eq!(
        packets[1].entries,
        vec![(9, 1_030_000), (10, 1_000_000), (11, 1_010_000), (12, 1_020_000)]
    );
}

#[test]
fn scenario_3_sequence_wrap_truncates_to_16_bits_on_the_wire() {
    let clock = Arc::new(FakeClock::new(0));
    let sender = Arc::new(RecordingSender::default());
    let proxy = build_proxy(ProxyConfig::default(), clock.clone(), sender.clone());

    for (seq, arrival_ms) in [(65535u16, 1i64), (0, 2), (1, 3)] {
        clock.set(arrival_ms);
        proxy.incoming_packet(header(seq), arrival_ms, 100, None);
    }

    clock.set(10_000);
    proxy.process();

    let packets = sender.transport.lock().unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].base_seq, 65535);
    assert_eq!(packets[0].entries.len(), 3);
}

#[test]
fn scenario_4_hard_bound_after_40000_arrivals() {
    let clock = Arc::new(FakeClock::new(0));
    let sender = Arc::new(RecordingSender::default());
    let proxy = build_proxy(ProxyConfig::default(), clock.clone(), sender.clone());

    for seq in 0u16..40_000u16 {
        let arrival_ms = seq as i64;
        clock.set(arrival_ms);
        proxy.incoming_packet(header(seq), arrival_ms, 100, None);
    }

    // The most recent arrival is always resident regardless of the hard
    // bound; request it alone to confirm the map still tracks it.
    proxy.send_feedback_on_request(39_999, FeedbackRequest { sequence_count: 1 });
    let packets = sender.transport.lock().unwrap();
    let last = packets.last().unwrap();
    assert_eq!(last.entries, vec![(39_999, 39_999_000)]);
}

#[test]
fn scenario_5_on_request_feedback_trims_the_prefix() {
    let clock = Arc::new(FakeClock::new(1000));
    let sender = Arc::new(RecordingSender::default());
    let proxy = build_proxy(ProxyConfig::default(), clock.clone(), sender.clone());

    for (seq, arrival_ms) in (100u16..110).zip(1000i64..1010) {
        clock.set(arrival_ms);
        proxy.incoming_packet(header(seq), arrival_ms, 100, None);
    }

    proxy.send_feedback_on_request(108, FeedbackRequest { sequence_count: 5 });

    let packets = sender.transport.lock().unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].base_seq, 104);
    assert_eq!(packets[0].entries.len(), 5);

    // The prefix below 104 must now be gone: requesting a wider range that
    // would have reached back to 100 only turns up the surviving entries.
    drop(packets);
    proxy.send_feedback_on_request(109, FeedbackRequest { sequence_count: 10 });
    let packets = sender.transport.lock().unwrap();
    let last = packets.last().unwrap();
    assert_eq!(last.entries.first().unwrap().0, 104);
}

#[test]
fn scenario_6_bwe_sendback_is_throttled_to_one_per_window() {
    let clock = Arc::new(FakeClock::new(0));
    let sender = Arc::new(RecordingSender::default());
    let config = ProxyConfig {
        bwe_feedback_duration_ms: 200,
        ..ProxyConfig::default()
    };
    let proxy = build_proxy(config, clock.clone(), sender.clone());

    for i in 0..50u16 {
        let now = i as i64 * 10;
        clock.set(now);
        proxy.incoming_packet(header(i), now, 100, None);
    }

    let application = sender.application.lock().unwrap();
    let timestamps: Vec<i64> = application
        .iter()
        .map(|payload| i64::from_le_bytes(payload[12..20].try_into().unwrap()))
        .collect();

    assert!(!timestamps.is_empty());
    for pair in timestamps.windows(2) {
        assert!(pair[1] - pair[0] > 200);
    }
}

#[test]
fn scenario_7_bitrate_adaptation_clamps_into_configured_bounds() {
    let clock = Arc::new(FakeClock::new(0));
    let sender = Arc::new(RecordingSender::default());
    let config = ProxyConfig {
        min_interval_ms: 50,
        max_interval_ms: 250,
        bandwidth_fraction: 0.05,
        ..ProxyConfig::default()
    };
    let proxy = build_proxy(config, clock.clone(), sender.clone());

    proxy.on_bitrate_changed(1_000_000.0);
    assert_eq!(proxy.send_interval_ms(), 50);
}

#[test]
fn abs_send_time_extension_is_unwrapped_into_the_predictor_observation() {
    let clock = Arc::new(FakeClock::new(0));
    let sender = Arc::new(RecordingSender::default());
    let observations = Arc::new(Mutex::new(Vec::new()));
    let predictor_observations = observations.clone();
    let proxy = Proxy::new(
        ProxyConfig::default(),
        clock.clone(),
        sender.clone(),
        Box::new(|| Box::new(FakePacket::unbounded()) as Box<dyn TransportFeedbackPacket>),
        Box::new(NullTelemetryStore::default()),
        move || {
            Ok(Box::new(RecordingPredictor {
                observations: predictor_observations,
            }) as Box<dyn Predictor>)
        },
    );

    let mut header = header(1);
    header.abs_send_time = Some(1_000_000);
    proxy.incoming_packet(header, 1, 100, None);

    let mut header = header(2);
    header.abs_send_time = None;
    proxy.incoming_packet(header, 2, 100, None);

    let observed = observations.lock().unwrap();
    assert_eq!(observed.len(), 2);
    assert!(observed[0].send_time_ms > 0);
    assert_eq!(observed[1].send_time_ms, 0);
}
