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

//! Drives a [`Proxy`] against a synthetic packet-arrival stream and a
//! periodic scheduler task, using stub collaborators in place of a real
//! wire codec, predictor, and telemetry transport. Two subsystems model
//! the two caller contexts the engine assumes: one drives
//! `incoming_packet`, the other drives `time_until_next_process`/`process`.

use clap::Parser;
use miette::IntoDiagnostic;
use rand::Rng;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::info;
use tracing_subscriber::EnvFilter;
use twcc_feedback_engine::clock::{Clock, MonotonicClock};
use twcc_feedback_engine::predictor::{Predictor, PredictorObservation};
use twcc_feedback_engine::telemetry::NullTelemetryStore;
use twcc_feedback_engine::wire::{FeedbackSender, PacketHeader, TransportFeedbackPacket};
use twcc_feedback_engine::{Proxy, ProxyConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML config file; falls back to built-in defaults.
    #[arg(short, long, env = "TWCC_FEEDBACK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct StdoutFeedbackPacket {
    media_ssrc: u32,
    base_seq: u16,
    base_time_us: i64,
    feedback_sequence_number: u8,
    entries: Vec<(u16, i64)>,
}

impl TransportFeedbackPacket for StdoutFeedbackPacket {
    fn set_media_ssrc(&mut self, ssrc: u32) {
        self.media_ssrc = ssrc;
    }

    fn set_base(&mut self, seq: u16, base_time_us: i64) {
        self.base_seq = seq;
        self.base_time_us = base_time_us;
    }

    fn set_feedback_sequence_number(&mut self, counter: u8) {
        self.feedback_sequence_number = counter;
    }

    fn add_received_packet(&mut self, seq: u16, arrival_us: i64) -> bool {
        const MAX_ENTRIES_PER_PACKET: usize = 200;
        if self.entries.len() >= MAX_ENTRIES_PER_PACKET {
            return false;
        }
        self.entries.push((seq, arrival_us));
        true
    }
}

struct StdoutSender;

impl FeedbackSender for StdoutSender {
    fn send_transport_feedback(&self, packet: &dyn TransportFeedbackPacket) {
        // This demo only ever constructs `StdoutFeedbackPacket`; a real
        // sender would serialize straight from the trait's setters instead.
        let packet = (packet as &dyn std::any::Any)
            .downcast_ref::<StdoutFeedbackPacket>()
            .expect("demo sender only ever receives StdoutFeedbackPacket");
        info!(
            media_ssrc = packet.media_ssrc,
            base_seq = packet.base_seq,
            base_time_us = packet.base_time_us,
            feedback_sequence_number = packet.feedback_sequence_number,
            entry_count = packet.entries.len(),
            "transport feedback"
        );
    }

    fn send_application_packet(&self, sub_type: u8, name: [u8; 4], payload: &[u8]) {
        info!(sub_type, name = ?name, len = payload.len(), "application packet (BWE sendback)");
    }
}

#[derive(Default)]
struct FixedPredictor {
    estimate_bps: Mutex<f32>,
}

impl Predictor for FixedPredictor {
    fn on_received(&mut self, _observation: PredictorObservation) {}

    fn get_bwe_estimate(&self) -> f32 {
        *self.estimate_bps.lock().expect("mutex poisoned")
    }
}

fn load_config(args: &Args) -> miette::Result<ProxyConfig> {
    match &args.config {
        Some(path) => ProxyConfig::load(path).into_diagnostic(),
        None => Ok(ProxyConfig::default()),
    }
}

/// Simulates an incoming-packet thread: a steady stream of arrivals with a
/// little jitter, feeding `proxy.incoming_packet` the way a real socket
/// read loop would.
async fn arrival_loop(subsys: SubsystemHandle, proxy: Arc<Proxy>, clock: Arc<dyn Clock>) {
    let mut rng = rand::rng();
    let mut seq: u16 = 0;
    loop {
        tokio::select! {
            () = subsys.on_shutdown_requested() => break,
            () = sleep(Duration::from_millis(10 + rng.random_range(0..5))) => {
                let now_ms = clock.time_in_ms();
                let abs_send_time = (((now_ms as f64 / 1000.0) % 64.0) * 262_144.0) as u32;
                let header = PacketHeader {
                    ssrc: 0xCAFE_BABE,
                    payload_type: 111,
                    transport_sequence: Some(seq),
                    abs_send_time: Some(abs_send_time),
                    padding_len: 0,
                    header_len: 12,
                };
                proxy.incoming_packet(header, now_ms, 1200, None);
                seq = seq.wrapping_add(1);
            }
        }
    }
}

/// Drives the periodic `time_until_next_process`/`process` contract.
async fn scheduler_loop(subsys: SubsystemHandle, proxy: Arc<Proxy>) {
    loop {
        let wait_ms = proxy.time_until_next_process().max(0) as u64;
        tokio::select! {
            () = subsys.on_shutdown_requested() => break,
            () = sleep(Duration::from_millis(wait_ms.min(60_000))) => {
                proxy.process();
            }
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let sender: Arc<dyn FeedbackSender> = Arc::new(StdoutSender);
    let telemetry = Box::new(NullTelemetryStore::default());

    let proxy = Arc::new(Proxy::new(
        config,
        clock.clone(),
        sender,
        Box::new(|| Box::<StdoutFeedbackPacket>::default() as Box<dyn TransportFeedbackPacket>),
        telemetry,
        || Ok(Box::new(FixedPredictor::default()) as Box<dyn Predictor>),
    ));

    Toplevel::new(move |s| {
        let arrivals = proxy.clone();
        let arrivals_clock = clock.clone();
        let scheduler = proxy.clone();
        async move {
            s.start(SubsystemBuilder::new("arrivals", move |s| {
                arrival_loop(s, arrivals, arrivals_clock)
            }));
            s.start(SubsystemBuilder::new("scheduler", move |s| async move {
                scheduler_loop(s, scheduler).await;
                Ok::<(), miette::Report>(())
            }));
        }
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(1))
    .await
    .into_diagnostic()?;

    Ok(())
}
