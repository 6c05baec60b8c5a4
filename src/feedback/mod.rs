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

//! Feedback packetization and emission: turns pending arrivals
//! into wire feedback packets, either on the periodic schedule or on
//! explicit request.

pub mod builder;
pub mod scheduler;

use crate::arrival_map::{ArrivalMap, FeedbackRequest};
use crate::wire::{FeedbackSender, TransportFeedbackPacket};
use builder::FillOutcome;
use scheduler::FeedbackScheduler;
use tracing::debug;

/// `send_periodic_feedbacks`: repeatedly packs the run of arrivals
/// starting at the map's `periodic_window_start` until the map is drained
/// or the iterator is empty, handing each packet to `sender` as it's built.
/// Entries are never erased here; the cull policy owns that.
pub fn emit_periodic_feedback(
    arrival_map: &mut ArrivalMap,
    scheduler: &mut FeedbackScheduler,
    media_ssrc: u32,
    sender: &dyn FeedbackSender,
    mut new_packet: impl FnMut() -> Box<dyn TransportFeedbackPacket>,
) {
    let Some(mut window_start) = arrival_map.periodic_window_start() else {
        return;
    };

    loop {
        let mut entries = arrival_map.range_from(window_start).peekable();
        if entries.peek().is_none() {
            break;
        }

        let mut packet = new_packet();
        let counter = scheduler.next_feedback_counter();
        let outcome = builder::fill_packet(packet.as_mut(), counter, media_ssrc, window_start, entries);
        sender.send_transport_feedback(packet.as_ref());
        debug!(base_seq = window_start, "emitted periodic feedback packet");

        window_start = outcome.next_seq();
        if matches!(outcome, FillOutcome::Done { .. }) {
            break;
        }
    }

    arrival_map.set_periodic_window_start(Some(window_start));
}

/// `send_feedback_on_request`: builds one packet over
/// `[seq - count + 1, seq]` and trims the map's prefix below that range,
/// unlike periodic emission which never erases.
pub fn emit_feedback_on_request(
    arrival_map: &mut ArrivalMap,
    scheduler: &mut FeedbackScheduler,
    media_ssrc: u32,
    seq: i64,
    request: FeedbackRequest,
    sender: &dyn FeedbackSender,
    mut new_packet: impl FnMut() -> Box<dyn TransportFeedbackPacket>,
) {
    if request.sequence_count == 0 {
        return;
    }

    let begin = seq - request.sequence_count as i64 + 1;
    let entries: Vec<(i64, i64)> = arrival_map
        .range_from(begin)
        .take_while(|&(k, _)| k <= seq)
        .collect();

    let mut packet = new_packet();
    let counter = scheduler.next_feedback_counter();
    builder::fill_packet(packet.as_mut(), counter, media_ssrc, begin, entries.into_iter());
    sender.send_transport_feedback(packet.as_ref());
    debug!(begin, seq, "emitted on-request feedback packet");

    arrival_map.erase_before(begin);
}
