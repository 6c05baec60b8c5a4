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

//! Packs a contiguous run of arrivals into one wire feedback packet,
//! reporting capacity exhaustion instead of failing.

use crate::wire::TransportFeedbackPacket;

/// Result of filling one packet: where the *next* packet should resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// The packet filled to capacity; `next_seq` is the first unsent
    /// sequence number and must start a new packet.
    Exhausted { next_seq: i64 },
    /// Every entry was accepted; `next_seq` is one past the last sent
    /// sequence.
    Done { next_seq: i64 },
}

impl FillOutcome {
    pub fn next_seq(self) -> i64 {
        match self {
            FillOutcome::Exhausted { next_seq } | FillOutcome::Done { next_seq } => next_seq,
        }
    }
}

/// Fill `packet` with `entries` (already in ascending sequence order, each
/// `(seq, arrival_ms)`), starting the packet's header at `base_seq`.
///
/// Panics if the very first entry is rejected by `packet`: that is
/// a programmer-error precondition violation (an empty packet must always
/// accept at least one entry), not a runtime condition to recover from.
pub fn fill_packet(
    packet: &mut dyn TransportFeedbackPacket,
    feedback_counter: u8,
    media_ssrc: u32,
    base_seq: i64,
    mut entries: impl Iterator<Item = (i64, i64)>,
) -> FillOutcome {
    let Some((first_seq, first_arrival_ms)) = entries.next() else {
        return FillOutcome::Done {
            next_seq: base_seq,
        };
    };

    packet.set_media_ssrc(media_ssrc);
    packet.set_base((base_seq & 0xFFFF) as u16, first_arrival_ms * 1_000);
    packet.set_feedback_sequence_number(feedback_counter);

    if !packet.add_received_packet((first_seq & 0xFFFF) as u16, first_arrival_ms * 1_000) {
        panic!("feedback packet rejected its first entry; packet capacity must cover at least one entry");
    }

    let mut last_sent_seq = first_seq;
    for (seq, arrival_ms) in entries {
        if !packet.add_received_packet((seq & 0xFFFF) as u16, arrival_ms * 1_000) {
            return FillOutcome::Exhausted { next_seq: seq };
        }
        last_sent_seq = seq;
    }

    FillOutcome::Done {
        next_seq: last_sent_seq + 1,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingPacket {
        media_ssrc: u32,
        base_seq: u16,
        base_time_us: i64,
        feedback_sequence_number: u8,
        entries: Vec<(u16, i64)>,
        capacity: usize,
    }

    impl TransportFeedbackPacket for RecordingPacket {
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
            if self.entries.len() >= self.capacity {
                return false;
            }
            self.entries.push((seq, arrival_us));
            true
        }
    }

    #[test]
    fn fills_every_entry_when_capacity_is_unbounded() {
        let mut packet = RecordingPacket {
            capacity: usize::MAX,
            ..Default::default()
        };
        let entries = vec![(10, 1000), (11, 1010), (12, 1020)];
        let outcome = fill_packet(&mut packet, 0, 42, 10, entries.into_iter());

        assert_eq!(outcome, FillOutcome::Done { next_seq: 13 });
        assert_eq!(packet.media_ssrc, 42);
        assert_eq!(packet.base_seq, 10);
        assert_eq!(packet.base_time_us, 1_000_000);
        assert_eq!(packet.entries, vec![(10, 1_000_000), (11, 1_010_000), (12, 1_020_000)]);
    }

    #[test]
    fn splits_cleanly_when_capacity_is_exhausted_mid_fill() {
        let mut packet = RecordingPacket {
            capacity: 2,
            ..Default::default()
        };
        let entries = vec![(0i64, 0i64), (1, 1), (2, 2), (3, 3)];
        let outcome = fill_packet(&mut packet, 0, 1, 0, entries.into_iter());

        assert_eq!(outcome, FillOutcome::Exhausted { next_seq: 2 });
        assert_eq!(packet.entries.len(), 2);
    }

    #[test]
    fn empty_iterator_leaves_base_seq_as_next_seq() {
        let mut packet = RecordingPacket {
            capacity: 10,
            ..Default::default()
        };
        let outcome = fill_packet(&mut packet, 0, 1, 7, std::iter::empty());
        assert_eq!(outcome, FillOutcome::Done { next_seq: 7 });
        assert!(packet.entries.is_empty());
    }

    #[test]
    #[should_panic(expected = "rejected its first entry")]
    fn panics_when_the_first_entry_is_rejected() {
        let mut packet = RecordingPacket {
            capacity: 0,
            ..Default::default()
        };
        fill_packet(&mut packet, 0, 1, 0, vec![(0i64, 0i64)].into_iter());
    }
}
