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

//! Lifts 16-bit wrapping transport sequence numbers to a monotonic 64-bit
//! space.

const WRAP: i64 = 1 << 16;
const HALF_WRAP: i64 = 1 << 15;

/// Stateful unwrapper for one receiver session's transport sequence numbers.
#[derive(Debug, Default)]
pub struct SequenceUnwrapper {
    last_unwrapped: Option<i64>,
}

impl SequenceUnwrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unwrap one 16-bit wire sequence number.
    ///
    /// The first call zero-extends its input. Every later call picks the
    /// 64-bit value congruent to `raw` modulo 2¹⁶ that is closest to the
    /// previous result, with ties resolved toward the larger value — i.e. a
    /// backward-looking raw delta greater than 2¹⁵ is treated as a forward
    /// wrap rather than as 2¹⁶ consecutive retransmissions.
    pub fn unwrap(&mut self, raw: u16) -> i64 {
        let raw = raw as i64;

        let Some(last) = self.last_unwrapped else {
            self.last_unwrapped = Some(raw);
            return raw;
        };

        let last_cycle_base = last - last.rem_euclid(WRAP);
        let mut candidate = last_cycle_base + raw;

        if candidate - last > HALF_WRAP {
            candidate -= WRAP;
        } else if last - candidate > HALF_WRAP {
            candidate += WRAP;
        }

        self.last_unwrapped = Some(candidate);
        candidate
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn first_call_zero_extends() {
        let mut unwrapper = SequenceUnwrapper::new();
        assert_eq!(unwrapper.unwrap(42), 42);
    }

    #[test]
    fn forward_progression_is_identity() {
        let mut unwrapper = SequenceUnwrapper::new();
        for raw in 0..1000u16 {
            assert_eq!(unwrapper.unwrap(raw), raw as i64);
        }
    }

    #[test]
    fn wraps_forward_across_the_16_bit_boundary() {
        let mut unwrapper = SequenceUnwrapper::new();
        assert_eq!(unwrapper.unwrap(65535), 65535);
        assert_eq!(unwrapper.unwrap(0), 65536);
        assert_eq!(unwrapper.unwrap(1), 65537);
    }

    #[test]
    fn tolerates_small_reordering_without_treating_it_as_a_wrap() {
        let mut unwrapper = SequenceUnwrapper::new();
        assert_eq!(unwrapper.unwrap(10), 10);
        assert_eq!(unwrapper.unwrap(12), 12);
        // 11 arrives late, reordered behind 12; it must resolve to 11, not 11 + 2^16.
        assert_eq!(unwrapper.unwrap(11), 11);
    }

    #[test]
    fn wrap_then_unwrap_round_trip_recovers_original_sequence() {
        let mut unwrapper = SequenceUnwrapper::new();
        let original: Vec<i64> = (65530..65540).chain(100_000..100_010).collect();
        for &seq in &original {
            let wire = (seq & 0xFFFF) as u16;
            assert_eq!(unwrapper.unwrap(wire), seq);
        }
    }

    #[test]
    fn monotone_for_forward_deltas_within_half_wrap() {
        let mut unwrapper = SequenceUnwrapper::new();
        let mut raw: i64 = 1000;
        let mut last_unwrapped = unwrapper.unwrap(raw as u16);
        for delta in [100, 32000, 1, 32767, 500] {
            raw += delta;
            let wire = raw.rem_euclid(WRAP) as u16;
            let unwrapped = unwrapper.unwrap(wire);
            assert!(unwrapped > last_unwrapped);
            last_unwrapped = unwrapped;
        }
    }
}
