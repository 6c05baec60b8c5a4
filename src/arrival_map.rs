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

//! Ordered, bounded arrival-time store plus the periodic-window bookkeeping
//! it is coupled to.

use std::collections::BTreeMap;

/// Hard bound on the span of sequence numbers a map may hold: the wire
/// format's own capacity, `2^15`.
pub const MAX_SEQUENCE_SPAN: i64 = 1 << 15;

/// An explicit per-packet feedback request, made alongside an arrival.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackRequest {
    /// Number of trailing sequence numbers (ending at the arriving packet's
    /// own sequence) to cover in the immediate report.
    pub sequence_count: u32,
}

/// Ordered `seq -> arrival_ms` store with the bounded-window and
/// first-seen-wins invariants.
#[derive(Debug, Default)]
pub struct ArrivalMap {
    entries: BTreeMap<i64, i64>,
    periodic_window_start: Option<i64>,
}

/// Outcome of folding one arrival into the map, distinguishing the two
/// reasons an insert can be skipped so the caller can log appropriately.
#[derive(Debug, PartialEq, Eq)]
pub enum ArrivalOutcome {
    Inserted,
    Duplicate,
}

impl ArrivalMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn periodic_window_start(&self) -> Option<i64> {
        self.periodic_window_start
    }

    pub fn set_periodic_window_start(&mut self, seq: Option<i64>) {
        self.periodic_window_start = seq;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, seq: i64) -> Option<i64> {
        self.entries.get(&seq).copied()
    }

    /// Ascending-order iterator over `(seq, arrival_ms)`.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (i64, i64)> + '_ {
        self.entries.iter().map(|(&k, &v)| (k, v))
    }

    /// Iterator over the keys `>= from`, in ascending order.
    pub fn range_from(&self, from: i64) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.entries.range(from..).map(|(&k, &v)| (k, v))
    }

    fn min_key(&self) -> Option<i64> {
        self.entries.keys().next().copied()
    }

    fn max_key(&self) -> Option<i64> {
        self.entries.keys().next_back().copied()
    }

    /// Window-close culling, periodic-window-start
    /// tracking, first-seen-wins insertion, and hard-bound enforcement.
    ///
    /// `periodic_enabled` gates both the window-close cull and the
    /// window-start adjustment that follows a hard-bound cull;
    /// insertion and the hard bound itself apply unconditionally.
    pub fn record_arrival(
        &mut self,
        seq: i64,
        arrival_ms: i64,
        back_window_ms: i64,
        periodic_enabled: bool,
    ) -> ArrivalOutcome {
        if periodic_enabled {
            if let Some(window_start) = self.periodic_window_start {
                let window_closed = !self.entries.range(window_start..).next().is_some();
                if window_closed {
                    self.cull_closed_window(seq, arrival_ms, back_window_ms);
                }
            }
        }

        match self.periodic_window_start {
            None => self.periodic_window_start = Some(seq),
            Some(window_start) if seq < window_start => self.periodic_window_start = Some(seq),
            _ => {}
        }

        if self.entries.contains_key(&seq) {
            return ArrivalOutcome::Duplicate;
        }

        self.entries.insert(seq, arrival_ms);
        self.enforce_hard_bound(periodic_enabled);

        ArrivalOutcome::Inserted
    }

    /// Entries at the front younger than `seq` are culled only
    /// once they are also at least `back_window_ms` old, preserving
    /// retransmits that land within the back window.
    fn cull_closed_window(&mut self, seq: i64, arrival_ms: i64, back_window_ms: i64) {
        let to_remove: Vec<i64> = self
            .entries
            .range(..seq)
            .take_while(|&(_, &entry_arrival)| arrival_ms - entry_arrival >= back_window_ms)
            .map(|(&k, _)| k)
            .collect();

        for key in to_remove {
            self.entries.remove(&key);
        }
    }

    /// Erase everything more than `2^15` sequence numbers
    /// behind the current maximum.
    fn enforce_hard_bound(&mut self, periodic_enabled: bool) {
        let Some(max_key) = self.max_key() else {
            return;
        };

        let floor = max_key - MAX_SEQUENCE_SPAN;
        let to_remove: Vec<i64> = self
            .entries
            .range(..=floor)
            .map(|(&k, _)| k)
            .collect();

        if to_remove.is_empty() {
            return;
        }

        for key in to_remove {
            self.entries.remove(&key);
        }

        if periodic_enabled {
            self.periodic_window_start = self.min_key();
        }
    }

    /// On-request emission: erase every entry with key `< from`.
    pub fn erase_before(&mut self, from: i64) {
        let to_remove: Vec<i64> = self.entries.range(..from).map(|(&k, _)| k).collect();
        for key in to_remove {
            self.entries.remove(&key);
        }
    }

    /// Invariant check used by tests: `max_key - min_key < 2^15`.
    #[cfg(test)]
    pub(crate) fn span_within_bound(&self) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => max - min < MAX_SEQUENCE_SPAN,
            _ => true,
        }
    }
}
