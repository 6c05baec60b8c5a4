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

use std::time::Instant;

/// Monotonic wall clock, external to the engine. Implementations must
/// be monotonic for the lifetime of one receiver session; they need not be
/// synced to any external time base, since the engine only ever compares
/// two readings of the same clock.
pub trait Clock: Send + Sync {
    fn time_in_ms(&self) -> i64;
}

/// Default [`Clock`] backed by [`std::time::Instant`], anchored at
/// construction time.
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn time_in_ms(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }
}
