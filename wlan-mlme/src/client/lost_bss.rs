// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {std::time::Duration, wlan_common::TimeUnit};

/// Counts time since the joined BSS was last heard from, to decide when the
/// connection is lost.
#[derive(Debug)]
pub struct LostBssCounter {
    /// The AP's beacon period, used to convert beacon counts to time.
    beacon_period: Duration,

    /// How long the BSS may stay silent before the connection is declared
    /// lost.
    full_timeout: Duration,

    /// Time since the last beacon. Reset to zero whenever one arrives.
    time_since_last_beacon: Duration,
}

/// A full status-check interval is added every time the check timer fires.
/// To avoid over-counting when a beacon arrived within the interval, call
/// `should_deauthenticate()` before `add_beacon_interval()`.
impl LostBssCounter {
    pub fn start(beacon_period: TimeUnit, full_timeout_beacon_count: u32) -> Self {
        Self {
            beacon_period: Duration::from(beacon_period),
            full_timeout: beacon_period * full_timeout_beacon_count,
            time_since_last_beacon: Duration::ZERO,
        }
    }

    pub fn reset(&mut self) {
        self.time_since_last_beacon = Duration::ZERO;
    }

    pub fn should_deauthenticate(&self) -> bool {
        self.time_since_last_beacon >= self.full_timeout
    }

    pub fn add_beacon_interval(&mut self, beacon_intervals_since_last_timeout: u32) {
        self.time_since_last_beacon += self.beacon_period * beacon_intervals_since_last_timeout;
    }

    /// Records time shorter than a full check interval (typically spent
    /// off-channel scanning while associated).
    pub fn add_time(&mut self, time: Duration) {
        self.time_since_last_beacon += time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BEACON_PERIOD: TimeUnit = TimeUnit(42);
    const TEST_TIMEOUT_BCN_COUNT: u32 = 1000;

    #[test]
    fn single_uninterrupted_period() {
        let mut counter = LostBssCounter::start(TEST_BEACON_PERIOD, TEST_TIMEOUT_BCN_COUNT);
        // About to time out, but not yet.
        counter.add_beacon_interval(TEST_TIMEOUT_BCN_COUNT - 1);
        assert!(!counter.should_deauthenticate());
        // Any more silence crosses the threshold.
        counter.add_beacon_interval(1);
        assert!(counter.should_deauthenticate());
    }

    #[test]
    fn beacon_received_midway() {
        let mut counter = LostBssCounter::start(TEST_BEACON_PERIOD, TEST_TIMEOUT_BCN_COUNT);
        counter.add_beacon_interval(TEST_TIMEOUT_BCN_COUNT - 1);
        assert!(!counter.should_deauthenticate());

        // A beacon arrives, resetting the count.
        counter.reset();

        counter.add_beacon_interval(1);
        assert!(!counter.should_deauthenticate());
        // Silence for the full timeout from here does trigger.
        counter.add_beacon_interval(TEST_TIMEOUT_BCN_COUNT - 1);
        assert!(counter.should_deauthenticate());
    }

    #[test]
    fn add_time_mixes_with_intervals() {
        let mut counter = LostBssCounter::start(TEST_BEACON_PERIOD, TEST_TIMEOUT_BCN_COUNT);
        counter.add_beacon_interval(TEST_TIMEOUT_BCN_COUNT - 1);
        assert!(!counter.should_deauthenticate());
        counter.add_time(Duration::from(TEST_BEACON_PERIOD));
        assert!(counter.should_deauthenticate());
    }
}
