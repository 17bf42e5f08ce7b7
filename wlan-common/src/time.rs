// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::time::Duration;

/// An IEEE Std 802.11 TimeUnit: 1024 microseconds. Beacon intervals, listen
/// intervals and BlockAck timeouts are all expressed in TUs on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeUnit(pub u16);

impl TimeUnit {
    pub const DEFAULT_BEACON_INTERVAL: TimeUnit = TimeUnit(100);
    pub const MICROS_PER_TIME_UNIT: u64 = 1024;

    pub const fn into_micros(self) -> u64 {
        self.0 as u64 * Self::MICROS_PER_TIME_UNIT
    }
}

impl From<TimeUnit> for Duration {
    fn from(tu: TimeUnit) -> Duration {
        Duration::from_micros(tu.into_micros())
    }
}

impl std::ops::Mul<u32> for TimeUnit {
    type Output = Duration;

    fn mul(self, count: u32) -> Duration {
        Duration::from_micros(self.into_micros() * count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Duration::from(TimeUnit(1)), Duration::from_micros(1024));
        assert_eq!(
            Duration::from(TimeUnit::DEFAULT_BEACON_INTERVAL),
            Duration::from_micros(102_400)
        );
        assert_eq!(TimeUnit(100) * 3, Duration::from_micros(307_200));
    }
}
