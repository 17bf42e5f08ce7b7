// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::energy::DecibelMilliWatt;

/// Maintains a signal strength exponentially weighted moving average.
///
/// DecibelMilliWatt uses an i8 to represent the signal strength. Due to
/// integer rounding, small updates to the average may never move an i8 value
/// (e.g. avg(-50, -51) rounds to -50, so updates of -51 would never reach
/// -51). The average is therefore kept as an f64 so even small changes
/// accumulate.
#[derive(Clone, Debug, PartialEq)]
pub struct EwmaSignalStrength {
    current: f64,
    weighting_factor: f64,
}

impl EwmaSignalStrength {
    pub fn new(n: usize, initial_signal: DecibelMilliWatt) -> Self {
        Self { current: initial_signal.0.into(), weighting_factor: n as f64 }
    }

    pub fn dbm(&self) -> DecibelMilliWatt {
        DecibelMilliWatt(self.current.round() as i8)
    }

    // Linear average rather than logarithmic; more representative of
    // observed link performance.
    pub fn update_average(&mut self, dbm: DecibelMilliWatt) {
        let weight = 2.0 / (1.0 + self.weighting_factor);
        self.current = weight * (dbm.0 as f64) + (1.0 - weight) * self.current;
    }
}
