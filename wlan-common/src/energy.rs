// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// Received signal strength in dBm. The usable range for 802.11 receivers is
/// roughly -100..0; i8 covers it with room to spare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct DecibelMilliWatt(pub i8);

impl From<i8> for DecibelMilliWatt {
    fn from(dbm: i8) -> Self {
        DecibelMilliWatt(dbm)
    }
}
