// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use zerocopy::{AsBytes, FromBytes, Unaligned};

/// A u16 stored as big-endian bytes, as used by LLC/SNAP protocol ids.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C, packed)]
pub struct BigEndianU16([u8; 2]);

impl BigEndianU16 {
    pub fn from_native(native: u16) -> Self {
        BigEndianU16(native.to_be_bytes())
    }

    pub fn to_native(&self) -> u16 {
        u16::from_be_bytes(self.0)
    }
}
