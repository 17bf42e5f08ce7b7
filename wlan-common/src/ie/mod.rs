// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Management-frame information elements, IEEE Std 802.11-2016, 9.4.2.
//!
//! Reading is an iterator over bounds-checked `(Id, body)` pairs; any
//! element whose length byte runs past the buffer terminates the walk.
//! Writing goes through [`crate::appendable::Appendable`] and validates
//! body constraints before emitting a single byte.

mod fields;
mod parse;
mod rates_writer;
mod reader;
mod write;

pub use {fields::*, parse::*, rates_writer::*, reader::*, write::*};

use zerocopy::{AsBytes, FromBytes, Unaligned};

pub const IE_MAX_LEN: usize = 255;
pub const SSID_MAX_LEN: usize = 32;
pub const SUPPORTED_RATES_MAX_LEN: usize = 8;
pub const TIM_MAX_BITMAP_LEN: usize = 251;

// IEEE Std 802.11-2016, 9.4.2.1, Table 9-77
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct Id(pub u8);

impl Id {
    pub const SSID: Id = Id(0);
    pub const SUPPORTED_RATES: Id = Id(1);
    pub const DSSS_PARAM_SET: Id = Id(3);
    pub const TIM: Id = Id(5);
    pub const COUNTRY: Id = Id(7);
    pub const POWER_CONSTRAINT: Id = Id(32);
    pub const CHANNEL_SWITCH_ANNOUNCEMENT: Id = Id(37);
    pub const HT_CAPABILITIES: Id = Id(45);
    pub const RSNE: Id = Id(48);
    pub const EXTENDED_SUPPORTED_RATES: Id = Id(50);
    pub const MOBILITY_DOMAIN: Id = Id(54);
    pub const HT_OPERATION: Id = Id(61);
    pub const VHT_CAPABILITIES: Id = Id(191);
    pub const VHT_OPERATION: Id = Id(192);
    pub const VENDOR_SPECIFIC: Id = Id(221);
    pub const EXTENSION: Id = Id(255);
}

#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct Header {
    pub id: Id,
    pub body_len: u8,
}
