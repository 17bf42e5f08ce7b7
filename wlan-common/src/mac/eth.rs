// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::MacAddr,
    crate::big_endian::BigEndianU16,
    zerocopy::{AsBytes, FromBytes, Unaligned},
};

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_EAPOL: u16 = 0x888e;

#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct EthernetIIHdr {
    pub da: MacAddr,
    pub sa: MacAddr,
    pub ether_type: BigEndianU16,
}
