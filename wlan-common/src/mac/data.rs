// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::{Bssid, CtrlSubtype, FrameControl, FrameType, MacAddr, SequenceControl},
    crate::big_endian::BigEndianU16,
    zerocopy::{AsBytes, FromBytes, Unaligned},
};

// IEEE Std 802.11-2016, 9.3.2.1: the address fields every data frame
// carries. Addr4 and QoS-control follow only for particular to-DS/from-DS
// and subtype combinations.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct FixedDataHdrFields {
    pub frame_ctrl: FrameControl,
    pub duration: u16,
    pub addr1: MacAddr,
    pub addr2: MacAddr,
    pub addr3: MacAddr,
    pub seq_ctrl: SequenceControl,
}

#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct Addr4(pub MacAddr);

// IEEE Std 802.11-2016, 9.3.1.5. The one control frame a station
// transmits itself: the buffered-traffic poll.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct PsPoll {
    pub frame_ctrl: FrameControl,
    /// The association id with the two MSBs set, IEEE Std 802.11-2016,
    /// 9.2.4.2.
    pub masked_aid: u16,
    pub bssid: MacAddr,
    pub ta: MacAddr,
}

pub const PS_POLL_AID_MASK: u16 = 0b1100_0000_0000_0000;

pub fn ps_poll_frame_ctrl() -> FrameControl {
    let mut frame_ctrl = FrameControl(0).with_frame_type(FrameType::CTRL);
    frame_ctrl.0 |= CtrlSubtype::PS_POLL.0 << 4;
    frame_ctrl
}

// IEEE Std 802.2: LLC/SNAP encapsulation of an ethertype.
pub const LLC_SNAP_EXTENSION: u8 = 0xaa;
pub const LLC_SNAP_UNNUMBERED_INFO: u8 = 0x03;
pub const LLC_SNAP_OUI: [u8; 3] = [0, 0, 0];

#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct LlcHdr {
    pub dsap: u8,
    pub ssap: u8,
    pub control: u8,
    pub oui: [u8; 3],
    pub protocol_id: BigEndianU16,
}

pub fn make_snap_llc_hdr(protocol_id: u16) -> LlcHdr {
    LlcHdr {
        dsap: LLC_SNAP_EXTENSION,
        ssap: LLC_SNAP_EXTENSION,
        control: LLC_SNAP_UNNUMBERED_INFO,
        oui: LLC_SNAP_OUI,
        protocol_id: BigEndianU16::from_native(protocol_id),
    }
}

pub fn data_hdr_client_to_ap(
    mut frame_ctrl: FrameControl,
    bssid: Bssid,
    client_addr: MacAddr,
    seq_ctrl: SequenceControl,
) -> FixedDataHdrFields {
    frame_ctrl.set_to_ds(true);
    frame_ctrl.set_from_ds(false);
    FixedDataHdrFields {
        frame_ctrl,
        duration: 0,
        addr1: bssid.0,
        addr2: client_addr,
        addr3: bssid.0,
        seq_ctrl,
    }
}
