// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! MAC frame headers and their fixed fields, IEEE Std 802.11-2016, 9.2-9.4.

use zerocopy::{ByteSlice, LayoutVerified};

use crate::buffer_reader::BufferReader;

pub mod data;
pub mod eth;
pub mod fields;
pub mod mgmt;

pub use data::*;
pub use eth::*;
pub use fields::*;
pub use mgmt::*;

pub type MacAddr = [u8; 6];

pub const BCAST_ADDR: MacAddr = [0xff; 6];
pub const NULL_ADDR: MacAddr = [0x00; 6];

/// A BSSID is the MAC address that identifies one BSS.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bssid(pub MacAddr);

pub const WILDCARD_BSSID: Bssid = Bssid(BCAST_ADDR);

/// A parsed view of one received MAC frame, classified by frame type. Only
/// the frame types a station control plane consumes are represented.
pub enum MacFrame<B: ByteSlice> {
    Mgmt {
        mgmt_hdr: LayoutVerified<B, MgmtHdr>,
        body: B,
    },
    Data {
        fixed_fields: LayoutVerified<B, FixedDataHdrFields>,
        addr4: Option<LayoutVerified<B, Addr4>>,
        qos_ctrl: Option<LayoutVerified<B, QosControl>>,
        body: B,
    },
    PsPoll {
        ps_poll: LayoutVerified<B, PsPoll>,
    },
    Unsupported {
        frame_ctrl: FrameControl,
    },
}

impl<B: ByteSlice> MacFrame<B> {
    /// Classifies and splits a frame by its frame-control field. Returns
    /// `None` if the buffer is too short for the advertised header.
    pub fn parse(bytes: B) -> Option<MacFrame<B>> {
        let mut reader = BufferReader::new(bytes);
        let frame_ctrl = *reader.peek::<FrameControl>()?;
        match frame_ctrl.frame_type() {
            FrameType::MGMT => {
                let mgmt_hdr = reader.read::<MgmtHdr>()?;
                Some(MacFrame::Mgmt { mgmt_hdr, body: reader.into_remaining() })
            }
            FrameType::DATA => {
                let fixed_fields = reader.read::<FixedDataHdrFields>()?;
                let addr4 = if frame_ctrl.to_ds() && frame_ctrl.from_ds() {
                    Some(reader.read::<Addr4>()?)
                } else {
                    None
                };
                let qos_ctrl = if frame_ctrl.data_subtype().qos() {
                    Some(reader.read::<QosControl>()?)
                } else {
                    None
                };
                Some(MacFrame::Data { fixed_fields, addr4, qos_ctrl, body: reader.into_remaining() })
            }
            FrameType::CTRL if frame_ctrl.ctrl_subtype() == CtrlSubtype::PS_POLL => {
                let ps_poll = reader.read::<PsPoll>()?;
                Some(MacFrame::PsPoll { ps_poll })
            }
            _ => Some(MacFrame::Unsupported { frame_ctrl }),
        }
    }
}
