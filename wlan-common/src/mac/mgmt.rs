// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::{
        AuthAlgorithmNumber, CapabilityInfo, FrameControl, MacAddr, ReasonCode, SequenceControl,
        StatusCode,
    },
    zerocopy::{AsBytes, FromBytes, Unaligned},
};

// IEEE Std 802.11-2016, 9.3.3.2
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct MgmtHdr {
    pub frame_ctrl: FrameControl,
    pub duration: u16,
    pub addr1: MacAddr,
    pub addr2: MacAddr,
    pub addr3: MacAddr,
    pub seq_ctrl: SequenceControl,
}

// IEEE Std 802.11-2016, 9.3.3.3. Probe responses share the same fixed
// fields.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct BeaconHdr {
    pub timestamp: u64,
    pub beacon_interval: u16,
    pub capabilities: CapabilityInfo,
}

// IEEE Std 802.11-2016, 9.3.3.12
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct AuthHdr {
    pub auth_alg_num: AuthAlgorithmNumber,
    pub auth_txn_seq_num: u16,
    pub status_code: StatusCode,
}

// IEEE Std 802.11-2016, 9.3.3.6
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct AssocReqHdr {
    pub capabilities: CapabilityInfo,
    pub listen_interval: u16,
}

// IEEE Std 802.11-2016, 9.3.3.7
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct AssocRespHdr {
    pub capabilities: CapabilityInfo,
    pub status_code: StatusCode,
    pub aid: u16,
}

// IEEE Std 802.11-2016, 9.3.3.13
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct DeauthHdr {
    pub reason_code: ReasonCode,
}

// IEEE Std 802.11-2016, 9.3.3.5
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct DisassocHdr {
    pub reason_code: ReasonCode,
}

// IEEE Std 802.11-2016, 9.4.1.11, Table 9-76
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct ActionCategory(pub u8);

impl ActionCategory {
    pub const SPECTRUM_MGMT: ActionCategory = ActionCategory(0);
    pub const QOS: ActionCategory = ActionCategory(1);
    pub const BLOCK_ACK: ActionCategory = ActionCategory(3);
    pub const SA_QUERY: ActionCategory = ActionCategory(8);
    pub const VENDOR: ActionCategory = ActionCategory(127);
}

#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ActionHdr {
    pub action: ActionCategory,
}

// IEEE Std 802.11-2016, 9.6.5.1
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct BlockAckAction(pub u8);

impl BlockAckAction {
    pub const ADDBA_REQUEST: BlockAckAction = BlockAckAction(0);
    pub const ADDBA_RESPONSE: BlockAckAction = BlockAckAction(1);
    pub const DELBA: BlockAckAction = BlockAckAction(2);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockAckPolicy(pub u8);

impl BlockAckPolicy {
    pub const DELAYED: BlockAckPolicy = BlockAckPolicy(0);
    pub const IMMEDIATE: BlockAckPolicy = BlockAckPolicy(1);
}

// IEEE Std 802.11-2016, 9.4.1.14
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct BlockAckParameters(pub u16);

impl BlockAckParameters {
    bitfield_bit!(u16, amsdu, set_amsdu, with_amsdu, 0);
    bitfield_field!(u16, tid, set_tid, with_tid, u16, 2, 4);
    bitfield_field!(u16, buffer_size, set_buffer_size, with_buffer_size, u16, 6, 10);

    pub fn policy(&self) -> BlockAckPolicy {
        BlockAckPolicy(((self.0 >> 1) & 1) as u8)
    }

    pub fn set_policy(&mut self, policy: BlockAckPolicy) {
        self.0 = (self.0 & !(1 << 1)) | (((policy.0 as u16) & 1) << 1);
    }

    pub fn with_policy(mut self, policy: BlockAckPolicy) -> Self {
        self.set_policy(policy);
        self
    }
}

// IEEE Std 802.11-2016, 9.4.1.15
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct DelbaParameters(pub u16);

impl DelbaParameters {
    bitfield_bit!(u16, initiator, set_initiator, with_initiator, 11);
    bitfield_field!(u16, tid, set_tid, with_tid, u16, 12, 4);
}

// IEEE Std 802.11-2016, 9.6.5.2
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct BlockAckStartingSequenceControl(pub u16);

impl BlockAckStartingSequenceControl {
    bitfield_field!(u16, fragment_number, set_fragment_number, with_fragment_number, u8, 0, 4);
    bitfield_field!(
        u16,
        starting_sequence_number,
        set_starting_sequence_number,
        with_starting_sequence_number,
        u16,
        4,
        12
    );
}

// IEEE Std 802.11-2016, 9.6.5.2
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct AddbaReqHdr {
    pub action: BlockAckAction,
    pub dialog_token: u8,
    pub parameters: BlockAckParameters,
    /// Timeout in TUs; zero disables the peer-side timeout.
    pub timeout: u16,
    pub starting_sequence_control: BlockAckStartingSequenceControl,
}

// IEEE Std 802.11-2016, 9.6.5.3
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct AddbaRespHdr {
    pub action: BlockAckAction,
    pub dialog_token: u8,
    pub status: StatusCode,
    pub parameters: BlockAckParameters,
    pub timeout: u16,
}

// IEEE Std 802.11-2016, 9.6.5.4
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct DelbaHdr {
    pub action: BlockAckAction,
    pub parameters: DelbaParameters,
    pub reason_code: ReasonCode,
}
