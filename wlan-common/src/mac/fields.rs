// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use zerocopy::{AsBytes, FromBytes, Unaligned};

// IEEE Std 802.11-2016, 9.2.4.1.3
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameType(pub u16);

impl FrameType {
    pub const MGMT: FrameType = FrameType(0);
    pub const CTRL: FrameType = FrameType(1);
    pub const DATA: FrameType = FrameType(2);
    pub const EXT: FrameType = FrameType(3);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MgmtSubtype(pub u16);

impl MgmtSubtype {
    pub const ASSOC_REQ: MgmtSubtype = MgmtSubtype(0b0000);
    pub const ASSOC_RESP: MgmtSubtype = MgmtSubtype(0b0001);
    pub const REASSOC_REQ: MgmtSubtype = MgmtSubtype(0b0010);
    pub const REASSOC_RESP: MgmtSubtype = MgmtSubtype(0b0011);
    pub const PROBE_REQ: MgmtSubtype = MgmtSubtype(0b0100);
    pub const PROBE_RESP: MgmtSubtype = MgmtSubtype(0b0101);
    pub const BEACON: MgmtSubtype = MgmtSubtype(0b1000);
    pub const ATIM: MgmtSubtype = MgmtSubtype(0b1001);
    pub const DISASSOC: MgmtSubtype = MgmtSubtype(0b1010);
    pub const AUTH: MgmtSubtype = MgmtSubtype(0b1011);
    pub const DEAUTH: MgmtSubtype = MgmtSubtype(0b1100);
    pub const ACTION: MgmtSubtype = MgmtSubtype(0b1101);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CtrlSubtype(pub u16);

impl CtrlSubtype {
    pub const BLOCK_ACK_REQ: CtrlSubtype = CtrlSubtype(0b1000);
    pub const BLOCK_ACK: CtrlSubtype = CtrlSubtype(0b1001);
    pub const PS_POLL: CtrlSubtype = CtrlSubtype(0b1010);
    pub const RTS: CtrlSubtype = CtrlSubtype(0b1011);
    pub const CTS: CtrlSubtype = CtrlSubtype(0b1100);
    pub const ACK: CtrlSubtype = CtrlSubtype(0b1101);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DataSubtype(pub u16);

impl DataSubtype {
    pub const DATA: DataSubtype = DataSubtype(0b0000);
    pub const NULL: DataSubtype = DataSubtype(0b0100);
    pub const QOS_DATA: DataSubtype = DataSubtype(0b1000);
    pub const QOS_NULL: DataSubtype = DataSubtype(0b1100);

    /// QoS variants carry a QoS-control field after the addresses.
    pub fn qos(&self) -> bool {
        self.0 & 0b1000 != 0
    }

    /// Null variants carry no frame body.
    pub fn null(&self) -> bool {
        self.0 & 0b0100 != 0
    }
}

// IEEE Std 802.11-2016, 9.2.4.1.1
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct FrameControl(pub u16);

impl FrameControl {
    bitfield_field!(u16, protocol_version, set_protocol_version, with_protocol_version, u8, 0, 2);
    bitfield_bit!(u16, to_ds, set_to_ds, with_to_ds, 8);
    bitfield_bit!(u16, from_ds, set_from_ds, with_from_ds, 9);
    bitfield_bit!(u16, more_fragments, set_more_fragments, with_more_fragments, 10);
    bitfield_bit!(u16, retry, set_retry, with_retry, 11);
    bitfield_bit!(u16, power_mgmt, set_power_mgmt, with_power_mgmt, 12);
    bitfield_bit!(u16, more_data, set_more_data, with_more_data, 13);
    bitfield_bit!(u16, protected, set_protected, with_protected, 14);
    bitfield_bit!(u16, htc_order, set_htc_order, with_htc_order, 15);

    pub fn frame_type(&self) -> FrameType {
        FrameType((self.0 >> 2) & 0b11)
    }

    pub fn set_frame_type(&mut self, frame_type: FrameType) {
        self.0 = (self.0 & !(0b11 << 2)) | ((frame_type.0 & 0b11) << 2);
    }

    pub fn with_frame_type(mut self, frame_type: FrameType) -> Self {
        self.set_frame_type(frame_type);
        self
    }

    fn subtype(&self) -> u16 {
        (self.0 >> 4) & 0b1111
    }

    fn set_subtype(&mut self, subtype: u16) {
        self.0 = (self.0 & !(0b1111 << 4)) | ((subtype & 0b1111) << 4);
    }

    pub fn mgmt_subtype(&self) -> MgmtSubtype {
        MgmtSubtype(self.subtype())
    }

    pub fn set_mgmt_subtype(&mut self, subtype: MgmtSubtype) {
        self.set_subtype(subtype.0);
    }

    pub fn with_mgmt_subtype(mut self, subtype: MgmtSubtype) -> Self {
        self.set_mgmt_subtype(subtype);
        self
    }

    pub fn ctrl_subtype(&self) -> CtrlSubtype {
        CtrlSubtype(self.subtype())
    }

    pub fn data_subtype(&self) -> DataSubtype {
        DataSubtype(self.subtype())
    }

    pub fn set_data_subtype(&mut self, subtype: DataSubtype) {
        self.set_subtype(subtype.0);
    }

    pub fn with_data_subtype(mut self, subtype: DataSubtype) -> Self {
        self.set_data_subtype(subtype);
        self
    }
}

// IEEE Std 802.11-2016, 9.2.4.4.1
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct SequenceControl(pub u16);

impl SequenceControl {
    bitfield_field!(u16, frag_num, set_frag_num, with_frag_num, u8, 0, 4);
    bitfield_field!(u16, seq_num, set_seq_num, with_seq_num, u16, 4, 12);
}

// IEEE Std 802.11-2016, 9.2.4.5.1
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct QosControl(pub u16);

impl QosControl {
    bitfield_field!(u16, tid, set_tid, with_tid, u16, 0, 4);
    bitfield_bit!(u16, eosp, set_eosp, with_eosp, 4);
    bitfield_field!(u16, ack_policy, set_ack_policy, with_ack_policy, u8, 5, 2);
    bitfield_bit!(u16, amsdu_present, set_amsdu_present, with_amsdu_present, 7);
}

// IEEE Std 802.11-2016, 9.4.1.4
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct CapabilityInfo(pub u16);

impl CapabilityInfo {
    bitfield_bit!(u16, ess, set_ess, with_ess, 0);
    bitfield_bit!(u16, ibss, set_ibss, with_ibss, 1);
    bitfield_bit!(u16, cf_pollable, set_cf_pollable, with_cf_pollable, 2);
    bitfield_bit!(u16, cf_poll_req, set_cf_poll_req, with_cf_poll_req, 3);
    bitfield_bit!(u16, privacy, set_privacy, with_privacy, 4);
    bitfield_bit!(u16, short_preamble, set_short_preamble, with_short_preamble, 5);
    bitfield_bit!(u16, spectrum_mgmt, set_spectrum_mgmt, with_spectrum_mgmt, 8);
    bitfield_bit!(u16, qos, set_qos, with_qos, 9);
    bitfield_bit!(u16, short_slot_time, set_short_slot_time, with_short_slot_time, 10);
    bitfield_bit!(u16, apsd, set_apsd, with_apsd, 11);
    bitfield_bit!(u16, radio_measurement, set_radio_measurement, with_radio_measurement, 12);
    bitfield_bit!(u16, delayed_block_ack, set_delayed_block_ack, with_delayed_block_ack, 14);
    bitfield_bit!(u16, immediate_block_ack, set_immediate_block_ack, with_immediate_block_ack, 15);
}

// IEEE Std 802.11-2016, 9.4.1.9, Table 9-46
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const SUCCESS: StatusCode = StatusCode(0);
    pub const REFUSED: StatusCode = StatusCode(1);
    pub const REFUSED_CAPABILITIES_MISMATCH: StatusCode = StatusCode(10);
    pub const DENIED_NO_ASSOCIATION_EXISTS: StatusCode = StatusCode(11);
    pub const REJECTED_EMERGENCY_SERVICES_NOT_SUPPORTED: StatusCode = StatusCode(12);
    pub const UNSUPPORTED_AUTH_ALGORITHM: StatusCode = StatusCode(13);
    pub const TRANSACTION_SEQUENCE_ERROR: StatusCode = StatusCode(14);
    pub const CHALLENGE_FAILURE: StatusCode = StatusCode(15);
    pub const REJECTED_SEQUENCE_TIMEOUT: StatusCode = StatusCode(16);
    pub const DENIED_NO_MORE_STAS: StatusCode = StatusCode(17);
    pub const REFUSED_BASIC_RATES_MISMATCH: StatusCode = StatusCode(18);
    pub const REFUSED_TEMPORARILY: StatusCode = StatusCode(30);
    pub const REQUEST_DECLINED: StatusCode = StatusCode(37);
    pub const INVALID_PARAMETERS: StatusCode = StatusCode(38);
}

// IEEE Std 802.11-2016, 9.4.1.7, Table 9-45
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct ReasonCode(pub u16);

impl ReasonCode {
    pub const UNSPECIFIED_REASON: ReasonCode = ReasonCode(1);
    pub const INVALID_AUTHENTICATION: ReasonCode = ReasonCode(2);
    pub const LEAVING_NETWORK_DEAUTH: ReasonCode = ReasonCode(3);
    pub const REASON_INACTIVITY: ReasonCode = ReasonCode(4);
    pub const NO_MORE_STAS: ReasonCode = ReasonCode(5);
    pub const INVALID_CLASS2_FRAME: ReasonCode = ReasonCode(6);
    pub const INVALID_CLASS3_FRAME: ReasonCode = ReasonCode(7);
    pub const LEAVING_NETWORK_DISASSOC: ReasonCode = ReasonCode(8);
    pub const UNSPECIFIED_QOS_REASON: ReasonCode = ReasonCode(32);
    pub const EXCEEDED_TXOP: ReasonCode = ReasonCode(35);
    pub const TIMEOUT: ReasonCode = ReasonCode(39);
}

// IEEE Std 802.11-2016, 9.4.1.1
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct AuthAlgorithmNumber(pub u16);

impl AuthAlgorithmNumber {
    pub const OPEN: AuthAlgorithmNumber = AuthAlgorithmNumber(0);
    pub const SHARED_KEY: AuthAlgorithmNumber = AuthAlgorithmNumber(1);
    pub const FAST_BSS_TRANSITION: AuthAlgorithmNumber = AuthAlgorithmNumber(2);
    pub const SAE: AuthAlgorithmNumber = AuthAlgorithmNumber(3);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_control_bits() {
        let mut fc = FrameControl(0);
        fc.set_frame_type(FrameType::DATA);
        fc.set_data_subtype(DataSubtype::QOS_DATA);
        fc.set_to_ds(true);
        fc.set_protected(true);
        assert_eq!({ fc.0 }, 0b0100_0001_1000_1000);
        assert_eq!(fc.frame_type(), FrameType::DATA);
        assert_eq!(fc.data_subtype(), DataSubtype::QOS_DATA);
        assert!(fc.to_ds());
        assert!(!fc.from_ds());
        fc.set_to_ds(false);
        assert!(!fc.to_ds());
    }

    #[test]
    fn frame_control_builders() {
        let fc = FrameControl(0)
            .with_frame_type(FrameType::MGMT)
            .with_mgmt_subtype(MgmtSubtype::BEACON)
            .with_retry(true);
        assert_eq!({ fc.0 }, 0b0000_1000_1000_0000);
    }

    #[test]
    fn sequence_control_fields() {
        let seq_ctrl = SequenceControl(0).with_frag_num(2).with_seq_num(4000);
        assert_eq!(seq_ctrl.frag_num(), 2);
        assert_eq!(seq_ctrl.seq_num(), 4000);
        // Out-of-range values are masked, never smeared across fields.
        let seq_ctrl = SequenceControl(0).with_seq_num(4097);
        assert_eq!(seq_ctrl.seq_num(), 1);
        assert_eq!(seq_ctrl.frag_num(), 0);
    }

    #[test]
    fn qos_control_fields() {
        let qos_ctrl = QosControl(0).with_tid(6).with_eosp(true).with_ack_policy(3);
        assert_eq!(qos_ctrl.tid(), 6);
        assert!(qos_ctrl.eosp());
        assert_eq!(qos_ctrl.ack_policy(), 3);
        assert!(!qos_ctrl.amsdu_present());
    }

    #[test]
    fn capability_info_bits() {
        let cap = CapabilityInfo(0).with_ess(true).with_privacy(true).with_qos(true);
        assert_eq!({ cap.0 }, 0b0000_0010_0001_0001);
        assert!(cap.ess());
        assert!(!cap.ibss());
    }

    #[test]
    fn data_subtype_predicates() {
        assert!(DataSubtype::QOS_NULL.qos());
        assert!(DataSubtype::QOS_NULL.null());
        assert!(!DataSubtype::DATA.qos());
        assert!(DataSubtype::NULL.null());
    }
}
