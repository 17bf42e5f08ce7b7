// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use zerocopy::{AsBytes, ByteSlice, FromBytes, Unaligned};

// IEEE Std 802.11-2016, 9.4.2.3: rate in units of 500 kbit/s with the MSB
// flagging membership in the BSS basic rate set.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct SupportedRate(pub u8);

impl SupportedRate {
    pub fn rate(&self) -> u8 {
        self.0 & 0x7f
    }

    pub fn basic(&self) -> bool {
        self.0 & 0x80 != 0
    }
}

// IEEE Std 802.11-2016, 9.4.2.4
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct DsssParamSet {
    pub current_channel: u8,
}

// IEEE Std 802.11-2016, 9.4.2.6
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C, packed)]
pub struct BitmapControl(pub u8);

impl BitmapControl {
    pub fn group_traffic(&self) -> bool {
        self.0 & 1 != 0
    }

    pub fn offset(&self) -> u8 {
        self.0 >> 1
    }

    pub fn with_offset(mut self, offset: u8) -> Self {
        self.0 = (self.0 & 1) | (offset << 1);
        self
    }
}

#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct TimHeader {
    pub dtim_count: u8,
    pub dtim_period: u8,
    pub bmp_ctrl: BitmapControl,
}

/// A parsed TIM element: fixed header plus the partial virtual bitmap.
pub struct TimView<B> {
    pub header: TimHeader,
    pub bitmap: B,
}

impl<B: ByteSlice> TimView<B> {
    /// Whether the AP advertises buffered unicast traffic for `aid`.
    pub fn traffic_buffered(&self, aid: u16) -> bool {
        let octet = aid as usize / 8;
        let offset = self.header.bmp_ctrl.offset() as usize * 2;
        octet >= offset
            && octet < offset + self.bitmap.len()
            && self.bitmap[octet - offset] & (1 << (aid % 8)) != 0
    }
}

// IEEE Std 802.11-2016, 9.4.2.9. The subband triplets follow the fixed
// fields; the element is padded to an even length on the wire.
pub struct CountryView<B> {
    pub alpha2: [u8; 2],
    pub environment: u8,
    pub subbands: B,
}

pub const COUNTRY_ENVIRON_ANY: u8 = b' ';
pub const COUNTRY_ENVIRON_OUTDOOR: u8 = b'O';
pub const COUNTRY_ENVIRON_INDOOR: u8 = b'I';

// IEEE Std 802.11-2016, 9.4.2.14
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct PowerConstraint {
    /// Reduction of the regulatory maximum power, in dB.
    pub local_constraint: u8,
}

// IEEE Std 802.11-2016, 9.4.2.19
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ChannelSwitchAnnouncement {
    pub mode: u8,
    pub new_channel: u8,
    pub channel_switch_count: u8,
}

// IEEE Std 802.11-2016, 9.4.2.47
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct MobilityDomain {
    pub mdid: u16,
    pub ft_capability_policy: u8,
}

// IEEE Std 802.11-2016, 9.4.2.56.2
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C, packed)]
pub struct HtCapabilityInfo(pub u16);

impl HtCapabilityInfo {
    bitfield_bit!(u16, ldpc_coding_cap, set_ldpc_coding_cap, with_ldpc_coding_cap, 0);
    bitfield_bit!(u16, chan_width_40, set_chan_width_40, with_chan_width_40, 1);
    bitfield_bit!(u16, sgi_20, set_sgi_20, with_sgi_20, 5);
    bitfield_bit!(u16, sgi_40, set_sgi_40, with_sgi_40, 6);
    bitfield_bit!(u16, tx_stbc, set_tx_stbc, with_tx_stbc, 7);
}

// IEEE Std 802.11-2016, 9.4.2.56.3
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C, packed)]
pub struct AmpduParams(pub u8);

impl AmpduParams {
    bitfield_field!(u8, max_ampdu_exponent, set_max_ampdu_exponent, with_max_ampdu_exponent, u8, 0, 2);
    bitfield_field!(u8, min_start_spacing, set_min_start_spacing, with_min_start_spacing, u8, 2, 3);
}

// IEEE Std 802.11-2016, 9.4.2.56: 26-byte fixed-size element.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct HtCapabilities {
    pub ht_cap_info: HtCapabilityInfo,
    pub ampdu_params: AmpduParams,
    pub mcs_set: [u8; 16],
    pub ht_ext_cap: u16,
    pub txbf_cap: u32,
    pub asel_cap: u8,
}

// IEEE Std 802.11-2016, 9.4.2.57: 22-byte fixed-size element.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct HtOperation {
    pub primary_channel: u8,
    pub ht_op_info: [u8; 5],
    pub basic_mcs_set: [u8; 16],
}

// IEEE Std 802.11-2016, 9.4.2.158: 12-byte fixed-size element.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct VhtCapabilities {
    pub vht_cap_info: u32,
    pub vht_mcs_nss: u64,
}

// IEEE Std 802.11-2016, 9.4.2.159: 5-byte fixed-size element.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct VhtOperation {
    pub vht_cbw: u8,
    pub center_freq_seg0: u8,
    pub center_freq_seg1: u8,
    pub basic_mcs_nss: u16,
}

// WMM Parameter Element (WFA OUI 00:50:F2, type 2, subtype 1): the interop
// carrier for the EDCA parameter set in practice.
pub const WMM_OUI: [u8; 3] = [0x00, 0x50, 0xf2];
pub const WMM_OUI_TYPE: u8 = 2;
pub const WMM_PARAM_OUI_SUBTYPE: u8 = 1;

#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C, packed)]
pub struct WmmAcParams {
    /// ACI (bits 5-6), ACM (bit 4), AIFSN (bits 0-3).
    pub aci_aifsn: u8,
    /// ECWmax (bits 4-7), ECWmin (bits 0-3).
    pub ecw_min_max: u8,
    pub txop_limit: u16,
}

impl WmmAcParams {
    pub fn aifsn(&self) -> u8 {
        self.aci_aifsn & 0x0f
    }

    pub fn acm(&self) -> bool {
        self.aci_aifsn & 0x10 != 0
    }
}

#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C, packed)]
pub struct WmmParam {
    pub qos_info: u8,
    pub reserved: u8,
    pub ac_be_params: WmmAcParams,
    pub ac_bk_params: WmmAcParams,
    pub ac_vi_params: WmmAcParams,
    pub ac_vo_params: WmmAcParams,
}
