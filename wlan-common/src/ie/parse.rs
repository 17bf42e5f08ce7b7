// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::{
        ChannelSwitchAnnouncement, DsssParamSet, HtCapabilities, HtOperation, MobilityDomain,
        PowerConstraint, SupportedRate, TimHeader, TimView, VhtCapabilities, VhtOperation,
        WmmParam, SSID_MAX_LEN, TIM_MAX_BITMAP_LEN, WMM_OUI, WMM_OUI_TYPE, WMM_PARAM_OUI_SUBTYPE,
    },
    crate::{buffer_reader::BufferReader, error::FrameParseError},
    zerocopy::{ByteSlice, LayoutVerified},
};

macro_rules! validate {
    ($condition:expr, $error:expr) => {
        if !$condition {
            return Err($error);
        }
    };
}

pub fn parse_ssid<B: ByteSlice>(raw_body: B) -> Result<B, FrameParseError> {
    validate!(raw_body.len() <= SSID_MAX_LEN, FrameParseError::UnexpectedBodyLen("SSID"));
    Ok(raw_body)
}

pub fn parse_supported_rates<B: ByteSlice>(
    raw_body: B,
) -> Result<LayoutVerified<B, [SupportedRate]>, FrameParseError> {
    validate!(!raw_body.is_empty(), FrameParseError::UnexpectedBodyLen("Supported Rates"));
    // Some APs advertise more than the eight rates the element is specified
    // to carry; tolerate them on the parse side.
    LayoutVerified::new_slice_unaligned(raw_body)
        .ok_or(FrameParseError::UnexpectedBodyLen("Supported Rates"))
}

pub fn parse_dsss_param_set<B: ByteSlice>(
    raw_body: B,
) -> Result<LayoutVerified<B, DsssParamSet>, FrameParseError> {
    LayoutVerified::new_unaligned(raw_body)
        .ok_or(FrameParseError::UnexpectedBodyLen("DSSS Parameter Set"))
}

pub fn parse_tim<B: ByteSlice>(raw_body: B) -> Result<TimView<B>, FrameParseError> {
    let mut reader = BufferReader::new(raw_body);
    let header = reader
        .read::<TimHeader>()
        .ok_or(FrameParseError::BufferTooShort("TIM header"))?;
    let bitmap = reader.into_remaining();
    validate!(!bitmap.is_empty(), FrameParseError::UnexpectedBodyLen("TIM bitmap empty"));
    validate!(
        bitmap.len() <= TIM_MAX_BITMAP_LEN,
        FrameParseError::UnexpectedBodyLen("TIM bitmap too long")
    );
    Ok(TimView { header: *header, bitmap })
}

pub fn parse_country<B: ByteSlice>(
    raw_body: B,
) -> Result<super::CountryView<B>, FrameParseError> {
    let mut reader = BufferReader::new(raw_body);
    let alpha2 = reader.read_bytes(2).ok_or(FrameParseError::BufferTooShort("Country"))?;
    let alpha2 = [alpha2[0], alpha2[1]];
    let environment = reader.read_byte().ok_or(FrameParseError::BufferTooShort("Country"))?;
    Ok(super::CountryView { alpha2, environment, subbands: reader.into_remaining() })
}

pub fn parse_power_constraint<B: ByteSlice>(
    raw_body: B,
) -> Result<LayoutVerified<B, PowerConstraint>, FrameParseError> {
    LayoutVerified::new_unaligned(raw_body)
        .ok_or(FrameParseError::UnexpectedBodyLen("Power Constraint"))
}

pub fn parse_channel_switch_announcement<B: ByteSlice>(
    raw_body: B,
) -> Result<LayoutVerified<B, ChannelSwitchAnnouncement>, FrameParseError> {
    LayoutVerified::new_unaligned(raw_body)
        .ok_or(FrameParseError::UnexpectedBodyLen("Channel Switch Announcement"))
}

pub fn parse_mobility_domain<B: ByteSlice>(
    raw_body: B,
) -> Result<LayoutVerified<B, MobilityDomain>, FrameParseError> {
    LayoutVerified::new_unaligned(raw_body)
        .ok_or(FrameParseError::UnexpectedBodyLen("Mobility Domain"))
}

pub fn parse_ht_capabilities<B: ByteSlice>(
    raw_body: B,
) -> Result<LayoutVerified<B, HtCapabilities>, FrameParseError> {
    LayoutVerified::new_unaligned(raw_body)
        .ok_or(FrameParseError::UnexpectedBodyLen("HT Capabilities"))
}

pub fn parse_ht_operation<B: ByteSlice>(
    raw_body: B,
) -> Result<LayoutVerified<B, HtOperation>, FrameParseError> {
    LayoutVerified::new_unaligned(raw_body)
        .ok_or(FrameParseError::UnexpectedBodyLen("HT Operation"))
}

pub fn parse_vht_capabilities<B: ByteSlice>(
    raw_body: B,
) -> Result<LayoutVerified<B, VhtCapabilities>, FrameParseError> {
    LayoutVerified::new_unaligned(raw_body)
        .ok_or(FrameParseError::UnexpectedBodyLen("VHT Capabilities"))
}

pub fn parse_vht_operation<B: ByteSlice>(
    raw_body: B,
) -> Result<LayoutVerified<B, VhtOperation>, FrameParseError> {
    LayoutVerified::new_unaligned(raw_body)
        .ok_or(FrameParseError::UnexpectedBodyLen("VHT Operation"))
}

/// Parses the WMM Parameter vendor element, the carrier of the EDCA
/// parameter set. The body passed in is the full vendor-element body,
/// starting at the OUI.
pub fn parse_vendor_wmm_param<B: ByteSlice>(
    raw_body: B,
) -> Result<LayoutVerified<B, WmmParam>, FrameParseError> {
    let mut reader = BufferReader::new(raw_body);
    let prefix = reader
        .read_bytes(6)
        .ok_or(FrameParseError::BufferTooShort("WMM Parameter prefix"))?;
    validate!(
        prefix[0..3] == WMM_OUI[..]
            && prefix[3] == WMM_OUI_TYPE
            && prefix[4] == WMM_PARAM_OUI_SUBTYPE,
        FrameParseError::InvalidFieldValue("WMM Parameter OUI/subtype")
    );
    LayoutVerified::new_unaligned(reader.into_remaining())
        .ok_or(FrameParseError::UnexpectedBodyLen("WMM Parameter"))
}
