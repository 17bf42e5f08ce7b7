// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::{
        ChannelSwitchAnnouncement, DsssParamSet, Header, HtCapabilities, Id, MobilityDomain,
        PowerConstraint, TimHeader, VhtCapabilities, IE_MAX_LEN, SSID_MAX_LEN,
        SUPPORTED_RATES_MAX_LEN, TIM_MAX_BITMAP_LEN,
    },
    crate::{appendable::Appendable, error::FrameWriteError},
    zerocopy::AsBytes,
};

fn write_ie<B: Appendable>(
    buf: &mut B,
    id: Id,
    body: &[u8],
) -> Result<(), FrameWriteError> {
    if body.len() > IE_MAX_LEN {
        return Err(FrameWriteError::new_invalid_data("IE body exceeds 255 bytes"));
    }
    if !buf.can_append(std::mem::size_of::<Header>() + body.len()) {
        return Err(FrameWriteError::BufferTooSmall);
    }
    buf.append_value(&Header { id, body_len: body.len() as u8 })?;
    buf.append_bytes(body)?;
    Ok(())
}

pub fn write_ssid<B: Appendable>(buf: &mut B, ssid: &[u8]) -> Result<(), FrameWriteError> {
    if ssid.len() > SSID_MAX_LEN {
        return Err(FrameWriteError::new_invalid_data("SSID longer than 32 bytes"));
    }
    write_ie(buf, Id::SSID, ssid)
}

pub fn write_supported_rates<B: Appendable>(
    buf: &mut B,
    rates: &[u8],
) -> Result<(), FrameWriteError> {
    if rates.is_empty() {
        return Err(FrameWriteError::new_invalid_data("no rates to write"));
    }
    if rates.len() > SUPPORTED_RATES_MAX_LEN {
        return Err(FrameWriteError::new_invalid_data("too many rates for Supported Rates"));
    }
    write_ie(buf, Id::SUPPORTED_RATES, rates)
}

pub fn write_ext_supported_rates<B: Appendable>(
    buf: &mut B,
    rates: &[u8],
) -> Result<(), FrameWriteError> {
    if rates.is_empty() {
        return Err(FrameWriteError::new_invalid_data("no rates to write"));
    }
    write_ie(buf, Id::EXTENDED_SUPPORTED_RATES, rates)
}

pub fn write_dsss_param_set<B: Appendable>(
    buf: &mut B,
    dsss: &DsssParamSet,
) -> Result<(), FrameWriteError> {
    write_ie(buf, Id::DSSS_PARAM_SET, dsss.as_bytes())
}

pub fn write_tim<B: Appendable>(
    buf: &mut B,
    header: &TimHeader,
    bitmap: &[u8],
) -> Result<(), FrameWriteError> {
    if bitmap.is_empty() {
        return Err(FrameWriteError::new_invalid_data("TIM bitmap is empty"));
    }
    if bitmap.len() > TIM_MAX_BITMAP_LEN {
        return Err(FrameWriteError::new_invalid_data("TIM bitmap too long"));
    }
    if !buf.can_append(std::mem::size_of::<Header>() + std::mem::size_of::<TimHeader>() + bitmap.len())
    {
        return Err(FrameWriteError::BufferTooSmall);
    }
    let body_len = std::mem::size_of::<TimHeader>() + bitmap.len();
    buf.append_value(&Header { id: Id::TIM, body_len: body_len as u8 })?;
    buf.append_value(header)?;
    buf.append_bytes(bitmap)?;
    Ok(())
}

pub fn write_country<B: Appendable>(
    buf: &mut B,
    alpha2: [u8; 2],
    environment: u8,
    subbands: &[u8],
) -> Result<(), FrameWriteError> {
    // The element is padded with a zero byte to an even body length,
    // IEEE Std 802.11-2016, 9.4.2.9.
    let unpadded = 3 + subbands.len();
    let body_len = unpadded + (unpadded % 2);
    if body_len > IE_MAX_LEN {
        return Err(FrameWriteError::new_invalid_data("Country body too large"));
    }
    if !buf.can_append(std::mem::size_of::<Header>() + body_len) {
        return Err(FrameWriteError::BufferTooSmall);
    }
    buf.append_value(&Header { id: Id::COUNTRY, body_len: body_len as u8 })?;
    buf.append_bytes(&[alpha2[0], alpha2[1], environment])?;
    buf.append_bytes(subbands)?;
    if unpadded % 2 != 0 {
        buf.append_byte(0)?;
    }
    Ok(())
}

pub fn write_power_constraint<B: Appendable>(
    buf: &mut B,
    constraint: &PowerConstraint,
) -> Result<(), FrameWriteError> {
    write_ie(buf, Id::POWER_CONSTRAINT, constraint.as_bytes())
}

pub fn write_channel_switch_announcement<B: Appendable>(
    buf: &mut B,
    csa: &ChannelSwitchAnnouncement,
) -> Result<(), FrameWriteError> {
    write_ie(buf, Id::CHANNEL_SWITCH_ANNOUNCEMENT, csa.as_bytes())
}

pub fn write_mobility_domain<B: Appendable>(
    buf: &mut B,
    mde: &MobilityDomain,
) -> Result<(), FrameWriteError> {
    write_ie(buf, Id::MOBILITY_DOMAIN, mde.as_bytes())
}

pub fn write_ht_capabilities<B: Appendable>(
    buf: &mut B,
    ht_cap: &HtCapabilities,
) -> Result<(), FrameWriteError> {
    write_ie(buf, Id::HT_CAPABILITIES, ht_cap.as_bytes())
}

pub fn write_vht_capabilities<B: Appendable>(
    buf: &mut B,
    vht_cap: &VhtCapabilities,
) -> Result<(), FrameWriteError> {
    write_ie(buf, Id::VHT_CAPABILITIES, vht_cap.as_bytes())
}

/// Appends caller-supplied, already-serialized elements verbatim.
pub fn write_raw_ies<B: Appendable>(buf: &mut B, ies: &[u8]) -> Result<(), FrameWriteError> {
    if !buf.can_append(ies.len()) {
        return Err(FrameWriteError::BufferTooSmall);
    }
    buf.append_bytes(ies)?;
    Ok(())
}
