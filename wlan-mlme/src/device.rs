// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The capability interface the control plane drives the radio through.
//! Every call that involves a hardware round trip completes asynchronously
//! with a matching [`crate::DriverEvent`]; nothing here blocks.

use {
    crate::{error::Error, VifId},
    wlan_common::{
        channel::{Cbw, Channel},
        ie::SupportedRate,
        mac::{Bssid, CapabilityInfo, MacAddr},
        security::CipherSuite,
        TimeUnit,
    },
};

pub type TxToken = u64;

/// Hardware transmit queues, the WMM access categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessCategory {
    Background,
    BestEffort,
    Video,
    Voice,
}

/// The standard TID-to-AC mapping, IEEE Std 802.11-2016, Table 10-1.
pub fn ac_for_tid(tid: u16) -> AccessCategory {
    match tid & 0b111 {
        1 | 2 => AccessCategory::Background,
        0 | 3 => AccessCategory::BestEffort,
        4 | 5 => AccessCategory::Video,
        _ => AccessCategory::Voice,
    }
}

/// One serialized frame handed to a hardware transmit queue together with
/// the rate decision and the completion token.
#[derive(Debug, Clone, PartialEq)]
pub struct TxRequest {
    pub token: TxToken,
    pub tc: AccessCategory,
    /// Initial and fallback rate indices from the rate selector.
    pub tx_vector: u16,
    pub fallback_tx_vector: u16,
    pub frame: Vec<u8>,
}

/// BSS parameters are programmed one at a time; each is an independent
/// hardware round trip completed by `DriverEvent::BssParamComplete`.
#[derive(Debug, Clone, PartialEq)]
pub enum BssParam {
    Bssid(Bssid),
    BasicRateSet(Vec<SupportedRate>),
    BeaconInterval(TimeUnit),
    Edca(wlan_common::ie::WmmParam),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    Active,
    Idle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerDescriptor {
    pub vif: VifId,
    pub addr: MacAddr,
    pub aid: u16,
    pub capabilities: CapabilityInfo,
    pub rates: Vec<SupportedRate>,
    pub bandwidth: Cbw,
    pub qos: bool,
}

/// Key material programmed into a hardware key slot.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySlot {
    pub slot: u8,
    pub key_id: u8,
    pub cipher: CipherSuite,
    pub key: Vec<u8>,
    /// Peer address, or the broadcast address for group keys.
    pub addr: MacAddr,
}

pub trait Device {
    /// Submits one frame to the transmit queue for its traffic class.
    /// Completion arrives as `DriverEvent::TxStatusReport`.
    fn send_frame(&mut self, req: TxRequest) -> Result<(), Error>;

    /// Tunes to a channel (connection or scan dwell). Completion arrives as
    /// `DriverEvent::ChannelComplete`.
    fn set_channel(&mut self, channel: Channel) -> Result<(), Error>;

    /// Allocates a hardware peer slot. Completion arrives as
    /// `DriverEvent::PeerAddComplete` with the assigned index or a failure.
    fn add_peer(&mut self, desc: PeerDescriptor) -> Result<(), Error>;

    /// Releases a hardware peer slot. Completion arrives as
    /// `DriverEvent::PeerDelComplete`.
    fn del_peer(&mut self, addr: MacAddr) -> Result<(), Error>;

    /// Programs one BSS parameter. Completion arrives as
    /// `DriverEvent::BssParamComplete`.
    fn set_bss_param(&mut self, vif: VifId, param: BssParam) -> Result<(), Error>;

    fn set_key(&mut self, key: KeySlot) -> Result<(), Error>;

    /// Drives the radio to an explicit state. Completion arrives as
    /// `DriverEvent::RadioStateComplete`.
    fn set_radio_state(&mut self, vif: VifId, state: RadioState) -> Result<(), Error>;

    /// Delivers a decapsulated received payload to the network stack.
    fn deliver_eth_frame(&mut self, vif: VifId, bytes: &[u8]) -> Result<(), Error>;
}
