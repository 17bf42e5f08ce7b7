// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    wlan_common::{
        channel::{Cbw, Channel},
        ie,
        mac::{Bssid, CapabilityInfo},
        Ssid, TimeUnit,
    },
};

/// Everything learned about a target or joined network. Built from a scan
/// result or a received beacon/probe response when a join begins, and
/// replaced wholesale on every join.
#[derive(Debug, Clone, PartialEq)]
pub struct BssInfo {
    pub bssid: Bssid,
    pub ssid: Ssid,
    pub capabilities: CapabilityInfo,
    pub beacon_interval: TimeUnit,
    pub channel: Channel,
    pub rates: Vec<ie::SupportedRate>,
    pub ht_cap: Option<ie::HtCapabilities>,
    pub ht_op: Option<ie::HtOperation>,
    pub vht_cap: Option<ie::VhtCapabilities>,
    pub vht_op: Option<ie::VhtOperation>,
    pub edca: Option<ie::WmmParam>,
    pub mobility_domain: Option<ie::MobilityDomain>,
    /// Regulatory power limit reduction for the operating channel, dB.
    pub power_constraint: Option<u8>,
    pub rssi_dbm: i8,
}

impl BssInfo {
    /// A minimal target for a join with a caller-supplied BSSID/channel;
    /// the rest fills in from association.
    pub fn from_target(bssid: Bssid, ssid: Ssid, channel: u8) -> Self {
        Self {
            bssid,
            ssid,
            capabilities: CapabilityInfo(0).with_ess(true),
            beacon_interval: TimeUnit::DEFAULT_BEACON_INTERVAL,
            channel: Channel::new(channel, Cbw::Cbw20),
            rates: vec![],
            ht_cap: None,
            ht_op: None,
            vht_cap: None,
            vht_op: None,
            edca: None,
            mobility_domain: None,
            power_constraint: None,
            rssi_dbm: 0,
        }
    }

    /// Builds the full join description from a beacon or probe response.
    /// Malformed elements are skipped individually; the frame as a whole is
    /// only rejected if its element chain cannot be walked at all.
    pub fn from_frame(
        bssid: Bssid,
        rx_channel: u8,
        rssi_dbm: i8,
        beacon_interval: u16,
        capabilities: CapabilityInfo,
        ies: &[u8],
    ) -> Self {
        let mut bss = Self::from_target(bssid, vec![], rx_channel);
        bss.capabilities = capabilities;
        bss.beacon_interval = TimeUnit(beacon_interval);
        bss.rssi_dbm = rssi_dbm;
        for (id, body) in ie::Reader::new(ies) {
            match id {
                ie::Id::SSID => {
                    if let Ok(ssid) = ie::parse_ssid(body) {
                        bss.ssid = ssid.to_vec();
                    }
                }
                ie::Id::SUPPORTED_RATES | ie::Id::EXTENDED_SUPPORTED_RATES => {
                    if let Ok(rates) = ie::parse_supported_rates(body) {
                        bss.rates.extend(rates.iter().copied());
                    }
                }
                ie::Id::DSSS_PARAM_SET => {
                    if let Ok(dsss) = ie::parse_dsss_param_set(body) {
                        bss.channel.primary = dsss.current_channel;
                    }
                }
                ie::Id::HT_CAPABILITIES => {
                    bss.ht_cap = ie::parse_ht_capabilities(body).ok().map(|v| *v);
                }
                ie::Id::HT_OPERATION => {
                    bss.ht_op = ie::parse_ht_operation(body).ok().map(|v| *v);
                }
                ie::Id::VHT_CAPABILITIES => {
                    bss.vht_cap = ie::parse_vht_capabilities(body).ok().map(|v| *v);
                }
                ie::Id::VHT_OPERATION => {
                    bss.vht_op = ie::parse_vht_operation(body).ok().map(|v| *v);
                }
                ie::Id::MOBILITY_DOMAIN => {
                    bss.mobility_domain = ie::parse_mobility_domain(body).ok().map(|v| *v);
                }
                ie::Id::POWER_CONSTRAINT => {
                    bss.power_constraint =
                        ie::parse_power_constraint(body).ok().map(|v| v.local_constraint);
                }
                ie::Id::VENDOR_SPECIFIC => {
                    if let Ok(wmm) = ie::parse_vendor_wmm_param(body) {
                        bss.edca = Some(*wmm);
                    }
                }
                _ => {}
            }
        }
        bss
    }

    /// The subset of the rate set the BSS marked as basic (required).
    pub fn basic_rates(&self) -> Vec<ie::SupportedRate> {
        self.rates.iter().filter(|r| r.basic()).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_frame_parses_elements() {
        #[rustfmt::skip]
        let ies = [
            0, 3, b'f', b'o', b'o', // SSID
            1, 4, 0x82, 0x84, 0x0c, 0x12, // supported rates
            3, 1, 11, // DSSS param set
            54, 3, 0x21, 0x43, 0x01, // mobility domain
            32, 1, 3, // power constraint
        ];
        let bss = BssInfo::from_frame(
            Bssid([1; 6]),
            6,
            -40,
            100,
            CapabilityInfo(0).with_ess(true),
            &ies[..],
        );
        assert_eq!(bss.ssid, b"foo".to_vec());
        assert_eq!(bss.rates.len(), 4);
        // The DSSS parameter set wins over the receive channel.
        assert_eq!(bss.channel.primary, 11);
        assert_eq!(bss.mobility_domain.map(|m| { m.mdid }), Some(0x4321));
        assert_eq!(bss.power_constraint, Some(3));
        assert_eq!(bss.basic_rates().len(), 2);
        assert_eq!(bss.rssi_dbm, -40);
    }

    #[test]
    fn malformed_element_is_skipped_not_fatal() {
        #[rustfmt::skip]
        let ies = [
            0, 3, b'b', b'a', b'r', // SSID
            45, 2, 0, 0, // HT capabilities with a bogus length
        ];
        let bss = BssInfo::from_frame(Bssid([1; 6]), 1, -50, 100, CapabilityInfo(0), &ies[..]);
        assert_eq!(bss.ssid, b"bar".to_vec());
        assert!(bss.ht_cap.is_none());
    }

    #[test]
    fn from_target_defaults() {
        let bss = BssInfo::from_target(Bssid([2; 6]), b"net".to_vec(), 36);
        assert_eq!(bss.channel.primary, 36);
        assert_eq!(bss.beacon_interval, TimeUnit::DEFAULT_BEACON_INTERVAL);
        assert!(bss.rates.is_empty());
    }
}
