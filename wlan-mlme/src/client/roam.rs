// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Roaming: watches link quality while associated and, when it degrades,
//! ranks scan candidates with hysteresis so the station only moves to a
//! clearly better BSS instead of flapping between comparable ones.

use {
    crate::client::scanner::ScanResultEntry,
    std::time::Duration,
    wlan_common::{energy::DecibelMilliWatt, ewma_signal::EwmaSignalStrength, mac::Bssid},
};

/// Roaming behavior knobs. The thresholds are tunables, not protocol
/// constants; deployments adjust them per antenna and environment.
#[derive(Clone, Debug, PartialEq)]
pub struct RoamConfig {
    /// Average signal below this starts background candidate scans.
    pub trigger_dbm: i8,
    /// A candidate must beat the current average by this margin.
    pub hysteresis_db: u8,
    /// Window of the exponentially weighted signal average.
    pub ewma_window: usize,
    /// How often the roam check fires while associated.
    pub scan_interval: Duration,
    pub enabled: bool,
}

impl Default for RoamConfig {
    fn default() -> Self {
        Self {
            trigger_dbm: -75,
            hysteresis_db: 6,
            ewma_window: 10,
            scan_interval: Duration::from_secs(30),
            enabled: true,
        }
    }
}

#[derive(Debug)]
pub struct RoamMonitor {
    signal: EwmaSignalStrength,
    config: RoamConfig,
}

impl RoamMonitor {
    pub fn new(config: RoamConfig, initial_rssi_dbm: i8) -> Self {
        Self {
            signal: EwmaSignalStrength::new(config.ewma_window, DecibelMilliWatt(initial_rssi_dbm)),
            config,
        }
    }

    pub fn on_signal(&mut self, rssi_dbm: i8) {
        self.signal.update_average(DecibelMilliWatt(rssi_dbm));
    }

    pub fn average_dbm(&self) -> i8 {
        self.signal.dbm().0
    }

    pub fn should_scan(&self) -> bool {
        self.config.enabled && self.average_dbm() < self.config.trigger_dbm
    }

    /// Ranks candidates by signal strength and returns the best one that
    /// clears the hysteresis margin over the current link, if any.
    pub fn pick_candidate(
        &self,
        results: &[ScanResultEntry],
        current_bssid: Bssid,
        ssid: &[u8],
    ) -> Option<ScanResultEntry> {
        let threshold = self.average_dbm() as i16 + self.config.hysteresis_db as i16;
        results
            .iter()
            .filter(|entry| entry.bssid != current_bssid && entry.ssid == ssid)
            .filter(|entry| entry.rssi_dbm as i16 > threshold)
            .max_by_key(|entry| entry.rssi_dbm)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, wlan_common::mac::CapabilityInfo};

    fn entry(bssid: [u8; 6], ssid: &[u8], rssi_dbm: i8) -> ScanResultEntry {
        ScanResultEntry {
            bssid: Bssid(bssid),
            ssid: ssid.to_vec(),
            channel: 6,
            rssi_dbm,
            capabilities: CapabilityInfo(0),
        }
    }

    #[test]
    fn scan_triggers_below_threshold() {
        let mut monitor = RoamMonitor::new(RoamConfig::default(), -60);
        assert!(!monitor.should_scan());
        for _ in 0..50 {
            monitor.on_signal(-85);
        }
        assert!(monitor.should_scan());
    }

    #[test]
    fn disabled_monitor_never_scans() {
        let config = RoamConfig { enabled: false, ..Default::default() };
        let monitor = RoamMonitor::new(config, -90);
        assert!(!monitor.should_scan());
    }

    #[test]
    fn candidate_must_clear_hysteresis() {
        let monitor = RoamMonitor::new(RoamConfig::default(), -80);
        let current = Bssid([1; 6]);
        // Within the hysteresis margin: not worth moving.
        let marginal = [entry([2; 6], b"net", -76)];
        assert_eq!(monitor.pick_candidate(&marginal, current, b"net"), None);
        // Clearly better: picked.
        let better = [entry([2; 6], b"net", -76), entry([3; 6], b"net", -60)];
        let picked = monitor.pick_candidate(&better, current, b"net").expect("candidate");
        assert_eq!(picked.bssid, Bssid([3; 6]));
    }

    #[test]
    fn candidate_filters_ssid_and_self() {
        let monitor = RoamMonitor::new(RoamConfig::default(), -80);
        let current = Bssid([1; 6]);
        let results = [
            entry([1; 6], b"net", -40), // the current BSS itself
            entry([4; 6], b"other", -40), // different network
        ];
        assert_eq!(monitor.pick_candidate(&results, current, b"net"), None);
    }
}
