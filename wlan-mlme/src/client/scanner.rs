// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The scan engine: walks the channel list band by band, probes actively
//! when asked, and maintains the bounded table of discovered networks.
//! Scans are started for three reasons (user discovery, a pending join, a
//! roam check); the completion is routed by kind.

use {
    crate::{
        client::bss::BssInfo,
        device::Device,
        error::Error,
        timer::EventId,
        tx::TxPipeline,
        Context, ScanRequest, ScanStatus, ScanType, TimedEvent, VifId,
    },
    log::warn,
    std::collections::VecDeque,
    wlan_common::{
        channel::{band_of, Band, Cbw, Channel},
        mac::{Bssid, CapabilityInfo, MacAddr},
        Ssid, TimeUnit,
    },
};

pub const SCAN_RESULT_TABLE_SIZE: usize = 32;

#[derive(Clone, Debug, PartialEq)]
pub struct ScanConfig {
    pub min_channel_time: TimeUnit,
    pub max_channel_time: TimeUnit,
    pub passive_channel_time: TimeUnit,
    /// Byte cap for caller-supplied extra probe-request elements.
    pub probe_extra_ies_max: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_channel_time: TimeUnit(100),
            max_channel_time: TimeUnit(300),
            passive_channel_time: TimeUnit(300),
            probe_extra_ies_max: 64,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinTarget {
    pub ssid: Ssid,
    pub bssid: Option<Bssid>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScanKind {
    Discovery { vif: VifId },
    Join { vif: VifId, target: JoinTarget },
    Roam { vif: VifId },
}

#[derive(Debug, PartialEq)]
pub enum JoinScanResult {
    Found(Box<BssInfo>),
    NotFound,
}

/// Raised when the last band is exhausted; the owner routes it by kind.
#[derive(Debug, PartialEq)]
pub enum ScanCompletion {
    Discovery { vif: VifId, status: ScanStatus },
    Join { vif: VifId, result: JoinScanResult },
    Roam { vif: VifId },
}

/// One entry of the discovered-network table, snapshot form.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanResultEntry {
    pub bssid: Bssid,
    pub ssid: Ssid,
    pub channel: u8,
    pub rssi_dbm: i8,
    pub capabilities: CapabilityInfo,
}

#[derive(Debug)]
struct ScanResultSlot {
    bssid: Bssid,
    ssid: Ssid,
    channel: u8,
    /// Best signal seen for this BSS across all receptions.
    rssi_dbm: i8,
    capabilities: CapabilityInfo,
}

/// Fixed-capacity table keyed by BSSID. Allocation fails silently once the
/// table is full: the frame is ignored, never an error.
#[derive(Default)]
pub struct ScanResultTable {
    slots: [Option<ScanResultSlot>; SCAN_RESULT_TABLE_SIZE],
}

impl ScanResultTable {
    fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    fn update(
        &mut self,
        bssid: Bssid,
        channel: u8,
        rssi_dbm: i8,
        capabilities: CapabilityInfo,
        ssid: &[u8],
    ) {
        if let Some(slot) = self.slots.iter_mut().flatten().find(|s| s.bssid == bssid) {
            slot.capabilities = capabilities;
            if rssi_dbm >= slot.rssi_dbm {
                slot.rssi_dbm = rssi_dbm;
                // When a BSS is heard on multiple channels, keep the one
                // with the strongest signal.
                slot.channel = channel;
            }
            // Hidden-SSID beacons never blank a previously learned name.
            if !ssid.is_empty() {
                slot.ssid = ssid.to_vec();
            }
            return;
        }
        match self.slots.iter_mut().position(|s| s.is_none()) {
            Some(free) => {
                self.slots[free] = Some(ScanResultSlot {
                    bssid,
                    ssid: ssid.to_vec(),
                    channel,
                    rssi_dbm,
                    capabilities,
                });
            }
            None => {} // Table full: the frame is ignored.
        }
    }

    fn snapshot(&self) -> Vec<ScanResultEntry> {
        self.slots
            .iter()
            .flatten()
            .map(|s| ScanResultEntry {
                bssid: s.bssid,
                ssid: s.ssid.clone(),
                channel: s.channel,
                rssi_dbm: s.rssi_dbm,
                capabilities: s.capabilities,
            })
            .collect()
    }

    fn matches_any(&self, ssids: &[Ssid], bssid: &Option<Bssid>) -> bool {
        self.slots.iter().flatten().any(|s| {
            bssid.map_or(false, |b| b == s.bssid) || ssids.iter().any(|ssid| *ssid == s.ssid)
        })
    }
}

struct ScanInProgress {
    kind: ScanKind,
    req: ScanRequest,
    vif_addr: MacAddr,
    remaining: VecDeque<u8>,
    dwell_timer: Option<EventId>,
    /// Full join description, filled once the target is heard.
    bss_info: Option<Box<BssInfo>>,
}

pub struct Scanner {
    state: Option<ScanInProgress>,
    results: ScanResultTable,
}

impl Scanner {
    pub fn new() -> Self {
        Self { state: None, results: ScanResultTable::default() }
    }

    pub fn is_scanning(&self) -> bool {
        self.state.is_some()
    }

    pub fn results(&self) -> Vec<ScanResultEntry> {
        self.results.snapshot()
    }

    /// Starts a scan. Channels are walked grouped by frequency band: all of
    /// 2.4 GHz before any of 5 GHz.
    pub fn start<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        vif_addr: MacAddr,
        kind: ScanKind,
        req: ScanRequest,
    ) -> Result<(), Error> {
        if self.state.is_some() {
            return Err(Error::Refused("scan already in progress"));
        }
        let channels: Vec<u8> = if req.channels.is_empty() {
            ctx.config.device_info.supported_channels.clone()
        } else {
            req.channels.clone()
        };
        if channels.is_empty() {
            return Err(Error::Refused("no channels to scan"));
        }
        let mut remaining: VecDeque<u8> = channels
            .iter()
            .copied()
            .filter(|c| band_of(*c) == Band::TwoGhz)
            .chain(channels.iter().copied().filter(|c| band_of(*c) == Band::FiveGhz))
            .collect();

        // Results from a prior pass persist while a join is in progress;
        // any other scan invalidates the table up front.
        if !matches!(kind, ScanKind::Join { .. }) {
            self.results.clear();
        }

        let first = remaining.pop_front().unwrap();
        ctx.device.set_channel(Channel::new(first, Cbw::Cbw20))?;
        self.state = Some(ScanInProgress {
            kind,
            req,
            vif_addr,
            remaining,
            dwell_timer: None,
            bss_info: None,
        });
        Ok(())
    }

    /// The radio finished tuning: open the dwell window and, when probing
    /// actively, transmit the probe request.
    pub fn handle_channel_complete<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        tx: &mut TxPipeline,
    ) {
        let scan = match &mut self.state {
            Some(scan) => scan,
            None => return,
        };
        let dwell = match scan.req.scan_type {
            ScanType::Active => ctx.config.scan.max_channel_time,
            ScanType::Passive => ctx.config.scan.passive_channel_time,
        };
        if let ScanType::Active = scan.req.scan_type {
            let ssid: &[u8] = scan.req.ssids.first().map(|s| &s[..]).unwrap_or(&[]);
            let vif_addr = scan.vif_addr;
            let bssid = scan.req.bssid;
            let extra = scan.req.extra_ies.clone();
            if let Err(e) = tx.send_probe_req_frame(ctx, vif_addr, bssid, ssid, &extra) {
                warn!("failed to send probe request: {}", e);
            }
        }
        let scan = self.state.as_mut().unwrap();
        scan.dwell_timer =
            Some(ctx.timer.schedule_after(dwell.into(), TimedEvent::ScanDwell));
    }

    /// The dwell window closed: advance to the next channel, crossing into
    /// the next band only when the current one is exhausted, or finish.
    pub fn handle_dwell_timeout<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
    ) -> Option<ScanCompletion> {
        let scan = self.state.as_mut()?;
        scan.dwell_timer = None;
        if let Some(next) = scan.remaining.pop_front() {
            if let Err(e) = ctx.device.set_channel(Channel::new(next, Cbw::Cbw20)) {
                warn!("failed to advance scan channel: {}", e);
                return self.finish();
            }
            return None;
        }
        self.finish()
    }

    fn finish(&mut self) -> Option<ScanCompletion> {
        let scan = self.state.take()?;
        Some(match scan.kind {
            ScanKind::Discovery { vif } => {
                let filtered = !scan.req.ssids.is_empty() || scan.req.bssid.is_some();
                let status = if filtered
                    && !self.results.matches_any(&scan.req.ssids, &scan.req.bssid)
                {
                    ScanStatus::NotFound
                } else {
                    ScanStatus::Success
                };
                ScanCompletion::Discovery { vif, status }
            }
            ScanKind::Join { vif, .. } => ScanCompletion::Join {
                vif,
                result: match scan.bss_info {
                    Some(bss) => JoinScanResult::Found(bss),
                    None => JoinScanResult::NotFound,
                },
            },
            ScanKind::Roam { vif } => ScanCompletion::Roam { vif },
        })
    }

    /// Beacon/probe-response intake during a scan window.
    pub fn handle_beacon_or_probe_resp(
        &mut self,
        bssid: Bssid,
        rx_channel: u8,
        rssi_dbm: i8,
        beacon_interval: u16,
        capabilities: CapabilityInfo,
        ies: &[u8],
    ) {
        let scan = match &mut self.state {
            Some(scan) => scan,
            None => return,
        };
        let bss = BssInfo::from_frame(bssid, rx_channel, rssi_dbm, beacon_interval, capabilities, ies);
        self.results.update(bssid, bss.channel.primary, rssi_dbm, capabilities, &bss.ssid);

        // While joining, additionally capture the full description the
        // Connection Manager needs.
        if let ScanKind::Join { target, .. } = &scan.kind {
            let matches = match target.bssid {
                Some(target_bssid) => target_bssid == bssid,
                None => !target.ssid.is_empty() && target.ssid == bss.ssid,
            };
            if matches {
                let better = scan
                    .bss_info
                    .as_ref()
                    .map_or(true, |current| bss.rssi_dbm >= current.rssi_dbm);
                if better {
                    scan.bss_info = Some(Box::new(bss));
                }
            }
        }
    }

    /// Cancels any scan in progress (disconnect or reset path).
    pub fn abort<D: Device>(&mut self, ctx: &mut Context<D>) {
        if let Some(scan) = self.state.take() {
            if let Some(timer) = scan.dwell_timer {
                ctx.timer.cancel_event(timer);
            }
        }
    }
}
