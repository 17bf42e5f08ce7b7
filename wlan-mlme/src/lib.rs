// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Station-side IEEE Std 802.11 MAC control plane: connection
//! establishment, scanning, power save, BlockAck negotiation and the
//! per-frame security/framing pipeline, driven by a single-threaded
//! cooperative event loop. The hardware below is reached only through the
//! [`device::Device`] capability trait; the radio posts [`DriverEvent`]s
//! back through an unbounded queue from any context.

pub mod block_ack;
pub mod client;
pub mod device;
pub mod error;
pub mod key;
pub mod peer;
pub mod rates;
pub mod timer;
pub mod tx;

use {
    anyhow::bail,
    block_ack::{BaRole, BlockAckConfig, BlockAckManager},
    client::{
        scanner::{ScanCompletion, ScanConfig, ScanKind, Scanner},
        Client, ClientCtx, ClientEvent, LinkInfo, PowerSaveConfig, RoamConfig,
    },
    device::{Device, RadioState, TxToken},
    error::Error,
    futures::{channel::mpsc, select, StreamExt},
    log::{debug, error, info, warn},
    peer::PeerTable,
    timer::{EventId, Scheduler, Timer},
    tx::{FrameKind, TxDescriptor, TxPipeline},
    wlan_common::{
        appendable::Appendable,
        buffer_reader::BufferReader,
        channel::Channel,
        ie,
        mac::{self, Bssid, MacAddr, ReasonCode, StatusCode},
        security::CipherSuite,
        Ssid,
    },
};

pub use client::scanner::ScanResultEntry;

const MAX_VIFS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VifId(pub u8);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacRole {
    Station,
    Ap,
    Mesh,
}

/// Static radio facts the control plane needs.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    pub addr: MacAddr,
    pub supported_channels: Vec<u8>,
    pub rates: Vec<ie::SupportedRate>,
    pub ht_capabilities: Option<ie::HtCapabilities>,
    pub vht_capabilities: Option<ie::VhtCapabilities>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MlmeConfig {
    pub device_info: DeviceInfo,
    pub scan: ScanConfig,
    pub ps: PowerSaveConfig,
    pub roam: RoamConfig,
    pub ba: BlockAckConfig,
}

impl MlmeConfig {
    pub fn new(device_info: DeviceInfo) -> Self {
        Self {
            device_info,
            scan: ScanConfig::default(),
            ps: PowerSaveConfig::default(),
            roam: RoamConfig::default(),
            ba: BlockAckConfig::default(),
        }
    }
}

/// Sink for notifications to the upper layer.
pub struct EventSink(mpsc::UnboundedSender<MlmeEvent>);

impl EventSink {
    pub fn new(sender: mpsc::UnboundedSender<MlmeEvent>) -> Self {
        EventSink(sender)
    }

    pub fn send(&self, event: MlmeEvent) {
        if let Err(e) = self.0.unbounded_send(event) {
            debug!("dropping MLME event; receiver gone: {}", e);
        }
    }
}

/// Shared handler context: the pieces every actor needs mutable access to
/// in a single-threaded, non-reentrant fashion.
pub struct Context<D> {
    pub config: MlmeConfig,
    pub device: D,
    pub timer: Timer<TimedEvent>,
    pub events: EventSink,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanType {
    Active,
    Passive,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectRequest {
    pub ssid: Ssid,
    pub bssid: Option<Bssid>,
    pub channel: Option<u8>,
    pub scan_type: ScanType,
    pub cipher: CipherSuite,
    /// Pre-derived key material; `None` on a protected network leaves the
    /// logical port gated on key-exchange traffic.
    pub key: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScanRequest {
    pub ssids: Vec<Ssid>,
    pub bssid: Option<Bssid>,
    /// Empty means every supported channel.
    pub channels: Vec<u8>,
    pub scan_type: ScanType,
    /// Extra probe-request elements, subject to the configured byte cap.
    pub extra_ies: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectFailure {
    /// Another connect or disconnect is already in flight.
    Busy,
    /// No BSS matching the target was discovered.
    NotFound,
    /// The peer rejected an exchange with an explicit status.
    Rejected { status: StatusCode },
    TimedOut,
    NoResources,
    LinkLost,
    Canceled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectResult {
    Success,
    Failed(ConnectFailure),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStatus {
    Success,
    /// A caller-supplied SSID/BSSID filter matched nothing.
    NotFound,
    /// A scan was already running.
    Busy,
}

/// Upper-layer requests.
#[derive(Debug)]
pub enum MlmeRequest {
    Connect { vif: VifId, req: ConnectRequest },
    Disconnect { vif: VifId, reason: ReasonCode },
    Scan { vif: VifId, req: ScanRequest },
    SetPowerSave { vif: VifId, enabled: bool },
    GetScanResults { vif: VifId },
}

/// Upper-layer notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum MlmeEvent {
    ConnectConf { vif: VifId, result: ConnectResult },
    DisconnectConf { vif: VifId },
    ConnectionLost { vif: VifId, cause: ConnectFailure },
    ScanEnd { vif: VifId, status: ScanStatus },
    ScanResults { vif: VifId, results: Vec<ScanResultEntry> },
    PowerSaveConf { vif: VifId, enabled: bool },
    SignalReport { vif: VifId, rssi_dbm: i8 },
    RoamAttempt { vif: VifId, bssid: Bssid },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RxInfo {
    pub channel: Channel,
    pub rssi_dbm: i8,
}

/// Hardware transmit completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxStatus {
    pub success: bool,
    /// Whether the hardware considers the frame eligible for a software
    /// retry.
    pub retry_eligible: bool,
}

/// Everything the radio (or the platform timer) can tell the control
/// plane. Interrupt context posts these and returns; all processing
/// happens on the event loop.
#[derive(Debug)]
pub enum DriverEvent {
    /// Shut the event loop down.
    Stop,
    MacFrameRx { vif: VifId, bytes: Vec<u8>, rx_info: RxInfo },
    EthFrameTx { vif: VifId, bytes: Vec<u8> },
    TxStatusReport { token: TxToken, status: TxStatus },
    /// A set-channel or scan-dwell tune finished.
    ChannelComplete,
    PeerAddComplete { addr: MacAddr, hw_index: Option<u16> },
    PeerDelComplete { addr: MacAddr },
    BssParamComplete { vif: VifId, ok: bool },
    RadioStateComplete { vif: VifId, state: RadioState },
    /// Target beacon transmission time reached.
    Tbtt { vif: VifId },
    /// A scheduled timer deadline fired.
    Timeout { id: EventId },
    /// Fatal hardware fault; triggers the full reset path.
    HwError { code: u32 },
}

/// Events scheduled on the timer, recovered by id when the deadline fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimedEvent {
    ScanDwell,
    AuthTimeout { vif: VifId },
    AssocTimeout { vif: VifId },
    ConnStatusCheck { vif: VifId },
    PsKeepAlive { vif: VifId },
    RoamScan { vif: VifId },
    BaInactivity { peer: MacAddr, tid: u16, originator: bool },
}

struct Vif {
    role: MacRole,
    addr: MacAddr,
    active: bool,
    sta: Option<Client>,
}

/// The control plane: one logical actor per concern, all driven from one
/// event loop. No handler blocks; multi-step exchanges re-enter through
/// `DriverEvent`s.
pub struct Mlme<D: Device> {
    ctx: Context<D>,
    vifs: [Option<Vif>; MAX_VIFS],
    scanner: Scanner,
    block_ack: BlockAckManager,
    tx: TxPipeline,
    peers: PeerTable,
}

impl<D: Device> Mlme<D> {
    pub fn new(
        config: MlmeConfig,
        device: D,
        scheduler: Box<dyn Scheduler>,
        event_sink: mpsc::UnboundedSender<MlmeEvent>,
    ) -> Self {
        let block_ack = BlockAckManager::new(&config.ba);
        let tx = TxPipeline::new(std::sync::Arc::new(parking_lot::Mutex::new(
            rates::RateSelector::new(),
        )));
        Self {
            ctx: Context {
                config,
                device,
                timer: Timer::new(scheduler),
                events: EventSink::new(event_sink),
            },
            vifs: Default::default(),
            scanner: Scanner::new(),
            block_ack,
            tx,
            peers: PeerTable::new(),
        }
    }

    /// Registers a virtual interface. The platform owns the VIF for its
    /// lifetime; the returned index is how every request refers to it.
    pub fn add_vif(&mut self, role: MacRole, addr: MacAddr) -> Result<VifId, Error> {
        let free = self
            .vifs
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(Error::NoResources("interface table full"))?;
        let id = VifId(free as u8);
        let sta = match role {
            MacRole::Station => Some(Client::new(id, addr)),
            _ => None,
        };
        self.vifs[free] = Some(Vif { role, addr, active: true, sta });
        Ok(id)
    }

    pub fn remove_vif(&mut self, vif: VifId) {
        if let Some(mut slot) = self.vifs.get_mut(vif.0 as usize).and_then(|s| s.take()) {
            if let Some(client) = slot.sta.as_mut() {
                let mut cc = ClientCtx {
                    ctx: &mut self.ctx,
                    tx: &mut self.tx,
                    peers: &mut self.peers,
                    block_ack: &mut self.block_ack,
                    scanner: &mut self.scanner,
                };
                client.reset(&mut cc);
            }
            self.peers.remove_vif(vif);
        }
    }

    fn with_client<R>(
        &mut self,
        vif: VifId,
        f: impl FnOnce(&mut Client, &mut ClientCtx<'_, D>) -> R,
    ) -> Option<R> {
        let slot = self.vifs.get_mut(vif.0 as usize)?.as_mut()?;
        let client = slot.sta.as_mut()?;
        let mut cc = ClientCtx {
            ctx: &mut self.ctx,
            tx: &mut self.tx,
            peers: &mut self.peers,
            block_ack: &mut self.block_ack,
            scanner: &mut self.scanner,
        };
        Some(f(client, &mut cc))
    }

    fn station_vifs(&self) -> Vec<VifId> {
        self.vifs
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Some(vif) if vif.role == MacRole::Station && vif.active => Some(VifId(i as u8)),
                _ => None,
            })
            .collect()
    }

    fn station_link(&self, vif: VifId) -> Option<LinkInfo> {
        self.vifs
            .get(vif.0 as usize)?
            .as_ref()?
            .sta
            .as_ref()?
            .link_info()
    }

    fn vif_addr(&self, vif: VifId) -> Option<MacAddr> {
        self.vifs.get(vif.0 as usize)?.as_ref().map(|v| v.addr)
    }

    pub fn handle_mlme_request(&mut self, req: MlmeRequest) {
        match req {
            MlmeRequest::Connect { vif, req } => {
                if self.with_client(vif, |client, cc| client.handle_connect(cc, req)).is_none() {
                    warn!("connect request for unknown station interface {:?}", vif);
                }
            }
            MlmeRequest::Disconnect { vif, reason } => {
                self.with_client(vif, |client, cc| client.handle_disconnect(cc, reason, true));
            }
            MlmeRequest::Scan { vif, req } => {
                let addr = match self.vif_addr(vif) {
                    Some(addr) => addr,
                    None => return,
                };
                match self.scanner.start(&mut self.ctx, addr, ScanKind::Discovery { vif }, req) {
                    Ok(()) => {}
                    Err(e) => {
                        debug!("scan refused: {}", e);
                        self.ctx
                            .events
                            .send(MlmeEvent::ScanEnd { vif, status: ScanStatus::Busy });
                    }
                }
            }
            MlmeRequest::SetPowerSave { vif, enabled } => {
                self.with_client(vif, |client, cc| client.handle_set_power_save(cc, enabled));
            }
            MlmeRequest::GetScanResults { vif } => {
                let results = self.scanner.results();
                self.ctx.events.send(MlmeEvent::ScanResults { vif, results });
            }
        }
    }

    pub fn handle_driver_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Stop => unreachable!("Stop is consumed by the event loop"),
            DriverEvent::MacFrameRx { vif, bytes, rx_info } => {
                self.handle_mac_frame_rx(vif, &bytes[..], rx_info)
            }
            DriverEvent::EthFrameTx { vif, bytes } => self.handle_eth_frame_tx(vif, &bytes[..]),
            DriverEvent::TxStatusReport { token, status } => self.handle_tx_status(token, status),
            DriverEvent::ChannelComplete => self.handle_channel_complete(),
            DriverEvent::PeerAddComplete { addr, hw_index } => {
                for vif in self.station_vifs() {
                    self.with_client(vif, |client, cc| {
                        if client.in_connection_setup() {
                            client.step(cc, ClientEvent::PeerAddComplete { addr, hw_index });
                        }
                    });
                }
            }
            DriverEvent::PeerDelComplete { addr } => {
                for vif in self.station_vifs() {
                    self.with_client(vif, |client, cc| {
                        client.step(cc, ClientEvent::PeerDelComplete { addr });
                    });
                }
            }
            DriverEvent::BssParamComplete { vif, ok } => {
                self.with_client(vif, |client, cc| {
                    client.step(cc, ClientEvent::BssParamComplete { ok });
                });
            }
            DriverEvent::RadioStateComplete { vif, state } => {
                self.with_client(vif, |client, cc| {
                    client.step(cc, ClientEvent::RadioStateComplete(state));
                });
            }
            DriverEvent::Tbtt { vif } => {
                debug!("TBTT on {:?}", vif);
            }
            DriverEvent::Timeout { id } => self.handle_timeout(id),
            DriverEvent::HwError { code } => self.handle_hw_error(code),
        }
    }

    fn handle_channel_complete(&mut self) {
        if self.scanner.is_scanning() {
            self.scanner.handle_channel_complete(&mut self.ctx, &mut self.tx);
            return;
        }
        for vif in self.station_vifs() {
            self.with_client(vif, |client, cc| {
                if client.in_connection_setup() {
                    client.step(cc, ClientEvent::ChannelComplete);
                }
            });
        }
    }

    fn handle_timeout(&mut self, id: EventId) {
        let event = match self.ctx.timer.triggered(&id) {
            Some(event) => event,
            None => return, // canceled before it fired
        };
        match event {
            TimedEvent::ScanDwell => {
                if let Some(completion) = self.scanner.handle_dwell_timeout(&mut self.ctx) {
                    self.handle_scan_completion(completion);
                }
            }
            TimedEvent::BaInactivity { peer, tid, originator } => {
                let link = self
                    .station_vifs()
                    .into_iter()
                    .find_map(|vif| self.station_link(vif).filter(|link| link.bssid.0 == peer));
                if let Some(link) = link {
                    self.block_ack.handle_inactivity_timeout(
                        &mut self.ctx,
                        &mut self.tx,
                        link.addr,
                        link.bssid,
                        peer,
                        tid,
                        originator,
                    );
                }
            }
            TimedEvent::AuthTimeout { vif }
            | TimedEvent::AssocTimeout { vif }
            | TimedEvent::ConnStatusCheck { vif }
            | TimedEvent::PsKeepAlive { vif }
            | TimedEvent::RoamScan { vif } => {
                self.with_client(vif, |client, cc| client.handle_timeout(cc, event));
            }
        }
    }

    fn handle_scan_completion(&mut self, completion: ScanCompletion) {
        match completion {
            ScanCompletion::Discovery { vif, status } => {
                self.ctx.events.send(MlmeEvent::ScanEnd { vif, status });
            }
            ScanCompletion::Join { vif, result } => {
                self.with_client(vif, |client, cc| {
                    client.step(cc, ClientEvent::JoinScanEnded(result));
                });
            }
            ScanCompletion::Roam { vif } => {
                self.with_client(vif, |client, cc| client.handle_roam_scan_complete(cc));
            }
        }
    }

    fn handle_mac_frame_rx(&mut self, vif: VifId, bytes: &[u8], rx_info: RxInfo) {
        match mac::MacFrame::parse(bytes) {
            Some(mac::MacFrame::Mgmt { mgmt_hdr, body }) => {
                self.handle_mgmt_frame(vif, &mgmt_hdr, body, rx_info)
            }
            Some(mac::MacFrame::Data { fixed_fields, qos_ctrl, body, .. }) => {
                let frame_ctrl = fixed_fields.frame_ctrl;
                let peer = fixed_fields.addr2;
                let tid = qos_ctrl.map(|qos| qos.tid()).unwrap_or(0);
                self.block_ack.note_activity(&peer, tid);
                for sta in self.station_vifs() {
                    self.with_client(sta, |client, _cc| {
                        if client.bssid() == Some(Bssid(peer)) {
                            client.ps.on_rx_data(frame_ctrl.more_data());
                        }
                    });
                }
                if frame_ctrl.data_subtype().null() {
                    return;
                }
                self.deliver_data_frame(vif, &fixed_fields, frame_ctrl, body);
            }
            Some(mac::MacFrame::PsPoll { .. }) => {
                debug!("ignoring PS-Poll in station role");
            }
            Some(mac::MacFrame::Unsupported { frame_ctrl }) => {
                debug!("unsupported frame type {:?}", frame_ctrl.frame_type());
            }
            None => {
                debug!("dropping malformed MAC frame ({} bytes)", bytes.len());
            }
        }
    }

    /// Decapsulates one received data frame and hands it to the network
    /// stack.
    fn deliver_data_frame(
        &mut self,
        vif: VifId,
        fixed_fields: &mac::FixedDataHdrFields,
        frame_ctrl: mac::FrameControl,
        body: &[u8],
    ) {
        let mut reader = BufferReader::new(body);
        if frame_ctrl.protected() {
            // Hardware decrypted in place; skip the cipher header it left
            // behind.
            let iv_len = self
                .tx
                .keys
                .pairwise(&fixed_fields.addr2)
                .map_or(0, |cipher_ctx| cipher_ctx.cipher.iv_len());
            if reader.read_bytes(iv_len).is_none() {
                return;
            }
        }
        let llc = match reader.read::<mac::LlcHdr>() {
            Some(llc) => llc,
            None => return,
        };
        let mut eth = vec![];
        let eth_hdr = mac::EthernetIIHdr {
            da: fixed_fields.addr1,
            sa: fixed_fields.addr3,
            ether_type: llc.protocol_id,
        };
        if eth.append_value(&eth_hdr).is_ok() && eth.append_bytes(reader.peek_remaining()).is_ok() {
            if let Err(e) = self.ctx.device.deliver_eth_frame(vif, &eth[..]) {
                warn!("failed to deliver received frame: {}", e);
            }
        }
    }

    fn handle_mgmt_frame(
        &mut self,
        vif: VifId,
        mgmt_hdr: &mac::MgmtHdr,
        body: &[u8],
        rx_info: RxInfo,
    ) {
        let subtype = mgmt_hdr.frame_ctrl.mgmt_subtype();
        match subtype {
            mac::MgmtSubtype::BEACON | mac::MgmtSubtype::PROBE_RESP => {
                let mut reader = BufferReader::new(body);
                let beacon_hdr = match reader.read::<mac::BeaconHdr>() {
                    Some(hdr) => hdr,
                    None => return,
                };
                let beacon_interval = { beacon_hdr.beacon_interval };
                let capabilities = beacon_hdr.capabilities;
                let ies = reader.into_remaining();
                let bssid = Bssid(mgmt_hdr.addr3);
                self.scanner.handle_beacon_or_probe_resp(
                    bssid,
                    rx_info.channel.primary,
                    rx_info.rssi_dbm,
                    beacon_interval,
                    capabilities,
                    ies,
                );
                if subtype == mac::MgmtSubtype::BEACON {
                    for sta in self.station_vifs() {
                        self.with_client(sta, |client, cc| {
                            client.handle_beacon(cc, bssid, rx_info.rssi_dbm, ies);
                        });
                    }
                }
            }
            mac::MgmtSubtype::AUTH => {
                let mut reader = BufferReader::new(body);
                if let Some(auth_hdr) = reader.read::<mac::AuthHdr>() {
                    let status = auth_hdr.status_code;
                    let from = mgmt_hdr.addr3;
                    self.with_client(vif, |client, cc| {
                        client.step(cc, ClientEvent::AuthFrame { from, status });
                    });
                }
            }
            mac::MgmtSubtype::ASSOC_RESP => {
                let mut reader = BufferReader::new(body);
                if let Some(assoc_hdr) = reader.read::<mac::AssocRespHdr>() {
                    let status = assoc_hdr.status_code;
                    let caps = assoc_hdr.capabilities;
                    let aid = { assoc_hdr.aid } & 0x3fff;
                    let mut rates = vec![];
                    for (id, ie_body) in ie::Reader::new(reader.into_remaining()) {
                        if id == ie::Id::SUPPORTED_RATES || id == ie::Id::EXTENDED_SUPPORTED_RATES {
                            if let Ok(parsed) = ie::parse_supported_rates(ie_body) {
                                rates.extend(parsed.iter().copied());
                            }
                        }
                    }
                    self.with_client(vif, |client, cc| {
                        client.step(cc, ClientEvent::AssocResp { status, aid, caps, rates });
                    });
                }
            }
            mac::MgmtSubtype::DEAUTH => {
                let mut reader = BufferReader::new(body);
                if let Some(deauth_hdr) = reader.read::<mac::DeauthHdr>() {
                    let reason = deauth_hdr.reason_code;
                    self.with_client(vif, |client, cc| {
                        client.step(cc, ClientEvent::DeauthInd { reason });
                    });
                }
            }
            mac::MgmtSubtype::DISASSOC => {
                let mut reader = BufferReader::new(body);
                if let Some(disassoc_hdr) = reader.read::<mac::DisassocHdr>() {
                    let reason = disassoc_hdr.reason_code;
                    self.with_client(vif, |client, cc| {
                        client.step(cc, ClientEvent::DisassocInd { reason });
                    });
                }
            }
            mac::MgmtSubtype::ACTION => {
                self.handle_action_frame(vif, mgmt_hdr, body);
            }
            other => {
                debug!("ignoring management subtype {:?}", other);
            }
        }
    }

    fn handle_action_frame(&mut self, vif: VifId, mgmt_hdr: &mac::MgmtHdr, body: &[u8]) {
        let mut reader = BufferReader::new(body);
        let action_hdr = match reader.read::<mac::ActionHdr>() {
            Some(hdr) => hdr,
            None => return,
        };
        if action_hdr.action != mac::ActionCategory::BLOCK_ACK {
            debug!("ignoring action category {:?}", action_hdr.action);
            return;
        }
        let peer = mgmt_hdr.addr2;
        let bssid = Bssid(mgmt_hdr.addr3);
        let client_addr = match self.vif_addr(vif) {
            Some(addr) => addr,
            None => return,
        };
        let action = match reader.peek_remaining().first() {
            Some(byte) => mac::BlockAckAction(*byte),
            None => return,
        };
        match action {
            mac::BlockAckAction::ADDBA_REQUEST => {
                if let Some(req) = reader.read::<mac::AddbaReqHdr>() {
                    if let Err(e) = self.block_ack.handle_addba_req(
                        &mut self.ctx,
                        &mut self.tx,
                        &self.peers,
                        client_addr,
                        bssid,
                        peer,
                        &req,
                    ) {
                        warn!("failed to answer ADDBA request: {}", e);
                    }
                }
            }
            mac::BlockAckAction::ADDBA_RESPONSE => {
                if let Some(resp) = reader.read::<mac::AddbaRespHdr>() {
                    self.block_ack.handle_addba_resp(&mut self.ctx, peer, &resp);
                }
            }
            mac::BlockAckAction::DELBA => {
                if let Some(delba) = reader.read::<mac::DelbaHdr>() {
                    self.block_ack.handle_delba(&mut self.ctx, peer, &delba);
                }
            }
            other => {
                debug!("ignoring BlockAck action {:?}", other);
            }
        }
    }

    fn handle_eth_frame_tx(&mut self, vif: VifId, bytes: &[u8]) {
        let mut reader = BufferReader::new(bytes);
        let eth_hdr = match reader.read::<mac::EthernetIIHdr>() {
            Some(hdr) => hdr,
            None => {
                debug!("dropping malformed outgoing ethernet frame");
                return;
            }
        };
        let link = match self.station_link(vif) {
            Some(link) => link,
            None => {
                debug!("dropping outgoing frame: interface not associated");
                return;
            }
        };
        let tid = 0;
        let desc = TxDescriptor {
            vif,
            src: eth_hdr.sa,
            dst: eth_hdr.da,
            bssid: link.bssid,
            peer: link.bssid.0,
            tid,
            ether_type: eth_hdr.ether_type.to_native(),
            payload: reader.peek_remaining(),
            aggregated: self.block_ack.is_active(&link.bssid.0, tid, BaRole::Originator),
            more_data: false,
            four_addr: false,
            retry_of: None,
        };
        match self.tx.send_data_frame(&mut self.ctx, &self.peers, desc) {
            Ok(_) => {
                self.block_ack.note_activity(&link.bssid.0, tid);
                self.with_client(vif, |client, _cc| client.ps.on_tx_activity());
            }
            Err(e) => debug!("outgoing frame dropped: {}", e),
        }
    }

    fn handle_tx_status(&mut self, token: TxToken, status: TxStatus) {
        let confirm = match self.tx.on_tx_status(token, status.success) {
            Some(confirm) => confirm,
            None => return,
        };
        match confirm.kind {
            FrameKind::Data { aggregated: true } => {
                self.block_ack.note_tx_result(&confirm.peer, confirm.tid, confirm.success);
            }
            FrameKind::Null | FrameKind::QosNull => {
                for vif in self.station_vifs() {
                    self.with_client(vif, |client, cc| {
                        client.handle_null_tx_result(cc, token, confirm.success);
                    });
                }
            }
            _ => {}
        }
    }

    /// The full reset path: every actor's state is torn down and every
    /// in-flight request resolved before the radio is re-armed.
    fn handle_hw_error(&mut self, code: u32) {
        error!("hardware fault {:#x}; resetting control plane", code);
        for vif in self.station_vifs() {
            self.with_client(vif, |client, cc| client.reset(cc));
        }
        self.scanner.abort(&mut self.ctx);
        self.block_ack.reset(&mut self.ctx);
        self.tx.reset();
        self.peers.clear();
        self.ctx.timer.cancel_all();
        for vif in self.station_vifs() {
            if let Err(e) = self.ctx.device.set_radio_state(vif, RadioState::Idle) {
                error!("failed to idle interface {:?} after fault: {}", vif, e);
            }
        }
    }

    /// Runs the control plane until `DriverEvent::Stop` arrives. Events
    /// posted to each queue are processed in arrival order; no handler
    /// blocks or preempts another.
    pub async fn serve(
        mut self,
        mut requests: mpsc::UnboundedReceiver<MlmeRequest>,
        mut driver_events: mpsc::UnboundedReceiver<DriverEvent>,
    ) -> Result<(), anyhow::Error> {
        loop {
            select! {
                request = requests.next() => match request {
                    Some(request) => self.handle_mlme_request(request),
                    None => bail!("MLME request stream terminated unexpectedly."),
                },
                event = driver_events.next() => match event {
                    Some(DriverEvent::Stop) => {
                        info!("MLME event loop exiting.");
                        return Ok(());
                    }
                    Some(event) => self.handle_driver_event(event),
                    None => bail!("Driver event stream terminated unexpectedly."),
                },
            }
        }
    }
}
