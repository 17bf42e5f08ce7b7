// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The per-interface connection state machine. A connect request walks
//! `Idle → Scanning → Joining → Authenticating → Associating → PeerAdding →
//! BssParamSetting → Activating → Associated`; a disconnect unwinds through
//! `Disconnecting` from anywhere. Every state owns the connect command so a
//! transition consumes the machine and returns its successor.

use {
    super::{
        bss::BssInfo,
        scanner::{JoinScanResult, JoinTarget, ScanKind},
        ClientCtx,
    },
    crate::{
        device::{BssParam, Device, RadioState},
        peer::{Peer, PeerCapabilities, PeerId, PortState},
        timer::EventId,
        ConnectFailure, ConnectRequest, ConnectResult, MlmeEvent, ScanRequest, ScanType,
        TimedEvent, VifId,
    },
    log::{error, warn},
    std::collections::VecDeque,
    wlan_common::{
        channel::Cbw,
        ie::SupportedRate,
        mac::{self, Bssid, CapabilityInfo, MacAddr, ReasonCode, StatusCode},
    },
};

/// Protocol round-trip budgets, in beacon intervals.
const AUTH_FAILURE_TIMEOUT_BCN: u32 = 20;
const ASSOC_FAILURE_TIMEOUT_BCN: u32 = 20;

#[derive(Debug)]
pub struct ConnectCommand {
    pub req: ConnectRequest,
    pub bss: Option<Box<BssInfo>>,
    /// The target was (or is being) discovered with active probes.
    pub used_active_probe: bool,
    /// The one passive rediscovery retry has been spent.
    pub passive_retry_done: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectPhase {
    PeerDelete,
    RadioIdle,
}

#[derive(Debug)]
pub enum State {
    Idle,
    Scanning {
        cmd: ConnectCommand,
    },
    Joining {
        cmd: ConnectCommand,
    },
    Authenticating {
        cmd: ConnectCommand,
        timeout: EventId,
    },
    Associating {
        cmd: ConnectCommand,
        timeout: EventId,
    },
    PeerAdding {
        cmd: ConnectCommand,
        peer: PeerId,
        aid: u16,
    },
    BssParamSetting {
        cmd: ConnectCommand,
        peer: PeerId,
        aid: u16,
        remaining: VecDeque<BssParam>,
    },
    Activating {
        cmd: ConnectCommand,
        peer: PeerId,
        aid: u16,
    },
    Associated {
        req: ConnectRequest,
        bss: Box<BssInfo>,
        peer: PeerId,
        aid: u16,
        last_rssi: Option<i8>,
    },
    Disconnecting {
        phase: DisconnectPhase,
        notify: bool,
    },
}

/// Events the state machine consumes. Requests that cannot be taken in the
/// current state are rejected or deferred by the owning [`super::Client`]
/// before they reach this machine.
#[derive(Debug)]
pub enum ClientEvent {
    Connect(ConnectRequest),
    Disconnect { reason: ReasonCode, notify: bool },
    JoinScanEnded(JoinScanResult),
    ChannelComplete,
    AuthFrame { from: MacAddr, status: StatusCode },
    AssocResp { status: StatusCode, aid: u16, caps: CapabilityInfo, rates: Vec<SupportedRate> },
    DeauthInd { reason: ReasonCode },
    DisassocInd { reason: ReasonCode },
    PeerAddComplete { addr: MacAddr, hw_index: Option<u16> },
    BssParamComplete { ok: bool },
    PeerDelComplete { addr: MacAddr },
    RadioStateComplete(RadioState),
    AuthTimeout,
    AssocTimeout,
}

impl State {
    pub fn on_event<D: Device>(
        self,
        vif: VifId,
        addr: MacAddr,
        cc: &mut ClientCtx<'_, D>,
        event: ClientEvent,
    ) -> State {
        match self {
            State::Idle => match event {
                ClientEvent::Connect(req) => {
                    let cmd = ConnectCommand {
                        used_active_probe: req.scan_type == ScanType::Active
                            && !(req.bssid.is_some() && req.channel.is_some()),
                        passive_retry_done: false,
                        bss: None,
                        req,
                    };
                    start_connect(vif, addr, cc, cmd)
                }
                ClientEvent::Disconnect { notify, .. } => {
                    // Nothing in flight; completion is immediate.
                    if notify {
                        cc.ctx.events.send(MlmeEvent::DisconnectConf { vif });
                    }
                    State::Idle
                }
                other => {
                    warn!("unexpected event while Idle: {:?}", other);
                    State::Idle
                }
            },

            State::Scanning { mut cmd } => match event {
                ClientEvent::JoinScanEnded(JoinScanResult::Found(bss)) => {
                    cmd.bss = Some(bss);
                    start_join(vif, addr, cc, cmd)
                }
                ClientEvent::JoinScanEnded(JoinScanResult::NotFound) => {
                    // Networks hiding from active probes get one passive
                    // rediscovery pass before the attempt fails.
                    if cmd.used_active_probe && !cmd.passive_retry_done {
                        cmd.passive_retry_done = true;
                        start_join_scan(vif, addr, cc, cmd, ScanType::Passive)
                    } else {
                        fail_connect(vif, addr, cc, ConnectFailure::NotFound)
                    }
                }
                ClientEvent::Disconnect { notify, .. } => {
                    cc.scanner.abort(cc.ctx);
                    report_connect_finished(vif, cc, ConnectResult::Failed(ConnectFailure::Canceled));
                    to_disconnecting_radio_idle(vif, cc, notify)
                }
                other => {
                    warn!("unexpected event while Scanning: {:?}", other);
                    State::Scanning { cmd }
                }
            },

            State::Joining { cmd } => match event {
                ClientEvent::ChannelComplete => to_authenticating(vif, addr, cc, cmd),
                ClientEvent::Disconnect { notify, .. } => {
                    report_connect_finished(vif, cc, ConnectResult::Failed(ConnectFailure::Canceled));
                    to_disconnecting_radio_idle(vif, cc, notify)
                }
                other => {
                    warn!("unexpected event while Joining: {:?}", other);
                    State::Joining { cmd }
                }
            },

            State::Authenticating { mut cmd, timeout } => match event {
                ClientEvent::AuthFrame { from, status } => {
                    let bssid = cmd.bss.as_ref().map(|b| b.bssid).unwrap_or_default();
                    if from != bssid.0 {
                        return State::Authenticating { cmd, timeout };
                    }
                    cc.ctx.timer.cancel_event(timeout);
                    if status == StatusCode::SUCCESS {
                        to_associating(vif, addr, cc, cmd)
                    } else {
                        error!("authentication rejected with status {:?}", status);
                        fail_connect(vif, addr, cc, ConnectFailure::Rejected { status })
                    }
                }
                ClientEvent::AuthTimeout => {
                    if cmd.used_active_probe && !cmd.passive_retry_done {
                        cmd.passive_retry_done = true;
                        cmd.bss = None;
                        start_join_scan(vif, addr, cc, cmd, ScanType::Passive)
                    } else {
                        fail_connect(vif, addr, cc, ConnectFailure::TimedOut)
                    }
                }
                ClientEvent::DeauthInd { reason } => {
                    warn!("deauthenticated while authenticating: {:?}", reason);
                    cc.ctx.timer.cancel_event(timeout);
                    fail_connect(vif, addr, cc, ConnectFailure::Rejected { status: StatusCode::REFUSED })
                }
                ClientEvent::Disconnect { notify, .. } => {
                    cc.ctx.timer.cancel_event(timeout);
                    report_connect_finished(vif, cc, ConnectResult::Failed(ConnectFailure::Canceled));
                    to_disconnecting_radio_idle(vif, cc, notify)
                }
                other => {
                    warn!("unexpected event while Authenticating: {:?}", other);
                    State::Authenticating { cmd, timeout }
                }
            },

            State::Associating { mut cmd, timeout } => match event {
                ClientEvent::AssocResp { status, aid, caps, rates } => {
                    cc.ctx.timer.cancel_event(timeout);
                    if status != StatusCode::SUCCESS {
                        error!("association rejected with status {:?}", status);
                        return fail_connect(vif, addr, cc, ConnectFailure::Rejected { status });
                    }
                    if let Some(bss) = cmd.bss.as_mut() {
                        if bss.rates.is_empty() {
                            bss.rates = rates.clone();
                        }
                    }
                    to_peer_adding(vif, addr, cc, cmd, aid, caps, rates)
                }
                ClientEvent::AssocTimeout => fail_connect(vif, addr, cc, ConnectFailure::TimedOut),
                ClientEvent::DeauthInd { reason } => {
                    warn!("deauthenticated while associating: {:?}", reason);
                    cc.ctx.timer.cancel_event(timeout);
                    fail_connect(vif, addr, cc, ConnectFailure::Rejected { status: StatusCode::REFUSED })
                }
                ClientEvent::Disconnect { reason, notify } => {
                    cc.ctx.timer.cancel_event(timeout);
                    report_connect_finished(vif, cc, ConnectResult::Failed(ConnectFailure::Canceled));
                    send_deauth(addr, cc, &cmd, reason);
                    to_disconnecting_radio_idle(vif, cc, notify)
                }
                other => {
                    warn!("unexpected event while Associating: {:?}", other);
                    State::Associating { cmd, timeout }
                }
            },

            State::PeerAdding { cmd, peer, aid } => match event {
                ClientEvent::PeerAddComplete { addr: peer_addr, hw_index } => {
                    let bssid = cmd.bss.as_ref().map(|b| b.bssid).unwrap_or_default();
                    if peer_addr != bssid.0 {
                        return State::PeerAdding { cmd, peer, aid };
                    }
                    match hw_index {
                        Some(index) => {
                            if let Some(entry) = cc.peers.get_mut(peer) {
                                entry.hw_index = Some(index);
                            }
                            to_bss_param_setting(vif, addr, cc, cmd, peer, aid)
                        }
                        None => {
                            // No hardware peer slot: peer-registration
                            // failure.
                            error!("hardware refused peer slot for {:02x?}", peer_addr);
                            cc.peers.remove(peer);
                            send_deauth(addr, cc, &cmd, ReasonCode::UNSPECIFIED_REASON);
                            fail_connect(vif, addr, cc, ConnectFailure::NoResources)
                        }
                    }
                }
                other => {
                    warn!("unexpected event while PeerAdding: {:?}", other);
                    State::PeerAdding { cmd, peer, aid }
                }
            },

            State::BssParamSetting { cmd, peer, aid, mut remaining } => match event {
                ClientEvent::BssParamComplete { ok } => {
                    if !ok {
                        error!("BSS parameter programming failed");
                        return fail_connect_teardown_peer(vif, addr, cc, cmd, peer);
                    }
                    match remaining.pop_front() {
                        Some(param) => {
                            if let Err(e) = cc.ctx.device.set_bss_param(vif, param) {
                                error!("failed to program BSS parameter: {}", e);
                                return fail_connect_teardown_peer(vif, addr, cc, cmd, peer);
                            }
                            State::BssParamSetting { cmd, peer, aid, remaining }
                        }
                        None => to_activating(vif, addr, cc, cmd, peer, aid),
                    }
                }
                other => {
                    warn!("unexpected event while BssParamSetting: {:?}", other);
                    State::BssParamSetting { cmd, peer, aid, remaining }
                }
            },

            State::Activating { cmd, peer, aid } => match event {
                ClientEvent::RadioStateComplete(RadioState::Active) => {
                    report_connect_finished(vif, cc, ConnectResult::Success);
                    let bss = cmd.bss.expect("activating without a BSS");
                    State::Associated { req: cmd.req, bss, peer, aid, last_rssi: None }
                }
                other => {
                    warn!("unexpected event while Activating: {:?}", other);
                    State::Activating { cmd, peer, aid }
                }
            },

            State::Associated { req, bss, peer, aid, last_rssi } => match event {
                ClientEvent::DeauthInd { reason } | ClientEvent::DisassocInd { reason } => {
                    warn!("connection to {:02x?} lost: {:?}", bss.bssid, reason);
                    cc.ctx.events.send(MlmeEvent::ConnectionLost {
                        vif,
                        cause: ConnectFailure::LinkLost,
                    });
                    teardown_peer(cc, &bss.bssid, peer);
                    State::Disconnecting { phase: DisconnectPhase::PeerDelete, notify: false }
                }
                ClientEvent::Disconnect { reason, notify } => {
                    if let Err(e) = cc.tx.send_deauth_frame(cc.ctx, addr, bss.bssid, reason) {
                        error!("failed to send deauthentication frame: {}", e);
                    }
                    teardown_peer(cc, &bss.bssid, peer);
                    State::Disconnecting { phase: DisconnectPhase::PeerDelete, notify }
                }
                other => {
                    warn!("unexpected event while Associated: {:?}", other);
                    State::Associated { req, bss, peer, aid, last_rssi }
                }
            },

            State::Disconnecting { phase, notify } => match (phase, event) {
                (DisconnectPhase::PeerDelete, ClientEvent::PeerDelComplete { .. }) => {
                    to_disconnecting_radio_idle(vif, cc, notify)
                }
                (DisconnectPhase::RadioIdle, ClientEvent::RadioStateComplete(RadioState::Idle)) => {
                    if notify {
                        cc.ctx.events.send(MlmeEvent::DisconnectConf { vif });
                    }
                    State::Idle
                }
                (phase, other) => {
                    warn!("unexpected event while Disconnecting: {:?}", other);
                    State::Disconnecting { phase, notify }
                }
            },
        }
    }

    pub fn is_associated(&self) -> bool {
        matches!(self, State::Associated { .. })
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, State::Idle)
    }

    /// Mid-transition states are pinned on a hardware round trip; requests
    /// arriving now are deferred rather than processed or dropped.
    pub fn is_mid_transition(&self) -> bool {
        matches!(
            self,
            State::PeerAdding { .. }
                | State::BssParamSetting { .. }
                | State::Activating { .. }
                | State::Disconnecting { .. }
        )
    }
}

fn report_connect_finished<D: Device>(vif: VifId, cc: &mut ClientCtx<'_, D>, result: ConnectResult) {
    cc.ctx.events.send(MlmeEvent::ConnectConf { vif, result });
}

/// Terminal failure path: exactly one notification, then the radio is
/// returned to an explicit idle state.
fn fail_connect<D: Device>(
    vif: VifId,
    _addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    cause: ConnectFailure,
) -> State {
    report_connect_finished(vif, cc, ConnectResult::Failed(cause));
    to_disconnecting_radio_idle(vif, cc, false)
}

fn fail_connect_teardown_peer<D: Device>(
    vif: VifId,
    addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    cmd: ConnectCommand,
    peer: PeerId,
) -> State {
    let bssid = cmd.bss.as_ref().map(|b| b.bssid).unwrap_or_default();
    send_deauth(addr, cc, &cmd, ReasonCode::UNSPECIFIED_REASON);
    report_connect_finished(vif, cc, ConnectResult::Failed(ConnectFailure::NoResources));
    teardown_peer(cc, &bssid, peer);
    State::Disconnecting { phase: DisconnectPhase::PeerDelete, notify: false }
}

fn send_deauth<D: Device>(
    addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    cmd: &ConnectCommand,
    reason: ReasonCode,
) {
    if let Some(bss) = &cmd.bss {
        if let Err(e) = cc.tx.send_deauth_frame(cc.ctx, addr, bss.bssid, reason) {
            error!("failed to send deauthentication frame: {}", e);
        }
    }
}

/// Tears down everything attached to the peer: BlockAck agreements, cipher
/// and sequencing state, the peer entry, and the hardware slot.
fn teardown_peer<D: Device>(cc: &mut ClientCtx<'_, D>, bssid: &Bssid, peer: PeerId) {
    cc.block_ack.teardown_peer(cc.ctx, &bssid.0);
    cc.tx.remove_peer(&bssid.0);
    cc.peers.remove(peer);
    if let Err(e) = cc.ctx.device.del_peer(bssid.0) {
        error!("failed to delete hardware peer: {}", e);
    }
}

fn to_disconnecting_radio_idle<D: Device>(
    vif: VifId,
    cc: &mut ClientCtx<'_, D>,
    notify: bool,
) -> State {
    match cc.ctx.device.set_radio_state(vif, RadioState::Idle) {
        Ok(()) => State::Disconnecting { phase: DisconnectPhase::RadioIdle, notify },
        Err(e) => {
            error!("failed to idle the radio: {}", e);
            if notify {
                cc.ctx.events.send(MlmeEvent::DisconnectConf { vif });
            }
            State::Idle
        }
    }
}

fn start_connect<D: Device>(
    vif: VifId,
    addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    mut cmd: ConnectCommand,
) -> State {
    // A fully specified target joins directly, skipping the scan engine.
    if let (Some(bssid), Some(channel)) = (cmd.req.bssid, cmd.req.channel) {
        cmd.bss = Some(Box::new(BssInfo::from_target(bssid, cmd.req.ssid.clone(), channel)));
        return start_join(vif, addr, cc, cmd);
    }
    let scan_type = cmd.req.scan_type;
    start_join_scan(vif, addr, cc, cmd, scan_type)
}

fn start_join_scan<D: Device>(
    vif: VifId,
    addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    cmd: ConnectCommand,
    scan_type: ScanType,
) -> State {
    let kind = ScanKind::Join {
        vif,
        target: JoinTarget { ssid: cmd.req.ssid.clone(), bssid: cmd.req.bssid },
    };
    let req = ScanRequest {
        ssids: vec![cmd.req.ssid.clone()],
        bssid: cmd.req.bssid,
        channels: cmd.req.channel.map(|c| vec![c]).unwrap_or_default(),
        scan_type,
        extra_ies: vec![],
    };
    match cc.scanner.start(cc.ctx, addr, kind, req) {
        Ok(()) => State::Scanning { cmd },
        Err(e) => {
            warn!("cannot start join scan: {}", e);
            fail_connect(vif, addr, cc, ConnectFailure::Busy)
        }
    }
}

fn start_join<D: Device>(
    vif: VifId,
    addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    cmd: ConnectCommand,
) -> State {
    let channel = cmd.bss.as_ref().expect("join without a BSS").channel;
    match cc.ctx.device.set_channel(channel) {
        Ok(()) => State::Joining { cmd },
        Err(e) => {
            error!("failed to tune to {:?}: {}", channel, e);
            fail_connect(vif, addr, cc, ConnectFailure::NoResources)
        }
    }
}

fn to_authenticating<D: Device>(
    vif: VifId,
    addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    cmd: ConnectCommand,
) -> State {
    let bss = cmd.bss.as_ref().expect("authenticating without a BSS");
    if let Err(e) = cc.tx.send_auth_frame(cc.ctx, addr, bss.bssid) {
        error!("failed to send authentication frame: {}", e);
        return fail_connect(vif, addr, cc, ConnectFailure::NoResources);
    }
    let timeout = cc.ctx.timer.schedule_after(
        bss.beacon_interval * AUTH_FAILURE_TIMEOUT_BCN,
        TimedEvent::AuthTimeout { vif },
    );
    State::Authenticating { cmd, timeout }
}

fn to_associating<D: Device>(
    vif: VifId,
    addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    cmd: ConnectCommand,
) -> State {
    let bss = cmd.bss.as_ref().expect("associating without a BSS");
    if let Err(e) = cc.tx.send_assoc_req_frame(cc.ctx, addr, bss) {
        error!("failed to send association request: {}", e);
        return fail_connect(vif, addr, cc, ConnectFailure::NoResources);
    }
    let timeout = cc.ctx.timer.schedule_after(
        bss.beacon_interval * ASSOC_FAILURE_TIMEOUT_BCN,
        TimedEvent::AssocTimeout { vif },
    );
    State::Associating { cmd, timeout }
}

fn to_peer_adding<D: Device>(
    vif: VifId,
    addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    cmd: ConnectCommand,
    aid: u16,
    peer_caps: CapabilityInfo,
    rates: Vec<SupportedRate>,
) -> State {
    let bss = cmd.bss.as_ref().expect("peer registration without a BSS");
    let mut capabilities = PeerCapabilities::empty();
    if peer_caps.qos() {
        capabilities |= PeerCapabilities::QOS;
    }
    if bss.ht_cap.is_some() {
        capabilities |= PeerCapabilities::HT;
    }
    if bss.vht_cap.is_some() {
        capabilities |= PeerCapabilities::VHT;
    }
    let bandwidth =
        if bss.ht_cap.map_or(false, |c| c.ht_cap_info.chan_width_40()) { Cbw::Cbw40 } else { Cbw::Cbw20 };
    let entry = Peer {
        vif,
        addr: bss.bssid.0,
        aid,
        capabilities,
        rates: rates.clone(),
        bandwidth,
        hw_index: None,
        port: PortState::Closed,
        dozing: false,
        key_slot: None,
    };
    let peer = match cc.peers.add(entry) {
        Ok(peer) => peer,
        Err(e) => {
            error!("cannot register peer: {}", e);
            send_deauth(addr, cc, &cmd, ReasonCode::UNSPECIFIED_REASON);
            return fail_connect(vif, addr, cc, ConnectFailure::NoResources);
        }
    };
    let descriptor = crate::device::PeerDescriptor {
        vif,
        addr: bss.bssid.0,
        aid,
        capabilities: peer_caps,
        rates,
        bandwidth,
        qos: capabilities.contains(PeerCapabilities::QOS),
    };
    match cc.ctx.device.add_peer(descriptor) {
        Ok(()) => State::PeerAdding { cmd, peer, aid },
        Err(e) => {
            error!("failed to request hardware peer slot: {}", e);
            cc.peers.remove(peer);
            fail_connect(vif, addr, cc, ConnectFailure::NoResources)
        }
    }
}

/// BSS parameters are programmed one at a time; each is its own hardware
/// round trip.
fn to_bss_param_setting<D: Device>(
    vif: VifId,
    addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    cmd: ConnectCommand,
    peer: PeerId,
    aid: u16,
) -> State {
    let bss = cmd.bss.as_ref().expect("parameter setting without a BSS");
    let mut remaining: VecDeque<BssParam> = VecDeque::new();
    remaining.push_back(BssParam::Bssid(bss.bssid));
    remaining.push_back(BssParam::BasicRateSet(bss.basic_rates()));
    remaining.push_back(BssParam::BeaconInterval(bss.beacon_interval));
    if let Some(edca) = bss.edca {
        remaining.push_back(BssParam::Edca(edca));
    }
    let first = remaining.pop_front().unwrap();
    match cc.ctx.device.set_bss_param(vif, first) {
        Ok(()) => State::BssParamSetting { cmd, peer, aid, remaining },
        Err(e) => {
            error!("failed to program BSS parameter: {}", e);
            fail_connect_teardown_peer(vif, addr, cc, cmd, peer)
        }
    }
}

/// Activation: arms the transmit pipeline's cipher state and the logical
/// port, registers the peer with rate selection, and drives the radio to
/// its active state.
fn to_activating<D: Device>(
    vif: VifId,
    addr: MacAddr,
    cc: &mut ClientCtx<'_, D>,
    cmd: ConnectCommand,
    peer: PeerId,
    aid: u16,
) -> State {
    let bss = cmd.bss.as_ref().expect("activating without a BSS");
    let bssid = bss.bssid;
    let cipher = cmd.req.cipher;
    let port = match (&cmd.req.key, cipher.is_protected()) {
        (Some(key), true) => {
            let slot = cc.tx.keys.assign_pairwise(bssid.0, cipher, key.clone(), 0);
            if let Err(e) = cc.ctx.device.set_key(slot.clone()) {
                error!("failed to program key: {}", e);
            }
            if let Some(entry) = cc.peers.get_mut(peer) {
                entry.key_slot = Some(slot.slot);
            }
            PortState::Open
        }
        // Protected network, no key material yet: only key-exchange
        // traffic may pass until authorization completes.
        (None, true) => PortState::Controlled(mac::ETHER_TYPE_EAPOL),
        _ => PortState::Open,
    };
    if let Some(entry) = cc.peers.get_mut(peer) {
        entry.port = port;
        let ht = entry.capabilities.contains(PeerCapabilities::HT);
        cc.tx.rates().lock().add_peer(bssid.0, &entry.rates, ht);
    }
    match cc.ctx.device.set_radio_state(vif, RadioState::Active) {
        Ok(()) => State::Activating { cmd, peer, aid },
        Err(e) => {
            error!("failed to activate the radio: {}", e);
            fail_connect_teardown_peer(vif, addr, cc, cmd, peer)
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            block_ack::{BlockAckConfig, BlockAckManager},
            client::scanner::Scanner,
            device::test_utils::{DeviceCall, FakeDevice},
            peer::PeerTable,
            rates::RateSelector,
            test_utils::{fake_context_with_events, next_event},
            tx::TxPipeline,
            Context, MlmeEvent,
        },
        futures::channel::mpsc::UnboundedReceiver,
        parking_lot::Mutex,
        std::sync::Arc,
        wlan_common::{assert_variant, security::CipherSuite},
    };

    const VIF: VifId = VifId(0);
    const CLIENT: MacAddr = [7; 6];
    const AP: MacAddr = [0x0b; 6];

    struct TestHelper {
        ctx: Context<FakeDevice>,
        events: UnboundedReceiver<MlmeEvent>,
        tx: TxPipeline,
        peers: PeerTable,
        block_ack: BlockAckManager,
        scanner: Scanner,
    }

    impl TestHelper {
        fn new() -> Self {
            let (ctx, events) = fake_context_with_events();
            Self {
                ctx,
                events,
                tx: TxPipeline::new(Arc::new(Mutex::new(RateSelector::new()))),
                peers: PeerTable::new(),
                block_ack: BlockAckManager::new(&BlockAckConfig::default()),
                scanner: Scanner::new(),
            }
        }

        fn cc(&mut self) -> ClientCtx<'_, FakeDevice> {
            ClientCtx {
                ctx: &mut self.ctx,
                tx: &mut self.tx,
                peers: &mut self.peers,
                block_ack: &mut self.block_ack,
                scanner: &mut self.scanner,
            }
        }

        fn step(&mut self, state: State, event: ClientEvent) -> State {
            let mut cc = self.cc();
            state.on_event(VIF, CLIENT, &mut cc, event)
        }
    }

    fn connect_req(bssid: Option<Bssid>, channel: Option<u8>) -> ConnectRequest {
        ConnectRequest {
            ssid: b"corp".to_vec(),
            bssid,
            channel,
            scan_type: ScanType::Active,
            cipher: CipherSuite::Open,
            key: None,
        }
    }

    fn fake_bss() -> Box<BssInfo> {
        let mut bss = BssInfo::from_target(Bssid(AP), b"corp".to_vec(), 6);
        bss.rates = vec![SupportedRate(0x82), SupportedRate(0x8c), SupportedRate(0x12)];
        Box::new(bss)
    }

    fn cmd_with_bss(req: ConnectRequest) -> ConnectCommand {
        ConnectCommand { req, bss: Some(fake_bss()), used_active_probe: false, passive_retry_done: false }
    }

    fn success_assoc_resp() -> ClientEvent {
        ClientEvent::AssocResp {
            status: StatusCode::SUCCESS,
            aid: 42,
            caps: CapabilityInfo(0).with_ess(true).with_qos(true),
            rates: vec![SupportedRate(0x82), SupportedRate(0x8c)],
        }
    }

    #[test]
    fn known_bssid_connect_skips_scan_engine() {
        let mut h = TestHelper::new();
        let req = connect_req(Some(Bssid(AP)), Some(6));
        let state = h.step(State::Idle, ClientEvent::Connect(req));
        // Straight to Joining: the first device call tunes the channel,
        // no scan was started.
        assert_variant!(&state, State::Joining { .. });
        assert!(!h.scanner.is_scanning());
        assert_variant!(h.ctx.device.next_call(), Some(DeviceCall::SetChannel(c)) => {
            assert_eq!(c.primary, 6);
        });
        // Tuning completion sends the authentication frame.
        let state = h.step(state, ClientEvent::ChannelComplete);
        assert_variant!(&state, State::Authenticating { .. });
        let frames = h.ctx.device.sent_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame[0], 0b1011_0000); // auth subtype
    }

    #[test]
    fn unknown_target_scans_first() {
        let mut h = TestHelper::new();
        let state = h.step(State::Idle, ClientEvent::Connect(connect_req(None, None)));
        assert_variant!(&state, State::Scanning { .. });
        assert!(h.scanner.is_scanning());
    }

    #[test]
    fn full_happy_path_to_associated() {
        let mut h = TestHelper::new();
        let state = h.step(State::Idle, ClientEvent::Connect(connect_req(Some(Bssid(AP)), Some(6))));
        let state = h.step(state, ClientEvent::ChannelComplete);
        let state = h.step(
            state,
            ClientEvent::AuthFrame { from: AP, status: StatusCode::SUCCESS },
        );
        assert_variant!(&state, State::Associating { .. });

        let state = h.step(state, success_assoc_resp());
        assert_variant!(&state, State::PeerAdding { .. });
        // The peer entry exists while the hardware round trip is in flight.
        assert!(h.peers.by_addr(&AP).is_some());

        let state = h.step(state, ClientEvent::PeerAddComplete { addr: AP, hw_index: Some(3) });
        assert_variant!(&state, State::BssParamSetting { .. });
        assert_eq!(h.peers.by_addr(&AP).unwrap().1.hw_index, Some(3));

        // Parameters are programmed one per round trip: BSSID, basic
        // rates, beacon interval (no EDCA in this BSS).
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        assert_variant!(&state, State::Activating { .. });
        let params: Vec<_> = h
            .ctx
            .device
            .calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::SetBssParam(_, p) => Some(p.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(params.len(), 3);
        assert_variant!(&params[0], BssParam::Bssid(b) => assert_eq!(*b, Bssid(AP)));
        assert_variant!(&params[1], BssParam::BasicRateSet(_));
        assert_variant!(&params[2], BssParam::BeaconInterval(_));

        let state = h.step(state, ClientEvent::RadioStateComplete(RadioState::Active));
        assert!(state.is_associated());
        // Exactly one terminal notification: success.
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::ConnectConf { result: ConnectResult::Success, .. })
        );
        assert!(next_event(&mut h.events).is_none());
        // The port is open for an unprotected network.
        assert_eq!(h.peers.port_state(&AP), PortState::Open);
    }

    #[test]
    fn auth_rejection_notifies_once_with_cause() {
        let mut h = TestHelper::new();
        let state = h.step(State::Idle, ClientEvent::Connect(connect_req(Some(Bssid(AP)), Some(6))));
        let state = h.step(state, ClientEvent::ChannelComplete);
        let state = h.step(
            state,
            ClientEvent::AuthFrame { from: AP, status: StatusCode::REFUSED },
        );
        assert_variant!(&state, State::Disconnecting { notify: false, .. });
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::ConnectConf {
                result: ConnectResult::Failed(ConnectFailure::Rejected {
                    status: StatusCode::REFUSED
                }),
                ..
            })
        );
        assert!(next_event(&mut h.events).is_none());
        // The radio returns to idle, then the machine to Idle.
        let state = h.step(state, ClientEvent::RadioStateComplete(RadioState::Idle));
        assert!(state.is_idle());
        // No disconnect confirmation for a failed connect.
        assert!(next_event(&mut h.events).is_none());
    }

    #[test]
    fn auth_frame_from_stranger_is_ignored() {
        let mut h = TestHelper::new();
        let state = h.step(State::Idle, ClientEvent::Connect(connect_req(Some(Bssid(AP)), Some(6))));
        let state = h.step(state, ClientEvent::ChannelComplete);
        let state = h.step(
            state,
            ClientEvent::AuthFrame { from: [9; 6], status: StatusCode::REFUSED },
        );
        assert_variant!(&state, State::Authenticating { .. });
        assert!(next_event(&mut h.events).is_none());
    }

    #[test]
    fn active_probe_auth_timeout_retries_passively_once() {
        let mut h = TestHelper::new();
        // Target discovered by an active scan.
        let state = h.step(State::Idle, ClientEvent::Connect(connect_req(None, None)));
        let state = h.step(
            state,
            ClientEvent::JoinScanEnded(JoinScanResult::Found(fake_bss())),
        );
        let state = h.step(state, ClientEvent::ChannelComplete);
        assert_variant!(&state, State::Authenticating { .. });

        // First timeout: the attempt is not failed; a passive rediscovery
        // runs instead.
        let state = h.step(state, ClientEvent::AuthTimeout);
        assert_variant!(&state, State::Scanning { cmd } => assert!(cmd.passive_retry_done));
        assert!(next_event(&mut h.events).is_none());

        // The passive pass finds the network again; a second timeout is
        // terminal.
        let state = h.step(state, ClientEvent::JoinScanEnded(JoinScanResult::Found(fake_bss())));
        let state = h.step(state, ClientEvent::ChannelComplete);
        let state = h.step(state, ClientEvent::AuthTimeout);
        assert_variant!(&state, State::Disconnecting { .. });
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::ConnectConf {
                result: ConnectResult::Failed(ConnectFailure::TimedOut),
                ..
            })
        );
    }

    #[test]
    fn scan_not_found_retries_passively_then_fails() {
        let mut h = TestHelper::new();
        let state = h.step(State::Idle, ClientEvent::Connect(connect_req(None, None)));
        let state = h.step(state, ClientEvent::JoinScanEnded(JoinScanResult::NotFound));
        assert_variant!(&state, State::Scanning { cmd } => assert!(cmd.passive_retry_done));
        let state = h.step(state, ClientEvent::JoinScanEnded(JoinScanResult::NotFound));
        assert_variant!(&state, State::Disconnecting { .. });
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::ConnectConf {
                result: ConnectResult::Failed(ConnectFailure::NotFound),
                ..
            })
        );
    }

    #[test]
    fn no_hardware_peer_slot_fails_with_no_resources() {
        let mut h = TestHelper::new();
        let state = h.step(State::Idle, ClientEvent::Connect(connect_req(Some(Bssid(AP)), Some(6))));
        let state = h.step(state, ClientEvent::ChannelComplete);
        let state =
            h.step(state, ClientEvent::AuthFrame { from: AP, status: StatusCode::SUCCESS });
        let state = h.step(state, success_assoc_resp());
        let state = h.step(state, ClientEvent::PeerAddComplete { addr: AP, hw_index: None });
        assert_variant!(&state, State::Disconnecting { .. });
        // The provisional peer entry is gone again.
        assert!(h.peers.by_addr(&AP).is_none());
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::ConnectConf {
                result: ConnectResult::Failed(ConnectFailure::NoResources),
                ..
            })
        );
    }

    #[test]
    fn disconnect_while_associated_unwinds_fully() {
        let mut h = TestHelper::new();
        let state = associated_state(&mut h);
        h.ctx.device.calls.clear();

        let state = h.step(
            state,
            ClientEvent::Disconnect { reason: ReasonCode::LEAVING_NETWORK_DEAUTH, notify: true },
        );
        assert_variant!(&state, State::Disconnecting { phase: DisconnectPhase::PeerDelete, .. });
        // Deauth frame out, then the hardware peer deletion.
        let frames = h.ctx.device.sent_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame[0], 0b1100_0000); // deauth subtype
        assert!(h.peers.by_addr(&AP).is_none());

        let state = h.step(state, ClientEvent::PeerDelComplete { addr: AP });
        assert_variant!(&state, State::Disconnecting { phase: DisconnectPhase::RadioIdle, .. });
        let state = h.step(state, ClientEvent::RadioStateComplete(RadioState::Idle));
        assert!(state.is_idle());
        assert_variant!(next_event(&mut h.events), Some(MlmeEvent::DisconnectConf { .. }));
    }

    #[test]
    fn deauth_while_associated_reports_connection_lost() {
        let mut h = TestHelper::new();
        let state = associated_state(&mut h);
        let state = h.step(
            state,
            ClientEvent::DeauthInd { reason: ReasonCode::UNSPECIFIED_REASON },
        );
        assert_variant!(&state, State::Disconnecting { notify: false, .. });
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::ConnectionLost { cause: ConnectFailure::LinkLost, .. })
        );
    }

    #[test]
    fn disconnect_while_scanning_cancels_attempt() {
        let mut h = TestHelper::new();
        let state = h.step(State::Idle, ClientEvent::Connect(connect_req(None, None)));
        let state = h.step(
            state,
            ClientEvent::Disconnect { reason: ReasonCode::LEAVING_NETWORK_DEAUTH, notify: true },
        );
        assert_variant!(&state, State::Disconnecting { .. });
        assert!(!h.scanner.is_scanning());
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::ConnectConf {
                result: ConnectResult::Failed(ConnectFailure::Canceled),
                ..
            })
        );
    }

    #[test]
    fn protected_network_without_key_gets_controlled_port() {
        let mut h = TestHelper::new();
        let mut req = connect_req(Some(Bssid(AP)), Some(6));
        req.cipher = CipherSuite::Ccmp128;
        let state = h.step(State::Idle, ClientEvent::Connect(req));
        let state = h.step(state, ClientEvent::ChannelComplete);
        let state =
            h.step(state, ClientEvent::AuthFrame { from: AP, status: StatusCode::SUCCESS });
        let state = h.step(state, success_assoc_resp());
        let state = h.step(state, ClientEvent::PeerAddComplete { addr: AP, hw_index: Some(0) });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        assert_variant!(&state, State::Activating { .. });
        assert_eq!(h.peers.port_state(&AP), PortState::Controlled(mac::ETHER_TYPE_EAPOL));
    }

    #[test]
    fn protected_network_with_key_installs_it() {
        let mut h = TestHelper::new();
        let mut req = connect_req(Some(Bssid(AP)), Some(6));
        req.cipher = CipherSuite::Ccmp128;
        req.key = Some(vec![0xab; 16]);
        let state = h.step(State::Idle, ClientEvent::Connect(req));
        let state = h.step(state, ClientEvent::ChannelComplete);
        let state =
            h.step(state, ClientEvent::AuthFrame { from: AP, status: StatusCode::SUCCESS });
        let state = h.step(state, success_assoc_resp());
        let state = h.step(state, ClientEvent::PeerAddComplete { addr: AP, hw_index: Some(0) });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        assert_variant!(&state, State::Activating { .. });
        assert!(h
            .ctx
            .device
            .calls
            .iter()
            .any(|c| matches!(c, DeviceCall::SetKey(k) if k.cipher == CipherSuite::Ccmp128)));
        assert_eq!(h.peers.port_state(&AP), PortState::Open);
        assert!(h.tx.keys.pairwise(&AP).is_some());
    }

    fn associated_state(h: &mut TestHelper) -> State {
        let state =
            h.step(State::Idle, ClientEvent::Connect(connect_req(Some(Bssid(AP)), Some(6))));
        let state = h.step(state, ClientEvent::ChannelComplete);
        let state =
            h.step(state, ClientEvent::AuthFrame { from: AP, status: StatusCode::SUCCESS });
        let state = h.step(state, success_assoc_resp());
        let state = h.step(state, ClientEvent::PeerAddComplete { addr: AP, hw_index: Some(0) });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        let state = h.step(state, ClientEvent::BssParamComplete { ok: true });
        let state = h.step(state, ClientEvent::RadioStateComplete(RadioState::Active));
        assert!(state.is_associated());
        // Drain the success notification.
        while let Some(_event) = next_event(&mut h.events) {}
        state
    }
}
