// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The station-role side of one virtual interface: the connection state
//! machine plus the link maintenance that runs while associated (power
//! save, keep-alive/connection-loss tracking, roaming).

pub mod bss;
pub mod lost_bss;
pub mod power_save;
pub mod roam;
pub mod scanner;
pub mod state;

pub use {
    bss::BssInfo,
    power_save::{PowerSave, PowerSaveConfig, PsDecision},
    roam::{RoamConfig, RoamMonitor},
    state::{ClientEvent, State},
};

use {
    crate::{
        block_ack::BlockAckManager,
        device::{Device, TxToken},
        peer::PeerTable,
        timer::EventId,
        tx::TxPipeline,
        ConnectFailure, ConnectRequest, ConnectResult, Context, MlmeEvent, ScanRequest, ScanType,
        TimedEvent, VifId,
    },
    log::{debug, warn},
    lost_bss::LostBssCounter,
    scanner::{ScanKind, Scanner},
    std::collections::VecDeque,
    wlan_common::{
        ie,
        mac::{Bssid, MacAddr, ReasonCode},
        TimeUnit,
    },
};

/// How often the association status check fires, in beacon intervals.
const ASSOCIATION_STATUS_CHECK_BEACON_COUNT: u32 = 100;
/// Beacon silence tolerated before the connection is declared lost.
const LOST_BSS_TIMEOUT_BEACON_COUNT: u32 = 300;

/// The pieces of the joined link that the maintenance actors need.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkInfo {
    pub vif: VifId,
    pub addr: MacAddr,
    pub bssid: Bssid,
    pub aid: u16,
}

/// Mutable collaborators handed into every client handler. Each table is
/// owned elsewhere; the client only holds them for the duration of one
/// event.
pub struct ClientCtx<'a, D: Device> {
    pub ctx: &'a mut Context<D>,
    pub tx: &'a mut TxPipeline,
    pub peers: &'a mut PeerTable,
    pub block_ack: &'a mut BlockAckManager,
    pub scanner: &'a mut Scanner,
}

#[derive(Debug)]
enum Deferred {
    Connect(ConnectRequest),
    Disconnect { reason: ReasonCode, notify: bool },
}

pub struct Client {
    pub vif: VifId,
    pub addr: MacAddr,
    /// `None` only transiently inside a transition.
    state: Option<State>,
    /// Requests that arrived mid-transition, replayed in order once the
    /// machine reaches a stable state.
    deferred: VecDeque<Deferred>,
    pub ps: PowerSave,
    roam: Option<RoamMonitor>,
    lost_bss: Option<LostBssCounter>,
    conn_status_timer: Option<EventId>,
    roam_timer: Option<EventId>,
}

impl Client {
    pub fn new(vif: VifId, addr: MacAddr) -> Self {
        Self {
            vif,
            addr,
            state: Some(State::Idle),
            deferred: VecDeque::new(),
            ps: PowerSave::new(),
            roam: None,
            lost_bss: None,
            conn_status_timer: None,
            roam_timer: None,
        }
    }

    fn state_ref(&self) -> &State {
        self.state.as_ref().expect("state machine invariant")
    }

    pub fn is_associated(&self) -> bool {
        self.state_ref().is_associated()
    }

    pub fn is_idle(&self) -> bool {
        self.state_ref().is_idle()
    }

    pub fn in_connection_setup(&self) -> bool {
        matches!(
            self.state_ref(),
            State::Scanning { .. }
                | State::Joining { .. }
                | State::Authenticating { .. }
                | State::Associating { .. }
                | State::PeerAdding { .. }
                | State::BssParamSetting { .. }
                | State::Activating { .. }
        )
    }

    pub fn link_info(&self) -> Option<LinkInfo> {
        match self.state_ref() {
            State::Associated { bss, aid, .. } => Some(LinkInfo {
                vif: self.vif,
                addr: self.addr,
                bssid: bss.bssid,
                aid: *aid,
            }),
            _ => None,
        }
    }

    pub fn bssid(&self) -> Option<Bssid> {
        self.link_info().map(|link| link.bssid)
    }

    fn beacon_interval(&self) -> TimeUnit {
        match self.state_ref() {
            State::Associated { bss, .. } => bss.beacon_interval,
            _ => TimeUnit::DEFAULT_BEACON_INTERVAL,
        }
    }

    /// Upper-layer connect. A second connect while one connect or a
    /// disconnect is in flight is answered busy immediately, never queued.
    pub fn handle_connect<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>, req: ConnectRequest) {
        if !self.is_idle() {
            warn!("connect request while busy");
            cc.ctx.events.send(MlmeEvent::ConnectConf {
                vif: self.vif,
                result: ConnectResult::Failed(ConnectFailure::Busy),
            });
            return;
        }
        self.step(cc, ClientEvent::Connect(req));
    }

    /// Upper-layer or internal disconnect. Always accepted: deferred when
    /// the machine is pinned on a hardware round trip, immediate otherwise.
    pub fn handle_disconnect<D: Device>(
        &mut self,
        cc: &mut ClientCtx<'_, D>,
        reason: ReasonCode,
        notify: bool,
    ) {
        if self.state_ref().is_mid_transition() {
            self.deferred.push_back(Deferred::Disconnect { reason, notify });
            return;
        }
        self.step(cc, ClientEvent::Disconnect { reason, notify });
    }

    pub fn handle_set_power_save<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>, enabled: bool) {
        match self.link_info() {
            Some(link) => {
                let decision = self.ps.request(cc.ctx, cc.tx, &link, enabled);
                self.apply_ps_decision(cc, decision);
            }
            None => {
                warn!("power save request while not associated");
                cc.ctx.events.send(MlmeEvent::PowerSaveConf { vif: self.vif, enabled: false });
            }
        }
    }

    /// Runs one state machine step and then any housekeeping the
    /// transition implies.
    pub fn step<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>, event: ClientEvent) {
        self.step_inner(cc, event);
        self.process_deferred(cc);
    }

    fn step_inner<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>, event: ClientEvent) {
        let was_associated = self.is_associated();
        let state = self.state.take().expect("state machine invariant");
        let state = state.on_event(self.vif, self.addr, cc, event);
        self.state = Some(state);
        let now_associated = self.is_associated();
        if !was_associated && now_associated {
            self.arm_link(cc);
        } else if was_associated && !now_associated {
            self.disarm_link(cc);
        }
    }

    /// Replays deferred requests once the machine is stable (idle or
    /// associated). Deferred connects found anything but idle answer busy.
    fn process_deferred<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>) {
        while (self.is_idle() || self.is_associated()) && !self.deferred.is_empty() {
            match self.deferred.pop_front().unwrap() {
                Deferred::Connect(req) => {
                    if self.is_idle() {
                        self.step_inner(cc, ClientEvent::Connect(req));
                    } else {
                        cc.ctx.events.send(MlmeEvent::ConnectConf {
                            vif: self.vif,
                            result: ConnectResult::Failed(ConnectFailure::Busy),
                        });
                    }
                }
                Deferred::Disconnect { reason, notify } => {
                    self.step_inner(cc, ClientEvent::Disconnect { reason, notify });
                }
            }
        }
    }

    fn arm_link<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>) {
        let (uapsd, beacon_interval, rssi_dbm) = match self.state_ref() {
            State::Associated { bss, .. } => {
                (bss.capabilities.apsd(), bss.beacon_interval, bss.rssi_dbm)
            }
            _ => return,
        };
        self.ps.arm(uapsd);
        self.lost_bss = Some(LostBssCounter::start(beacon_interval, LOST_BSS_TIMEOUT_BEACON_COUNT));
        self.schedule_conn_status_check(cc);
        if cc.ctx.config.roam.enabled {
            self.roam = Some(RoamMonitor::new(cc.ctx.config.roam.clone(), rssi_dbm));
            self.schedule_roam_check(cc);
        }
    }

    fn disarm_link<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>) {
        self.ps.disarm(cc.ctx);
        if let Some(timer) = self.conn_status_timer.take() {
            cc.ctx.timer.cancel_event(timer);
        }
        if let Some(timer) = self.roam_timer.take() {
            cc.ctx.timer.cancel_event(timer);
        }
        self.lost_bss = None;
        self.roam = None;
    }

    fn schedule_conn_status_check<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>) {
        let delay = self.beacon_interval() * ASSOCIATION_STATUS_CHECK_BEACON_COUNT;
        self.conn_status_timer = Some(
            cc.ctx.timer.schedule_after(delay, TimedEvent::ConnStatusCheck { vif: self.vif }),
        );
    }

    fn schedule_roam_check<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>) {
        let delay = cc.ctx.config.roam.scan_interval;
        self.roam_timer =
            Some(cc.ctx.timer.schedule_after(delay, TimedEvent::RoamScan { vif: self.vif }));
    }

    /// Beacon intake while associated to the sender: feeds keep-alive,
    /// signal tracking and the power-save TIM inspection.
    pub fn handle_beacon<D: Device>(
        &mut self,
        cc: &mut ClientCtx<'_, D>,
        bssid: Bssid,
        rssi_dbm: i8,
        ies: &[u8],
    ) {
        let link = match self.link_info() {
            Some(link) if link.bssid == bssid => link,
            _ => return,
        };
        if let Some(lost_bss) = &mut self.lost_bss {
            lost_bss.reset();
        }
        if let Some(roam) = &mut self.roam {
            roam.on_signal(rssi_dbm);
        }
        if let Some(State::Associated { last_rssi, .. }) = self.state.as_mut() {
            *last_rssi = Some(rssi_dbm);
        }
        cc.ctx.events.send(MlmeEvent::SignalReport { vif: self.vif, rssi_dbm });

        let mut traffic_buffered = false;
        for (id, body) in ie::Reader::new(ies) {
            if id == ie::Id::TIM {
                if let Ok(tim) = ie::parse_tim(body) {
                    traffic_buffered = tim.traffic_buffered(link.aid);
                }
            }
        }
        self.ps.on_beacon_tim(cc.ctx, cc.tx, &link, traffic_buffered);
    }

    pub fn handle_timeout<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>, event: TimedEvent) {
        match event {
            TimedEvent::AuthTimeout { .. } => self.step(cc, ClientEvent::AuthTimeout),
            TimedEvent::AssocTimeout { .. } => self.step(cc, ClientEvent::AssocTimeout),
            TimedEvent::ConnStatusCheck { .. } => self.handle_conn_status_check(cc),
            TimedEvent::PsKeepAlive { .. } => {
                if let Some(link) = self.link_info() {
                    self.ps.on_keep_alive_timeout(cc.ctx, cc.tx, &link);
                }
            }
            TimedEvent::RoamScan { .. } => self.handle_roam_check(cc),
            other => debug!("timer event not for this client: {:?}", other),
        }
    }

    /// Periodic check that the BSS is still alive. Declares the link lost
    /// after sustained beacon silence.
    fn handle_conn_status_check<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>) {
        if !self.is_associated() {
            return;
        }
        self.conn_status_timer = None;
        let lost = self.lost_bss.as_ref().map_or(false, |counter| counter.should_deauthenticate());
        if lost {
            warn!("beacon silence exceeded timeout; connection lost");
            cc.ctx.events.send(MlmeEvent::ConnectionLost {
                vif: self.vif,
                cause: ConnectFailure::LinkLost,
            });
            self.step(
                cc,
                ClientEvent::Disconnect { reason: ReasonCode::REASON_INACTIVITY, notify: false },
            );
            return;
        }
        if let Some(counter) = &mut self.lost_bss {
            counter.add_beacon_interval(ASSOCIATION_STATUS_CHECK_BEACON_COUNT);
        }
        self.schedule_conn_status_check(cc);
    }

    /// Periodic roam check: a degraded link starts a background candidate
    /// scan.
    fn handle_roam_check<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>) {
        if !self.is_associated() {
            return;
        }
        self.roam_timer = None;
        let should_scan = self.roam.as_ref().map_or(false, |roam| roam.should_scan());
        if should_scan && !cc.scanner.is_scanning() {
            let ssid = match self.state_ref() {
                State::Associated { bss, .. } => bss.ssid.clone(),
                _ => return,
            };
            let req = ScanRequest {
                ssids: vec![ssid],
                bssid: None,
                channels: vec![],
                scan_type: ScanType::Active,
                extra_ies: vec![],
            };
            if let Err(e) =
                cc.scanner.start(cc.ctx, self.addr, ScanKind::Roam { vif: self.vif }, req)
            {
                debug!("roam scan not started: {}", e);
            }
        }
        self.schedule_roam_check(cc);
    }

    /// A roam candidate scan finished: move only if a candidate clears the
    /// hysteresis margin, then reconnect through the deferred queue.
    pub fn handle_roam_scan_complete<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>) {
        let (current_bssid, ssid, req) = match self.state_ref() {
            State::Associated { bss, req, .. } => (bss.bssid, bss.ssid.clone(), req.clone()),
            _ => return,
        };
        let candidate = match &self.roam {
            Some(roam) => roam.pick_candidate(&cc.scanner.results(), current_bssid, &ssid),
            None => return,
        };
        if let Some(candidate) = candidate {
            cc.ctx.events.send(MlmeEvent::RoamAttempt { vif: self.vif, bssid: candidate.bssid });
            let mut reconnect = req;
            reconnect.bssid = Some(candidate.bssid);
            reconnect.channel = Some(candidate.channel);
            self.deferred.push_back(Deferred::Connect(reconnect));
            self.step(
                cc,
                ClientEvent::Disconnect {
                    reason: ReasonCode::LEAVING_NETWORK_DEAUTH,
                    notify: false,
                },
            );
        }
    }

    /// Completion of a power-save announcement or trigger frame.
    pub fn handle_null_tx_result<D: Device>(
        &mut self,
        cc: &mut ClientCtx<'_, D>,
        token: TxToken,
        success: bool,
    ) {
        if !self.ps.owns_token(token) {
            return;
        }
        let link = match self.link_info() {
            Some(link) => link,
            None => return,
        };
        let decision = self.ps.on_null_tx_result(cc.ctx, cc.tx, &link, success);
        self.apply_ps_decision(cc, decision);
    }

    fn apply_ps_decision<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>, decision: PsDecision) {
        match decision {
            PsDecision::None => {}
            PsDecision::Confirmed { enabled } => {
                cc.ctx.events.send(MlmeEvent::PowerSaveConf { vif: self.vif, enabled });
            }
            PsDecision::LinkLost => {
                cc.ctx.events.send(MlmeEvent::ConnectionLost {
                    vif: self.vif,
                    cause: ConnectFailure::LinkLost,
                });
                self.step(
                    cc,
                    ClientEvent::Disconnect {
                        reason: ReasonCode::UNSPECIFIED_REASON,
                        notify: false,
                    },
                );
            }
        }
    }

    /// Full reset (hardware/fatal error): every in-flight attempt resolves
    /// with exactly one notification, all link state is dropped.
    pub fn reset<D: Device>(&mut self, cc: &mut ClientCtx<'_, D>) {
        if self.is_associated() {
            cc.ctx.events.send(MlmeEvent::ConnectionLost {
                vif: self.vif,
                cause: ConnectFailure::LinkLost,
            });
        } else if self.in_connection_setup() {
            cc.ctx.events.send(MlmeEvent::ConnectConf {
                vif: self.vif,
                result: ConnectResult::Failed(ConnectFailure::LinkLost),
            });
        } else if let State::Disconnecting { notify: true, .. } = self.state_ref() {
            cc.ctx.events.send(MlmeEvent::DisconnectConf { vif: self.vif });
        }
        if self.is_associated() {
            self.disarm_link(cc);
        }
        self.deferred.clear();
        self.state = Some(State::Idle);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            block_ack::{BlockAckConfig, BlockAckManager},
            device::test_utils::FakeDevice,
            rates::RateSelector,
            test_utils::{fake_context_with_events, next_event},
            Context,
        },
        futures::channel::mpsc::UnboundedReceiver,
        parking_lot::Mutex,
        std::sync::Arc,
        wlan_common::{
            assert_variant,
            mac::{CapabilityInfo, StatusCode},
            security::CipherSuite,
        },
    };

    const VIF: VifId = VifId(0);
    const CLIENT_ADDR: MacAddr = [7; 6];
    const AP: MacAddr = [0x0b; 6];

    struct TestHelper {
        ctx: Context<FakeDevice>,
        events: UnboundedReceiver<MlmeEvent>,
        tx: TxPipeline,
        peers: PeerTable,
        block_ack: BlockAckManager,
        scanner: Scanner,
        client: Client,
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
                client: Client::new(VIF, CLIENT_ADDR),
            }
        }

        fn with<R>(&mut self, f: impl FnOnce(&mut Client, &mut ClientCtx<'_, FakeDevice>) -> R) -> R {
            let mut cc = ClientCtx {
                ctx: &mut self.ctx,
                tx: &mut self.tx,
                peers: &mut self.peers,
                block_ack: &mut self.block_ack,
                scanner: &mut self.scanner,
            };
            f(&mut self.client, &mut cc)
        }

        fn connect_to_associated(&mut self) {
            let req = ConnectRequest {
                ssid: b"corp".to_vec(),
                bssid: Some(Bssid(AP)),
                channel: Some(6),
                scan_type: ScanType::Active,
                cipher: CipherSuite::Open,
                key: None,
            };
            self.with(|client, cc| {
                client.handle_connect(cc, req);
                client.step(cc, ClientEvent::ChannelComplete);
                client.step(cc, ClientEvent::AuthFrame { from: AP, status: StatusCode::SUCCESS });
                client.step(
                    cc,
                    ClientEvent::AssocResp {
                        status: StatusCode::SUCCESS,
                        aid: 5,
                        caps: CapabilityInfo(0).with_ess(true).with_qos(true).with_apsd(false),
                        rates: vec![wlan_common::ie::SupportedRate(0x82)],
                    },
                );
                client.step(cc, ClientEvent::PeerAddComplete { addr: AP, hw_index: Some(0) });
                client.step(cc, ClientEvent::BssParamComplete { ok: true });
                client.step(cc, ClientEvent::BssParamComplete { ok: true });
                client.step(cc, ClientEvent::BssParamComplete { ok: true });
                client.step(
                    cc,
                    ClientEvent::RadioStateComplete(crate::device::RadioState::Active),
                );
            });
            assert!(self.client.is_associated());
            while next_event(&mut self.events).is_some() {}
            self.ctx.device.calls.clear();
        }
    }

    #[test]
    fn second_connect_answers_busy() {
        let mut h = TestHelper::new();
        let req = ConnectRequest {
            ssid: b"corp".to_vec(),
            bssid: Some(Bssid(AP)),
            channel: Some(6),
            scan_type: ScanType::Active,
            cipher: CipherSuite::Open,
            key: None,
        };
        h.with(|client, cc| {
            client.handle_connect(cc, req.clone());
            client.handle_connect(cc, req.clone());
        });
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::ConnectConf {
                result: ConnectResult::Failed(ConnectFailure::Busy),
                ..
            })
        );
        // The original attempt is still in flight, not duplicated.
        assert!(!h.client.is_idle());
        assert!(next_event(&mut h.events).is_none());
    }

    #[test]
    fn disconnect_mid_transition_is_deferred_and_replayed() {
        let mut h = TestHelper::new();
        let req = ConnectRequest {
            ssid: b"corp".to_vec(),
            bssid: Some(Bssid(AP)),
            channel: Some(6),
            scan_type: ScanType::Active,
            cipher: CipherSuite::Open,
            key: None,
        };
        h.with(|client, cc| {
            client.handle_connect(cc, req);
            client.step(cc, ClientEvent::ChannelComplete);
            client.step(cc, ClientEvent::AuthFrame { from: AP, status: StatusCode::SUCCESS });
            client.step(
                cc,
                ClientEvent::AssocResp {
                    status: StatusCode::SUCCESS,
                    aid: 5,
                    caps: CapabilityInfo(0).with_ess(true),
                    rates: vec![wlan_common::ie::SupportedRate(0x82)],
                },
            );
            // Mid peer registration: the disconnect must not be dropped.
            client.handle_disconnect(cc, ReasonCode::LEAVING_NETWORK_DEAUTH, true);
            assert!(!client.deferred.is_empty());
            client.step(cc, ClientEvent::PeerAddComplete { addr: AP, hw_index: Some(0) });
            client.step(cc, ClientEvent::BssParamComplete { ok: true });
            client.step(cc, ClientEvent::BssParamComplete { ok: true });
            client.step(cc, ClientEvent::BssParamComplete { ok: true });
            client.step(cc, ClientEvent::RadioStateComplete(crate::device::RadioState::Active));
            // On reaching Associated the deferred disconnect replays
            // immediately.
            assert!(matches!(client.state_ref(), State::Disconnecting { .. }));
            client.step(cc, ClientEvent::PeerDelComplete { addr: AP });
            client.step(cc, ClientEvent::RadioStateComplete(crate::device::RadioState::Idle));
        });
        assert!(h.client.is_idle());
        // Success for the connect, then the disconnect confirmation.
        let mut saw_success = false;
        let mut saw_disconnect = false;
        while let Some(event) = next_event(&mut h.events) {
            match event {
                MlmeEvent::ConnectConf { result: ConnectResult::Success, .. } => {
                    saw_success = true
                }
                MlmeEvent::DisconnectConf { .. } => saw_disconnect = true,
                _ => {}
            }
        }
        assert!(saw_success);
        assert!(saw_disconnect);
    }

    #[test]
    fn beacon_resets_lost_bss_and_reports_signal() {
        let mut h = TestHelper::new();
        h.connect_to_associated();
        h.with(|client, cc| {
            client.handle_beacon(cc, Bssid(AP), -48, &[]);
        });
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::SignalReport { rssi_dbm: -48, .. })
        );
        // A beacon from a foreign BSS is not ours.
        h.with(|client, cc| {
            client.handle_beacon(cc, Bssid([9; 6]), -20, &[]);
        });
        assert!(next_event(&mut h.events).is_none());
    }

    #[test]
    fn conn_status_check_escalates_to_connection_lost() {
        let mut h = TestHelper::new();
        h.connect_to_associated();
        // Fire the status check enough times without beacons.
        for _ in 0..(LOST_BSS_TIMEOUT_BEACON_COUNT / ASSOCIATION_STATUS_CHECK_BEACON_COUNT) + 1 {
            h.with(|client, cc| {
                client.handle_timeout(cc, TimedEvent::ConnStatusCheck { vif: VIF });
            });
        }
        let mut saw_lost = false;
        while let Some(event) = next_event(&mut h.events) {
            if matches!(event, MlmeEvent::ConnectionLost { cause: ConnectFailure::LinkLost, .. }) {
                saw_lost = true;
            }
        }
        assert!(saw_lost);
        // The deauth frame went out as part of the teardown.
        assert!(h
            .ctx
            .device
            .sent_frames()
            .iter()
            .any(|frame| frame.frame[0] == 0b1100_0000));
    }

    #[test]
    fn power_save_round_trip_via_client() {
        let mut h = TestHelper::new();
        h.connect_to_associated();
        h.with(|client, cc| client.handle_set_power_save(cc, true));
        let frames = h.ctx.device.sent_frames();
        assert_eq!(frames.len(), 1);
        let token = frames[0].token;
        h.with(|client, cc| client.handle_null_tx_result(cc, token, true));
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::PowerSaveConf { enabled: true, .. })
        );
    }

    #[test]
    fn roam_scan_complete_moves_to_better_candidate() {
        let mut h = TestHelper::new();
        h.connect_to_associated();
        // Degrade the link average well below the roam trigger.
        h.with(|client, cc| {
            for _ in 0..60 {
                client.handle_beacon(cc, Bssid(AP), -88, &[]);
            }
        });
        while next_event(&mut h.events).is_some() {}

        // A roam check starts a background scan.
        h.with(|client, cc| client.handle_timeout(cc, TimedEvent::RoamScan { vif: VIF }));
        assert!(h.scanner.is_scanning());

        // Feed a clearly better candidate and finish the scan.
        h.with(|client, cc| {
            cc.scanner.handle_beacon_or_probe_resp(
                Bssid([0xcc; 6]),
                11,
                -40,
                100,
                CapabilityInfo(0).with_ess(true),
                &[0, 4, b'c', b'o', b'r', b'p'],
            );
            // Walk the remaining dwell windows until the scan completes.
            loop {
                if cc.scanner.handle_dwell_timeout(cc.ctx).is_some() {
                    break;
                }
            }
            client.handle_roam_scan_complete(cc);
        });
        let mut saw_roam = false;
        while let Some(event) = next_event(&mut h.events) {
            if let MlmeEvent::RoamAttempt { bssid, .. } = event {
                assert_eq!(bssid, Bssid([0xcc; 6]));
                saw_roam = true;
            }
        }
        assert!(saw_roam);
        // The old link is being torn down; the reconnect is queued.
        assert!(matches!(h.client.state_ref(), State::Disconnecting { .. }));
        assert!(!h.client.deferred.is_empty());
    }

    #[test]
    fn reset_resolves_inflight_connect() {
        let mut h = TestHelper::new();
        let req = ConnectRequest {
            ssid: b"corp".to_vec(),
            bssid: Some(Bssid(AP)),
            channel: Some(6),
            scan_type: ScanType::Active,
            cipher: CipherSuite::Open,
            key: None,
        };
        h.with(|client, cc| {
            client.handle_connect(cc, req);
            client.reset(cc);
        });
        assert!(h.client.is_idle());
        assert_variant!(
            next_event(&mut h.events),
            Some(MlmeEvent::ConnectConf {
                result: ConnectResult::Failed(ConnectFailure::LinkLost),
                ..
            })
        );
    }
}
