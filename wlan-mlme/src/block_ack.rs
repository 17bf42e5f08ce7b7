// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! BlockAck agreement management, IEEE Std 802.11-2016, 10.24.
//!
//! One agreement exists per (peer, TID, direction). An agreement passes
//! through admission (resource grant, ADDBA exchange) before it is active;
//! it is destroyed by explicit DELBA, by inactivity, or with its peer. The
//! resource pool models the hardware's bounded reordering/aggregation
//! contexts: admission is refused, never queued, when the pool is dry.

use {
    crate::{
        device::Device,
        error::Error,
        peer::PeerTable,
        timer::EventId,
        tx::TxPipeline,
        Context, TimedEvent,
    },
    log::{error, warn},
    std::time::Duration,
    wlan_common::{
        appendable::Appendable,
        buffer_writer::BufferWriter,
        frame_len,
        mac::{self, Bssid, MacAddr},
    },
};

pub const ADDBA_REQ_BODY_LEN: usize = frame_len!(mac::ActionHdr, mac::AddbaReqHdr);
pub const ADDBA_RESP_BODY_LEN: usize = frame_len!(mac::ActionHdr, mac::AddbaRespHdr);
pub const DELBA_BODY_LEN: usize = frame_len!(mac::ActionHdr, mac::DelbaHdr);

const MAX_BA_AGREEMENTS: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub struct BlockAckConfig {
    /// The hardware's aggregation window limit; negotiated buffer sizes are
    /// clamped to it.
    pub hw_max_buffer: u16,
    /// Hardware reordering/aggregation contexts available for grants.
    pub max_sessions: usize,
    pub inactivity_timeout: Duration,
}

impl Default for BlockAckConfig {
    fn default() -> Self {
        Self {
            hw_max_buffer: 64,
            max_sessions: 4,
            inactivity_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaRole {
    Originator,
    Responder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BaPhase {
    CheckAdmission,
    Active,
}

#[derive(Debug)]
pub struct Agreement {
    pub peer: MacAddr,
    pub tid: u16,
    pub role: BaRole,
    phase: BaPhase,
    dialog_token: u8,
    /// Negotiated window, valid once active.
    pub window: u16,
    pub ssn: u16,
    inactivity_timer: Option<EventId>,
    /// Whether any frames moved under this agreement since the last tick.
    active_since_tick: bool,
    /// Retry/credit accounting fed by transmit completions.
    pub tx_attempts: u64,
    pub tx_failures: u64,
}

pub struct BlockAckManager {
    agreements: [Option<Agreement>; MAX_BA_AGREEMENTS],
    available_grants: usize,
    next_dialog_token: u8,
}

impl BlockAckManager {
    pub fn new(config: &BlockAckConfig) -> Self {
        Self {
            agreements: Default::default(),
            available_grants: config.max_sessions,
            next_dialog_token: 1,
        }
    }

    fn find(&self, peer: &MacAddr, tid: u16, role: BaRole) -> Option<usize> {
        self.agreements.iter().position(|slot| {
            slot.as_ref().map_or(false, |a| a.peer == *peer && a.tid == tid && a.role == role)
        })
    }

    fn insert(&mut self, agreement: Agreement) -> Result<(), Error> {
        let free = self
            .agreements
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(Error::NoResources("BlockAck agreement table full"))?;
        self.agreements[free] = Some(agreement);
        Ok(())
    }

    pub fn is_active(&self, peer: &MacAddr, tid: u16, role: BaRole) -> bool {
        self.find(peer, tid, role)
            .and_then(|idx| self.agreements[idx].as_ref())
            .map_or(false, |a| a.phase == BaPhase::Active)
    }

    pub fn agreement(&self, peer: &MacAddr, tid: u16, role: BaRole) -> Option<&Agreement> {
        self.find(peer, tid, role).and_then(|idx| self.agreements[idx].as_ref())
    }

    pub fn available_grants(&self) -> usize {
        self.available_grants
    }

    fn take_dialog_token(&mut self) -> u8 {
        let token = self.next_dialog_token;
        self.next_dialog_token = self.next_dialog_token.checked_add(1).unwrap_or(1);
        token
    }

    /// Originator path: requests admission and sends an ADDBA request.
    pub fn establish<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        tx: &mut TxPipeline,
        client_addr: MacAddr,
        bssid: Bssid,
        peer: MacAddr,
        tid: u16,
        ssn: u16,
    ) -> Result<(), Error> {
        if self.find(&peer, tid, BaRole::Originator).is_some() {
            return Err(Error::Refused("agreement already exists for TID"));
        }
        if self.available_grants == 0 {
            return Err(Error::NoResources("no BlockAck resource grant available"));
        }
        let dialog_token = self.take_dialog_token();
        let buffer_size = ctx.config.ba.hw_max_buffer;
        let mut body = [0u8; ADDBA_REQ_BODY_LEN];
        let mut writer = BufferWriter::new(&mut body[..]);
        write_addba_req_body(&mut writer, dialog_token, tid, buffer_size, ssn)?;
        tx.send_action_frame(ctx, client_addr, bssid, peer, writer.into_written())?;
        self.available_grants -= 1;
        self.insert(Agreement {
            peer,
            tid,
            role: BaRole::Originator,
            phase: BaPhase::CheckAdmission,
            dialog_token,
            window: buffer_size,
            ssn,
            inactivity_timer: None,
            active_since_tick: false,
            tx_attempts: 0,
            tx_failures: 0,
        })
    }

    /// Originator path: reacts to the peer's ADDBA response.
    pub fn handle_addba_resp<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        peer: MacAddr,
        resp: &mac::AddbaRespHdr,
    ) {
        let idx = match self.agreements.iter().position(|slot| match slot {
            Some(a) => {
                a.peer == peer && a.role == BaRole::Originator && a.phase == BaPhase::CheckAdmission
            }
            None => false,
        }) {
            Some(idx) => idx,
            None => {
                warn!("ADDBA response from {:02x?} without a pending request", peer);
                return;
            }
        };
        let agreement = self.agreements[idx].as_ref().unwrap();
        let matches = resp.parameters.tid() == agreement.tid
            && resp.dialog_token == agreement.dialog_token
            && { resp.status } == mac::StatusCode::SUCCESS;
        if !matches {
            error!(
                "ADDBA response mismatch or failure for {:02x?} TID {}; abandoning",
                peer, agreement.tid
            );
            self.destroy(ctx, idx);
            return;
        }
        // The responder's buffer size overrides ours when smaller; the
        // result is clamped to the hardware maximum either way.
        let agreement = self.agreements[idx].as_mut().unwrap();
        let resp_buffer = resp.parameters.buffer_size();
        if resp_buffer != 0 && resp_buffer < agreement.window {
            agreement.window = resp_buffer;
        }
        agreement.window = agreement.window.min(ctx.config.ba.hw_max_buffer);
        agreement.phase = BaPhase::Active;
        agreement.active_since_tick = false;
        let timeout = ctx.config.ba.inactivity_timeout;
        let event =
            TimedEvent::BaInactivity { peer, tid: agreement.tid, originator: true };
        agreement.inactivity_timer = Some(ctx.timer.schedule_after(timeout, event));
    }

    /// Responder path: reacts to a peer's ADDBA request. Refusals never
    /// consume a resource grant.
    pub fn handle_addba_req<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        tx: &mut TxPipeline,
        peers: &PeerTable,
        client_addr: MacAddr,
        bssid: Bssid,
        peer: MacAddr,
        req: &mac::AddbaReqHdr,
    ) -> Result<(), Error> {
        let tid = req.parameters.tid();
        let refusal = if self.find(&peer, tid, BaRole::Responder).is_some() {
            Some("TID already covered by an agreement")
        } else if peers.is_dozing(&peer) {
            Some("peer is in power save")
        } else if self.available_grants == 0 {
            Some("no resource grant available")
        } else {
            None
        };
        if let Some(reason) = refusal {
            warn!("refusing ADDBA request from {:02x?} TID {}: {}", peer, tid, reason);
            return self.send_addba_resp(
                ctx,
                tx,
                client_addr,
                bssid,
                peer,
                req.dialog_token,
                tid,
                0,
                mac::StatusCode::REQUEST_DECLINED,
            );
        }
        // Grant first; the affirmative response only goes out once the
        // grant succeeded.
        self.available_grants -= 1;
        let window = match req.parameters.buffer_size() {
            0 => ctx.config.ba.hw_max_buffer,
            n => n.min(ctx.config.ba.hw_max_buffer),
        };
        self.send_addba_resp(
            ctx,
            tx,
            client_addr,
            bssid,
            peer,
            req.dialog_token,
            tid,
            window,
            mac::StatusCode::SUCCESS,
        )?;
        let timeout = ctx.config.ba.inactivity_timeout;
        let timer = ctx.timer.schedule_after(
            timeout,
            TimedEvent::BaInactivity { peer, tid, originator: false },
        );
        self.insert(Agreement {
            peer,
            tid,
            role: BaRole::Responder,
            phase: BaPhase::Active,
            dialog_token: req.dialog_token,
            window,
            ssn: req.starting_sequence_control.starting_sequence_number(),
            inactivity_timer: Some(timer),
            active_since_tick: false,
            tx_attempts: 0,
            tx_failures: 0,
        })
    }

    fn send_addba_resp<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        tx: &mut TxPipeline,
        client_addr: MacAddr,
        bssid: Bssid,
        peer: MacAddr,
        dialog_token: u8,
        tid: u16,
        buffer_size: u16,
        status: mac::StatusCode,
    ) -> Result<(), Error> {
        let mut body = [0u8; ADDBA_RESP_BODY_LEN];
        let mut writer = BufferWriter::new(&mut body[..]);
        write_addba_resp_body(&mut writer, dialog_token, tid, buffer_size, status)?;
        tx.send_action_frame(ctx, client_addr, bssid, peer, writer.into_written())?;
        Ok(())
    }

    /// Explicit teardown requested by the peer.
    pub fn handle_delba<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        peer: MacAddr,
        hdr: &mac::DelbaHdr,
    ) {
        let tid = hdr.parameters.tid();
        // The sender flags whether it was the originator of the agreement;
        // that selects which of our directions is torn down.
        let role = if hdr.parameters.initiator() { BaRole::Responder } else { BaRole::Originator };
        match self.find(&peer, tid, role) {
            Some(idx) => self.destroy(ctx, idx),
            None => warn!("DELBA from {:02x?} for unknown agreement TID {}", peer, tid),
        }
    }

    /// Inactivity tick: rearm if frames moved since the last tick,
    /// otherwise tear the agreement down (the originator explicitly).
    pub fn handle_inactivity_timeout<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        tx: &mut TxPipeline,
        client_addr: MacAddr,
        bssid: Bssid,
        peer: MacAddr,
        tid: u16,
        originator: bool,
    ) {
        let role = if originator { BaRole::Originator } else { BaRole::Responder };
        let idx = match self.find(&peer, tid, role) {
            Some(idx) => idx,
            None => return,
        };
        let agreement = self.agreements[idx].as_mut().unwrap();
        if let Some(timer) = agreement.inactivity_timer.take() {
            ctx.timer.cancel_event(timer);
        }
        if agreement.active_since_tick {
            agreement.active_since_tick = false;
            let timeout = ctx.config.ba.inactivity_timeout;
            agreement.inactivity_timer = Some(
                ctx.timer
                    .schedule_after(timeout, TimedEvent::BaInactivity { peer, tid, originator }),
            );
            return;
        }
        if originator {
            let mut body = [0u8; DELBA_BODY_LEN];
            let mut writer = BufferWriter::new(&mut body[..]);
            match write_delba_body(&mut writer, true, tid, mac::ReasonCode::TIMEOUT)
                .map_err(Error::from)
                .and_then(|_| {
                    tx.send_action_frame(ctx, client_addr, bssid, peer, writer.into_written())
                }) {
                Ok(_) => {}
                Err(e) => error!("error sending DELBA frame: {}", e),
            }
        }
        self.destroy(ctx, idx);
    }

    /// Marks traffic movement under an agreement (either direction).
    pub fn note_activity(&mut self, peer: &MacAddr, tid: u16) {
        for slot in self.agreements.iter_mut().flatten() {
            if slot.peer == *peer && slot.tid == tid {
                slot.active_since_tick = true;
            }
        }
    }

    /// Feeds an aggregated-frame completion into the window's accounting.
    pub fn note_tx_result(&mut self, peer: &MacAddr, tid: u16, success: bool) {
        if let Some(idx) = self.find(peer, tid, BaRole::Originator) {
            let agreement = self.agreements[idx].as_mut().unwrap();
            agreement.tx_attempts += 1;
            if !success {
                agreement.tx_failures += 1;
            }
            agreement.active_since_tick = true;
        }
    }

    /// Destroys every agreement with a departing peer.
    pub fn teardown_peer<D: Device>(&mut self, ctx: &mut Context<D>, peer: &MacAddr) {
        for idx in 0..self.agreements.len() {
            if self.agreements[idx].as_ref().map_or(false, |a| a.peer == *peer) {
                self.destroy(ctx, idx);
            }
        }
    }

    pub fn reset<D: Device>(&mut self, ctx: &mut Context<D>) {
        for idx in 0..self.agreements.len() {
            if self.agreements[idx].is_some() {
                self.destroy(ctx, idx);
            }
        }
    }

    /// Every teardown path funnels here: the inactivity timer is canceled
    /// and the resource grant released before the record goes away.
    fn destroy<D: Device>(&mut self, ctx: &mut Context<D>, idx: usize) {
        if let Some(agreement) = self.agreements[idx].take() {
            if let Some(timer) = agreement.inactivity_timer {
                ctx.timer.cancel_event(timer);
            }
            self.available_grants += 1;
        }
    }
}

/// Writes the ADDBA request action body (category, action header and
/// parameters), IEEE Std 802.11-2016, 9.6.5.2.
pub fn write_addba_req_body<B: Appendable>(
    buffer: &mut B,
    dialog_token: u8,
    tid: u16,
    buffer_size: u16,
    ssn: u16,
) -> Result<(), Error> {
    buffer
        .append_value(&mac::ActionHdr { action: mac::ActionCategory::BLOCK_ACK })
        .map_err(|_| Error::NoResources("ADDBA request buffer"))?;
    buffer
        .append_value(&mac::AddbaReqHdr {
            action: mac::BlockAckAction::ADDBA_REQUEST,
            dialog_token,
            parameters: mac::BlockAckParameters(0)
                .with_amsdu(true)
                .with_policy(mac::BlockAckPolicy::IMMEDIATE)
                .with_tid(tid)
                .with_buffer_size(buffer_size),
            timeout: 0, // Local inactivity tracking is used instead.
            starting_sequence_control: mac::BlockAckStartingSequenceControl(0)
                .with_fragment_number(0) // Always zero, IEEE Std 802.11-2016, 9.6.5.2.
                .with_starting_sequence_number(ssn),
        })
        .map_err(|_| Error::NoResources("ADDBA request buffer"))?;
    Ok(())
}

/// Writes the ADDBA response action body, IEEE Std 802.11-2016, 9.6.5.3.
pub fn write_addba_resp_body<B: Appendable>(
    buffer: &mut B,
    dialog_token: u8,
    tid: u16,
    buffer_size: u16,
    status: mac::StatusCode,
) -> Result<(), Error> {
    buffer
        .append_value(&mac::ActionHdr { action: mac::ActionCategory::BLOCK_ACK })
        .map_err(|_| Error::NoResources("ADDBA response buffer"))?;
    buffer
        .append_value(&mac::AddbaRespHdr {
            action: mac::BlockAckAction::ADDBA_RESPONSE,
            dialog_token,
            status,
            parameters: mac::BlockAckParameters(0)
                .with_amsdu(true)
                .with_policy(mac::BlockAckPolicy::IMMEDIATE)
                .with_tid(tid)
                .with_buffer_size(buffer_size),
            timeout: 0,
        })
        .map_err(|_| Error::NoResources("ADDBA response buffer"))?;
    Ok(())
}

/// Writes the DELBA action body, IEEE Std 802.11-2016, 9.6.5.4.
pub fn write_delba_body<B: Appendable>(
    buffer: &mut B,
    is_initiator: bool,
    tid: u16,
    reason_code: mac::ReasonCode,
) -> Result<(), Error> {
    buffer
        .append_value(&mac::ActionHdr { action: mac::ActionCategory::BLOCK_ACK })
        .map_err(|_| Error::NoResources("DELBA buffer"))?;
    buffer
        .append_value(&mac::DelbaHdr {
            action: mac::BlockAckAction::DELBA,
            parameters: mac::DelbaParameters(0).with_initiator(is_initiator).with_tid(tid),
            reason_code,
        })
        .map_err(|_| Error::NoResources("DELBA buffer"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            peer::{test_utils::fake_peer, PeerTable},
            rates::RateSelector,
            test_utils::fake_context,
            VifId,
        },
        parking_lot::Mutex,
        std::sync::Arc,
    };

    const CLIENT: MacAddr = [7; 6];
    const AP: MacAddr = [0x0b; 6];

    fn manager() -> BlockAckManager {
        BlockAckManager::new(&BlockAckConfig::default())
    }

    fn pipeline() -> TxPipeline {
        TxPipeline::new(Arc::new(Mutex::new(RateSelector::new())))
    }

    fn success_resp(dialog_token: u8, tid: u16, buffer_size: u16) -> mac::AddbaRespHdr {
        mac::AddbaRespHdr {
            action: mac::BlockAckAction::ADDBA_RESPONSE,
            dialog_token,
            status: mac::StatusCode::SUCCESS,
            parameters: mac::BlockAckParameters(0)
                .with_amsdu(true)
                .with_policy(mac::BlockAckPolicy::IMMEDIATE)
                .with_tid(tid)
                .with_buffer_size(buffer_size),
            timeout: 0,
        }
    }

    fn addba_req(dialog_token: u8, tid: u16, buffer_size: u16) -> mac::AddbaReqHdr {
        mac::AddbaReqHdr {
            action: mac::BlockAckAction::ADDBA_REQUEST,
            dialog_token,
            parameters: mac::BlockAckParameters(0)
                .with_amsdu(true)
                .with_policy(mac::BlockAckPolicy::IMMEDIATE)
                .with_tid(tid)
                .with_buffer_size(buffer_size),
            timeout: 0,
            starting_sequence_control: mac::BlockAckStartingSequenceControl(0)
                .with_starting_sequence_number(1),
        }
    }

    #[test]
    fn originator_happy_path() {
        let mut ctx = fake_context();
        let mut ba = manager();
        let mut tx = pipeline();

        ba.establish(&mut ctx, &mut tx, CLIENT, mac::Bssid(AP), AP, 0, 1).expect("establish");
        assert_eq!(ba.available_grants(), BlockAckConfig::default().max_sessions - 1);
        assert!(!ba.is_active(&AP, 0, BaRole::Originator));

        // The ADDBA request went out with our dialog token.
        let frames = ctx.device.sent_frames();
        assert_eq!(frames.len(), 1);
        let body = &frames[0].frame[24..];
        assert_eq!(body[0], 0x03); // block ack category
        assert_eq!(body[1], 0x00); // ADDBA request
        let dialog_token = body[2];

        ba.handle_addba_resp(&mut ctx, AP, &success_resp(dialog_token, 0, 32));
        assert!(ba.is_active(&AP, 0, BaRole::Originator));
        // The smaller responder buffer size overrode ours.
        assert_eq!(ba.agreement(&AP, 0, BaRole::Originator).unwrap().window, 32);
        // Exactly one inactivity timer is armed.
        assert_eq!(ctx.timer.scheduled_count(), 1);
    }

    #[test]
    fn mismatched_dialog_token_abandons() {
        let mut ctx = fake_context();
        let mut ba = manager();
        let mut tx = pipeline();
        ba.establish(&mut ctx, &mut tx, CLIENT, mac::Bssid(AP), AP, 0, 1).unwrap();

        ba.handle_addba_resp(&mut ctx, AP, &success_resp(99, 0, 64));
        assert!(!ba.is_active(&AP, 0, BaRole::Originator));
        assert!(ba.agreement(&AP, 0, BaRole::Originator).is_none());
        // The grant was released with the abandoned attempt.
        assert_eq!(ba.available_grants(), BlockAckConfig::default().max_sessions);
        assert_eq!(ctx.timer.scheduled_count(), 0);
    }

    #[test]
    fn failure_status_abandons() {
        let mut ctx = fake_context();
        let mut ba = manager();
        let mut tx = pipeline();
        ba.establish(&mut ctx, &mut tx, CLIENT, mac::Bssid(AP), AP, 0, 1).unwrap();
        let frames = ctx.device.sent_frames();
        let dialog_token = frames[0].frame[26];

        let mut resp = success_resp(dialog_token, 0, 64);
        resp.status = mac::StatusCode::REQUEST_DECLINED;
        ba.handle_addba_resp(&mut ctx, AP, &resp);
        assert!(ba.agreement(&AP, 0, BaRole::Originator).is_none());
    }

    #[test]
    fn responder_refuses_peer_in_power_save_without_grant_request() {
        let mut ctx = fake_context();
        let mut ba = manager();
        let mut tx = pipeline();
        let mut peers = PeerTable::new();
        peers.add(fake_peer(VifId(0), AP)).unwrap();
        peers.by_addr_mut(&AP).unwrap().dozing = true;

        ba.handle_addba_req(
            &mut ctx,
            &mut tx,
            &peers,
            CLIENT,
            mac::Bssid(AP),
            AP,
            &addba_req(7, 3, 64),
        )
        .expect("refusal still sends a response");

        // No grant consumed, no agreement created.
        assert_eq!(ba.available_grants(), BlockAckConfig::default().max_sessions);
        assert!(ba.agreement(&AP, 3, BaRole::Responder).is_none());
        // A declined response went to the peer.
        let frames = ctx.device.sent_frames();
        let body = &frames[0].frame[24..];
        assert_eq!(body[1], 0x01); // ADDBA response
        assert_eq!(u16::from_le_bytes([body[3], body[4]]), { mac::StatusCode::REQUEST_DECLINED.0 });
    }

    #[test]
    fn responder_accepts_and_clamps_window() {
        let mut ctx = fake_context();
        let mut ba = manager();
        let mut tx = pipeline();
        let mut peers = PeerTable::new();
        peers.add(fake_peer(VifId(0), AP)).unwrap();

        ba.handle_addba_req(
            &mut ctx,
            &mut tx,
            &peers,
            CLIENT,
            mac::Bssid(AP),
            AP,
            &addba_req(7, 5, 256),
        )
        .expect("accept");
        let agreement = ba.agreement(&AP, 5, BaRole::Responder).expect("agreement");
        assert_eq!(agreement.window, BlockAckConfig::default().hw_max_buffer);
        assert!(ba.is_active(&AP, 5, BaRole::Responder));
        assert_eq!(ba.available_grants(), BlockAckConfig::default().max_sessions - 1);

        // A second request for the same TID is refused: already covered.
        ba.handle_addba_req(
            &mut ctx,
            &mut tx,
            &peers,
            CLIENT,
            mac::Bssid(AP),
            AP,
            &addba_req(8, 5, 64),
        )
        .expect("refusal response");
        assert_eq!(ba.available_grants(), BlockAckConfig::default().max_sessions - 1);
    }

    #[test]
    fn inactivity_tears_down_idle_originator_agreement() {
        let mut ctx = fake_context();
        let mut ba = manager();
        let mut tx = pipeline();
        ba.establish(&mut ctx, &mut tx, CLIENT, mac::Bssid(AP), AP, 6, 1).unwrap();
        let dialog_token = ctx.device.sent_frames()[0].frame[26];
        ba.handle_addba_resp(&mut ctx, AP, &success_resp(dialog_token, 6, 64));
        assert!(ba.is_active(&AP, 6, BaRole::Originator));
        ctx.device.calls.clear();

        // Activity since the tick: the timer is rearmed, nothing torn down.
        ba.note_activity(&AP, 6);
        ba.handle_inactivity_timeout(&mut ctx, &mut tx, CLIENT, mac::Bssid(AP), AP, 6, true);
        assert!(ba.is_active(&AP, 6, BaRole::Originator));
        assert!(ctx.device.sent_frames().is_empty());

        // No activity: an explicit DELBA goes out and the record dies.
        ba.handle_inactivity_timeout(&mut ctx, &mut tx, CLIENT, mac::Bssid(AP), AP, 6, true);
        assert!(ba.agreement(&AP, 6, BaRole::Originator).is_none());
        let frames = ctx.device.sent_frames();
        let body = &frames[0].frame[24..];
        assert_eq!(body[1], 0x02); // DELBA
        assert_eq!(ba.available_grants(), BlockAckConfig::default().max_sessions);
        // No lingering inactivity timers.
        assert_eq!(ctx.timer.scheduled_count(), 0);
    }

    #[test]
    fn delba_from_peer_destroys_matching_direction() {
        let mut ctx = fake_context();
        let mut ba = manager();
        let mut tx = pipeline();
        ba.establish(&mut ctx, &mut tx, CLIENT, mac::Bssid(AP), AP, 0, 1).unwrap();
        let dialog_token = ctx.device.sent_frames()[0].frame[26];
        ba.handle_addba_resp(&mut ctx, AP, &success_resp(dialog_token, 0, 64));

        // The peer (the responder) tears down our originator agreement.
        let delba = mac::DelbaHdr {
            action: mac::BlockAckAction::DELBA,
            parameters: mac::DelbaParameters(0).with_initiator(false).with_tid(0),
            reason_code: mac::ReasonCode::UNSPECIFIED_REASON,
        };
        ba.handle_delba(&mut ctx, AP, &delba);
        assert!(ba.agreement(&AP, 0, BaRole::Originator).is_none());
        assert_eq!(ctx.timer.scheduled_count(), 0);
        assert_eq!(ba.available_grants(), BlockAckConfig::default().max_sessions);
    }

    #[test]
    fn teardown_peer_releases_everything() {
        let mut ctx = fake_context();
        let mut ba = manager();
        let mut tx = pipeline();
        let mut peers = PeerTable::new();
        peers.add(fake_peer(VifId(0), AP)).unwrap();
        ba.establish(&mut ctx, &mut tx, CLIENT, mac::Bssid(AP), AP, 0, 1).unwrap();
        ba.handle_addba_req(
            &mut ctx,
            &mut tx,
            &peers,
            CLIENT,
            mac::Bssid(AP),
            AP,
            &addba_req(9, 1, 64),
        )
        .unwrap();

        ba.teardown_peer(&mut ctx, &AP);
        assert!(ba.agreement(&AP, 0, BaRole::Originator).is_none());
        assert!(ba.agreement(&AP, 1, BaRole::Responder).is_none());
        assert_eq!(ba.available_grants(), BlockAckConfig::default().max_sessions);
        assert_eq!(ctx.timer.scheduled_count(), 0);
    }

    #[test]
    fn tx_accounting_marks_activity() {
        let mut ctx = fake_context();
        let mut ba = manager();
        let mut tx = pipeline();
        ba.establish(&mut ctx, &mut tx, CLIENT, mac::Bssid(AP), AP, 0, 1).unwrap();
        let dialog_token = ctx.device.sent_frames()[0].frame[26];
        ba.handle_addba_resp(&mut ctx, AP, &success_resp(dialog_token, 0, 64));

        ba.note_tx_result(&AP, 0, true);
        ba.note_tx_result(&AP, 0, false);
        let agreement = ba.agreement(&AP, 0, BaRole::Originator).unwrap();
        assert_eq!(agreement.tx_attempts, 2);
        assert_eq!(agreement.tx_failures, 1);
        assert!(agreement.active_since_tick);
    }
}
