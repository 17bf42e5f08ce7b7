// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The transmit security/framing pipeline. Every outgoing frame passes
//! through here: the logical-port gate, cipher sequencing, MAC header
//! construction, security-field population, rate selection and queue
//! submission. Completions come back through [`TxPipeline::on_tx_status`]
//! and are classified for the actor that cares about them.

use {
    crate::{
        device::{ac_for_tid, AccessCategory, Device, TxRequest, TxToken},
        error::Error,
        key::KeyStore,
        peer::{PeerTable, PortState},
        rates::RateSelector,
        Context, VifId,
    },
    log::{debug, warn},
    parking_lot::Mutex,
    std::{collections::HashMap, sync::Arc},
    wlan_common::{
        appendable::Appendable,
        ie,
        mac::{self, Bssid, MacAddr},
        security,
        sequence::SequenceManager,
    },
};

/// What one in-flight frame was, for completion routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Data { aggregated: bool },
    Null,
    QosNull,
    PsPoll,
    ProbeReq,
    Auth,
    AssocReq,
    Deauth,
    Action,
}

/// A classified hardware transmit completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxConfirm {
    pub kind: FrameKind,
    pub peer: MacAddr,
    pub tid: u16,
    pub success: bool,
}

/// Everything the pipeline needs to know about one outgoing data frame.
/// Exists only for the duration of this frame's traversal.
pub struct TxDescriptor<'a> {
    pub vif: VifId,
    pub src: MacAddr,
    pub dst: MacAddr,
    pub bssid: Bssid,
    /// Receiver address; for a station this is the BSSID.
    pub peer: MacAddr,
    pub tid: u16,
    pub ether_type: u16,
    pub payload: &'a [u8],
    pub aggregated: bool,
    pub more_data: bool,
    /// Relay (four-address) framing.
    pub four_addr: bool,
    /// A retransmission reuses the sequencing of the frame it replaces.
    pub retry_of: Option<TxToken>,
}

struct PendingTx {
    kind: FrameKind,
    peer: MacAddr,
    tid: u16,
    pn: Option<u64>,
    seq_num: u16,
    tx_vector: u16,
}

pub struct TxPipeline {
    seq_mgr: SequenceManager,
    pub keys: KeyStore,
    rates: Arc<Mutex<RateSelector>>,
    next_token: TxToken,
    pending: HashMap<TxToken, PendingTx>,
    /// Frames refused by the logical-port gate. Dropped frames are counted,
    /// never silently lost without trace.
    port_discards: u64,
}

impl TxPipeline {
    pub fn new(rates: Arc<Mutex<RateSelector>>) -> Self {
        Self {
            seq_mgr: SequenceManager::new(),
            keys: KeyStore::new(),
            rates,
            next_token: 0,
            pending: HashMap::new(),
            port_discards: 0,
        }
    }

    pub fn rates(&self) -> &Arc<Mutex<RateSelector>> {
        &self.rates
    }

    pub fn port_discards(&self) -> u64 {
        self.port_discards
    }

    /// Clears all in-flight bookkeeping and cipher state (reset path).
    pub fn reset(&mut self) {
        self.pending.clear();
        self.keys.clear();
        self.seq_mgr = SequenceManager::new();
        self.rates.lock().clear();
    }

    pub fn remove_peer(&mut self, addr: &MacAddr) {
        self.keys.remove_peer(addr);
        self.seq_mgr.delete_sta(addr);
        self.rates.lock().remove_peer(addr);
    }

    fn take_token(&mut self) -> TxToken {
        self.next_token += 1;
        self.next_token
    }

    /// Transmits one data frame through the full pipeline.
    pub fn send_data_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        peers: &PeerTable,
        desc: TxDescriptor<'_>,
    ) -> Result<TxToken, Error> {
        // Step 1: logical port filter.
        match peers.port_state(&desc.peer) {
            PortState::Open => {}
            PortState::Controlled(allowed) if allowed == desc.ether_type => {}
            _ => {
                self.port_discards += 1;
                debug!(
                    "dropping frame to {:02x?}: logical port not open (discards: {})",
                    desc.peer, self.port_discards
                );
                return Err(Error::Refused("logical port closed"));
            }
        }

        // Step 2: cipher sequencing. The packet number advances exactly
        // once per first transmission; a retry reuses its predecessor's.
        let retry_state = match desc.retry_of {
            Some(token) => match self.pending.get(&token) {
                Some(prior) => Some((prior.pn, prior.seq_num)),
                None => {
                    warn!("retry of unknown tx token {}", token);
                    None
                }
            },
            None => None,
        };
        let is_retry = retry_state.is_some();
        let pn = match retry_state {
            Some((pn, _)) => pn,
            None => match self.keys.pairwise_mut(&desc.peer) {
                Some(cipher_ctx) => Some(cipher_ctx.advance_pn()?),
                None => None,
            },
        };

        // Step 3: MAC header.
        let qos = peers.supports_qos(&desc.peer);
        let mut frame_ctrl = mac::FrameControl(0)
            .with_frame_type(mac::FrameType::DATA)
            .with_data_subtype(if qos { mac::DataSubtype::QOS_DATA } else { mac::DataSubtype::DATA })
            .with_more_data(desc.more_data)
            .with_retry(is_retry)
            .with_protected(pn.is_some());
        let seq_num = match retry_state {
            Some((_, seq_num)) => seq_num,
            None if qos => self.seq_mgr.next_sns2(&desc.peer, desc.tid),
            None => self.seq_mgr.next_sns1(&desc.peer),
        };
        let seq_ctrl = mac::SequenceControl(0).with_seq_num(seq_num);

        let mut frame = vec![];
        if desc.four_addr {
            frame_ctrl.set_to_ds(true);
            frame_ctrl.set_from_ds(true);
            frame
                .append_value(&mac::FixedDataHdrFields {
                    frame_ctrl,
                    duration: 0,
                    addr1: desc.peer,
                    addr2: desc.src,
                    addr3: desc.dst,
                    seq_ctrl,
                })
                .map_err(|_| Error::NoResources("tx buffer"))?;
            frame
                .append_value(&mac::Addr4(desc.src))
                .map_err(|_| Error::NoResources("tx buffer"))?;
        } else {
            let mut fixed = mac::data_hdr_client_to_ap(frame_ctrl, desc.bssid, desc.src, seq_ctrl);
            fixed.addr3 = desc.dst;
            frame.append_value(&fixed).map_err(|_| Error::NoResources("tx buffer"))?;
        }
        if qos {
            frame
                .append_value(&mac::QosControl(0).with_tid(desc.tid))
                .map_err(|_| Error::NoResources("tx buffer"))?;
        }

        // Step 4: security fields. The trailer (ICV/MIC) space is filled by
        // the hardware cipher engine; only the IV is stamped here.
        if let (Some(pn), Some(cipher_ctx)) = (pn, self.keys.pairwise(&desc.peer)) {
            security::write_iv(cipher_ctx.cipher, pn, cipher_ctx.key_id, &mut frame)?;
        }

        frame
            .append_value(&mac::make_snap_llc_hdr(desc.ether_type))
            .map_err(|_| Error::NoResources("tx buffer"))?;
        frame.append_bytes(desc.payload).map_err(|_| Error::NoResources("tx buffer"))?;

        // Step 5: rate selection and queue submission.
        let (tx_vector, fallback) = self.rates.lock().select(&desc.peer);
        let token = self.take_token();
        ctx.device.send_frame(TxRequest {
            token,
            tc: ac_for_tid(desc.tid),
            tx_vector: *tx_vector,
            fallback_tx_vector: *fallback,
            frame,
        })?;
        self.pending.insert(
            token,
            PendingTx {
                kind: FrameKind::Data { aggregated: desc.aggregated },
                peer: desc.peer,
                tid: desc.tid,
                pn,
                seq_num,
                tx_vector: *tx_vector,
            },
        );
        Ok(token)
    }

    /// Step 6: classifies a hardware completion for the actor it feeds.
    pub fn on_tx_status(&mut self, token: TxToken, success: bool) -> Option<TxConfirm> {
        let pending = self.pending.remove(&token)?;
        if let Some(tx_vector) = crate::rates::TxVecIdx::new(pending.tx_vector) {
            self.rates.lock().on_tx_result(&pending.peer, tx_vector, success);
        }
        Some(TxConfirm { kind: pending.kind, peer: pending.peer, tid: pending.tid, success })
    }

    fn send_mgmt_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        kind: FrameKind,
        peer: MacAddr,
        frame: Vec<u8>,
        seq_num: u16,
    ) -> Result<TxToken, Error> {
        let tx_vector = self.rates.lock().select_basic(&peer);
        let token = self.take_token();
        ctx.device.send_frame(TxRequest {
            token,
            tc: AccessCategory::Voice,
            tx_vector: *tx_vector,
            fallback_tx_vector: *tx_vector,
            frame,
        })?;
        self.pending.insert(
            token,
            PendingTx { kind, peer, tid: 0, pn: None, seq_num, tx_vector: *tx_vector },
        );
        Ok(token)
    }

    fn mgmt_hdr(
        &mut self,
        subtype: mac::MgmtSubtype,
        client_addr: MacAddr,
        bssid: Bssid,
        peer: MacAddr,
    ) -> (mac::MgmtHdr, u16) {
        let seq_num = self.seq_mgr.next_sns1(&peer);
        let hdr = mac::MgmtHdr {
            frame_ctrl: mac::FrameControl(0)
                .with_frame_type(mac::FrameType::MGMT)
                .with_mgmt_subtype(subtype),
            duration: 0,
            addr1: peer,
            addr2: client_addr,
            addr3: bssid.0,
            seq_ctrl: mac::SequenceControl(0).with_seq_num(seq_num),
        };
        (hdr, seq_num)
    }

    pub fn send_auth_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        client_addr: MacAddr,
        bssid: Bssid,
    ) -> Result<TxToken, Error> {
        let (hdr, seq_num) = self.mgmt_hdr(mac::MgmtSubtype::AUTH, client_addr, bssid, bssid.0);
        let mut frame = vec![];
        frame.append_value(&hdr).map_err(|_| Error::NoResources("tx buffer"))?;
        frame
            .append_value(&mac::AuthHdr {
                auth_alg_num: mac::AuthAlgorithmNumber::OPEN,
                auth_txn_seq_num: 1,
                status_code: mac::StatusCode::SUCCESS,
            })
            .map_err(|_| Error::NoResources("tx buffer"))?;
        self.send_mgmt_frame(ctx, FrameKind::Auth, bssid.0, frame, seq_num)
    }

    pub fn send_assoc_req_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        client_addr: MacAddr,
        bss: &crate::client::BssInfo,
    ) -> Result<TxToken, Error> {
        let (hdr, seq_num) =
            self.mgmt_hdr(mac::MgmtSubtype::ASSOC_REQ, client_addr, bss.bssid, bss.bssid.0);
        let mut frame = vec![];
        frame.append_value(&hdr).map_err(|_| Error::NoResources("tx buffer"))?;
        let mut capabilities = mac::CapabilityInfo(0).with_ess(true);
        capabilities.set_privacy(bss.capabilities.privacy());
        frame
            .append_value(&mac::AssocReqHdr { capabilities, listen_interval: 10 })
            .map_err(|_| Error::NoResources("tx buffer"))?;
        ie::write_ssid(&mut frame, &bss.ssid)?;
        let rates: Vec<u8> = ctx.config.device_info.rates.iter().map(|r| r.0).collect();
        let rates_writer = ie::RatesWriter::try_new(&rates[..])?;
        rates_writer.write_supported_rates(&mut frame);
        rates_writer.write_ext_supported_rates(&mut frame);
        if let (Some(ht_cap), Some(_)) = (&ctx.config.device_info.ht_capabilities, &bss.ht_cap) {
            ie::write_ht_capabilities(&mut frame, ht_cap)?;
        }
        if let (Some(vht_cap), Some(_)) = (&ctx.config.device_info.vht_capabilities, &bss.vht_cap) {
            ie::write_vht_capabilities(&mut frame, vht_cap)?;
        }
        self.send_mgmt_frame(ctx, FrameKind::AssocReq, bss.bssid.0, frame, seq_num)
    }

    pub fn send_deauth_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        client_addr: MacAddr,
        bssid: Bssid,
        reason_code: mac::ReasonCode,
    ) -> Result<TxToken, Error> {
        let (hdr, seq_num) = self.mgmt_hdr(mac::MgmtSubtype::DEAUTH, client_addr, bssid, bssid.0);
        let mut frame = vec![];
        frame.append_value(&hdr).map_err(|_| Error::NoResources("tx buffer"))?;
        frame
            .append_value(&mac::DeauthHdr { reason_code })
            .map_err(|_| Error::NoResources("tx buffer"))?;
        self.send_mgmt_frame(ctx, FrameKind::Deauth, bssid.0, frame, seq_num)
    }

    /// Builds and sends a probe request. Caller-supplied extra elements are
    /// appended only when they fit the configured byte cap; oversized
    /// extras are dropped whole, never truncated.
    pub fn send_probe_req_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        client_addr: MacAddr,
        bssid_filter: Option<Bssid>,
        ssid: &[u8],
        extra_ies: &[u8],
    ) -> Result<TxToken, Error> {
        let bssid = bssid_filter.unwrap_or(mac::WILDCARD_BSSID);
        let (hdr, seq_num) =
            self.mgmt_hdr(mac::MgmtSubtype::PROBE_REQ, client_addr, bssid, mac::BCAST_ADDR);
        let mut frame = vec![];
        frame.append_value(&hdr).map_err(|_| Error::NoResources("tx buffer"))?;
        ie::write_ssid(&mut frame, ssid)?;
        let rates: Vec<u8> = ctx.config.device_info.rates.iter().map(|r| r.0).collect();
        let rates_writer = ie::RatesWriter::try_new(&rates[..])?;
        rates_writer.write_supported_rates(&mut frame);
        rates_writer.write_ext_supported_rates(&mut frame);
        if let Some(ht_cap) = &ctx.config.device_info.ht_capabilities {
            ie::write_ht_capabilities(&mut frame, ht_cap)?;
        }
        if let Some(vht_cap) = &ctx.config.device_info.vht_capabilities {
            ie::write_vht_capabilities(&mut frame, vht_cap)?;
        }
        if !extra_ies.is_empty() {
            if extra_ies.len() <= ctx.config.scan.probe_extra_ies_max {
                ie::write_raw_ies(&mut frame, extra_ies)?;
            } else {
                debug!("dropping oversized extra probe request elements ({} bytes)", extra_ies.len());
            }
        }
        self.send_mgmt_frame(ctx, FrameKind::ProbeReq, mac::BCAST_ADDR, frame, seq_num)
    }

    fn send_null_common<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        client_addr: MacAddr,
        bssid: Bssid,
        tid: Option<u16>,
        power_mgmt: bool,
    ) -> Result<TxToken, Error> {
        let subtype = if tid.is_some() { mac::DataSubtype::QOS_NULL } else { mac::DataSubtype::NULL };
        let frame_ctrl = mac::FrameControl(0)
            .with_frame_type(mac::FrameType::DATA)
            .with_data_subtype(subtype)
            .with_power_mgmt(power_mgmt);
        let seq_num = match tid {
            Some(tid) => self.seq_mgr.next_sns2(&bssid.0, tid),
            None => self.seq_mgr.next_sns1(&bssid.0),
        };
        let seq_ctrl = mac::SequenceControl(0).with_seq_num(seq_num);
        let mut frame = vec![];
        frame
            .append_value(&mac::data_hdr_client_to_ap(frame_ctrl, bssid, client_addr, seq_ctrl))
            .map_err(|_| Error::NoResources("tx buffer"))?;
        let kind = match tid {
            Some(tid) => {
                frame
                    .append_value(&mac::QosControl(0).with_tid(tid))
                    .map_err(|_| Error::NoResources("tx buffer"))?;
                FrameKind::QosNull
            }
            None => FrameKind::Null,
        };
        self.send_mgmt_frame(ctx, kind, bssid.0, frame, seq_num)
    }

    /// The power-save announcement frame.
    pub fn send_null_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        client_addr: MacAddr,
        bssid: Bssid,
        power_mgmt: bool,
    ) -> Result<TxToken, Error> {
        self.send_null_common(ctx, client_addr, bssid, None, power_mgmt)
    }

    /// The U-APSD trigger frame.
    pub fn send_qos_null_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        client_addr: MacAddr,
        bssid: Bssid,
        tid: u16,
        power_mgmt: bool,
    ) -> Result<TxToken, Error> {
        self.send_null_common(ctx, client_addr, bssid, Some(tid), power_mgmt)
    }

    pub fn send_ps_poll_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        client_addr: MacAddr,
        bssid: Bssid,
        aid: u16,
    ) -> Result<TxToken, Error> {
        let mut frame = vec![];
        frame
            .append_value(&mac::PsPoll {
                frame_ctrl: mac::ps_poll_frame_ctrl(),
                masked_aid: aid | mac::PS_POLL_AID_MASK,
                bssid: bssid.0,
                ta: client_addr,
            })
            .map_err(|_| Error::NoResources("tx buffer"))?;
        self.send_mgmt_frame(ctx, FrameKind::PsPoll, bssid.0, frame, 0)
    }

    /// Frames a BlockAck action body (ADDBA/DELBA) into a management frame.
    pub fn send_action_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        client_addr: MacAddr,
        bssid: Bssid,
        peer: MacAddr,
        body: &[u8],
    ) -> Result<TxToken, Error> {
        let (hdr, seq_num) = self.mgmt_hdr(mac::MgmtSubtype::ACTION, client_addr, bssid, peer);
        let mut frame = vec![];
        frame.append_value(&hdr).map_err(|_| Error::NoResources("tx buffer"))?;
        frame.append_bytes(body).map_err(|_| Error::NoResources("tx buffer"))?;
        self.send_mgmt_frame(ctx, FrameKind::Action, peer, frame, seq_num)
    }
}
