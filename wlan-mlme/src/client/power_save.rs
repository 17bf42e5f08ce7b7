// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The per-interface power-save controller. Sleep and wake are announced
//! to the peer with null data frames; a bounded number of failed
//! announcements escalates to connection loss instead of retrying forever.
//! While dozing, every beacon's traffic map is inspected and buffered
//! traffic is retrieved with a PS-Poll, or a trigger frame when every
//! access category uses unscheduled delivery.

use {
    crate::{
        device::{Device, TxToken},
        timer::EventId,
        tx::TxPipeline,
        Context, TimedEvent,
    },
    log::{error, warn},
    std::time::Duration,
    super::LinkInfo,
};

#[derive(Clone, Debug, PartialEq)]
pub struct PowerSaveConfig {
    /// Failed null-frame announcements tolerated before the peer is
    /// declared unreachable.
    pub null_retry_max: u8,
    /// Unscheduled-delivery service period timeout; the keep-alive trigger
    /// fires at half of it.
    pub service_period_timeout: Duration,
}

impl Default for PowerSaveConfig {
    fn default() -> Self {
        Self { null_retry_max: 3, service_period_timeout: Duration::from_millis(1600) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PsMode {
    Off,
    /// A null frame announcing sleep is in flight.
    Entering,
    On,
    /// A null frame announcing wake is in flight.
    Leaving,
}

/// What the caller must do after a power-save handler ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PsDecision {
    None,
    /// The mode change completed; confirm it to the upper layer.
    Confirmed { enabled: bool },
    /// The announcement retry budget is exhausted; the link is gone.
    LinkLost,
}

#[derive(Debug)]
pub struct PowerSave {
    mode: PsMode,
    /// Delivery-enabled for all ACs: retrieval uses trigger frames.
    uapsd: bool,
    paused: bool,
    retries: u8,
    pending_null: Option<TxToken>,
    /// Awake because announced traffic is still being retrieved.
    awake_hold: bool,
    keep_alive_timer: Option<EventId>,
    traffic_since_check: bool,
}

impl PowerSave {
    pub fn new() -> Self {
        Self {
            mode: PsMode::Off,
            uapsd: false,
            paused: false,
            retries: 0,
            pending_null: None,
            awake_hold: false,
            keep_alive_timer: None,
            traffic_since_check: false,
        }
    }

    /// Called at link activation with the association's delivery mode.
    pub fn arm(&mut self, uapsd: bool) {
        *self = Self::new();
        self.uapsd = uapsd;
    }

    pub fn disarm<D: Device>(&mut self, ctx: &mut Context<D>) {
        if let Some(timer) = self.keep_alive_timer.take() {
            ctx.timer.cancel_event(timer);
        }
        *self = Self::new();
    }

    pub fn enabled(&self) -> bool {
        matches!(self.mode, PsMode::On | PsMode::Entering)
    }

    pub fn owns_token(&self, token: TxToken) -> bool {
        self.pending_null == Some(token)
    }

    /// Starts a mode change by announcing it with one null frame.
    pub fn request<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        tx: &mut TxPipeline,
        link: &LinkInfo,
        enabled: bool,
    ) -> PsDecision {
        match (self.mode, enabled) {
            (PsMode::On, true) | (PsMode::Off, false) => {
                return PsDecision::Confirmed { enabled };
            }
            (PsMode::Entering, true) | (PsMode::Leaving, false) => return PsDecision::None,
            _ => {}
        }
        self.retries = 0;
        match tx.send_null_frame(ctx, link.addr, link.bssid, enabled) {
            Ok(token) => {
                self.pending_null = Some(token);
                self.mode = if enabled { PsMode::Entering } else { PsMode::Leaving };
                PsDecision::None
            }
            Err(e) => {
                error!("failed to send power save announcement: {}", e);
                PsDecision::None
            }
        }
    }

    /// Transmit completion for an announcement null frame.
    pub fn on_null_tx_result<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        tx: &mut TxPipeline,
        link: &LinkInfo,
        success: bool,
    ) -> PsDecision {
        self.pending_null = None;
        let entering = match self.mode {
            PsMode::Entering => true,
            PsMode::Leaving => false,
            _ => return PsDecision::None,
        };
        if success {
            self.retries = 0;
            if entering {
                self.mode = PsMode::On;
                self.schedule_keep_alive(ctx, link);
            } else {
                self.mode = PsMode::Off;
                if let Some(timer) = self.keep_alive_timer.take() {
                    ctx.timer.cancel_event(timer);
                }
            }
            return PsDecision::Confirmed { enabled: entering };
        }
        self.retries += 1;
        if self.retries >= ctx.config.ps.null_retry_max {
            warn!("power save announcement failed {} times; peer unreachable", self.retries);
            return PsDecision::LinkLost;
        }
        match tx.send_null_frame(ctx, link.addr, link.bssid, entering) {
            Ok(token) => self.pending_null = Some(token),
            Err(e) => error!("failed to resend power save announcement: {}", e),
        }
        PsDecision::None
    }

    /// Beacon intake while dozing: polls for announced unicast traffic and
    /// stays awake until that exchange completes.
    pub fn on_beacon_tim<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        tx: &mut TxPipeline,
        link: &LinkInfo,
        traffic_buffered: bool,
    ) {
        if self.mode != PsMode::On || self.paused || !traffic_buffered || self.awake_hold {
            return;
        }
        self.awake_hold = true;
        let result = if self.uapsd {
            tx.send_qos_null_frame(ctx, link.addr, link.bssid, 0, true).map(|_| ())
        } else {
            tx.send_ps_poll_frame(ctx, link.addr, link.bssid, link.aid).map(|_| ())
        };
        if let Err(e) = result {
            error!("failed to poll for buffered traffic: {}", e);
            self.awake_hold = false;
        }
    }

    /// Received-data intake: ends the awake hold once the peer has nothing
    /// more buffered.
    pub fn on_rx_data(&mut self, more_data: bool) {
        self.traffic_since_check = true;
        if self.awake_hold && !more_data {
            self.awake_hold = false;
        }
    }

    pub fn on_tx_activity(&mut self) {
        self.traffic_since_check = true;
    }

    /// Periodic unscheduled-delivery keep-alive: triggers only when the
    /// link went quiet, never on an already-active link.
    pub fn on_keep_alive_timeout<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        tx: &mut TxPipeline,
        link: &LinkInfo,
    ) {
        self.keep_alive_timer = None;
        if self.mode != PsMode::On || !self.uapsd {
            return;
        }
        if !self.paused && !self.traffic_since_check {
            if let Err(e) = tx.send_qos_null_frame(ctx, link.addr, link.bssid, 0, true) {
                error!("failed to send keep-alive trigger: {}", e);
            }
        }
        self.traffic_since_check = false;
        self.schedule_keep_alive(ctx, link);
    }

    /// A higher-priority traffic signal pauses dozing without the disable/
    /// re-enable announcement round trip.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn schedule_keep_alive<D: Device>(&mut self, ctx: &mut Context<D>, link: &LinkInfo) {
        if !self.uapsd {
            return;
        }
        let delay = ctx.config.ps.service_period_timeout / 2;
        self.keep_alive_timer =
            Some(ctx.timer.schedule_after(delay, TimedEvent::PsKeepAlive { vif: link.vif }));
    }
}
