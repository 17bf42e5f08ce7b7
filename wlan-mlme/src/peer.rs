// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The associated-peer table: a fixed-capacity arena with explicit free-slot
//! search. The Connection Manager owns it; every other actor reads through
//! the narrow accessors at the bottom.

use {
    bitflags::bitflags,
    wlan_common::{channel::Cbw, ie::SupportedRate, mac::MacAddr},
    crate::{error::Error, VifId},
};

pub const MAX_PEERS: usize = 8;

bitflags! {
    /// Capabilities negotiated with a peer at association time.
    pub struct PeerCapabilities: u8 {
        const QOS = 1 << 0;
        const HT = 1 << 1;
        const VHT = 1 << 2;
        const MFP = 1 << 3;
    }
}

/// The 802.1X-style gate deciding which frames may be sent to a peer
/// before authorization completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortState {
    Closed,
    /// Only the whitelisted ethertype passes (key-exchange traffic).
    Controlled(u16),
    Open,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(pub u8);

#[derive(Debug)]
pub struct Peer {
    pub vif: VifId,
    pub addr: MacAddr,
    pub aid: u16,
    pub capabilities: PeerCapabilities,
    pub rates: Vec<SupportedRate>,
    pub bandwidth: Cbw,
    pub hw_index: Option<u16>,
    pub port: PortState,
    /// Whether the peer has announced power save (its PM bit).
    pub dozing: bool,
    pub key_slot: Option<u8>,
}

#[derive(Default)]
pub struct PeerTable {
    slots: [Option<Peer>; MAX_PEERS],
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a slot for a new peer. A station VIF holds at most one
    /// peer; a second allocation for the same VIF is refused. A full table
    /// is refused rather than grown.
    pub fn add(&mut self, peer: Peer) -> Result<PeerId, Error> {
        if self.slots.iter().flatten().any(|p| p.vif == peer.vif) {
            return Err(Error::Refused("peer already registered for interface"));
        }
        if self.slots.iter().flatten().any(|p| p.addr == peer.addr) {
            return Err(Error::Refused("peer address already registered"));
        }
        let free = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(Error::NoResources("peer table full"))?;
        self.slots[free] = Some(peer);
        Ok(PeerId(free as u8))
    }

    pub fn get(&self, id: PeerId) -> Option<&Peer> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut Peer> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn by_addr(&self, addr: &MacAddr) -> Option<(PeerId, &Peer)> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(i, slot)| match slot {
                Some(peer) if peer.addr == *addr => Some((PeerId(i as u8), peer)),
                _ => None,
            })
    }

    pub fn by_addr_mut(&mut self, addr: &MacAddr) -> Option<&mut Peer> {
        self.slots.iter_mut().flatten().find(|peer| peer.addr == *addr)
    }

    pub fn remove(&mut self, id: PeerId) -> Option<Peer> {
        self.slots.get_mut(id.0 as usize)?.take()
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    pub fn remove_vif(&mut self, vif: VifId) {
        for slot in self.slots.iter_mut() {
            if slot.as_ref().map_or(false, |peer| peer.vif == vif) {
                *slot = None;
            }
        }
    }

    // Narrow read-only accessors for the other actors.

    pub fn is_dozing(&self, addr: &MacAddr) -> bool {
        self.by_addr(addr).map_or(false, |(_, peer)| peer.dozing)
    }

    pub fn port_state(&self, addr: &MacAddr) -> PortState {
        self.by_addr(addr).map_or(PortState::Closed, |(_, peer)| peer.port)
    }

    pub fn supports_qos(&self, addr: &MacAddr) -> bool {
        self.by_addr(addr)
            .map_or(false, |(_, peer)| peer.capabilities.contains(PeerCapabilities::QOS))
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;

    pub fn fake_peer(vif: VifId, addr: MacAddr) -> Peer {
        Peer {
            vif,
            addr,
            aid: 1,
            capabilities: PeerCapabilities::QOS,
            rates: vec![SupportedRate(0x8c), SupportedRate(0x12)],
            bandwidth: Cbw::Cbw20,
            hw_index: None,
            port: PortState::Open,
            dozing: false,
            key_slot: None,
        }
    }
}
