// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Cipher contexts and their packet-number counters. A context's transmit
//! counter is single-writer: only the transmit pipeline advances it, and it
//! advances exactly once per protected first transmission. Reuse of a
//! packet number under the same key would void the cipher's replay and
//! confidentiality guarantees.

use {
    crate::{device::KeySlot, error::Error, VifId},
    std::collections::HashMap,
    wlan_common::{mac::MacAddr, security::CipherSuite},
};

pub struct CipherContext {
    pub cipher: CipherSuite,
    pub key: Vec<u8>,
    pub key_id: u8,
    pub slot: u8,
    tx_pn: u64,
}

impl CipherContext {
    fn new(cipher: CipherSuite, key: Vec<u8>, key_id: u8, slot: u8) -> Self {
        Self { cipher, key, key_id, slot, tx_pn: 0 }
    }

    /// Advances the transmit packet number and returns the value to stamp
    /// into the frame. Fails once the cipher's counter space is exhausted;
    /// the key must be replaced at that point, never rewound.
    pub fn advance_pn(&mut self) -> Result<u64, Error> {
        if self.tx_pn >= self.cipher.max_pn() {
            return Err(Error::NoResources("packet number space exhausted"));
        }
        self.tx_pn += 1;
        Ok(self.tx_pn)
    }

    pub fn current_pn(&self) -> u64 {
        self.tx_pn
    }
}

/// All cipher contexts of one radio: one pairwise context per peer plus
/// default (group) contexts per VIF.
#[derive(Default)]
pub struct KeyStore {
    pairwise: HashMap<MacAddr, CipherContext>,
    group: HashMap<(VifId, u8), CipherContext>,
    next_slot: u8,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a pairwise key for a peer, replacing any previous context
    /// (and thereby resetting its packet number: a fresh key starts a fresh
    /// counter). Returns the slot assignment to program into hardware.
    pub fn assign_pairwise(
        &mut self,
        addr: MacAddr,
        cipher: CipherSuite,
        key: Vec<u8>,
        key_id: u8,
    ) -> KeySlot {
        let slot = self.alloc_slot();
        self.pairwise.insert(addr, CipherContext::new(cipher, key.clone(), key_id, slot));
        KeySlot { slot, key_id, cipher, key, addr }
    }

    pub fn assign_group(
        &mut self,
        vif: VifId,
        cipher: CipherSuite,
        key: Vec<u8>,
        key_id: u8,
    ) -> KeySlot {
        let slot = self.alloc_slot();
        self.group.insert((vif, key_id), CipherContext::new(cipher, key.clone(), key_id, slot));
        KeySlot { slot, key_id, cipher, key, addr: wlan_common::mac::BCAST_ADDR }
    }

    pub fn pairwise(&self, addr: &MacAddr) -> Option<&CipherContext> {
        self.pairwise.get(addr)
    }

    pub fn pairwise_mut(&mut self, addr: &MacAddr) -> Option<&mut CipherContext> {
        self.pairwise.get_mut(addr)
    }

    pub fn remove_peer(&mut self, addr: &MacAddr) {
        self.pairwise.remove(addr);
    }

    pub fn clear(&mut self) {
        self.pairwise.clear();
        self.group.clear();
    }

    fn alloc_slot(&mut self) -> u8 {
        let slot = self.next_slot;
        self.next_slot = self.next_slot.wrapping_add(1);
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: MacAddr = [6; 6];

    #[test]
    fn pn_strictly_increases() {
        let mut keys = KeyStore::new();
        keys.assign_pairwise(PEER, CipherSuite::Ccmp128, vec![0xab; 16], 0);
        let ctx = keys.pairwise_mut(&PEER).expect("expected context");
        let mut last = ctx.current_pn();
        for _ in 0..100 {
            let pn = ctx.advance_pn().unwrap();
            assert!(pn > last);
            last = pn;
        }
    }

    #[test]
    fn fresh_key_resets_counter() {
        let mut keys = KeyStore::new();
        keys.assign_pairwise(PEER, CipherSuite::Ccmp128, vec![1; 16], 0);
        keys.pairwise_mut(&PEER).unwrap().advance_pn().unwrap();
        assert_eq!(keys.pairwise(&PEER).unwrap().current_pn(), 1);
        keys.assign_pairwise(PEER, CipherSuite::Ccmp128, vec![2; 16], 0);
        assert_eq!(keys.pairwise(&PEER).unwrap().current_pn(), 0);
    }

    #[test]
    fn wep_counter_exhaustion_fails() {
        let mut keys = KeyStore::new();
        keys.assign_pairwise(PEER, CipherSuite::Wep40, vec![3; 5], 0);
        let ctx = keys.pairwise_mut(&PEER).unwrap();
        ctx.tx_pn = CipherSuite::Wep40.max_pn();
        assert!(ctx.advance_pn().is_err());
        // The counter never rewinds, even on failure.
        assert_eq!(ctx.current_pn(), CipherSuite::Wep40.max_pn());
    }

    #[test]
    fn group_contexts_keyed_per_vif() {
        let mut keys = KeyStore::new();
        let slot_a = keys.assign_group(VifId(0), CipherSuite::Ccmp128, vec![1; 16], 1);
        let slot_b = keys.assign_group(VifId(1), CipherSuite::Ccmp128, vec![2; 16], 1);
        assert_ne!(slot_a.slot, slot_b.slot);
        assert_eq!(slot_a.addr, wlan_common::mac::BCAST_ADDR);
    }
}
