// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Transmit rate selection. Rates are addressed through a dense index space
//! grouped by PHY so the hardware can be handed a plain integer:
//!
//!  Group   tx_vec_idx range      PHY   GI   CBW  MCS_IDX
//!  0         1 -  32             HT    800  20   0-31
//!  1        33 -  64             HT    800  40   0-31
//!  2        65 -  96             HT    400  20   0-31
//!  3        97 - 128             HT    400  40   0-31
//!  4       129 - 136             ERP   -    -    0-7
//!  5       137 - 138             DSSS  -    -    0-1
//!  6       139 - 140             CCK   -    -    2-3
//!
//! The selector keeps per-peer success statistics and hands out an initial
//! and a fallback vector per frame, probing a random candidate at a fixed
//! cadence to keep the statistics warm.

use {
    rand::seq::SliceRandom,
    std::collections::HashMap,
    wlan_common::{channel::Cbw, ie::SupportedRate, mac::MacAddr},
};

pub const HT_NUM_MCS: u8 = 32; // Only MCS 0-31 is supported.
pub const ERP_NUM_TX_VECTOR: u8 = 8;

const HT_NUM_GI: u8 = 2;
const HT_NUM_CBW: u8 = 2;
const HT_NUM_TX_VECTOR: u8 = HT_NUM_GI * HT_NUM_CBW * HT_NUM_MCS;
const DSSS_CCK_NUM_TX_VECTOR: u8 = 4;

pub const INVALID_TX_VECTOR_IDX: u16 = 0;
pub const START_IDX: u16 = 1 + INVALID_TX_VECTOR_IDX;
pub const HT_START_IDX: u16 = START_IDX;
pub const ERP_START_IDX: u16 = HT_START_IDX + HT_NUM_TX_VECTOR as u16;
pub const DSSS_CCK_START_IDX: u16 = ERP_START_IDX + ERP_NUM_TX_VECTOR as u16;
pub const MAX_VALID_IDX: u16 = DSSS_CCK_START_IDX + DSSS_CCK_NUM_TX_VECTOR as u16 - 1;

/// How many data frames are sent between probes of a random candidate.
const PROBE_INTERVAL: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhyType {
    Dsss,
    Cck,
    Erp,
    Ht,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardInterval {
    Long,  // 800 ns
    Short, // 400 ns
}

#[derive(PartialEq, Debug)]
pub struct TxVector {
    phy: PhyType,
    gi: GuardInterval,
    cbw: Cbw,
    mcs_idx: u8,
}

impl TxVector {
    pub fn new(phy: PhyType, gi: GuardInterval, cbw: Cbw, mcs_idx: u8) -> Option<Self> {
        let supported_mcs = match phy {
            PhyType::Dsss => mcs_idx == 0 || mcs_idx == 1,
            PhyType::Cck => mcs_idx == 2 || mcs_idx == 3,
            PhyType::Ht => mcs_idx < HT_NUM_MCS,
            PhyType::Erp => mcs_idx < ERP_NUM_TX_VECTOR,
        };
        if supported_mcs {
            Some(Self { phy, gi, cbw, mcs_idx })
        } else {
            None
        }
    }

    pub fn phy(&self) -> PhyType {
        self.phy
    }

    pub fn from_supported_rate(erp_rate: &SupportedRate) -> Option<Self> {
        let (phy, mcs_idx) = match erp_rate.rate() {
            2 => (PhyType::Dsss, 0),
            4 => (PhyType::Dsss, 1),
            11 => (PhyType::Cck, 2),
            22 => (PhyType::Cck, 3),
            12 => (PhyType::Erp, 0),
            18 => (PhyType::Erp, 1),
            24 => (PhyType::Erp, 2),
            36 => (PhyType::Erp, 3),
            48 => (PhyType::Erp, 4),
            72 => (PhyType::Erp, 5),
            96 => (PhyType::Erp, 6),
            108 => (PhyType::Erp, 7),
            _ => return None,
        };
        Self::new(phy, GuardInterval::Long, Cbw::Cbw20, mcs_idx)
    }

    // The unwraps in the next two functions hold for every index value,
    // verified exhaustively by tests below.

    pub fn from_idx(idx: TxVecIdx) -> Self {
        let phy = idx.to_phy();
        match phy {
            PhyType::Ht => {
                let group_idx = (*idx - HT_START_IDX) / HT_NUM_MCS as u16;
                let gi = match (group_idx / HT_NUM_CBW as u16) % HT_NUM_GI as u16 {
                    1 => GuardInterval::Short,
                    _ => GuardInterval::Long,
                };
                let cbw = match group_idx % HT_NUM_CBW as u16 {
                    0 => Cbw::Cbw20,
                    _ => Cbw::Cbw40,
                };
                let mcs_idx = ((*idx - HT_START_IDX) % HT_NUM_MCS as u16) as u8;
                Self::new(phy, gi, cbw, mcs_idx).unwrap()
            }
            PhyType::Erp => Self::new(
                phy,
                GuardInterval::Long,
                Cbw::Cbw20,
                (*idx - ERP_START_IDX) as u8,
            )
            .unwrap(),
            PhyType::Dsss | PhyType::Cck => Self::new(
                phy,
                GuardInterval::Long,
                Cbw::Cbw20,
                (*idx - DSSS_CCK_START_IDX) as u8,
            )
            .unwrap(),
        }
    }

    pub fn to_idx(&self) -> TxVecIdx {
        match self.phy {
            PhyType::Ht => {
                let group_idx = match self.gi {
                    GuardInterval::Short => HT_NUM_CBW as u16,
                    GuardInterval::Long => 0,
                } + match self.cbw {
                    Cbw::Cbw40 | Cbw::Cbw40Below => 1,
                    _ => 0,
                };
                TxVecIdx::new(HT_START_IDX + group_idx * HT_NUM_MCS as u16 + self.mcs_idx as u16)
                    .unwrap()
            }
            PhyType::Erp => TxVecIdx::new(ERP_START_IDX + self.mcs_idx as u16).unwrap(),
            PhyType::Cck | PhyType::Dsss => {
                TxVecIdx::new(DSSS_CCK_START_IDX + self.mcs_idx as u16).unwrap()
            }
        }
    }
}

#[derive(Hash, PartialEq, Eq, Debug, Copy, Clone, Ord, PartialOrd)]
pub struct TxVecIdx(u16);

impl std::ops::Deref for TxVecIdx {
    type Target = u16;
    fn deref(&self) -> &u16 {
        &self.0
    }
}

impl TxVecIdx {
    pub fn new(value: u16) -> Option<Self> {
        if INVALID_TX_VECTOR_IDX < value && value <= MAX_VALID_IDX {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn to_phy(&self) -> PhyType {
        match self.0 {
            idx if idx < HT_START_IDX + HT_NUM_TX_VECTOR as u16 => PhyType::Ht,
            idx if idx < ERP_START_IDX + ERP_NUM_TX_VECTOR as u16 => PhyType::Erp,
            idx if idx < DSSS_CCK_START_IDX + 2 => PhyType::Dsss,
            idx if idx < DSSS_CCK_START_IDX + DSSS_CCK_NUM_TX_VECTOR as u16 => PhyType::Cck,
            // Unreachable for any TxVecIdx constructed with TxVecIdx::new;
            // verified by exhaustive tests.
            _ => panic!("TxVecIdx has invalid value"),
        }
    }

    pub fn is_ht(&self) -> bool {
        HT_START_IDX <= self.0 && self.0 < HT_START_IDX + HT_NUM_TX_VECTOR as u16
    }

    pub fn is_erp(&self) -> bool {
        ERP_START_IDX <= self.0 && self.0 < ERP_START_IDX + ERP_NUM_TX_VECTOR as u16
    }
}

impl std::fmt::Display for TxVecIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tx_vector = TxVector::from_idx(*self);
        write!(f, "TxVecIdx {:3}: {:?}", self.0, tx_vector)
    }
}

/// The slowest always-available vector: 1 Mbps DSSS.
pub fn lowest_tx_vector() -> TxVecIdx {
    TxVecIdx::new(DSSS_CCK_START_IDX).unwrap()
}

#[derive(Default)]
struct RateStats {
    attempts: u64,
    successes: u64,
}

impl RateStats {
    fn success_ratio(&self) -> f64 {
        if self.attempts == 0 {
            // Optimistic prior so untried candidates get probed.
            1.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

struct PeerRateSet {
    candidates: Vec<TxVecIdx>,
    stats: HashMap<TxVecIdx, RateStats>,
    frames_since_probe: u32,
}

/// Per-peer rate selection with periodic probing. Shared between the
/// transmit pipeline (selection) and the completion path (statistics).
#[derive(Default)]
pub struct RateSelector {
    peers: HashMap<MacAddr, PeerRateSet>,
}

impl RateSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer(&mut self, addr: MacAddr, rates: &[SupportedRate], ht: bool) {
        let mut candidates: Vec<TxVecIdx> = rates
            .iter()
            .filter_map(TxVector::from_supported_rate)
            .map(|v| v.to_idx())
            .collect();
        if ht {
            // MCS 0-7, long GI, 20 MHz: the baseline HT single-stream set.
            for mcs in 0..8 {
                if let Some(v) = TxVector::new(PhyType::Ht, GuardInterval::Long, Cbw::Cbw20, mcs) {
                    candidates.push(v.to_idx());
                }
            }
        }
        if candidates.is_empty() {
            candidates.push(lowest_tx_vector());
        }
        candidates.sort();
        candidates.dedup();
        self.peers.insert(
            addr,
            PeerRateSet { candidates, stats: HashMap::new(), frames_since_probe: 0 },
        );
    }

    pub fn remove_peer(&mut self, addr: &MacAddr) {
        self.peers.remove(addr);
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }

    /// Picks (initial, fallback) vectors for one data frame to `addr`.
    pub fn select(&mut self, addr: &MacAddr) -> (TxVecIdx, TxVecIdx) {
        let peer = match self.peers.get_mut(addr) {
            Some(peer) => peer,
            None => return (lowest_tx_vector(), lowest_tx_vector()),
        };
        peer.frames_since_probe += 1;
        let fallback = *peer.candidates.first().expect("candidates are never empty");
        if peer.frames_since_probe >= PROBE_INTERVAL {
            peer.frames_since_probe = 0;
            let probe = *peer
                .candidates
                .choose(&mut rand::thread_rng())
                .expect("candidates are never empty");
            return (probe, fallback);
        }
        // Highest-throughput candidate among those performing well, scored
        // by index within the group ordering above.
        let initial = peer
            .candidates
            .iter()
            .rev()
            .find(|idx| {
                peer.stats.get(*idx).map_or(true, |stats| stats.success_ratio() > 0.5)
            })
            .copied()
            .unwrap_or(fallback);
        (initial, fallback)
    }

    /// The most conservative vector for a peer; management and control
    /// frames are sent at this rate.
    pub fn select_basic(&self, addr: &MacAddr) -> TxVecIdx {
        self.peers
            .get(addr)
            .and_then(|peer| peer.candidates.first().copied())
            .unwrap_or_else(lowest_tx_vector)
    }

    pub fn on_tx_result(&mut self, addr: &MacAddr, tx_vector: TxVecIdx, success: bool) {
        if let Some(peer) = self.peers.get_mut(addr) {
            let stats = peer.stats.entry(tx_vector).or_default();
            stats.attempts += 1;
            if success {
                stats.successes += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_tx_vector_idxs() {
        for idx in INVALID_TX_VECTOR_IDX + 1..=MAX_VALID_IDX {
            let idx = TxVecIdx::new(idx).expect("Could not make TxVecIdx from valid index");
            idx.to_phy(); // Must not panic for any valid value.
        }
        assert!(TxVecIdx::new(INVALID_TX_VECTOR_IDX).is_none());
        assert!(TxVecIdx::new(MAX_VALID_IDX + 1).is_none());
    }

    #[test]
    fn to_and_from_idx() {
        for idx in INVALID_TX_VECTOR_IDX + 1..=MAX_VALID_IDX {
            let idx = TxVecIdx::new(idx).expect("Could not make TxVecIdx from valid index");
            let tx_vector = TxVector::from_idx(idx);
            assert_eq!(idx, tx_vector.to_idx());
        }
    }

    #[test]
    fn from_supported_rates() {
        let vector = TxVector::from_supported_rate(&SupportedRate(108)).expect("ERP rate");
        assert_eq!(vector.phy(), PhyType::Erp);
        assert_eq!(*vector.to_idx(), ERP_START_IDX + 7);
        let vector = TxVector::from_supported_rate(&SupportedRate(0x82)).expect("basic 1 Mbps");
        assert_eq!(vector.phy(), PhyType::Dsss);
        assert!(TxVector::from_supported_rate(&SupportedRate(3)).is_none());
    }

    #[test]
    fn selection_prefers_fast_working_rates() {
        let mut selector = RateSelector::new();
        let addr = [1u8; 6];
        selector.add_peer(addr, &[SupportedRate(12), SupportedRate(108)], false);
        // Fail the fast rate consistently; it must fall out of favor.
        let fast = TxVecIdx::new(ERP_START_IDX + 7).unwrap();
        for _ in 0..10 {
            selector.on_tx_result(&addr, fast, false);
        }
        let (initial, fallback) = selector.select(&addr);
        assert_eq!(*initial, ERP_START_IDX); // 6 Mbps still untried, assumed good
        assert_eq!(*fallback, ERP_START_IDX);
    }

    #[test]
    fn unknown_peer_gets_lowest_rate() {
        let mut selector = RateSelector::new();
        let (initial, fallback) = selector.select(&[9; 6]);
        assert_eq!(initial, lowest_tx_vector());
        assert_eq!(fallback, lowest_tx_vector());
        assert_eq!(selector.select_basic(&[9; 6]), lowest_tx_vector());
    }

    #[test]
    fn ht_peer_gets_mcs_candidates() {
        let mut selector = RateSelector::new();
        let addr = [2u8; 6];
        selector.add_peer(addr, &[SupportedRate(12)], true);
        // The HT single-stream set joins the candidates; its MCS 0 sits at
        // the bottom of the index space and becomes the fallback.
        let (_, fallback) = selector.select(&addr);
        assert!(fallback.is_ht());
    }
}
