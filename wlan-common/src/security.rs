// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-cipher security framing: header/trailer reservation sizes and the
//! IV/extended-IV byte layouts derived from a packet number.
//!
//! The layouts here must match IEEE Std 802.11-2016, 12.3.2 (WEP), 12.5.2.2
//! (TKIP) and 12.5.3.2 (CCMP) bit for bit: a peer decrypts with exactly
//! these bytes.

use crate::{appendable::Appendable, error::FrameWriteError};

pub const EXT_IV: u8 = 0x20;

/// The cipher protecting one direction of one association.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    Open,
    Wep40,
    Wep104,
    Tkip,
    Ccmp128,
    /// A vendor cipher identified by its suite type; framing is sized like
    /// CCMP, the common case for vendor replacements.
    Vendor(u8),
}

impl CipherSuite {
    /// Bytes reserved between the MAC header and the frame body.
    pub fn iv_len(&self) -> usize {
        match self {
            CipherSuite::Open => 0,
            CipherSuite::Wep40 | CipherSuite::Wep104 => 4,
            CipherSuite::Tkip | CipherSuite::Ccmp128 | CipherSuite::Vendor(_) => 8,
        }
    }

    /// Bytes reserved after the frame body (ICV and/or MIC).
    pub fn trailer_len(&self) -> usize {
        match self {
            CipherSuite::Open => 0,
            CipherSuite::Wep40 | CipherSuite::Wep104 => 4,
            CipherSuite::Tkip => 12,
            CipherSuite::Ccmp128 | CipherSuite::Vendor(_) => 8,
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, CipherSuite::Open)
    }

    /// The largest packet number representable in this cipher's IV.
    pub fn max_pn(&self) -> u64 {
        match self {
            CipherSuite::Open => 0,
            CipherSuite::Wep40 | CipherSuite::Wep104 => (1 << 24) - 1,
            CipherSuite::Tkip | CipherSuite::Ccmp128 | CipherSuite::Vendor(_) => (1 << 48) - 1,
        }
    }
}

/// Writes the per-cipher IV/extended-IV bytes for `pn` under `key_id`.
/// Writes nothing for an open (unprotected) association.
pub fn write_iv<B: Appendable>(
    cipher: CipherSuite,
    pn: u64,
    key_id: u8,
    buf: &mut B,
) -> Result<(), FrameWriteError> {
    if key_id > 3 {
        return Err(FrameWriteError::new_invalid_data("key id exceeds two bits"));
    }
    let pn_bytes = pn.to_le_bytes();
    match cipher {
        CipherSuite::Open => Ok(()),
        CipherSuite::Wep40 | CipherSuite::Wep104 => {
            // IEEE Std 802.11-2016, 12.3.2.2: 24-bit IV then key id.
            buf.append_bytes(&[pn_bytes[0], pn_bytes[1], pn_bytes[2], key_id << 6])?;
            Ok(())
        }
        CipherSuite::Tkip => {
            // IEEE Std 802.11-2016, 12.5.2.2: TSC1, WEPSeed[1], TSC0,
            // key id | ExtIV, then TSC2..TSC5.
            let wep_seed = (pn_bytes[1] | 0x20) & 0x7f;
            buf.append_bytes(&[
                pn_bytes[1],
                wep_seed,
                pn_bytes[0],
                (key_id << 6) | EXT_IV,
                pn_bytes[2],
                pn_bytes[3],
                pn_bytes[4],
                pn_bytes[5],
            ])?;
            Ok(())
        }
        CipherSuite::Ccmp128 | CipherSuite::Vendor(_) => {
            // IEEE Std 802.11-2016, 12.5.3.2: PN0, PN1, reserved,
            // key id | ExtIV, then PN2..PN5.
            buf.append_bytes(&[
                pn_bytes[0],
                pn_bytes[1],
                0,
                (key_id << 6) | EXT_IV,
                pn_bytes[2],
                pn_bytes[3],
                pn_bytes[4],
                pn_bytes[5],
            ])?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_sizes() {
        assert_eq!(CipherSuite::Open.iv_len(), 0);
        assert_eq!(CipherSuite::Open.trailer_len(), 0);
        assert_eq!(CipherSuite::Wep104.iv_len(), 4);
        assert_eq!(CipherSuite::Tkip.iv_len(), 8);
        assert_eq!(CipherSuite::Tkip.trailer_len(), 12);
        assert_eq!(CipherSuite::Ccmp128.iv_len(), 8);
        assert_eq!(CipherSuite::Ccmp128.trailer_len(), 8);
        assert_eq!(CipherSuite::Vendor(6).iv_len(), 8);
    }

    #[test]
    fn wep_iv_layout() {
        let mut buf = vec![];
        write_iv(CipherSuite::Wep40, 0x030201, 2, &mut buf).unwrap();
        assert_eq!(&buf[..], &[0x01, 0x02, 0x03, 0b1000_0000]);
    }

    #[test]
    fn ccmp_iv_layout() {
        let mut buf = vec![];
        write_iv(CipherSuite::Ccmp128, 0x0000_0605_0403_0201, 1, &mut buf).unwrap();
        assert_eq!(&buf[..], &[0x01, 0x02, 0x00, 0b0110_0000, 0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn tkip_iv_layout() {
        let mut buf = vec![];
        write_iv(CipherSuite::Tkip, 0x0000_0605_0403_0201, 0, &mut buf).unwrap();
        // TSC1 first, then the WEP seed derived from it.
        assert_eq!(&buf[..], &[0x02, 0x22, 0x01, 0b0010_0000, 0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn open_writes_nothing() {
        let mut buf = vec![];
        write_iv(CipherSuite::Open, 7, 0, &mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn key_id_out_of_range() {
        let mut buf = vec![];
        assert!(write_iv(CipherSuite::Ccmp128, 1, 4, &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn max_pn_per_cipher() {
        assert_eq!(CipherSuite::Wep40.max_pn(), 0xff_ffff);
        assert_eq!(CipherSuite::Ccmp128.max_pn(), 0xffff_ffff_ffff);
    }
}
