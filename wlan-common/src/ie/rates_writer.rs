// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::{write_ext_supported_rates, write_supported_rates, IE_MAX_LEN, SUPPORTED_RATES_MAX_LEN},
    crate::{appendable::Appendable, error::FrameWriteError},
};

/// Splits a rate set across the Supported Rates element and, when it does
/// not fit in eight bytes, the Extended Supported Rates element.
pub struct RatesWriter<'a>(&'a [u8]);

impl<'a> RatesWriter<'a> {
    pub fn try_new(rates: &'a [u8]) -> Result<RatesWriter<'a>, FrameWriteError> {
        if rates.is_empty() {
            Err(FrameWriteError::new_invalid_data("no rates to write"))
        } else if rates.len() > SUPPORTED_RATES_MAX_LEN + IE_MAX_LEN {
            Err(FrameWriteError::new_invalid_data("rates will not fit in elements"))
        } else {
            Ok(RatesWriter(rates))
        }
    }

    pub fn write_supported_rates<B: Appendable>(&self, buf: &mut B) {
        let num_rates = std::cmp::min(self.0.len(), SUPPORTED_RATES_MAX_LEN);
        // safe to unwrap because we truncated the slice
        write_supported_rates(buf, &self.0[..num_rates]).unwrap();
    }

    pub fn write_ext_supported_rates<B: Appendable>(&self, buf: &mut B) {
        if self.0.len() > SUPPORTED_RATES_MAX_LEN {
            // safe to unwrap because it is guaranteed to fit.
            write_ext_supported_rates(buf, &self.0[SUPPORTED_RATES_MAX_LEN..]).unwrap();
        }
    }
}
