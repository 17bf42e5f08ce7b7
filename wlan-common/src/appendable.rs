// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use zerocopy::AsBytes;

/// Marker returned when a fixed-size buffer cannot hold an append.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct BufferTooSmall;

/// A byte sink frames are serialized into. `Vec<u8>` grows without bound;
/// [`crate::buffer_writer::BufferWriter`] refuses writes past its capacity.
pub trait Appendable {
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferTooSmall>;

    /// Appends `len` zero bytes and returns a mutable view of them so the
    /// caller can fill them in place.
    fn append_bytes_zeroed(&mut self, len: usize) -> Result<&mut [u8], BufferTooSmall>;

    fn bytes_written(&self) -> usize;

    fn can_append(&self, bytes: usize) -> bool;

    fn append_byte(&mut self, byte: u8) -> Result<(), BufferTooSmall> {
        self.append_bytes(&[byte])
    }

    fn append_value<T: AsBytes + ?Sized>(&mut self, value: &T) -> Result<(), BufferTooSmall> {
        self.append_bytes(value.as_bytes())
    }
}

impl Appendable for Vec<u8> {
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferTooSmall> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn append_bytes_zeroed(&mut self, len: usize) -> Result<&mut [u8], BufferTooSmall> {
        let old_len = self.len();
        self.resize(old_len + len, 0);
        Ok(&mut self[old_len..])
    }

    fn bytes_written(&self) -> usize {
        self.len()
    }

    fn can_append(&self, _bytes: usize) -> bool {
        true
    }
}
