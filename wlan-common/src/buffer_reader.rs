// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    std::mem::size_of,
    zerocopy::{ByteSlice, FromBytes, LayoutVerified, Unaligned},
};

/// A cursor over a byte slice that hands out typed, bounds-checked views.
/// Every read checks the remaining length first; a failed read consumes
/// nothing.
pub struct BufferReader<B> {
    buf: Option<B>,
    bytes_read: usize,
}

impl<B: ByteSlice> BufferReader<B> {
    pub fn new(bytes: B) -> Self {
        Self { buf: Some(bytes), bytes_read: 0 }
    }

    pub fn read<T: FromBytes + Unaligned>(&mut self) -> Option<LayoutVerified<B, T>> {
        if self.bytes_remaining() < size_of::<T>() {
            return None;
        }
        let buf = self.buf.take()?;
        // Cannot fail: length was checked and T is unaligned.
        let (parsed, remaining) = LayoutVerified::new_unaligned_from_prefix(buf)?;
        self.bytes_read += size_of::<T>();
        self.buf = Some(remaining);
        Some(parsed)
    }

    pub fn peek<T: FromBytes + Unaligned>(&self) -> Option<LayoutVerified<&[u8], T>> {
        let buf = self.buf.as_ref()?;
        LayoutVerified::new_unaligned_from_prefix(&buf[..]).map(|(parsed, _)| parsed)
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<B> {
        if self.bytes_remaining() < len {
            return None;
        }
        let buf = self.buf.take()?;
        let (head, tail) = buf.split_at(len);
        self.bytes_read += len;
        self.buf = Some(tail);
        Some(head)
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.read_bytes(1).map(|bytes| bytes[0])
    }

    pub fn peek_remaining(&self) -> &[u8] {
        match &self.buf {
            Some(buf) => &buf[..],
            None => &[],
        }
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    pub fn bytes_remaining(&self) -> usize {
        self.buf.as_ref().map_or(0, |buf| buf.len())
    }

    pub fn into_remaining(self) -> B {
        // `buf` is only `None` transiently inside a read.
        self.buf.unwrap()
    }
}
