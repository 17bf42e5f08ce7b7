// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::appendable::{Appendable, BufferTooSmall};

/// Writes into a caller-provided fixed-size buffer, tracking how many bytes
/// were appended. Refuses writes that would run past the end.
pub struct BufferWriter<'a> {
    buf: &'a mut [u8],
    written: usize,
}

impl<'a> BufferWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, written: 0 }
    }

    pub fn into_written(self) -> &'a [u8] {
        &self.buf[..self.written]
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.written
    }
}

impl Appendable for BufferWriter<'_> {
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferTooSmall> {
        if !self.can_append(bytes.len()) {
            return Err(BufferTooSmall);
        }
        self.buf[self.written..self.written + bytes.len()].copy_from_slice(bytes);
        self.written += bytes.len();
        Ok(())
    }

    fn append_bytes_zeroed(&mut self, len: usize) -> Result<&mut [u8], BufferTooSmall> {
        if !self.can_append(len) {
            return Err(BufferTooSmall);
        }
        let zeroed = &mut self.buf[self.written..self.written + len];
        for b in zeroed.iter_mut() {
            *b = 0;
        }
        self.written += len;
        Ok(zeroed)
    }

    fn bytes_written(&self) -> usize {
        self.written
    }

    fn can_append(&self, bytes: usize) -> bool {
        self.written + bytes <= self.buf.len()
    }
}
