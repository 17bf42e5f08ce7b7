// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

/// An error parsing a frame or information element. Parsing fails closed:
/// any length inconsistency rejects the input rather than reading past it.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum FrameParseError {
    #[error("buffer too short to hold {0}")]
    BufferTooShort(&'static str),
    #[error("invalid value in {0}")]
    InvalidFieldValue(&'static str),
    #[error("unexpected body length for {0}")]
    UnexpectedBodyLen(&'static str),
}

/// An error writing a frame or information element.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum FrameWriteError {
    #[error("buffer too small for write")]
    BufferTooSmall,
    #[error("attempted to write invalid data: {0}")]
    InvalidData(&'static str),
}

impl FrameWriteError {
    pub fn new_invalid_data(debug_message: &'static str) -> Self {
        FrameWriteError::InvalidData(debug_message)
    }
}

impl From<crate::appendable::BufferTooSmall> for FrameWriteError {
    fn from(_: crate::appendable::BufferTooSmall) -> Self {
        FrameWriteError::BufferTooSmall
    }
}
