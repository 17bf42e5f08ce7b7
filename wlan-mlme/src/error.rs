// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    thiserror::Error,
    wlan_common::error::{FrameParseError, FrameWriteError},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("out of resources: {0}")]
    NoResources(&'static str),
    #[error("error parsing frame: {0}")]
    ParsingFrame(#[from] FrameParseError),
    #[error("error writing frame: {0}")]
    WritingFrame(#[from] FrameWriteError),
    #[error("device rejected request: {0}")]
    Device(&'static str),
    #[error("request refused: {0}")]
    Refused(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_convert() {
        let err: Error = FrameParseError::BufferTooShort("TIM header").into();
        assert!(matches!(err, Error::ParsingFrame(_)));
        let err: Error = FrameWriteError::BufferTooSmall.into();
        assert!(matches!(err, Error::WritingFrame(_)));
    }
}
