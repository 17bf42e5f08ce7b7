// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::Header,
    crate::buffer_reader::BufferReader,
    std::mem::size_of,
    zerocopy::ByteSlice,
};

/// Iterates over a chain of information elements, yielding `(Id, body)`
/// pairs. An element whose advertised length exceeds the remaining buffer
/// ends the iteration; nothing past the inconsistency is ever read.
pub struct Reader<B>(BufferReader<B>);

impl<B: ByteSlice> Reader<B> {
    pub fn new(bytes: B) -> Self {
        Reader(BufferReader::new(bytes))
    }
}

impl<B: ByteSlice> Iterator for Reader<B> {
    type Item = (super::Id, B);

    fn next(&mut self) -> Option<Self::Item> {
        let header = self.0.peek::<Header>()?;
        let body_len = header.body_len as usize;
        if self.0.bytes_remaining() < size_of::<Header>() + body_len {
            None
        } else {
            // Unwraps are OK because the length was checked above.
            let header = self.0.read::<Header>().unwrap();
            let body = self.0.read_bytes(body_len).unwrap();
            Some((header.id, body))
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::ie::Id};

    #[test]
    fn empty() {
        assert_eq!(None, Reader::new(&[][..]).next());
    }

    #[test]
    fn less_than_header() {
        assert_eq!(None, Reader::new(&[0][..]).next());
    }

    #[test]
    fn body_too_short() {
        assert_eq!(None, Reader::new(&[0, 2, 10][..]).next());
    }

    #[test]
    fn empty_body() {
        let elems: Vec<_> = Reader::new(&[0, 0][..]).collect();
        assert_eq!(&[(Id::SSID, &[][..])], &elems[..]);
    }

    #[test]
    fn two_elements() {
        let bytes = vec![0, 2, 10, 20, 1, 3, 11, 22, 33];
        let elems: Vec<_> = Reader::new(&bytes[..]).collect();
        assert_eq!(
            &[(Id::SSID, &[10, 20][..]), (Id::SUPPORTED_RATES, &[11, 22, 33][..])],
            &elems[..]
        );
    }

    #[test]
    fn truncated_tail_element_is_dropped() {
        // The second element claims 4 bytes but only 2 remain.
        let bytes = vec![0, 1, 7, 5, 4, 1, 2];
        let elems: Vec<_> = Reader::new(&bytes[..]).collect();
        assert_eq!(&[(Id::SSID, &[7][..])], &elems[..]);
    }
}
