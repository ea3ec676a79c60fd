//! Length-prefixed framing: each frame is preceded by a fixed-width
//! integer giving its body length.
//!
//! The field may be 1, 2, 3, 4 or 8 bytes wide, big- or little-endian.
//! The decoder is a two-state machine (waiting for header, waiting for
//! frame); the encoder refuses frames whose length does not fit the
//! field, leaving nothing on the wire.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::LeftOverBytes;

/// Byte order of the length field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

#[derive(Debug, Error)]
pub enum LengthFieldError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The outbound frame cannot be described by the configured field.
    #[error("frame of {length} bytes exceeds length-field maximum of {max}")]
    MessageDataTooLongForLengthField { length: usize, max: u64 },

    #[error("{0}")]
    LeftOver(LeftOverBytes),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    WaitingForHeader,
    WaitingForFrame(usize),
}

/// Decoder/encoder pair for length-prefixed frames.
#[derive(Debug, Clone)]
pub struct LengthFieldCodec {
    field_bytes: usize,
    endianness: Endianness,
    state: State,
}

impl LengthFieldCodec {
    /// `field_bytes` must be one of 1, 2, 3, 4 or 8.
    pub fn new(field_bytes: usize, endianness: Endianness) -> Self {
        assert!(
            matches!(field_bytes, 1 | 2 | 3 | 4 | 8),
            "unsupported length field width: {field_bytes}",
        );
        Self { field_bytes, endianness, state: State::WaitingForHeader }
    }

    /// Largest body length the field can carry: `2^(8 * field_bytes) - 1`.
    pub fn max_frame_length(&self) -> u64 {
        if self.field_bytes >= 8 {
            u64::MAX
        } else {
            (1u64 << (8 * self.field_bytes)) - 1
        }
    }

    fn read_length(&self, src: &mut BytesMut) -> u64 {
        match self.endianness {
            Endianness::Big => src.get_uint(self.field_bytes),
            Endianness::Little => src.get_uint_le(self.field_bytes),
        }
    }

    fn write_length(&self, dst: &mut BytesMut, length: u64) {
        match self.endianness {
            Endianness::Big => dst.put_uint(length, self.field_bytes),
            Endianness::Little => dst.put_uint_le(length, self.field_bytes),
        }
    }
}

impl Decoder for LengthFieldCodec {
    type Item = Bytes;
    type Error = LengthFieldError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, LengthFieldError> {
        if let State::WaitingForHeader = self.state {
            if src.len() < self.field_bytes {
                return Ok(None);
            }
            let length = self.read_length(src) as usize;
            self.state = State::WaitingForFrame(length);
        }
        let State::WaitingForFrame(length) = self.state else {
            unreachable!()
        };
        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }
        self.state = State::WaitingForHeader;
        Ok(Some(src.split_to(length).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, LengthFieldError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() && self.state == State::WaitingForHeader => Ok(None),
            None => Err(LengthFieldError::LeftOver(LeftOverBytes(src.split().freeze()))),
        }
    }
}

impl Encoder<Bytes> for LengthFieldCodec {
    type Error = LengthFieldError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), LengthFieldError> {
        let max = self.max_frame_length();
        if item.len() as u64 > max {
            return Err(LengthFieldError::MessageDataTooLongForLengthField {
                length: item.len(),
                max,
            });
        }
        dst.reserve(self.field_bytes + item.len());
        self.write_length(dst, item.len() as u64);
        dst.extend_from_slice(&item);
        Ok(())
    }
}
