//! Fixed-length framing: every frame is exactly `frame_length` bytes, no
//! on-wire header.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::LeftOverBytes;

#[derive(Debug, Error)]
pub enum FixedFrameError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    LeftOver(LeftOverBytes),
}

/// Slices the inbound stream into frames of one configured size.
#[derive(Debug, Clone)]
pub struct FixedLengthCodec {
    frame_length: usize,
}

impl FixedLengthCodec {
    /// `frame_length` must be non-zero.
    pub fn new(frame_length: usize) -> Self {
        assert!(frame_length > 0, "frame length must be non-zero");
        Self { frame_length }
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }
}

impl Decoder for FixedLengthCodec {
    type Item = Bytes;
    type Error = FixedFrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FixedFrameError> {
        if src.len() < self.frame_length {
            src.reserve(self.frame_length - src.len());
            return Ok(None);
        }
        Ok(Some(src.split_to(self.frame_length).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FixedFrameError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FixedFrameError::LeftOver(LeftOverBytes(src.split().freeze()))),
        }
    }
}

impl Encoder<Bytes> for FixedLengthCodec {
    type Error = FixedFrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), FixedFrameError> {
        if item.len() != self.frame_length {
            return Err(FixedFrameError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "frame does not match the configured length",
            )));
        }
        dst.extend_from_slice(&item);
        Ok(())
    }
}
