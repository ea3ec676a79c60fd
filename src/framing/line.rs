//! Line framing: frames are terminated by `\n`, with an optional
//! preceding `\r` stripped from the payload.
//!
//! `last_scan_offset` remembers how far the buffer has already been
//! searched, so repeated decodes over a growing buffer stay linear in
//! the stream length instead of rescanning from the start.

use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::LeftOverBytes;

#[derive(Debug, Error)]
pub enum LineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("line is not valid utf-8")]
    InvalidUtf8,

    #[error("{0}")]
    LeftOver(LeftOverBytes),
}

/// Splits the inbound stream on newlines.
#[derive(Debug, Clone, Default)]
pub struct LineCodec {
    last_scan_offset: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, LineError> {
        let Some(at) = src[self.last_scan_offset..].iter().position(|&b| b == b'\n') else {
            self.last_scan_offset = src.len();
            return Ok(None);
        };
        let newline = self.last_scan_offset + at;
        let mut line = src.split_to(newline + 1);
        self.last_scan_offset = 0;
        line.truncate(line.len() - 1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        String::from_utf8(line.to_vec()).map(Some).map_err(|_| LineError::InvalidUtf8)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, LineError> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                self.last_scan_offset = 0;
                Err(LineError::LeftOver(LeftOverBytes(src.split().freeze())))
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = LineError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), LineError> {
        dst.reserve(item.len() + 1);
        dst.extend_from_slice(item.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
