//! SUN RPC record marking over TCP (RFC 5531 11).
//!
//! A record is one or more fragments, each prefixed by a 4-byte header:
//! the high bit marks the final fragment, the low 31 bits give the
//! fragment body length. The decoder reassembles fragment bodies until
//! the final bit and emits the whole record; the encoder always writes a
//! single final fragment, prepending the header once the body length is
//! known.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::LeftOverBytes;
use crate::rpc::{FragmentHeader, MAX_FRAGMENT_LEN};

/// Default cap on a reassembled record; a peer announcing more is cut off
/// before it can make us buffer it.
pub const DEFAULT_MAX_RECORD_LEN: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The record under reassembly exceeds the configured cap.
    #[error("record of {length} bytes exceeds cap of {max}")]
    TooLong { length: usize, max: usize },

    #[error("{0}")]
    LeftOver(LeftOverBytes),
}

/// Decoder/encoder for record-marked RPC messages.
#[derive(Debug)]
pub struct RecordCodec {
    max_record_len: usize,
    /// Header of the fragment currently being read, once known.
    pending: Option<FragmentHeader>,
    /// Bodies of non-final fragments seen so far.
    assembly: BytesMut,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORD_LEN)
    }
}

impl RecordCodec {
    pub fn new(max_record_len: usize) -> Self {
        Self { max_record_len, pending: None, assembly: BytesMut::new() }
    }

    fn mid_record(&self) -> bool {
        self.pending.is_some() || !self.assembly.is_empty()
    }
}

impl Decoder for RecordCodec {
    type Item = Bytes;
    type Error = RecordError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, RecordError> {
        loop {
            let header = match self.pending {
                Some(header) => header,
                None => {
                    if src.len() < 4 {
                        return Ok(None);
                    }
                    let header = FragmentHeader::from_wire(src.get_u32());
                    let total = self.assembly.len() + header.length as usize;
                    if total > self.max_record_len {
                        return Err(RecordError::TooLong {
                            length: total,
                            max: self.max_record_len,
                        });
                    }
                    self.pending = Some(header);
                    header
                }
            };

            let length = header.length as usize;
            if src.len() < length {
                src.reserve(length - src.len());
                return Ok(None);
            }
            let body = src.split_to(length);
            self.pending = None;

            if header.last {
                if self.assembly.is_empty() {
                    return Ok(Some(body.freeze()));
                }
                self.assembly.extend_from_slice(&body);
                return Ok(Some(self.assembly.split().freeze()));
            }
            self.assembly.extend_from_slice(&body);
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, RecordError> {
        match self.decode(src)? {
            Some(record) => Ok(Some(record)),
            None if src.is_empty() && !self.mid_record() => Ok(None),
            None => {
                let mut residue = self.assembly.split();
                residue.extend_from_slice(src);
                src.clear();
                Err(RecordError::LeftOver(LeftOverBytes(residue.freeze())))
            }
        }
    }
}

impl Encoder<Bytes> for RecordCodec {
    type Error = RecordError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), RecordError> {
        if item.len() > MAX_FRAGMENT_LEN as usize {
            return Err(RecordError::TooLong {
                length: item.len(),
                max: MAX_FRAGMENT_LEN as usize,
            });
        }
        dst.reserve(4 + item.len());
        dst.put_u32(FragmentHeader::new(item.len() as u32, true).to_wire());
        dst.extend_from_slice(&item);
        Ok(())
    }
}
