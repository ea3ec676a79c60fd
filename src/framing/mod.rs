//! Byte-stream framers.
//!
//! Every decoder here implements [`tokio_util::codec::Decoder`] so it can
//! sit directly on a TCP stream via `FramedRead`, survives arbitrary read
//! segmentation, and reports bytes stranded in its buffer at stream close
//! through `decode_eof` as a [`LeftOverBytes`] value.

pub mod content_length;
pub mod fixed;
pub mod length_prefix;
pub mod line;
pub mod record;

use bytes::Bytes;

/// Undecoded residue found in a decoder's buffer when the stream closed
/// or the decoder was detached. Whether this is fatal is the caller's
/// policy; at a clean connection close it usually is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftOverBytes(pub Bytes);

impl std::fmt::Display for LeftOverBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} undecoded bytes left in the stream", self.0.len())
    }
}
