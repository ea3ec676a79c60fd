//! Synthesised packet capture.
//!
//! Nothing here touches a NIC. A [`writer::PcapWriter`] renders
//! application-level observations (connection up, bytes in, bytes out,
//! connection down) as legitimate libpcap records - synthesising the TCP
//! handshake, data segments and teardown - and hands each finished record
//! to a [`CaptureSink`]. Sinks either persist immediately
//! ([`sink::FileSink`]) or hold the most recent traffic for on-demand
//! dumps ([`ring::RingSink`], [`ring::RingCapture`]).
//!
//! Captures open with the classic 24-byte libpcap global header
//! ([`file_header`]); all capture-format integers are written
//! little-endian, which readers detect from the magic number.

pub mod ring;
pub mod sink;
pub mod writer;

use bytes::{BufMut, Bytes, BytesMut};

/// libpcap magic number, major/minor 2.4.
pub const PCAP_MAGIC: u32 = 0xA1B2_C3D4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
/// Snapshot length advertised in the global header: unlimited.
const PCAP_SNAPLEN: u32 = 0xFFFF_FFFF;
/// Global link type 0: per-record BSD loopback family prefixes.
const PCAP_NETWORK_NULL: u32 = 0;

/// Receives finished capture chunks. The strategy seam between record
/// synthesis and persistence.
pub trait CaptureSink: Send {
    fn record(&mut self, chunk: Bytes);
}

impl<F: FnMut(Bytes) + Send> CaptureSink for F {
    fn record(&mut self, chunk: Bytes) {
        self(chunk)
    }
}

/// When outbound data should appear in the capture relative to the
/// transport write that carries it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum EmissionMode {
    /// Record the bytes as soon as the write is issued.
    #[default]
    WhenIssued,
    /// Record the bytes only once the transport write completed.
    WhenCompleted,
}

/// The 24-byte libpcap global header that starts every capture file.
pub fn file_header() -> Bytes {
    let mut header = BytesMut::with_capacity(24);
    header.put_u32_le(PCAP_MAGIC);
    header.put_u16_le(PCAP_VERSION_MAJOR);
    header.put_u16_le(PCAP_VERSION_MINOR);
    header.put_u32_le(0); // thiszone
    header.put_u32_le(0); // sigfigs
    header.put_u32_le(PCAP_SNAPLEN);
    header.put_u32_le(PCAP_NETWORK_NULL);
    header.freeze()
}
