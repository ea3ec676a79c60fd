//! Bounded FIFO of captured fragments, drained on demand.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};

use super::writer::{CaptureAddresses, PcapWriter};
use super::{file_header, CaptureSink};

/// Keeps the most recent capture fragments within a count and byte
/// budget, evicting the oldest first.
pub struct RingBuffer {
    fragments: VecDeque<Bytes>,
    total_bytes: usize,
    max_fragments: usize,
    max_bytes: usize,
}

impl RingBuffer {
    pub fn new(max_fragments: usize, max_bytes: usize) -> Self {
        assert!(max_fragments > 0, "fragment budget must be non-zero");
        Self { fragments: VecDeque::new(), total_bytes: 0, max_fragments, max_bytes }
    }

    pub fn add_fragment(&mut self, bytes: Bytes) {
        if self.fragments.len() >= self.max_fragments {
            self.drop_oldest();
        }
        self.total_bytes += bytes.len();
        self.fragments.push_back(bytes);
        while self.total_bytes > self.max_bytes {
            self.drop_oldest();
        }
    }

    fn drop_oldest(&mut self) {
        if let Some(dropped) = self.fragments.pop_front() {
            self.total_bytes -= dropped.len();
        }
    }

    /// Drains every fragment into one contiguous buffer, oldest first.
    pub fn emit(&mut self) -> Bytes {
        let mut assembled = BytesMut::with_capacity(self.total_bytes);
        for fragment in self.fragments.drain(..) {
            assembled.extend_from_slice(&fragment);
        }
        self.total_bytes = 0;
        assembled.freeze()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn byte_count(&self) -> usize {
        self.total_bytes
    }
}

/// Cloneable handle to one shared ring: every clone appends records as
/// fragments, any clone can dump the retained traffic. This is the sink
/// to hand out when several producers (for a server, one capture writer
/// per connection) should feed the same "last N packets" buffer.
#[derive(Clone)]
pub struct RingSink(Arc<Mutex<RingBuffer>>);

impl RingSink {
    pub fn new(max_fragments: usize, max_bytes: usize) -> Self {
        Self(Arc::new(Mutex::new(RingBuffer::new(max_fragments, max_bytes))))
    }

    /// Drains the retained records into `sink` as one standalone capture:
    /// the libpcap global header followed by the buffered records in
    /// insertion order. Triggered by the owner's "record previous
    /// packets" event.
    pub fn dump(&self, sink: &mut dyn CaptureSink) {
        let drained = self.0.lock().expect("ring poisoned").emit();
        sink.record(file_header());
        if !drained.is_empty() {
            sink.record(drained);
        }
    }
}

impl CaptureSink for RingSink {
    fn record(&mut self, chunk: Bytes) {
        self.0.lock().expect("ring poisoned").add_fragment(chunk);
    }
}

/// A pcap writer whose records land in a bounded ring instead of a file,
/// for "keep the last N packets, dump them on demand" diagnostics of a
/// single flow.
pub struct RingCapture {
    ring: RingSink,
    writer: PcapWriter<RingSink>,
}

impl RingCapture {
    pub fn new(max_fragments: usize, max_bytes: usize, addresses: CaptureAddresses) -> Self {
        let ring = RingSink::new(max_fragments, max_bytes);
        let writer = PcapWriter::new(ring.clone(), addresses);
        Self { ring, writer }
    }

    pub fn writer(&mut self) -> &mut PcapWriter<RingSink> {
        &mut self.writer
    }

    /// See [`RingSink::dump`].
    pub fn dump(&mut self, sink: &mut dyn CaptureSink) {
        self.ring.dump(sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(n: usize) -> Bytes {
        Bytes::from(vec![n as u8; n])
    }

    #[test]
    fn evicts_by_fragment_count() {
        let mut ring = RingBuffer::new(2, usize::MAX);
        ring.add_fragment(fragment(1));
        ring.add_fragment(fragment(2));
        ring.add_fragment(fragment(3));
        assert_eq!(ring.fragment_count(), 2);
        assert_eq!(ring.emit(), Bytes::from([vec![2u8; 2], vec![3u8; 3]].concat()));
    }

    #[test]
    fn evicts_by_byte_budget() {
        let mut ring = RingBuffer::new(16, 8);
        ring.add_fragment(fragment(4));
        ring.add_fragment(fragment(4));
        assert_eq!(ring.byte_count(), 8);
        ring.add_fragment(fragment(3));
        assert_eq!(ring.fragment_count(), 2);
        assert_eq!(ring.byte_count(), 7);
    }

    #[test]
    fn oversized_single_fragment_empties_the_ring() {
        let mut ring = RingBuffer::new(4, 8);
        ring.add_fragment(fragment(16));
        assert_eq!(ring.fragment_count(), 0);
        assert_eq!(ring.byte_count(), 0);
    }

    #[test]
    fn invariants_hold_after_every_add() {
        let mut ring = RingBuffer::new(3, 10);
        for n in [1usize, 5, 2, 7, 3, 9, 4] {
            ring.add_fragment(fragment(n));
            assert!(ring.fragment_count() <= 3);
            assert!(ring.byte_count() <= 10);
        }
    }

    #[test]
    fn emit_drains_in_insertion_order() {
        let mut ring = RingBuffer::new(8, 64);
        ring.add_fragment(Bytes::from_static(b"one"));
        ring.add_fragment(Bytes::from_static(b"two"));
        assert_eq!(ring.emit(), Bytes::from_static(b"onetwo"));
        assert_eq!(ring.fragment_count(), 0);
        assert_eq!(ring.emit(), Bytes::new());
    }

    #[test]
    fn shared_sink_clones_feed_one_ring() {
        let ring = RingSink::new(8, 1 << 16);
        let mut first = ring.clone();
        let mut second = ring.clone();
        first.record(Bytes::from_static(b"one"));
        second.record(Bytes::from_static(b"two"));

        let mut chunks: Vec<Bytes> = Vec::new();
        let mut sink = |chunk: Bytes| chunks.push(chunk);
        ring.dump(&mut sink);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], file_header());
        assert_eq!(chunks[1], Bytes::from_static(b"onetwo"));
    }

    #[test]
    fn dump_prefixes_the_file_header() {
        let mut capture = RingCapture::new(8, 1 << 16, CaptureAddresses::fallback());
        capture.writer().connection_established();

        let mut chunks: Vec<Bytes> = Vec::new();
        let mut sink = |chunk: Bytes| chunks.push(chunk);
        capture.dump(&mut sink);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], file_header());
        assert!(!chunks[1].is_empty());

        // A second dump with nothing new captured emits only the header.
        let mut more: Vec<Bytes> = Vec::new();
        let mut sink = |chunk: Bytes| more.push(chunk);
        capture.dump(&mut sink);
        assert_eq!(more.len(), 1);
    }
}
