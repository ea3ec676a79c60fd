//! TCP record synthesis from application-level observations.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

use super::CaptureSink;

/// Largest payload one synthesised segment may carry:
/// `65535 - 20 (IPv4) - 20 (TCP)`.
pub const MAX_SEGMENT_PAYLOAD: usize = 65_495;

/// BSD loopback family prefix for IPv4 packets.
const FAMILY_IPV4: u32 = 2;
/// BSD loopback family prefix for IPv6 packets.
const FAMILY_IPV6: u32 = 24;

const TCP_FIN: u8 = 0x01;
const TCP_SYN: u8 = 0x02;
const TCP_PSH: u8 = 0x08;
const TCP_ACK: u8 = 0x10;

/// Endpoints attributed to the synthesised flow. Both must share one
/// address family; anything else (including non-IP transports such as
/// Unix sockets) falls back to a fixed fake pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CaptureAddresses {
    pub local: SocketAddr,
    pub peer: SocketAddr,
}

impl CaptureAddresses {
    /// Fake endpoints used when the transport has no IP addresses.
    pub fn fallback() -> Self {
        Self {
            local: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(111, 111, 111, 111)), 1111),
            peer: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(222, 222, 222, 222)), 2222),
        }
    }

    /// Uses the given pair when both sides are IP addresses of the same
    /// family, the fallback pair otherwise.
    pub fn from_transport(local: Option<SocketAddr>, peer: Option<SocketAddr>) -> Self {
        match (local, peer) {
            (Some(local), Some(peer))
                if local.is_ipv4() == peer.is_ipv4() =>
            {
                Self { local, peer }
            }
            _ => Self::fallback(),
        }
    }
}

/// Synthesises one TCP flow. Sequence numbers advance with the bytes
/// observed in each direction, modulo 2^32.
pub struct PcapWriter<S: CaptureSink> {
    sink: S,
    addresses: CaptureAddresses,
    local_seq: u32,
    peer_seq: u32,
}

impl<S: CaptureSink> PcapWriter<S> {
    pub fn new(sink: S, addresses: CaptureAddresses) -> Self {
        Self { sink, addresses, local_seq: 0, peer_seq: 0 }
    }

    pub fn addresses(&self) -> CaptureAddresses {
        self.addresses
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Channel-active: the three-way handshake.
    pub fn connection_established(&mut self) {
        let syn = self.segment(true, TCP_SYN, 0, 0, &[]);
        self.sink.record(syn);
        let syn_ack = self.segment(false, TCP_SYN | TCP_ACK, 0, 1, &[]);
        self.sink.record(syn_ack);
        let ack = self.segment(true, TCP_ACK, 1, 1, &[]);
        self.sink.record(ack);
        self.local_seq = 1;
        self.peer_seq = 1;
    }

    /// Bytes that arrived from the peer.
    pub fn inbound_data(&mut self, data: &[u8]) {
        self.data_segments(false, data);
    }

    /// Bytes this side sent to the peer.
    pub fn outbound_data(&mut self, data: &[u8]) {
        self.data_segments(true, data);
    }

    /// Channel-inactive: FIN from whichever side closed first, FIN+ACK
    /// back, final ACK.
    pub fn connection_closed(&mut self, closed_by_local: bool) {
        let (initiator_seq, responder_seq) = if closed_by_local {
            (self.local_seq, self.peer_seq)
        } else {
            (self.peer_seq, self.local_seq)
        };
        let fin = self.segment(
            closed_by_local,
            TCP_FIN | TCP_ACK,
            initiator_seq,
            responder_seq,
            &[],
        );
        self.sink.record(fin);
        let fin_ack = self.segment(
            !closed_by_local,
            TCP_FIN | TCP_ACK,
            responder_seq,
            initiator_seq.wrapping_add(1),
            &[],
        );
        self.sink.record(fin_ack);
        let ack = self.segment(
            closed_by_local,
            TCP_ACK,
            initiator_seq.wrapping_add(1),
            responder_seq.wrapping_add(1),
            &[],
        );
        self.sink.record(ack);
    }

    fn data_segments(&mut self, from_local: bool, data: &[u8]) {
        for chunk in data.chunks(MAX_SEGMENT_PAYLOAD) {
            let (seq, ack) = if from_local {
                (self.local_seq, self.peer_seq)
            } else {
                (self.peer_seq, self.local_seq)
            };
            let segment = self.segment(from_local, TCP_PSH | TCP_ACK, seq, ack, chunk);
            self.sink.record(segment);
            let advanced = if from_local { &mut self.local_seq } else { &mut self.peer_seq };
            *advanced = advanced.wrapping_add(chunk.len() as u32);
        }
    }

    fn segment(&self, from_local: bool, flags: u8, seq: u32, ack: u32, payload: &[u8]) -> Bytes {
        let (src, dst) = if from_local {
            (self.addresses.local, self.addresses.peer)
        } else {
            (self.addresses.peer, self.addresses.local)
        };
        match (src.ip(), dst.ip()) {
            (IpAddr::V4(src_ip), IpAddr::V4(dst_ip)) => {
                ipv4_record(src_ip, dst_ip, src.port(), dst.port(), flags, seq, ack, payload)
            }
            (IpAddr::V6(src_ip), IpAddr::V6(dst_ip)) => {
                ipv6_record(src_ip, dst_ip, src.port(), dst.port(), flags, seq, ack, payload)
            }
            _ => {
                let fallback = CaptureAddresses::fallback();
                let (src, dst) =
                    if from_local { (fallback.local, fallback.peer) } else { (fallback.peer, fallback.local) };
                let (IpAddr::V4(src_ip), IpAddr::V4(dst_ip)) = (src.ip(), dst.ip()) else {
                    unreachable!()
                };
                ipv4_record(src_ip, dst_ip, src.port(), dst.port(), flags, seq, ack, payload)
            }
        }
    }
}

fn timestamp() -> (u32, u32) {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    (now.as_secs() as u32, now.subsec_micros())
}

fn record_header(dst: &mut BytesMut, packet_len: usize) {
    let (ts_sec, ts_usec) = timestamp();
    dst.put_u32_le(ts_sec);
    dst.put_u32_le(ts_usec);
    dst.put_u32_le(packet_len as u32);
    dst.put_u32_le(packet_len as u32);
}

fn tcp_header(
    dst: &mut BytesMut,
    src_port: u16,
    dst_port: u16,
    flags: u8,
    seq: u32,
    ack: u32,
) {
    dst.put_u16(src_port);
    dst.put_u16(dst_port);
    dst.put_u32(seq);
    dst.put_u32(ack);
    dst.put_u8(5 << 4); // data offset: 5 words, no options
    dst.put_u8(flags);
    dst.put_u16(0xFFFF); // window
    dst.put_u16(0); // checksum not computed
    dst.put_u16(0); // urgent pointer
}

#[allow(clippy::too_many_arguments)]
fn ipv4_record(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    flags: u8,
    seq: u32,
    ack: u32,
    payload: &[u8],
) -> Bytes {
    let total_len = 20 + 20 + payload.len();
    let packet_len = 4 + total_len;
    let mut record = BytesMut::with_capacity(16 + packet_len);
    record_header(&mut record, packet_len);
    record.put_u32_le(FAMILY_IPV4);

    record.put_u8(0x45); // version 4, header length 5 words
    record.put_u8(0); // dscp/ecn
    record.put_u16(total_len as u16);
    record.put_u16(0); // identification
    record.put_u16(0); // flags/fragment offset
    record.put_u8(64); // ttl
    record.put_u8(6); // protocol: tcp
    record.put_u16(0); // checksum not computed
    record.put_slice(&src.octets());
    record.put_slice(&dst.octets());

    tcp_header(&mut record, src_port, dst_port, flags, seq, ack);
    record.put_slice(payload);
    record.freeze()
}

#[allow(clippy::too_many_arguments)]
fn ipv6_record(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    src_port: u16,
    dst_port: u16,
    flags: u8,
    seq: u32,
    ack: u32,
    payload: &[u8],
) -> Bytes {
    let payload_len = 20 + payload.len();
    let packet_len = 4 + 40 + payload_len;
    let mut record = BytesMut::with_capacity(16 + packet_len);
    record_header(&mut record, packet_len);
    record.put_u32_le(FAMILY_IPV6);

    record.put_u32(6 << 28); // version 6, no traffic class or flow label
    record.put_u16(payload_len as u16);
    record.put_u8(6); // next header: tcp
    record.put_u8(64); // hop limit
    record.put_slice(&src.octets());
    record.put_slice(&dst.octets());

    tcp_header(&mut record, src_port, dst_port, flags, seq, ack);
    record.put_slice(payload);
    record.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Collector(Arc<Mutex<Vec<Bytes>>>);

    impl CaptureSink for Collector {
        fn record(&mut self, chunk: Bytes) {
            self.0.lock().unwrap().push(chunk);
        }
    }

    fn v4_addresses() -> CaptureAddresses {
        CaptureAddresses {
            local: "10.0.0.1:2049".parse().unwrap(),
            peer: "10.0.0.2:700".parse().unwrap(),
        }
    }

    fn records(collector: &Collector) -> Vec<Bytes> {
        collector.0.lock().unwrap().clone()
    }

    #[test]
    fn handshake_emits_three_records() {
        let collector = Collector::default();
        let mut writer = PcapWriter::new(collector.clone(), v4_addresses());
        writer.connection_established();

        let records = records(&collector);
        assert_eq!(records.len(), 3);
        // SYN from local, SYN|ACK from peer, ACK from local.
        let flags: Vec<u8> = records.iter().map(|r| r[16 + 4 + 20 + 13]).collect();
        assert_eq!(flags, vec![TCP_SYN, TCP_SYN | TCP_ACK, TCP_ACK]);
        // Record 0 source address is the local side.
        assert_eq!(&records[0][16 + 4 + 12..16 + 4 + 16], &[10, 0, 0, 1]);
        assert_eq!(&records[1][16 + 4 + 12..16 + 4 + 16], &[10, 0, 0, 2]);
    }

    #[test]
    fn record_lengths_describe_the_packet() {
        let collector = Collector::default();
        let mut writer = PcapWriter::new(collector.clone(), v4_addresses());
        writer.inbound_data(b"ABCDEFGH");

        let record = &records(&collector)[0];
        let incl_len = u32::from_le_bytes(record[8..12].try_into().unwrap()) as usize;
        let orig_len = u32::from_le_bytes(record[12..16].try_into().unwrap()) as usize;
        assert_eq!(incl_len, record.len() - 16);
        assert_eq!(incl_len, orig_len);
        assert_eq!(incl_len, 4 + 20 + 20 + 8);
        // IPv4 total length covers IP + TCP + data.
        let ip_total = u16::from_be_bytes(record[16 + 4 + 2..16 + 4 + 4].try_into().unwrap());
        assert_eq!(ip_total, 48);
    }

    #[test]
    fn large_writes_are_sliced_with_advancing_sequence_numbers() {
        let collector = Collector::default();
        let mut writer = PcapWriter::new(collector.clone(), v4_addresses());
        writer.connection_established();
        writer.outbound_data(&vec![0x42u8; MAX_SEGMENT_PAYLOAD + 10]);

        let records = records(&collector);
        assert_eq!(records.len(), 5);
        let seq_of = |record: &Bytes| {
            u32::from_be_bytes(record[16 + 4 + 20 + 4..16 + 4 + 20 + 8].try_into().unwrap())
        };
        assert_eq!(seq_of(&records[3]), 1);
        assert_eq!(seq_of(&records[4]), 1 + MAX_SEGMENT_PAYLOAD as u32);
        let payload_len = records[4].len() - 16 - 4 - 40;
        assert_eq!(payload_len, 10);
    }

    #[test]
    fn teardown_attributes_the_fin_to_the_closer() {
        for closed_by_local in [true, false] {
            let collector = Collector::default();
            let mut writer = PcapWriter::new(collector.clone(), v4_addresses());
            writer.connection_established();
            writer.connection_closed(closed_by_local);

            let records = records(&collector);
            let fin = &records[3];
            let expected_src: &[u8] =
                if closed_by_local { &[10, 0, 0, 1] } else { &[10, 0, 0, 2] };
            assert_eq!(&fin[16 + 4 + 12..16 + 4 + 16], expected_src);
            assert_eq!(fin[16 + 4 + 20 + 13], TCP_FIN | TCP_ACK);
            assert_eq!(records[5][16 + 4 + 20 + 13], TCP_ACK);
        }
    }

    #[test]
    fn non_ip_transport_uses_the_fallback_pair() {
        let addresses = CaptureAddresses::from_transport(None, None);
        assert_eq!(addresses, CaptureAddresses::fallback());
        assert_eq!(addresses.local.to_string(), "111.111.111.111:1111");
        assert_eq!(addresses.peer.to_string(), "222.222.222.222:2222");
    }

    #[test]
    fn mixed_families_fall_back() {
        let addresses = CaptureAddresses::from_transport(
            Some("10.0.0.1:1".parse().unwrap()),
            Some("[::1]:2".parse().unwrap()),
        );
        assert_eq!(addresses, CaptureAddresses::fallback());
    }

    #[test]
    fn ipv6_records_use_the_v6_family_and_header() {
        let collector = Collector::default();
        let addresses = CaptureAddresses {
            local: "[2001:db8::1]:2049".parse().unwrap(),
            peer: "[2001:db8::2]:700".parse().unwrap(),
        };
        let mut writer = PcapWriter::new(collector.clone(), addresses);
        writer.inbound_data(b"xy");

        let record = &records(&collector)[0];
        assert_eq!(&record[16..20], &[24, 0, 0, 0]);
        assert_eq!(record[20] >> 4, 6);
        let payload_len = u16::from_be_bytes(record[20 + 4..20 + 6].try_into().unwrap());
        assert_eq!(payload_len, 22);
    }
}
