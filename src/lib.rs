//! nfswire - the server half of NFS version 3 (RFC 1813) over SUN RPC
//! (RFC 5531), plus the stream-framing toolbox around it.
//!
//! The crate splits into:
//!
//! - wire model and codecs: [`nfs3`], [`rpc`], [`parser`], [`serializer`];
//! - transport framing: [`framing`] (record marking, fixed-length,
//!   length-prefixed, line and `Content-Length` framers);
//! - server runtime: [`vfs`] (the pluggable back-end seam), [`dispatch`],
//!   [`server`], [`quiesce`];
//! - client leg: [`client`] with the xid [`correlator`];
//! - request/response pairing for any protocol: [`exchange`];
//! - capture diagnostics: [`pcap`].

pub mod client;
pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod exchange;
pub mod framing;
pub mod nfs3;
pub mod parser;
pub mod pcap;
pub mod quiesce;
pub mod rpc;
pub mod serializer;
pub mod server;
pub mod vfs;
