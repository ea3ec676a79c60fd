//! SUN RPC message model (RFC 5531).
//!
//! Types for the record-marking fragment header and the RPC call/reply
//! envelopes. The byte-level mapping lives in [`crate::parser::rpc`] and
//! [`crate::serializer::rpc`]; the record reassembly state machine lives in
//! [`crate::framing::record`].

use num_derive::{FromPrimitive, ToPrimitive};

/// RPC protocol version spoken by this crate.
pub const RPC_VERSION: u32 = 2;

/// High bit of a fragment header: this fragment completes the record.
pub const FRAGMENT_LAST_BIT: u32 = 0x8000_0000;

/// Maximum bytes a single fragment body may carry (31-bit length).
pub const MAX_FRAGMENT_LEN: u32 = 0x7FFF_FFFF;

/// Maximum bytes of opaque body in a credential or verifier.
pub const MAX_AUTH_LEN: usize = 400;

/// Record-marking fragment header: 31-bit body length plus last-fragment bit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FragmentHeader {
    pub length: u32,
    pub last: bool,
}

impl FragmentHeader {
    pub fn new(length: u32, last: bool) -> Self {
        debug_assert!(length <= MAX_FRAGMENT_LEN);
        Self { length, last }
    }

    pub fn from_wire(word: u32) -> Self {
        Self { length: word & MAX_FRAGMENT_LEN, last: word & FRAGMENT_LAST_BIT != 0 }
    }

    pub fn to_wire(self) -> u32 {
        self.length | if self.last { FRAGMENT_LAST_BIT } else { 0 }
    }
}

/// Message discriminator following the xid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum MessageType {
    Call = 0,
    Reply = 1,
}

/// Authentication flavors (RFC 5531 8.2).
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum AuthFlavor {
    None = 0,
    Unix = 1,
    Short = 2,
    Dh = 3,
    Gss = 6,
}

/// Credential or verifier: a flavor plus up to [`MAX_AUTH_LEN`] opaque bytes.
///
/// The server accepts any flavor a client presents and never inspects the
/// body; every reply it emits carries the [`OpaqueAuth::none`] verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueAuth {
    pub flavor: AuthFlavor,
    pub body: Vec<u8>,
}

impl OpaqueAuth {
    pub fn none() -> Self {
        Self { flavor: AuthFlavor::None, body: Vec::new() }
    }

    pub fn unix(body: Vec<u8>) -> Self {
        Self { flavor: AuthFlavor::Unix, body }
    }
}

/// Decoded RPC call envelope. The procedure arguments follow in the
/// remainder of the record and are decoded per `(program, procedure)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHeader {
    pub xid: u32,
    pub program: u32,
    pub version: u32,
    pub procedure: u32,
    pub credentials: OpaqueAuth,
    pub verifier: OpaqueAuth,
}

/// Status carried by an accepted reply (RFC 5531 9).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AcceptedStatus {
    Success,
    ProgramUnavailable,
    ProgramMismatch { low: u32, high: u32 },
    ProcedureUnavailable,
    GarbageArgs,
    SystemError,
}

impl AcceptedStatus {
    pub fn discriminant(&self) -> u32 {
        match self {
            AcceptedStatus::Success => 0,
            AcceptedStatus::ProgramUnavailable => 1,
            AcceptedStatus::ProgramMismatch { .. } => 2,
            AcceptedStatus::ProcedureUnavailable => 3,
            AcceptedStatus::GarbageArgs => 4,
            AcceptedStatus::SystemError => 5,
        }
    }
}

/// Why a denied call failed authentication (RFC 5531 9).
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum AuthStatus {
    Ok = 0,
    BadCredentials = 1,
    RejectedCredentials = 2,
    BadVerifier = 3,
    RejectedVerifier = 4,
    TooWeak = 5,
    InvalidResponse = 6,
    Failed = 7,
    KerberosGeneric = 8,
    TimeExpired = 9,
    TicketFile = 10,
    Decode = 11,
    NetAddress = 12,
    GssCredProblem = 13,
    GssContextProblem = 14,
}

/// Body of a denied reply.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RejectedReply {
    RpcMismatch { low: u32, high: u32 },
    AuthError(AuthStatus),
}

/// Decoded RPC reply envelope. For accepted `Success` replies the
/// procedure-specific body follows in the remainder of the record.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyHeader {
    pub xid: u32,
    pub body: ReplyBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Accepted { verifier: OpaqueAuth, status: AcceptedStatus },
    Denied(RejectedReply),
}

impl ReplyHeader {
    /// The reply every successful server dispatch starts from: accepted,
    /// [`AuthFlavor::None`] verifier.
    pub fn accepted(xid: u32, status: AcceptedStatus) -> Self {
        Self { xid, body: ReplyBody::Accepted { verifier: OpaqueAuth::none(), status } }
    }
}
