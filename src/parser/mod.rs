//! XDR decoding for RPC, NFSv3 and MOUNT messages.
//!
//! Every function reads from a `std::io::Read` positioned inside one
//! complete record (reassembly happens in [`crate::framing::record`]).
//! Running out of bytes surfaces as [`Error::Io`] with
//! `ErrorKind::UnexpectedEof`; it is never a panic.

pub mod mount;
pub mod nfs3;
pub mod primitive;
pub mod rpc;

#[cfg(test)]
mod tests;

use thiserror::Error;

/// Result of parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Decoding failures. Any of these is fatal to the connection that
/// produced the bytes; the dispatcher answers recoverable conditions
/// (unknown procedure, undecodable arguments) at the RPC layer instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o while decoding: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer than 0..3 padding bytes were available after a counted field.
    #[error("truncated xdr padding")]
    IncorrectPadding,

    /// An XDR boolean held something other than 0 or 1.
    #[error("boolean discriminant {0} out of range")]
    InvalidBool(u32),

    /// A counted field exceeded its protocol bound.
    #[error("opaque of {length} bytes exceeds limit of {limit}")]
    TooLong { length: usize, limit: usize },

    /// A string field held non-UTF-8 bytes.
    #[error("string field is not valid utf-8")]
    InvalidString(#[from] std::string::FromUtf8Error),

    /// The message discriminator was neither CALL nor REPLY.
    #[error("unknown rpc message type {0}")]
    UnknownMessageType(u32),

    /// A CALL arrived where a REPLY was required, or vice versa.
    #[error("wrong rpc message type for this direction")]
    WrongMessageType,

    /// The call used an RPC version other than 2.
    #[error("unsupported rpc version {0}")]
    UnknownVersion(u32),

    /// Credential or verifier carried an unknown flavor.
    #[error("invalid auth flavor {0}")]
    InvalidAuthFlavor(u32),

    /// Reply status was neither accepted nor denied.
    #[error("illegal rpc reply status {0}")]
    IllegalReplyStatus(u32),

    /// Accepted-reply status outside the RFC 5531 set.
    #[error("illegal rpc accept status {0}")]
    IllegalAcceptStatus(u32),

    /// Rejected-reply status outside the RFC 5531 set.
    #[error("illegal rpc reject status {0}")]
    IllegalRejectStatus(u32),

    /// Auth-error status outside the RFC 5531 set.
    #[error("invalid auth status {0}")]
    InvalidAuthStatus(u32),

    /// `ftype3` discriminant outside 1..=7.
    #[error("invalid file type {0}")]
    InvalidFileType(u32),

    /// `nfsstat3` value outside the RFC 1813 set.
    #[error("invalid nfs status {0}")]
    InvalidStatus(u32),

    /// A file handle whose length this server does not accept.
    #[error("invalid file handle of {0} bytes")]
    InvalidFileHandle(usize),

    /// `set_atime`/`set_mtime` discriminant outside 0..=2.
    #[error("invalid time-update discriminant {0}")]
    InvalidSetTime(u32),
}
