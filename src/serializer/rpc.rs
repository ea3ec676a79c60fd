//! RPC call and reply envelope encoding (RFC 5531).

use std::io::{self, Write};

use crate::rpc::{
    AcceptedStatus, CallHeader, MessageType, OpaqueAuth, RejectedReply, ReplyBody, ReplyHeader,
    MAX_AUTH_LEN, RPC_VERSION,
};
use crate::serializer::{opaque_max, u32, variant};

/// Writes an `opaque_auth`.
pub fn auth(dest: &mut impl Write, auth: &OpaqueAuth) -> io::Result<()> {
    variant(dest, &auth.flavor)?;
    opaque_max(dest, &auth.body, MAX_AUTH_LEN)
}

/// Writes a complete call envelope; procedure arguments follow separately.
pub fn call_header(dest: &mut impl Write, call: &CallHeader) -> io::Result<()> {
    u32(dest, call.xid)?;
    variant(dest, &MessageType::Call)?;
    u32(dest, RPC_VERSION)?;
    u32(dest, call.program)?;
    u32(dest, call.version)?;
    u32(dest, call.procedure)?;
    auth(dest, &call.credentials)?;
    auth(dest, &call.verifier)
}

fn accepted_status(dest: &mut impl Write, status: &AcceptedStatus) -> io::Result<()> {
    u32(dest, status.discriminant())?;
    if let AcceptedStatus::ProgramMismatch { low, high } = status {
        u32(dest, *low)?;
        u32(dest, *high)?;
    }
    Ok(())
}

fn rejected_reply(dest: &mut impl Write, reply: &RejectedReply) -> io::Result<()> {
    match reply {
        RejectedReply::RpcMismatch { low, high } => {
            u32(dest, 0)?;
            u32(dest, *low)?;
            u32(dest, *high)
        }
        RejectedReply::AuthError(status) => {
            u32(dest, 1)?;
            variant(dest, status)
        }
    }
}

/// Writes a complete reply envelope; for accepted `Success` replies the
/// procedure-specific body follows separately.
pub fn reply_header(dest: &mut impl Write, reply: &ReplyHeader) -> io::Result<()> {
    u32(dest, reply.xid)?;
    variant(dest, &MessageType::Reply)?;
    match &reply.body {
        ReplyBody::Accepted { verifier, status } => {
            u32(dest, 0)?;
            auth(dest, verifier)?;
            accepted_status(dest, status)
        }
        ReplyBody::Denied(rejected) => {
            u32(dest, 1)?;
            rejected_reply(dest, rejected)
        }
    }
}
