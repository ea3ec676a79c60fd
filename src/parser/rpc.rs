//! RPC call and reply envelope decoding (RFC 5531).

use std::io::Read;

use crate::parser::primitive::{opaque_max, u32, variant};
use crate::parser::{Error, Result};
use crate::rpc::{
    AcceptedStatus, AuthStatus, CallHeader, MessageType, OpaqueAuth, RejectedReply, ReplyBody,
    ReplyHeader, MAX_AUTH_LEN, RPC_VERSION,
};

/// Reads an `opaque_auth`: flavor plus bounded opaque body.
pub fn auth(src: &mut impl Read) -> Result<OpaqueAuth> {
    Ok(OpaqueAuth {
        flavor: variant(src, Error::InvalidAuthFlavor)?,
        body: opaque_max(src, MAX_AUTH_LEN)?,
    })
}

fn message_type(src: &mut impl Read) -> Result<MessageType> {
    variant(src, Error::UnknownMessageType)
}

/// Reads a complete call envelope: xid, CALL discriminator, rpc version 2,
/// program/version/procedure, credentials and verifier. The procedure
/// arguments remain unread in `src`.
pub fn call_header(src: &mut impl Read) -> Result<CallHeader> {
    let xid = u32(src)?;
    match message_type(src)? {
        MessageType::Call => {}
        MessageType::Reply => return Err(Error::WrongMessageType),
    }
    let rpc_version = u32(src)?;
    if rpc_version != RPC_VERSION {
        return Err(Error::UnknownVersion(rpc_version));
    }
    Ok(CallHeader {
        xid,
        program: u32(src)?,
        version: u32(src)?,
        procedure: u32(src)?,
        credentials: auth(src)?,
        verifier: auth(src)?,
    })
}

fn accepted_status(src: &mut impl Read) -> Result<AcceptedStatus> {
    Ok(match u32(src)? {
        0 => AcceptedStatus::Success,
        1 => AcceptedStatus::ProgramUnavailable,
        2 => AcceptedStatus::ProgramMismatch { low: u32(src)?, high: u32(src)? },
        3 => AcceptedStatus::ProcedureUnavailable,
        4 => AcceptedStatus::GarbageArgs,
        5 => AcceptedStatus::SystemError,
        other => return Err(Error::IllegalAcceptStatus(other)),
    })
}

fn rejected_reply(src: &mut impl Read) -> Result<RejectedReply> {
    Ok(match u32(src)? {
        0 => RejectedReply::RpcMismatch { low: u32(src)?, high: u32(src)? },
        1 => RejectedReply::AuthError(auth_status(src)?),
        other => return Err(Error::IllegalRejectStatus(other)),
    })
}

fn auth_status(src: &mut impl Read) -> Result<AuthStatus> {
    variant(src, Error::InvalidAuthStatus)
}

/// Reads a complete reply envelope. For accepted `Success` replies the
/// procedure-specific body remains unread in `src`.
pub fn reply_header(src: &mut impl Read) -> Result<ReplyHeader> {
    let xid = u32(src)?;
    match message_type(src)? {
        MessageType::Reply => {}
        MessageType::Call => return Err(Error::WrongMessageType),
    }
    let body = match u32(src)? {
        0 => ReplyBody::Accepted { verifier: auth(src)?, status: accepted_status(src)? },
        1 => ReplyBody::Denied(rejected_reply(src)?),
        other => return Err(Error::IllegalReplyStatus(other)),
    };
    Ok(ReplyHeader { xid, body })
}
