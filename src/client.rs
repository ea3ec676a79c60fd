//! Pipelined client leg.
//!
//! Writes calls with fresh xids, registers each with the
//! [`ReplyCorrelator`] and decodes whatever replies arrive, in any
//! order. Primarily a test vehicle for the server, but complete enough
//! to drive a real NFSv3 export.

use std::io::{self, Cursor};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::codec::{Encoder, FramedRead};

use crate::correlator::{self, Expected, Mode, ProcedureReply, ReplyCorrelator};
use crate::framing::record::{RecordCodec, RecordError};
use crate::nfs3::{FileHandle, MOUNT_PROGRAM, MOUNT_VERSION, NFS_VERSION};
use crate::parser;
use crate::rpc::{AcceptedStatus, CallHeader, OpaqueAuth, RejectedReply, ReplyBody};
use crate::serializer;
use crate::vfs::{AccessArgs, LookupArgs, ReadArgs, ReadDirArgs, ReadDirPlusArgs, SetAttrArgs};

/// One call this client can issue, with its typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureCall {
    NfsNull,
    MountNull,
    Mount(String),
    Unmount(String),
    GetAttr(FileHandle),
    SetAttr(SetAttrArgs),
    Lookup(LookupArgs),
    Access(AccessArgs),
    ReadLink(FileHandle),
    Read(ReadArgs),
    ReadDir(ReadDirArgs),
    ReadDirPlus(ReadDirPlusArgs),
    FsStat(FileHandle),
    FsInfo(FileHandle),
    PathConf(FileHandle),
}

impl ProcedureCall {
    pub fn expected(&self) -> Expected {
        match self {
            ProcedureCall::NfsNull => Expected::NfsNull,
            ProcedureCall::MountNull => Expected::MountNull,
            ProcedureCall::Mount(_) => Expected::Mount,
            ProcedureCall::Unmount(_) => Expected::Unmount,
            ProcedureCall::GetAttr(_) => Expected::GetAttr,
            ProcedureCall::SetAttr(_) => Expected::SetAttr,
            ProcedureCall::Lookup(_) => Expected::Lookup,
            ProcedureCall::Access(_) => Expected::Access,
            ProcedureCall::ReadLink(_) => Expected::ReadLink,
            ProcedureCall::Read(_) => Expected::Read,
            ProcedureCall::ReadDir(_) => Expected::ReadDir,
            ProcedureCall::ReadDirPlus(_) => Expected::ReadDirPlus,
            ProcedureCall::FsStat(_) => Expected::FsStat,
            ProcedureCall::FsInfo(_) => Expected::FsInfo,
            ProcedureCall::PathConf(_) => Expected::PathConf,
        }
    }

    fn write_body(&self, dest: &mut Vec<u8>) -> io::Result<()> {
        use serializer::nfs3::calls;
        match self {
            ProcedureCall::NfsNull | ProcedureCall::MountNull => Ok(()),
            ProcedureCall::Mount(path) => serializer::mount::mount_args(dest, path),
            ProcedureCall::Unmount(path) => serializer::mount::unmount_args(dest, path),
            ProcedureCall::GetAttr(handle)
            | ProcedureCall::ReadLink(handle)
            | ProcedureCall::FsStat(handle)
            | ProcedureCall::FsInfo(handle)
            | ProcedureCall::PathConf(handle) => calls::handle_only(dest, handle),
            ProcedureCall::SetAttr(args) => calls::set_attr_args(dest, args),
            ProcedureCall::Lookup(args) => calls::lookup(dest, args),
            ProcedureCall::Access(args) => calls::access(dest, args),
            ProcedureCall::Read(args) => calls::read(dest, args),
            ProcedureCall::ReadDir(args) => calls::read_dir(dest, args),
            ProcedureCall::ReadDirPlus(args) => calls::read_dir_plus(dest, args),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Correlate(#[from] correlator::Error),

    #[error("server closed the connection")]
    Closed,

    #[error("call denied: {0:?}")]
    Denied(RejectedReply),

    #[error("call not successful: {0:?}")]
    Unsuccessful(AcceptedStatus),
}

/// NFSv3/MOUNT client over any byte stream.
pub struct NfsClient<S> {
    frames: FramedRead<ReadHalf<S>, RecordCodec>,
    writer: WriteHalf<S>,
    correlator: ReplyCorrelator,
    next_xid: u32,
}

impl<S: AsyncRead + AsyncWrite> NfsClient<S> {
    pub fn new(stream: S) -> Self {
        Self::with_correlator_mode(stream, Mode::OneShot)
    }

    pub fn with_correlator_mode(stream: S, mode: Mode) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            frames: FramedRead::new(read, RecordCodec::default()),
            writer: write,
            correlator: ReplyCorrelator::with_mode(mode),
            next_xid: 1,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.correlator.outstanding()
    }

    /// Writes one call and registers its xid. Returns the xid used.
    pub async fn send_call(&mut self, call: &ProcedureCall) -> Result<u32, ClientError> {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1);
        self.send_call_with_xid(xid, call).await?;
        Ok(xid)
    }

    /// Writes one call under a caller-chosen xid.
    pub async fn send_call_with_xid(
        &mut self,
        xid: u32,
        call: &ProcedureCall,
    ) -> Result<(), ClientError> {
        let expected = call.expected();
        let program = expected.program();
        let version = if program == MOUNT_PROGRAM { MOUNT_VERSION } else { NFS_VERSION };

        let mut body = Vec::with_capacity(128);
        serializer::rpc::call_header(
            &mut body,
            &CallHeader {
                xid,
                program,
                version,
                procedure: expected.procedure(),
                credentials: OpaqueAuth::none(),
                verifier: OpaqueAuth::none(),
            },
        )?;
        call.write_body(&mut body)?;

        let mut wire = BytesMut::new();
        RecordCodec::default().encode(Bytes::from(body), &mut wire)?;
        self.writer.write_all(&wire).await?;
        self.correlator.register(xid, expected);
        Ok(())
    }

    /// Receives the next reply, whichever call it answers.
    pub async fn recv_reply(&mut self) -> Result<(u32, ProcedureReply), ClientError> {
        let Some(frame) = self.frames.next().await else {
            return Err(ClientError::Closed);
        };
        let message = frame?;
        let mut src = Cursor::new(message.as_ref());
        let header = parser::rpc::reply_header(&mut src).map_err(correlator::Error::Decode)?;
        match header.body {
            ReplyBody::Accepted { status: AcceptedStatus::Success, .. } => {
                let reply = self.correlator.decode_reply(header.xid, &mut src)?;
                Ok((header.xid, reply))
            }
            ReplyBody::Accepted { status, .. } => {
                let _ = self.correlator.resolve(header.xid);
                Err(ClientError::Unsuccessful(status))
            }
            ReplyBody::Denied(rejected) => {
                let _ = self.correlator.resolve(header.xid);
                Err(ClientError::Denied(rejected))
            }
        }
    }

    /// One serial round trip: send, then wait for that call's reply.
    pub async fn call(&mut self, call: &ProcedureCall) -> Result<ProcedureReply, ClientError> {
        let xid = self.send_call(call).await?;
        loop {
            let (reply_xid, reply) = self.recv_reply().await?;
            if reply_xid == xid {
                return Ok(reply);
            }
        }
    }
}
