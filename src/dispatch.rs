//! Call dispatch: route one decoded RPC message to the back-end and
//! produce the reply bytes.
//!
//! Decoding ([`decode_call`]) stays on the connection's reader so that a
//! malformed message can kill the connection before anything is spawned;
//! execution ([`execute`]) runs wherever the server placed it and always
//! produces a reply frame. Unknown procedures never close the connection:
//! they answer with the matching RPC accept status.

use std::io::{self, Cursor};
use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use crate::nfs3::{
    mount_procedure, procedure, FileHandle, NfsResult, Status, MOUNT_PROGRAM, MOUNT_VERSION,
    NFS_PROGRAM, NFS_VERSION,
};
use crate::parser;
use crate::rpc::{AcceptedStatus, ReplyHeader};
use crate::serializer;
use crate::serializer::nfs3::replies;
use crate::vfs::{
    AccessArgs, LookupArgs, ReadArgs, ReadDirArgs, ReadDirPlusArgs, SetAttrArgs, Vfs,
};

/// One serialized reply, ready for record framing.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyFrame {
    Full(Bytes),
    /// READ success: envelope and metadata in `prefix`, then the file
    /// bytes and 0..3 filler bytes emitted straight from the back-end's
    /// buffer.
    Split { prefix: Bytes, data: Bytes, fill: usize },
}

impl ReplyFrame {
    /// Total record body length once on the wire.
    pub fn wire_len(&self) -> usize {
        match self {
            ReplyFrame::Full(bytes) => bytes.len(),
            ReplyFrame::Split { prefix, data, fill } => prefix.len() + data.len() + fill,
        }
    }
}

/// A call decoded down to typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    pub xid: u32,
    pub action: CallAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallAction {
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
    /// Known envelope, nothing to run: answered with this accept status.
    Unavailable(AcceptedStatus),
}

/// Decodes one complete record into a typed call.
///
/// Unknown programs, versions and procedures decode successfully into
/// [`CallAction::Unavailable`]; a malformed envelope or argument body is
/// an error and the caller must treat it as fatal to the connection.
pub fn decode_call(message: &Bytes) -> parser::Result<DecodedCall> {
    use crate::parser::nfs3::calls;

    let mut src = Cursor::new(message.as_ref());
    let call = parser::rpc::call_header(&mut src)?;

    let action = match (call.program, call.version) {
        (NFS_PROGRAM, NFS_VERSION) => match call.procedure {
            procedure::NULL => CallAction::NfsNull,
            procedure::GETATTR => CallAction::GetAttr(calls::handle_only(&mut src)?),
            procedure::SETATTR => CallAction::SetAttr(calls::set_attr_args(&mut src)?),
            procedure::LOOKUP => CallAction::Lookup(calls::lookup(&mut src)?),
            procedure::ACCESS => CallAction::Access(calls::access(&mut src)?),
            procedure::READLINK => CallAction::ReadLink(calls::handle_only(&mut src)?),
            procedure::READ => CallAction::Read(calls::read(&mut src)?),
            procedure::READDIR => CallAction::ReadDir(calls::read_dir(&mut src)?),
            procedure::READDIRPLUS => {
                CallAction::ReadDirPlus(calls::read_dir_plus(&mut src)?)
            }
            procedure::FSSTAT => CallAction::FsStat(calls::handle_only(&mut src)?),
            procedure::FSINFO => CallAction::FsInfo(calls::handle_only(&mut src)?),
            procedure::PATHCONF => CallAction::PathConf(calls::handle_only(&mut src)?),
            unknown => {
                warn!(
                    xid = call.xid,
                    program = call.program,
                    procedure = unknown,
                    "unknown nfs procedure"
                );
                CallAction::Unavailable(AcceptedStatus::ProcedureUnavailable)
            }
        },
        (MOUNT_PROGRAM, MOUNT_VERSION) => match call.procedure {
            mount_procedure::NULL => CallAction::MountNull,
            mount_procedure::MNT => CallAction::Mount(parser::mount::mount_args(&mut src)?),
            mount_procedure::UMNT => {
                CallAction::Unmount(parser::mount::unmount_args(&mut src)?)
            }
            unknown => {
                warn!(
                    xid = call.xid,
                    program = call.program,
                    procedure = unknown,
                    "unknown mount procedure"
                );
                CallAction::Unavailable(AcceptedStatus::ProcedureUnavailable)
            }
        },
        (NFS_PROGRAM, version) | (MOUNT_PROGRAM, version) => {
            warn!(xid = call.xid, program = call.program, version, "unsupported program version");
            CallAction::Unavailable(AcceptedStatus::ProgramMismatch {
                low: NFS_VERSION,
                high: NFS_VERSION,
            })
        }
        (program, _) => {
            warn!(xid = call.xid, program, "unknown rpc program");
            CallAction::Unavailable(AcceptedStatus::ProgramUnavailable)
        }
    };

    Ok(DecodedCall { xid: call.xid, action })
}

/// Runs a back-end future on its own task so a panic inside the back-end
/// degrades to a SERVERFAULT reply instead of killing the connection.
async fn shielded<O, F>(
    fut: impl std::future::Future<Output = NfsResult<O, F>> + Send + 'static,
) -> NfsResult<O, F>
where
    O: Send + 'static,
    F: Default + Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(result) => result,
        Err(join_error) => {
            warn!(error = %join_error, "back-end task failed");
            NfsResult::Fail(Status::ServerFault, F::default())
        }
    }
}

fn envelope(xid: u32, status: AcceptedStatus) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    serializer::rpc::reply_header(&mut buf, &ReplyHeader::accepted(xid, status))
        .expect("reply envelope into a vec cannot fail");
    buf
}

fn full_frame(
    xid: u32,
    body: impl FnOnce(&mut Vec<u8>) -> io::Result<()>,
) -> Result<ReplyFrame, io::Error> {
    let mut buf = envelope(xid, AcceptedStatus::Success);
    body(&mut buf)?;
    Ok(ReplyFrame::Full(Bytes::from(buf)))
}

/// A reply the encoder can never refuse: the procedure's fail arm with an
/// empty body. Used when encoding the real result failed.
fn serverfault_frame(xid: u32) -> ReplyFrame {
    let mut buf = envelope(xid, AcceptedStatus::Success);
    serializer::nfs3::status(&mut buf, Status::ServerFault)
        .expect("status into a vec cannot fail");
    serializer::bool(&mut buf, false).expect("empty post-op attr into a vec cannot fail");
    ReplyFrame::Full(Bytes::from(buf))
}

fn or_serverfault(xid: u32, frame: Result<ReplyFrame, io::Error>) -> ReplyFrame {
    frame.unwrap_or_else(|error| {
        warn!(xid, %error, "reply encoding failed");
        serverfault_frame(xid)
    })
}

/// Executes a decoded call against the back-end and serializes the reply.
pub async fn execute(vfs: Arc<dyn Vfs>, call: DecodedCall) -> ReplyFrame {
    let xid = call.xid;
    let frame = match call.action {
        CallAction::NfsNull | CallAction::MountNull => {
            vfs.null().await;
            full_frame(xid, |_| Ok(()))
        }
        CallAction::Unavailable(status) => Ok(ReplyFrame::Full(Bytes::from(envelope(xid, status)))),
        CallAction::Mount(path) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.mount(&path).await }).await;
            full_frame(xid, |buf| serializer::mount::mount_reply(buf, &res))
        }
        CallAction::Unmount(path) => {
            vfs.unmount(&path).await;
            full_frame(xid, |_| Ok(()))
        }
        CallAction::GetAttr(handle) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.get_attr(&handle).await }).await;
            full_frame(xid, |buf| replies::get_attr(buf, &res))
        }
        CallAction::SetAttr(args) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.set_attr(args).await }).await;
            full_frame(xid, |buf| replies::set_attr(buf, &res))
        }
        CallAction::Lookup(args) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.lookup(args).await }).await;
            full_frame(xid, |buf| replies::lookup(buf, &res))
        }
        CallAction::Access(args) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.access(args).await }).await;
            full_frame(xid, |buf| replies::access(buf, &res))
        }
        CallAction::ReadLink(handle) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.read_link(&handle).await }).await;
            full_frame(xid, |buf| replies::read_link(buf, &res))
        }
        CallAction::Read(args) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.read(args).await }).await;
            match res {
                NfsResult::Ok(ok) => {
                    let mut prefix = envelope(xid, AcceptedStatus::Success);
                    match replies::read_ok_prefix(&mut prefix, &ok) {
                        Ok(payload) => Ok(ReplyFrame::Split {
                            prefix: Bytes::from(prefix),
                            data: payload.data,
                            fill: payload.fill,
                        }),
                        Err(error) => Err(error),
                    }
                }
                fail => full_frame(xid, |buf| replies::read(buf, &fail)),
            }
        }
        CallAction::ReadDir(args) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.read_dir(args).await }).await;
            full_frame(xid, |buf| replies::read_dir(buf, &res))
        }
        CallAction::ReadDirPlus(args) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.read_dir_plus(args).await }).await;
            full_frame(xid, |buf| replies::read_dir_plus(buf, &res))
        }
        CallAction::FsStat(handle) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.fs_stat(&handle).await }).await;
            full_frame(xid, |buf| replies::fs_stat(buf, &res))
        }
        CallAction::FsInfo(handle) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.fs_info(&handle).await }).await;
            full_frame(xid, |buf| replies::fs_info(buf, &res))
        }
        CallAction::PathConf(handle) => {
            let vfs = Arc::clone(&vfs);
            let res = shielded(async move { vfs.path_conf(&handle).await }).await;
            full_frame(xid, |buf| replies::path_conf(buf, &res))
        }
    };
    or_serverfault(xid, frame)
}
