//! Virtual file system seam for NFSv3 (RFC 1813).
//!
//! The dispatcher decodes a call, invokes exactly one method here and
//! serializes whatever comes back. Implementations never touch the wire;
//! their only side effects are against their own state. Methods may
//! complete on any task - the connection glue hops results back onto the
//! connection's writer.

use async_trait::async_trait;
use bytes::Bytes;

use crate::nfs3::{
    Access, CookieVerifier, FileAttr, FileHandle, FileTime, FsProperties, NfsResult, SetAttr,
    SetAttrGuard, Status, WccData,
};
use crate::rpc::AuthFlavor;

/// Post-operation attributes: the common "resfail" body.
pub type PostOpAttr = Option<FileAttr>;

/// Successful MOUNT reply body (RFC 1813 5.2.1).
#[derive(Debug, Clone, PartialEq)]
pub struct MountOk {
    pub handle: FileHandle,
    /// Flavors the server will accept on this export. The wire encoder
    /// only ever emits `[Unix]` or `[None]`.
    pub auth_flavors: Vec<AuthFlavor>,
}

/// SETATTR arguments: target, requested changes, optional ctime guard.
#[derive(Debug, Clone, PartialEq)]
pub struct SetAttrArgs {
    pub handle: FileHandle,
    pub new_attr: SetAttr,
    pub guard: SetAttrGuard,
}

/// LOOKUP arguments (`diropargs3`).
#[derive(Debug, Clone, PartialEq)]
pub struct LookupArgs {
    pub dir: FileHandle,
    pub name: String,
}

/// Successful LOOKUP reply body.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupOk {
    pub handle: FileHandle,
    pub attr: PostOpAttr,
    pub dir_attr: PostOpAttr,
}

/// ACCESS arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessArgs {
    pub handle: FileHandle,
    pub access: Access,
}

/// Successful ACCESS reply body.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessOk {
    pub attr: PostOpAttr,
    pub access: Access,
}

/// Successful READLINK reply body.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadLinkOk {
    pub attr: PostOpAttr,
    pub target: String,
}

/// READ arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadArgs {
    pub handle: FileHandle,
    pub offset: u64,
    pub count: u32,
}

/// Successful READ reply body. `data` stays in its own buffer so the
/// serializer can emit it without copying through the reply staging area.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOk {
    pub attr: PostOpAttr,
    pub count: u32,
    pub eof: bool,
    pub data: Bytes,
}

/// READDIR arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadDirArgs {
    pub dir: FileHandle,
    pub cookie: u64,
    pub verifier: CookieVerifier,
    pub max_count: u32,
}

/// One READDIR entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub fileid: u64,
    pub name: String,
    pub cookie: u64,
}

/// Successful READDIR reply body.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadDirOk {
    pub dir_attr: PostOpAttr,
    pub verifier: CookieVerifier,
    pub entries: Vec<DirEntry>,
    pub eof: bool,
}

/// READDIRPLUS arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadDirPlusArgs {
    pub dir: FileHandle,
    pub cookie: u64,
    pub verifier: CookieVerifier,
    pub dir_count: u32,
    pub max_count: u32,
}

/// One READDIRPLUS entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DirPlusEntry {
    pub fileid: u64,
    pub name: String,
    pub cookie: u64,
    pub attr: PostOpAttr,
    pub handle: Option<FileHandle>,
}

/// Successful READDIRPLUS reply body.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadDirPlusOk {
    pub dir_attr: PostOpAttr,
    pub verifier: CookieVerifier,
    pub entries: Vec<DirPlusEntry>,
    pub eof: bool,
}

/// Successful FSSTAT reply body.
#[derive(Debug, Clone, PartialEq)]
pub struct FsStatOk {
    pub attr: PostOpAttr,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
    pub total_files: u64,
    pub free_files: u64,
    pub available_files: u64,
    pub invarsec: u32,
}

/// Successful FSINFO reply body.
#[derive(Debug, Clone, PartialEq)]
pub struct FsInfoOk {
    pub attr: PostOpAttr,
    pub read_max: u32,
    pub read_pref: u32,
    pub read_mult: u32,
    pub write_max: u32,
    pub write_pref: u32,
    pub write_mult: u32,
    pub dir_pref: u32,
    pub max_file_size: u64,
    pub time_delta: FileTime,
    pub properties: FsProperties,
}

/// Successful PATHCONF reply body.
#[derive(Debug, Clone, PartialEq)]
pub struct PathConfOk {
    pub attr: PostOpAttr,
    pub link_max: u32,
    pub name_max: u32,
    pub no_trunc: bool,
    pub chown_restricted: bool,
    pub case_insensitive: bool,
    pub case_preserving: bool,
}

/// NFSv3 back-end: one method per procedure the server dispatches.
///
/// The server trusts the client-supplied identity; no uid/gid checks
/// happen at this seam.
#[async_trait]
pub trait Vfs: Send + Sync {
    /// Procedure 0 (NFS and MOUNT): ping.
    async fn null(&self) {}

    /// MOUNT procedure 1: resolve an export path to its root handle.
    async fn mount(&self, dir_path: &str) -> NfsResult<MountOk, ()>;

    /// MOUNT procedure 3: forget a mount. The reply is empty either way.
    async fn unmount(&self, dir_path: &str);

    /// Procedure 1: GETATTR.
    async fn get_attr(&self, handle: &FileHandle) -> NfsResult<FileAttr, ()>;

    /// Procedure 2: SETATTR. Read-only back-ends typically answer
    /// [`Status::RoFs`].
    async fn set_attr(&self, args: SetAttrArgs) -> NfsResult<WccData, WccData> {
        let _ = args;
        NfsResult::Fail(Status::RoFs, WccData::default())
    }

    /// Procedure 3: LOOKUP. Does not follow symbolic links.
    async fn lookup(&self, args: LookupArgs) -> NfsResult<LookupOk, PostOpAttr>;

    /// Procedure 4: ACCESS.
    async fn access(&self, args: AccessArgs) -> NfsResult<AccessOk, PostOpAttr>;

    /// Procedure 5: READLINK.
    async fn read_link(&self, handle: &FileHandle) -> NfsResult<ReadLinkOk, PostOpAttr>;

    /// Procedure 6: READ.
    async fn read(&self, args: ReadArgs) -> NfsResult<ReadOk, PostOpAttr>;

    /// Procedure 16: READDIR. Defaults to READDIRPLUS with the directory
    /// budget pinned to `max_count`, dropping the attribute and handle
    /// fields from each entry.
    async fn read_dir(&self, args: ReadDirArgs) -> NfsResult<ReadDirOk, PostOpAttr> {
        let plus = self
            .read_dir_plus(ReadDirPlusArgs {
                dir: args.dir,
                cookie: args.cookie,
                verifier: args.verifier,
                dir_count: args.max_count,
                max_count: args.max_count,
            })
            .await;
        match plus {
            NfsResult::Ok(ok) => NfsResult::Ok(ReadDirOk {
                dir_attr: ok.dir_attr,
                verifier: ok.verifier,
                entries: ok
                    .entries
                    .into_iter()
                    .map(|entry| DirEntry {
                        fileid: entry.fileid,
                        name: entry.name,
                        cookie: entry.cookie,
                    })
                    .collect(),
                eof: ok.eof,
            }),
            NfsResult::Fail(status, attr) => NfsResult::Fail(status, attr),
        }
    }

    /// Procedure 17: READDIRPLUS.
    async fn read_dir_plus(&self, args: ReadDirPlusArgs)
        -> NfsResult<ReadDirPlusOk, PostOpAttr>;

    /// Procedure 18: FSSTAT.
    async fn fs_stat(&self, handle: &FileHandle) -> NfsResult<FsStatOk, PostOpAttr>;

    /// Procedure 19: FSINFO.
    async fn fs_info(&self, handle: &FileHandle) -> NfsResult<FsInfoOk, PostOpAttr>;

    /// Procedure 20: PATHCONF.
    async fn path_conf(&self, handle: &FileHandle) -> NfsResult<PathConfOk, PostOpAttr>;
}
