//! Client-side reply correlation.
//!
//! A pipelined client may have many calls in flight; replies carry only
//! the transaction id. When a call is written its xid is registered here
//! together with what the reply body will contain; when a reply envelope
//! arrives the xid is looked up and the expectation drives the body
//! decoder.

use std::collections::HashMap;
use std::io::Read;

use thiserror::Error;

use crate::nfs3::{mount_procedure, procedure, FileAttr, NfsResult, WccData};
use crate::nfs3::{MOUNT_PROGRAM, NFS_PROGRAM};
use crate::parser;
use crate::vfs::{
    AccessOk, FsInfoOk, FsStatOk, LookupOk, MountOk, PathConfOk, PostOpAttr, ReadDirOk,
    ReadDirPlusOk, ReadLinkOk, ReadOk,
};

/// The procedure a pending call expects a reply for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Expected {
    NfsNull,
    MountNull,
    Mount,
    Unmount,
    GetAttr,
    SetAttr,
    Lookup,
    Access,
    ReadLink,
    Read,
    ReadDir,
    ReadDirPlus,
    FsStat,
    FsInfo,
    PathConf,
}

impl Expected {
    pub fn program(&self) -> u32 {
        match self {
            Expected::MountNull | Expected::Mount | Expected::Unmount => MOUNT_PROGRAM,
            _ => NFS_PROGRAM,
        }
    }

    pub fn procedure(&self) -> u32 {
        match self {
            Expected::NfsNull => procedure::NULL,
            Expected::MountNull => mount_procedure::NULL,
            Expected::Mount => mount_procedure::MNT,
            Expected::Unmount => mount_procedure::UMNT,
            Expected::GetAttr => procedure::GETATTR,
            Expected::SetAttr => procedure::SETATTR,
            Expected::Lookup => procedure::LOOKUP,
            Expected::Access => procedure::ACCESS,
            Expected::ReadLink => procedure::READLINK,
            Expected::Read => procedure::READ,
            Expected::ReadDir => procedure::READDIR,
            Expected::ReadDirPlus => procedure::READDIRPLUS,
            Expected::FsStat => procedure::FSSTAT,
            Expected::FsInfo => procedure::FSINFO,
            Expected::PathConf => procedure::PATHCONF,
        }
    }

    /// Decodes the reply body this expectation announces.
    pub fn decode_body(&self, src: &mut impl Read) -> parser::Result<ProcedureReply> {
        use crate::parser::nfs3::replies;
        Ok(match self {
            Expected::NfsNull => ProcedureReply::NfsNull,
            Expected::MountNull => ProcedureReply::MountNull,
            Expected::Mount => ProcedureReply::Mount(parser::mount::mount_reply(src)?),
            Expected::Unmount => ProcedureReply::Unmount,
            Expected::GetAttr => ProcedureReply::GetAttr(replies::get_attr(src)?),
            Expected::SetAttr => ProcedureReply::SetAttr(replies::set_attr(src)?),
            Expected::Lookup => ProcedureReply::Lookup(replies::lookup(src)?),
            Expected::Access => ProcedureReply::Access(replies::access(src)?),
            Expected::ReadLink => ProcedureReply::ReadLink(replies::read_link(src)?),
            Expected::Read => ProcedureReply::Read(replies::read(src)?),
            Expected::ReadDir => ProcedureReply::ReadDir(replies::read_dir(src)?),
            Expected::ReadDirPlus => {
                ProcedureReply::ReadDirPlus(replies::read_dir_plus(src)?)
            }
            Expected::FsStat => ProcedureReply::FsStat(replies::fs_stat(src)?),
            Expected::FsInfo => ProcedureReply::FsInfo(replies::fs_info(src)?),
            Expected::PathConf => ProcedureReply::PathConf(replies::path_conf(src)?),
        })
    }
}

/// A fully decoded reply body, tagged by procedure.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureReply {
    NfsNull,
    MountNull,
    Mount(NfsResult<MountOk, ()>),
    Unmount,
    GetAttr(NfsResult<FileAttr, ()>),
    SetAttr(NfsResult<WccData, WccData>),
    Lookup(NfsResult<LookupOk, PostOpAttr>),
    Access(NfsResult<AccessOk, PostOpAttr>),
    ReadLink(NfsResult<ReadLinkOk, PostOpAttr>),
    Read(NfsResult<ReadOk, PostOpAttr>),
    ReadDir(NfsResult<ReadDirOk, PostOpAttr>),
    ReadDirPlus(NfsResult<ReadDirPlusOk, PostOpAttr>),
    FsStat(NfsResult<FsStatOk, PostOpAttr>),
    FsInfo(NfsResult<FsInfoOk, PostOpAttr>),
    PathConf(NfsResult<PathConfOk, PostOpAttr>),
}

#[derive(Debug, Error)]
pub enum Error {
    /// A reply arrived for an xid nobody registered.
    #[error("no outstanding call for xid {0:#010x}")]
    UnknownXid(u32),

    #[error(transparent)]
    Decode(#[from] parser::Error),
}

/// Lookup behavior once a reply matches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    /// Remove on match; a second reply for the same xid is unknown.
    #[default]
    OneShot,
    /// Keep the registration; duplicate replies decode again. Useful in
    /// tests and replay recovery.
    AllowDuplicates,
}

/// Outstanding-call table keyed by xid.
#[derive(Debug, Default)]
pub struct ReplyCorrelator {
    pending: HashMap<u32, Expected>,
    mode: Mode,
}

impl ReplyCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: Mode) -> Self {
        Self { pending: HashMap::new(), mode }
    }

    /// Records an in-flight call. Re-registering an xid replaces the
    /// previous expectation.
    pub fn register(&mut self, xid: u32, expected: Expected) {
        self.pending.insert(xid, expected);
    }

    /// Matches an arriving reply to its expectation.
    pub fn resolve(&mut self, xid: u32) -> Result<Expected, Error> {
        match self.mode {
            Mode::OneShot => self.pending.remove(&xid).ok_or(Error::UnknownXid(xid)),
            Mode::AllowDuplicates => {
                self.pending.get(&xid).copied().ok_or(Error::UnknownXid(xid))
            }
        }
    }

    /// Resolves `xid` and decodes the body in one step.
    pub fn decode_reply(
        &mut self,
        xid: u32,
        src: &mut impl Read,
    ) -> Result<ProcedureReply, Error> {
        let expected = self.resolve(xid)?;
        Ok(expected.decode_body(src)?)
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}
