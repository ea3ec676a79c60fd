//! Per-procedure reply-body decoding (client leg).
//!
//! Each function consumes the status discriminant and then the matching
//! "resok" or "resfail" arm, mirroring what the server-side writers in
//! [`crate::serializer::nfs3`] produce.

use std::io::Read;

use bytes::Bytes;

use crate::nfs3::{Access, FileAttr, FsProperties, NfsResult, Status, WccData};
use crate::parser::nfs3::{
    attr, cookie_verifier, entry_list, file_name, file_path, handle, post_op_attr,
    post_op_handle, status, time, wcc_data,
};
use crate::parser::primitive::{bool, opaque, u32, u64};
use crate::parser::Result;
use crate::vfs::{
    AccessOk, DirEntry, DirPlusEntry, FsInfoOk, FsStatOk, LookupOk, PathConfOk, PostOpAttr,
    ReadDirOk, ReadDirPlusOk, ReadLinkOk, ReadOk,
};

fn result<O, F, S: Read>(
    src: &mut S,
    ok: impl FnOnce(&mut S) -> Result<O>,
    fail: impl FnOnce(&mut S) -> Result<F>,
) -> Result<NfsResult<O, F>> {
    match status(src)? {
        Status::Ok => Ok(NfsResult::Ok(ok(src)?)),
        other => Ok(NfsResult::Fail(other, fail(src)?)),
    }
}

pub fn get_attr(src: &mut impl Read) -> Result<NfsResult<FileAttr, ()>> {
    result(src, attr, |_| Ok(()))
}

pub fn set_attr(src: &mut impl Read) -> Result<NfsResult<WccData, WccData>> {
    result(src, wcc_data, wcc_data)
}

pub fn lookup(src: &mut impl Read) -> Result<NfsResult<LookupOk, PostOpAttr>> {
    result(
        src,
        |s| {
            Ok(LookupOk { handle: handle(s)?, attr: post_op_attr(s)?, dir_attr: post_op_attr(s)? })
        },
        post_op_attr,
    )
}

pub fn access(src: &mut impl Read) -> Result<NfsResult<AccessOk, PostOpAttr>> {
    result(
        src,
        |s| Ok(AccessOk { attr: post_op_attr(s)?, access: Access::from_bits(u32(s)?) }),
        post_op_attr,
    )
}

pub fn read_link(src: &mut impl Read) -> Result<NfsResult<ReadLinkOk, PostOpAttr>> {
    result(
        src,
        |s| Ok(ReadLinkOk { attr: post_op_attr(s)?, target: file_path(s)? }),
        post_op_attr,
    )
}

pub fn read(src: &mut impl Read) -> Result<NfsResult<ReadOk, PostOpAttr>> {
    result(
        src,
        |s| {
            Ok(ReadOk {
                attr: post_op_attr(s)?,
                count: u32(s)?,
                eof: bool(s)?,
                data: Bytes::from(opaque(s)?),
            })
        },
        post_op_attr,
    )
}

fn dir_entry(src: &mut impl Read) -> Result<DirEntry> {
    Ok(DirEntry { fileid: u64(src)?, name: file_name(src)?, cookie: u64(src)? })
}

pub fn read_dir(src: &mut impl Read) -> Result<NfsResult<ReadDirOk, PostOpAttr>> {
    result(
        src,
        |s| {
            Ok(ReadDirOk {
                dir_attr: post_op_attr(s)?,
                verifier: cookie_verifier(s)?,
                entries: entry_list(s, dir_entry)?,
                eof: bool(s)?,
            })
        },
        post_op_attr,
    )
}

fn dir_plus_entry(src: &mut impl Read) -> Result<DirPlusEntry> {
    Ok(DirPlusEntry {
        fileid: u64(src)?,
        name: file_name(src)?,
        cookie: u64(src)?,
        attr: post_op_attr(src)?,
        handle: post_op_handle(src)?,
    })
}

pub fn read_dir_plus(src: &mut impl Read) -> Result<NfsResult<ReadDirPlusOk, PostOpAttr>> {
    result(
        src,
        |s| {
            Ok(ReadDirPlusOk {
                dir_attr: post_op_attr(s)?,
                verifier: cookie_verifier(s)?,
                entries: entry_list(s, dir_plus_entry)?,
                eof: bool(s)?,
            })
        },
        post_op_attr,
    )
}

pub fn fs_stat(src: &mut impl Read) -> Result<NfsResult<FsStatOk, PostOpAttr>> {
    result(
        src,
        |s| {
            Ok(FsStatOk {
                attr: post_op_attr(s)?,
                total_bytes: u64(s)?,
                free_bytes: u64(s)?,
                available_bytes: u64(s)?,
                total_files: u64(s)?,
                free_files: u64(s)?,
                available_files: u64(s)?,
                invarsec: u32(s)?,
            })
        },
        post_op_attr,
    )
}

pub fn fs_info(src: &mut impl Read) -> Result<NfsResult<FsInfoOk, PostOpAttr>> {
    result(
        src,
        |s| {
            Ok(FsInfoOk {
                attr: post_op_attr(s)?,
                read_max: u32(s)?,
                read_pref: u32(s)?,
                read_mult: u32(s)?,
                write_max: u32(s)?,
                write_pref: u32(s)?,
                write_mult: u32(s)?,
                dir_pref: u32(s)?,
                max_file_size: u64(s)?,
                time_delta: time(s)?,
                properties: FsProperties::from_bits(u32(s)?),
            })
        },
        post_op_attr,
    )
}

pub fn path_conf(src: &mut impl Read) -> Result<NfsResult<PathConfOk, PostOpAttr>> {
    result(
        src,
        |s| {
            Ok(PathConfOk {
                attr: post_op_attr(s)?,
                link_max: u32(s)?,
                name_max: u32(s)?,
                no_trunc: bool(s)?,
                chown_restricted: bool(s)?,
                case_insensitive: bool(s)?,
                case_preserving: bool(s)?,
            })
        },
        post_op_attr,
    )
}
