//! Per-procedure reply-body encoding (server leg).

use std::io::{self, Write};

use bytes::Bytes;

use crate::nfs3::{FileAttr, NfsResult, Status, WccData};
use crate::serializer::nfs3::{
    attr, cookie_verifier, entry_list, file_name, file_path, handle, post_op_attr,
    post_op_handle, status, time, wcc_data,
};
use crate::serializer::{bool, u32, u64, usize_as_u32, ALIGNMENT, PAD};
use crate::vfs::{
    AccessOk, DirEntry, DirPlusEntry, FsInfoOk, FsStatOk, LookupOk, PathConfOk, PostOpAttr,
    ReadDirOk, ReadDirPlusOk, ReadLinkOk, ReadOk,
};

fn result<O, F, S: Write>(
    dest: &mut S,
    res: &NfsResult<O, F>,
    ok: impl FnOnce(&mut S, &O) -> io::Result<()>,
    fail: impl FnOnce(&mut S, &F) -> io::Result<()>,
) -> io::Result<()> {
    match res {
        NfsResult::Ok(body) => {
            status(dest, Status::Ok)?;
            ok(dest, body)
        }
        NfsResult::Fail(code, body) => {
            debug_assert!(*code != Status::Ok, "fail arm must not carry Status::Ok");
            status(dest, *code)?;
            fail(dest, body)
        }
    }
}

pub fn get_attr(dest: &mut impl Write, res: &NfsResult<FileAttr, ()>) -> io::Result<()> {
    result(dest, res, |d, a| attr(d, a), |_, ()| Ok(()))
}

pub fn set_attr(dest: &mut impl Write, res: &NfsResult<WccData, WccData>) -> io::Result<()> {
    result(dest, res, |d, w| wcc_data(d, w), |d, w| wcc_data(d, w))
}

pub fn lookup(dest: &mut impl Write, res: &NfsResult<LookupOk, PostOpAttr>) -> io::Result<()> {
    result(
        dest,
        res,
        |d, ok| {
            handle(d, &ok.handle)?;
            post_op_attr(d, &ok.attr)?;
            post_op_attr(d, &ok.dir_attr)
        },
        |d, a| post_op_attr(d, a),
    )
}

pub fn access(dest: &mut impl Write, res: &NfsResult<AccessOk, PostOpAttr>) -> io::Result<()> {
    result(
        dest,
        res,
        |d, ok| {
            post_op_attr(d, &ok.attr)?;
            u32(d, ok.access.bits())
        },
        |d, a| post_op_attr(d, a),
    )
}

pub fn read_link(
    dest: &mut impl Write,
    res: &NfsResult<ReadLinkOk, PostOpAttr>,
) -> io::Result<()> {
    result(
        dest,
        res,
        |d, ok| {
            post_op_attr(d, &ok.attr)?;
            file_path(d, &ok.target)
        },
        |d, a| post_op_attr(d, a),
    )
}

/// Descriptor for the bytes that follow a READ reply prefix: the file
/// data itself plus 0..3 alignment filler bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPayload {
    pub data: Bytes,
    pub fill: usize,
}

impl ReadPayload {
    fn for_data(data: &Bytes) -> Self {
        let fill = (ALIGNMENT - data.len() % ALIGNMENT) % ALIGNMENT;
        Self { data: data.clone(), fill }
    }

    /// Total bytes this payload adds to the record.
    pub fn wire_len(&self) -> usize {
        self.data.len() + self.fill
    }
}

/// Writes everything of a successful READ reply except the file bytes:
/// status, attributes, count, eof and the opaque length. Returns the
/// payload descriptor so the transport can emit the data without staging
/// it through the reply buffer.
pub fn read_ok_prefix(dest: &mut impl Write, ok: &ReadOk) -> io::Result<ReadPayload> {
    status(dest, Status::Ok)?;
    post_op_attr(dest, &ok.attr)?;
    u32(dest, ok.count)?;
    bool(dest, ok.eof)?;
    usize_as_u32(dest, ok.data.len())?;
    Ok(ReadPayload::for_data(&ok.data))
}

/// Writes a complete READ reply, staging the payload through `dest`.
pub fn read(dest: &mut impl Write, res: &NfsResult<ReadOk, PostOpAttr>) -> io::Result<()> {
    match res {
        NfsResult::Ok(ok) => {
            let payload = read_ok_prefix(dest, ok)?;
            dest.write_all(&payload.data)?;
            let fill = [PAD; ALIGNMENT];
            dest.write_all(&fill[..payload.fill])
        }
        NfsResult::Fail(code, attr) => {
            debug_assert!(*code != Status::Ok, "fail arm must not carry Status::Ok");
            status(dest, *code)?;
            post_op_attr(dest, attr)
        }
    }
}

fn dir_entry(dest: &mut impl Write, entry: &DirEntry) -> io::Result<()> {
    u64(dest, entry.fileid)?;
    file_name(dest, &entry.name)?;
    u64(dest, entry.cookie)
}

pub fn read_dir(
    dest: &mut impl Write,
    res: &NfsResult<ReadDirOk, PostOpAttr>,
) -> io::Result<()> {
    result(
        dest,
        res,
        |d, ok| {
            post_op_attr(d, &ok.dir_attr)?;
            cookie_verifier(d, &ok.verifier)?;
            entry_list(d, &ok.entries, dir_entry)?;
            bool(d, ok.eof)
        },
        |d, a| post_op_attr(d, a),
    )
}

fn dir_plus_entry(dest: &mut impl Write, entry: &DirPlusEntry) -> io::Result<()> {
    u64(dest, entry.fileid)?;
    file_name(dest, &entry.name)?;
    u64(dest, entry.cookie)?;
    post_op_attr(dest, &entry.attr)?;
    post_op_handle(dest, &entry.handle)
}

pub fn read_dir_plus(
    dest: &mut impl Write,
    res: &NfsResult<ReadDirPlusOk, PostOpAttr>,
) -> io::Result<()> {
    result(
        dest,
        res,
        |d, ok| {
            post_op_attr(d, &ok.dir_attr)?;
            cookie_verifier(d, &ok.verifier)?;
            entry_list(d, &ok.entries, dir_plus_entry)?;
            bool(d, ok.eof)
        },
        |d, a| post_op_attr(d, a),
    )
}

pub fn fs_stat(dest: &mut impl Write, res: &NfsResult<FsStatOk, PostOpAttr>) -> io::Result<()> {
    result(
        dest,
        res,
        |d, ok| {
            post_op_attr(d, &ok.attr)?;
            u64(d, ok.total_bytes)?;
            u64(d, ok.free_bytes)?;
            u64(d, ok.available_bytes)?;
            u64(d, ok.total_files)?;
            u64(d, ok.free_files)?;
            u64(d, ok.available_files)?;
            u32(d, ok.invarsec)
        },
        |d, a| post_op_attr(d, a),
    )
}

pub fn fs_info(dest: &mut impl Write, res: &NfsResult<FsInfoOk, PostOpAttr>) -> io::Result<()> {
    result(
        dest,
        res,
        |d, ok| {
            post_op_attr(d, &ok.attr)?;
            u32(d, ok.read_max)?;
            u32(d, ok.read_pref)?;
            u32(d, ok.read_mult)?;
            u32(d, ok.write_max)?;
            u32(d, ok.write_pref)?;
            u32(d, ok.write_mult)?;
            u32(d, ok.dir_pref)?;
            u64(d, ok.max_file_size)?;
            time(d, &ok.time_delta)?;
            u32(d, ok.properties.bits())
        },
        |d, a| post_op_attr(d, a),
    )
}

pub fn path_conf(
    dest: &mut impl Write,
    res: &NfsResult<PathConfOk, PostOpAttr>,
) -> io::Result<()> {
    result(
        dest,
        res,
        |d, ok| {
            post_op_attr(d, &ok.attr)?;
            u32(d, ok.link_max)?;
            u32(d, ok.name_max)?;
            bool(d, ok.no_trunc)?;
            bool(d, ok.chown_restricted)?;
            bool(d, ok.case_insensitive)?;
            bool(d, ok.case_preserving)
        },
        |d, a| post_op_attr(d, a),
    )
}
