//! NFSv3 wire-value decoding shared by call and reply bodies.

pub mod calls;
pub mod replies;

use std::io::Read;

use crate::nfs3::{
    CookieVerifier, Device, FileAttr, FileHandle, FileTime, FileType, SetAttr, SetTime, Status,
    WccAttr, WccData, COOKIE_VERIFIER_SIZE, HANDLE_SIZE, MAX_NAME_LEN, MAX_PATH_LEN,
};
use crate::parser::primitive::{array, bool, option, string_max, u32, u64, variant};
use crate::parser::{Error, Result};

/// Reads an `nfs_fh3`. Only the canonical [`HANDLE_SIZE`]-byte handles this
/// server mints are accepted; any other length is rejected.
pub fn handle(src: &mut impl Read) -> Result<FileHandle> {
    let length = u32(src)? as usize;
    if length != HANDLE_SIZE {
        return Err(Error::InvalidFileHandle(length));
    }
    let bytes = array::<HANDLE_SIZE>(src)?;
    Ok(FileHandle::from_id(u64::from_be_bytes(bytes)))
}

/// Reads an `ftype3` discriminant.
pub fn file_type(src: &mut impl Read) -> Result<FileType> {
    variant(src, Error::InvalidFileType)
}

/// Reads an `nfsstat3` value.
pub fn status(src: &mut impl Read) -> Result<Status> {
    variant(src, Error::InvalidStatus)
}

/// Reads an `nfstime3`.
pub fn time(src: &mut impl Read) -> Result<FileTime> {
    Ok(FileTime { seconds: u32(src)?, nanos: u32(src)? })
}

/// Reads a `specdata3`.
pub fn device(src: &mut impl Read) -> Result<Device> {
    Ok(Device { major: u32(src)?, minor: u32(src)? })
}

/// Reads a full `fattr3`.
pub fn attr(src: &mut impl Read) -> Result<FileAttr> {
    Ok(FileAttr {
        file_type: file_type(src)?,
        mode: u32(src)?,
        nlink: u32(src)?,
        uid: u32(src)?,
        gid: u32(src)?,
        size: u64(src)?,
        used: u64(src)?,
        device: device(src)?,
        fsid: u64(src)?,
        fileid: u64(src)?,
        atime: time(src)?,
        mtime: time(src)?,
        ctime: time(src)?,
    })
}

/// Reads a `post_op_attr`.
pub fn post_op_attr(src: &mut impl Read) -> Result<Option<FileAttr>> {
    option(src, attr)
}

/// Reads a `post_op_fh3`.
pub fn post_op_handle(src: &mut impl Read) -> Result<Option<FileHandle>> {
    option(src, handle)
}

/// Reads a `wcc_attr` digest.
pub fn wcc_attr(src: &mut impl Read) -> Result<WccAttr> {
    Ok(WccAttr { size: u64(src)?, mtime: time(src)?, ctime: time(src)? })
}

/// Reads a full `wcc_data` pair.
pub fn wcc_data(src: &mut impl Read) -> Result<WccData> {
    Ok(WccData { before: option(src, wcc_attr)?, after: post_op_attr(src)? })
}

/// Reads a `set_atime`/`set_mtime` union.
pub fn set_time(src: &mut impl Read) -> Result<SetTime> {
    Ok(match u32(src)? {
        0 => SetTime::DontChange,
        1 => SetTime::ServerTime,
        2 => SetTime::ClientTime(time(src)?),
        other => return Err(Error::InvalidSetTime(other)),
    })
}

/// Reads a full `sattr3`.
pub fn set_attr(src: &mut impl Read) -> Result<SetAttr> {
    Ok(SetAttr {
        mode: option(src, u32)?,
        uid: option(src, u32)?,
        gid: option(src, u32)?,
        size: option(src, u64)?,
        atime: set_time(src)?,
        mtime: set_time(src)?,
    })
}

/// Reads a `cookieverf3`.
pub fn cookie_verifier(src: &mut impl Read) -> Result<CookieVerifier> {
    Ok(CookieVerifier(array::<COOKIE_VERIFIER_SIZE>(src)?))
}

/// Reads a `filename3` bounded by [`MAX_NAME_LEN`].
pub fn file_name(src: &mut impl Read) -> Result<String> {
    string_max(src, MAX_NAME_LEN)
}

/// Reads an `nfspath3` bounded by [`MAX_PATH_LEN`].
pub fn file_path(src: &mut impl Read) -> Result<String> {
    string_max(src, MAX_PATH_LEN)
}

/// Reads the XDR linked-list encoding used by READDIR entry lists:
/// `{1, entry}` pairs terminated by a lone `0`.
pub fn entry_list<T, S: Read>(
    src: &mut S,
    mut entry: impl FnMut(&mut S) -> Result<T>,
) -> Result<Vec<T>> {
    let mut entries = Vec::new();
    while bool(src)? {
        entries.push(entry(src)?);
    }
    Ok(entries)
}
