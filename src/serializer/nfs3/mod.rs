//! NFSv3 wire-value encoding shared by call and reply bodies.

pub mod calls;
pub mod replies;

use std::io::{self, Write};

use crate::nfs3::{
    CookieVerifier, Device, FileAttr, FileHandle, FileTime, SetAttr, SetTime, Status, WccAttr,
    WccData, MAX_FILE_HANDLE_LEN, MAX_NAME_LEN, MAX_PATH_LEN,
};
use crate::serializer::{bool, opaque_max, option, string_max, u32, u64, variant};

/// Writes an `nfs_fh3` as a counted opaque of the handle's actual width.
pub fn handle(dest: &mut impl Write, handle: &FileHandle) -> io::Result<()> {
    opaque_max(dest, handle.as_bytes(), MAX_FILE_HANDLE_LEN)
}

/// Writes an `nfsstat3`.
pub fn status(dest: &mut impl Write, status: Status) -> io::Result<()> {
    variant(dest, &status)
}

/// Writes an `nfstime3`.
pub fn time(dest: &mut impl Write, time: &FileTime) -> io::Result<()> {
    u32(dest, time.seconds)?;
    u32(dest, time.nanos)
}

/// Writes a `specdata3`.
pub fn device(dest: &mut impl Write, device: &Device) -> io::Result<()> {
    u32(dest, device.major)?;
    u32(dest, device.minor)
}

/// Writes a full `fattr3`.
pub fn attr(dest: &mut impl Write, attr: &FileAttr) -> io::Result<()> {
    variant(dest, &attr.file_type)?;
    u32(dest, attr.mode)?;
    u32(dest, attr.nlink)?;
    u32(dest, attr.uid)?;
    u32(dest, attr.gid)?;
    u64(dest, attr.size)?;
    u64(dest, attr.used)?;
    device(dest, &attr.device)?;
    u64(dest, attr.fsid)?;
    u64(dest, attr.fileid)?;
    time(dest, &attr.atime)?;
    time(dest, &attr.mtime)?;
    time(dest, &attr.ctime)
}

/// Writes a `post_op_attr`.
pub fn post_op_attr(dest: &mut impl Write, opt: &Option<FileAttr>) -> io::Result<()> {
    option(dest, opt.as_ref(), |d, a| attr(d, a))
}

/// Writes a `post_op_fh3`.
pub fn post_op_handle(dest: &mut impl Write, opt: &Option<FileHandle>) -> io::Result<()> {
    option(dest, opt.as_ref(), |d, h| handle(d, h))
}

/// Writes a `wcc_attr` digest.
pub fn wcc_attr(dest: &mut impl Write, digest: &WccAttr) -> io::Result<()> {
    u64(dest, digest.size)?;
    time(dest, &digest.mtime)?;
    time(dest, &digest.ctime)
}

/// Writes a full `wcc_data` pair.
pub fn wcc_data(dest: &mut impl Write, wcc: &WccData) -> io::Result<()> {
    option(dest, wcc.before.as_ref(), |d, b| wcc_attr(d, b))?;
    post_op_attr(dest, &wcc.after)
}

/// Writes a `set_atime`/`set_mtime` union.
pub fn set_time(dest: &mut impl Write, st: &SetTime) -> io::Result<()> {
    match st {
        SetTime::DontChange => u32(dest, 0),
        SetTime::ServerTime => u32(dest, 1),
        SetTime::ClientTime(t) => {
            u32(dest, 2)?;
            time(dest, t)
        }
    }
}

/// Writes a full `sattr3`.
pub fn set_attr(dest: &mut impl Write, sattr: &SetAttr) -> io::Result<()> {
    option(dest, sattr.mode.as_ref(), |d, v| u32(d, *v))?;
    option(dest, sattr.uid.as_ref(), |d, v| u32(d, *v))?;
    option(dest, sattr.gid.as_ref(), |d, v| u32(d, *v))?;
    option(dest, sattr.size.as_ref(), |d, v| u64(d, *v))?;
    set_time(dest, &sattr.atime)?;
    set_time(dest, &sattr.mtime)
}

/// Writes a `cookieverf3`.
pub fn cookie_verifier(dest: &mut impl Write, verifier: &CookieVerifier) -> io::Result<()> {
    dest.write_all(&verifier.0)
}

/// Writes a `filename3` bounded by [`MAX_NAME_LEN`].
pub fn file_name(dest: &mut impl Write, name: &str) -> io::Result<()> {
    string_max(dest, name, MAX_NAME_LEN)
}

/// Writes an `nfspath3` bounded by [`MAX_PATH_LEN`].
pub fn file_path(dest: &mut impl Write, path: &str) -> io::Result<()> {
    string_max(dest, path, MAX_PATH_LEN)
}

/// Writes the XDR linked-list encoding used by READDIR entry lists.
pub fn entry_list<T, S: Write>(
    dest: &mut S,
    entries: &[T],
    mut entry: impl FnMut(&mut S, &T) -> io::Result<()>,
) -> io::Result<()> {
    for item in entries {
        bool(dest, true)?;
        entry(dest, item)?;
    }
    bool(dest, false)
}
