//! MOUNT protocol decoding (RFC 1813 5.0).

use std::io::Read;

use crate::nfs3::{NfsResult, Status};
use crate::parser::nfs3::{file_path, handle, status};
use crate::parser::primitive::{list, variant};
use crate::parser::{Error, Result};
use crate::rpc::AuthFlavor;
use crate::vfs::MountOk;

/// Reads MNT arguments: the export directory path.
pub fn mount_args(src: &mut impl Read) -> Result<String> {
    file_path(src)
}

/// Reads UMNT arguments: the directory path being released.
pub fn unmount_args(src: &mut impl Read) -> Result<String> {
    file_path(src)
}

/// Reads a MNT reply body (client leg): status, then the root handle and
/// the counted list of acceptable auth flavors.
pub fn mount_reply(src: &mut impl Read) -> Result<NfsResult<MountOk, ()>> {
    match status(src)? {
        Status::Ok => Ok(NfsResult::Ok(MountOk {
            handle: handle(src)?,
            auth_flavors: list(src, |s| variant::<AuthFlavor>(s, Error::InvalidAuthFlavor))?,
        })),
        other => Ok(NfsResult::Fail(other, ())),
    }
}
