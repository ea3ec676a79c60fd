//! MOUNT protocol encoding (RFC 1813 5.0).

use std::io::{self, Write};

use crate::nfs3::{NfsResult, Status};
use crate::rpc::AuthFlavor;
use crate::serializer::nfs3::{file_path, handle, status};
use crate::serializer::{u32, variant};
use crate::vfs::MountOk;

/// Writes MNT arguments: the export directory path.
pub fn mount_args(dest: &mut impl Write, dir_path: &str) -> io::Result<()> {
    file_path(dest, dir_path)
}

/// Writes UMNT arguments.
pub fn unmount_args(dest: &mut impl Write, dir_path: &str) -> io::Result<()> {
    file_path(dest, dir_path)
}

/// Writes a MNT reply body. The emitted flavor list is always a single
/// element: `AUTH_UNIX` when the back-end allows it, `AUTH_NONE` otherwise.
pub fn mount_reply(dest: &mut impl Write, res: &NfsResult<MountOk, ()>) -> io::Result<()> {
    match res {
        NfsResult::Ok(ok) => {
            status(dest, Status::Ok)?;
            handle(dest, &ok.handle)?;
            let flavor = if ok.auth_flavors.contains(&AuthFlavor::Unix) {
                AuthFlavor::Unix
            } else {
                AuthFlavor::None
            };
            u32(dest, 1)?;
            variant(dest, &flavor)
        }
        NfsResult::Fail(code, ()) => {
            debug_assert!(*code != Status::Ok, "fail arm must not carry Status::Ok");
            status(dest, *code)
        }
    }
}
