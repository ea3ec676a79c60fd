//! Per-procedure call-argument decoding (server leg).

use std::io::Read;

use crate::nfs3::{Access, FileHandle};
use crate::parser::nfs3::{cookie_verifier, file_name, handle, set_attr, time};
use crate::parser::primitive::{option, u32, u64};
use crate::parser::Result;
use crate::vfs::{
    AccessArgs, LookupArgs, ReadArgs, ReadDirArgs, ReadDirPlusArgs, SetAttrArgs,
};

/// GETATTR, READLINK, FSSTAT, FSINFO and PATHCONF all take a bare handle.
pub fn handle_only(src: &mut impl Read) -> Result<FileHandle> {
    handle(src)
}

pub fn set_attr_args(src: &mut impl Read) -> Result<SetAttrArgs> {
    Ok(SetAttrArgs { handle: handle(src)?, new_attr: set_attr(src)?, guard: option(src, time)? })
}

pub fn lookup(src: &mut impl Read) -> Result<LookupArgs> {
    Ok(LookupArgs { dir: handle(src)?, name: file_name(src)? })
}

pub fn access(src: &mut impl Read) -> Result<AccessArgs> {
    Ok(AccessArgs { handle: handle(src)?, access: Access::from_bits(u32(src)?) })
}

pub fn read(src: &mut impl Read) -> Result<ReadArgs> {
    Ok(ReadArgs { handle: handle(src)?, offset: u64(src)?, count: u32(src)? })
}

pub fn read_dir(src: &mut impl Read) -> Result<ReadDirArgs> {
    Ok(ReadDirArgs {
        dir: handle(src)?,
        cookie: u64(src)?,
        verifier: cookie_verifier(src)?,
        max_count: u32(src)?,
    })
}

pub fn read_dir_plus(src: &mut impl Read) -> Result<ReadDirPlusArgs> {
    Ok(ReadDirPlusArgs {
        dir: handle(src)?,
        cookie: u64(src)?,
        verifier: cookie_verifier(src)?,
        dir_count: u32(src)?,
        max_count: u32(src)?,
    })
}
