//! Per-procedure call-argument encoding (client leg).

use std::io::{self, Write};

use crate::nfs3::FileHandle;
use crate::serializer::nfs3::{cookie_verifier, file_name, handle, set_attr, time};
use crate::serializer::{option, u32, u64};
use crate::vfs::{AccessArgs, LookupArgs, ReadArgs, ReadDirArgs, ReadDirPlusArgs, SetAttrArgs};

/// GETATTR, READLINK, FSSTAT, FSINFO and PATHCONF all send a bare handle.
pub fn handle_only(dest: &mut impl Write, fh: &FileHandle) -> io::Result<()> {
    handle(dest, fh)
}

pub fn set_attr_args(dest: &mut impl Write, args: &SetAttrArgs) -> io::Result<()> {
    handle(dest, &args.handle)?;
    set_attr(dest, &args.new_attr)?;
    option(dest, args.guard.as_ref(), |d, t| time(d, t))
}

pub fn lookup(dest: &mut impl Write, args: &LookupArgs) -> io::Result<()> {
    handle(dest, &args.dir)?;
    file_name(dest, &args.name)
}

pub fn access(dest: &mut impl Write, args: &AccessArgs) -> io::Result<()> {
    handle(dest, &args.handle)?;
    u32(dest, args.access.bits())
}

pub fn read(dest: &mut impl Write, args: &ReadArgs) -> io::Result<()> {
    handle(dest, &args.handle)?;
    u64(dest, args.offset)?;
    u32(dest, args.count)
}

pub fn read_dir(dest: &mut impl Write, args: &ReadDirArgs) -> io::Result<()> {
    handle(dest, &args.dir)?;
    u64(dest, args.cookie)?;
    cookie_verifier(dest, &args.verifier)?;
    u32(dest, args.max_count)
}

pub fn read_dir_plus(dest: &mut impl Write, args: &ReadDirPlusArgs) -> io::Result<()> {
    handle(dest, &args.dir)?;
    u64(dest, args.cookie)?;
    cookie_verifier(dest, &args.verifier)?;
    u32(dest, args.dir_count)?;
    u32(dest, args.max_count)
}
