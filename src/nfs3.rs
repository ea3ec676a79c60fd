//! NFS version 3 value model (RFC 1813).
//!
//! Plain data carried between the wire codecs and the [`crate::vfs::Vfs`]
//! back-end. All types use idiomatic Rust naming instead of the original
//! C/XDR definitions from the RFC; the `parser` and `serializer` modules
//! own the mapping to the wire.

use num_derive::{FromPrimitive, ToPrimitive};
use std::ops::{BitOr, BitOrAssign};

/// Program number of the NFS version 3 service (RFC 1813 1.0).
pub const NFS_PROGRAM: u32 = 100003;
/// Protocol version implemented by this crate.
pub const NFS_VERSION: u32 = 3;
/// Program number of the MOUNT service (RFC 1813 5.0).
pub const MOUNT_PROGRAM: u32 = 100005;
/// MOUNT protocol version implemented by this crate.
pub const MOUNT_VERSION: u32 = 3;

/// Maximum bytes an `nfs_fh3` may carry on the wire (RFC 1813 2.4).
pub const MAX_FILE_HANDLE_LEN: usize = 64;
/// Handle width this server actually issues and accepts.
pub const HANDLE_SIZE: usize = 8;
/// Maximum bytes in a file name.
pub const MAX_NAME_LEN: usize = 255;
/// Maximum bytes in a path.
pub const MAX_PATH_LEN: usize = 1024;
/// Width of a READDIR cookie verifier.
pub const COOKIE_VERIFIER_SIZE: usize = 8;

/// NFSv3 procedure numbers understood by the dispatcher.
pub mod procedure {
    pub const NULL: u32 = 0;
    pub const GETATTR: u32 = 1;
    pub const SETATTR: u32 = 2;
    pub const LOOKUP: u32 = 3;
    pub const ACCESS: u32 = 4;
    pub const READLINK: u32 = 5;
    pub const READ: u32 = 6;
    pub const READDIR: u32 = 16;
    pub const READDIRPLUS: u32 = 17;
    pub const FSSTAT: u32 = 18;
    pub const FSINFO: u32 = 19;
    pub const PATHCONF: u32 = 20;
}

/// MOUNT procedure numbers understood by the dispatcher.
pub mod mount_procedure {
    pub const NULL: u32 = 0;
    pub const MNT: u32 = 1;
    pub const UMNT: u32 = 3;
}

/// NFSv3 status codes (RFC 1813 2.6).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum Status {
    /// The call completed successfully.
    Ok = 0,
    /// Not owner.
    Perm = 1,
    /// No such file or directory.
    NoEnt = 2,
    /// A hard I/O error occurred while processing the operation.
    Io = 5,
    /// No such device or address.
    NxIo = 6,
    /// Permission denied.
    Access = 13,
    /// File exists.
    Exist = 17,
    /// Attempt to do a cross-device hard link.
    XDev = 18,
    /// No such device.
    NoDev = 19,
    /// The caller specified a non-directory in a directory operation.
    NotDir = 20,
    /// The caller specified a directory in a non-directory operation.
    IsDir = 21,
    /// Invalid or unsupported argument.
    Inval = 22,
    /// The operation would have grown a file beyond the server's limit.
    FBig = 27,
    /// No space left on device.
    NoSpc = 28,
    /// A modifying operation was attempted on a read-only file system.
    RoFs = 30,
    /// Too many hard links.
    MLink = 31,
    /// The filename in an operation was too long.
    NameTooLong = 63,
    /// An attempt was made to remove a non-empty directory.
    NotEmpty = 66,
    /// Resource (quota) hard limit exceeded.
    DQuot = 69,
    /// The file referred to by the handle no longer exists.
    Stale = 70,
    /// Too many levels of remote in path.
    Remote = 71,
    /// The file handle failed internal consistency checks.
    BadHandle = 10001,
    /// Update synchronization mismatch during SETATTR.
    NotSync = 10002,
    /// READDIR or READDIRPLUS cookie is stale.
    BadCookie = 10003,
    /// Operation is not supported.
    NotSupp = 10004,
    /// Buffer or request is too small.
    TooSmall = 10005,
    /// A server-side error that maps to no legal NFSv3 error value.
    ServerFault = 10006,
    /// Object type not supported by the server.
    BadType = 10007,
    /// The server started the request but cannot complete it in time;
    /// the client should retry with a new transaction id.
    Jukebox = 10008,
}

/// Generic NFSv3 procedure outcome: every reply body is either the
/// procedure's "resok" arm or a non-[`Status::Ok`] code plus a "resfail"
/// arm. The `Fail` arm never carries [`Status::Ok`]; the serializer treats
/// that combination as a caller bug.
#[derive(Debug, Clone, PartialEq)]
pub enum NfsResult<O, F> {
    Ok(O),
    Fail(Status, F),
}

impl<O, F> NfsResult<O, F> {
    pub fn is_ok(&self) -> bool {
        matches!(self, NfsResult::Ok(_))
    }

    /// The status transmitted on the wire for this outcome.
    pub fn status(&self) -> Status {
        match self {
            NfsResult::Ok(_) => Status::Ok,
            NfsResult::Fail(status, _) => *status,
        }
    }
}

/// File types enumerated by `ftype3` (RFC 1813 2.5).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum FileType {
    Regular = 1,
    Directory = 2,
    BlockDevice = 3,
    CharacterDevice = 4,
    Symlink = 5,
    Socket = 6,
    Fifo = 7,
}

/// Handle that uniquely identifies an object inside the exported filesystem.
///
/// The RFC allows up to [`MAX_FILE_HANDLE_LEN`] opaque bytes and the type
/// can carry them all, but every handle this server mints is exactly
/// [`HANDLE_SIZE`] bytes wide (a big-endian object id); the wire decoder
/// rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle(Vec<u8>);

impl FileHandle {
    /// Wraps raw handle bytes. Returns `None` when the RFC bound is exceeded.
    pub fn new(bytes: Vec<u8>) -> Option<Self> {
        (bytes.len() <= MAX_FILE_HANDLE_LEN).then_some(Self(bytes))
    }

    /// Builds the canonical 8-byte handle for an object id.
    pub fn from_id(id: u64) -> Self {
        Self(id.to_be_bytes().to_vec())
    }

    /// The object id, when this is a canonical 8-byte handle.
    pub fn to_id(&self) -> Option<u64> {
        let bytes: [u8; HANDLE_SIZE] = self.0.as_slice().try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Timestamp matching `nfstime3`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct FileTime {
    pub seconds: u32,
    pub nanos: u32,
}

/// Major/minor device pair (`specdata3`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Device {
    pub major: u32,
    pub minor: u32,
}

/// Full file attributes (`fattr3`, RFC 1813 2.6).
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttr {
    pub file_type: FileType,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub used: u64,
    pub device: Device,
    pub fsid: u64,
    pub fileid: u64,
    pub atime: FileTime,
    pub mtime: FileTime,
    pub ctime: FileTime,
}

/// Pre-operation attribute digest (`wcc_attr`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct WccAttr {
    pub size: u64,
    pub mtime: FileTime,
    pub ctime: FileTime,
}

/// Weak cache consistency data returned with modifying operations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WccData {
    pub before: Option<WccAttr>,
    pub after: Option<FileAttr>,
}

/// Timestamp update strategy inside [`SetAttr`] (`set_atime`/`set_mtime`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum SetTime {
    #[default]
    DontChange,
    ServerTime,
    ClientTime(FileTime),
}

/// Requested attribute modifications (`sattr3`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetAttr {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub size: Option<u64>,
    pub atime: SetTime,
    pub mtime: SetTime,
}

/// `sattrguard3`: when present, SETATTR proceeds only if the object's
/// current ctime matches.
pub type SetAttrGuard = Option<FileTime>;

/// READDIR pagination verifier (`cookieverf3`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct CookieVerifier(pub [u8; COOKIE_VERIFIER_SIZE]);

/// Access rights bitmask (RFC 1813 3.3.4).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Access(u32);

impl Access {
    pub const READ: Access = Access(0x0001);
    pub const LOOKUP: Access = Access(0x0002);
    pub const MODIFY: Access = Access(0x0004);
    pub const EXTEND: Access = Access(0x0008);
    pub const DELETE: Access = Access(0x0010);
    pub const EXECUTE: Access = Access(0x0020);

    /// Everything a read-only export can grant.
    pub const fn all_read_only() -> Access {
        Access(Access::READ.0 | Access::LOOKUP.0 | Access::EXECUTE.0)
    }

    /// Every right defined by the RFC.
    pub const fn all() -> Access {
        Access(
            Access::all_read_only().0
                | Access::MODIFY.0
                | Access::EXTEND.0
                | Access::DELETE.0,
        )
    }

    pub const fn from_bits(bits: u32) -> Access {
        Access(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Access) -> bool {
        self.0 & other.0 == other.0
    }

    /// The subset of `self` also present in `mask`.
    pub const fn intersect(self, mask: Access) -> Access {
        Access(self.0 & mask.0)
    }
}

impl BitOr for Access {
    type Output = Access;

    fn bitor(self, rhs: Access) -> Access {
        Access(self.0 | rhs.0)
    }
}

impl BitOrAssign for Access {
    fn bitor_assign(&mut self, rhs: Access) {
        self.0 |= rhs.0;
    }
}

/// Filesystem capability flags returned by FSINFO (RFC 1813 3.3.19).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FsProperties(u32);

impl FsProperties {
    pub const LINK: FsProperties = FsProperties(0x0001);
    pub const SYMLINK: FsProperties = FsProperties(0x0002);
    pub const HOMOGENEOUS: FsProperties = FsProperties(0x0008);
    pub const CANSETTIME: FsProperties = FsProperties(0x0010);

    pub const fn from_bits(bits: u32) -> FsProperties {
        FsProperties(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: FsProperties) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for FsProperties {
    /// Hard links, symlinks, homogeneous pathconf and settable times.
    fn default() -> Self {
        FsProperties(
            FsProperties::LINK.0
                | FsProperties::SYMLINK.0
                | FsProperties::HOMOGENEOUS.0
                | FsProperties::CANSETTIME.0,
        )
    }
}

impl BitOr for FsProperties {
    type Output = FsProperties;

    fn bitor(self, rhs: FsProperties) -> FsProperties {
        FsProperties(self.0 | rhs.0)
    }
}
