//! Shared test back-end: one regular file behind handle 7.

#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use nfswire::nfs3::{
    Access, CookieVerifier, Device, FileAttr, FileHandle, FileTime, FileType, FsProperties,
    NfsResult, Status,
};
use nfswire::rpc::AuthFlavor;
use nfswire::vfs::{
    AccessArgs, AccessOk, FsInfoOk, FsStatOk, LookupArgs, LookupOk, MountOk, PathConfOk,
    PostOpAttr, ReadArgs, ReadDirPlusArgs, ReadDirPlusOk, ReadLinkOk, ReadOk, Vfs,
};

pub const FILE_ID: u64 = 7;
pub const FILE_CONTENT: &[u8] = b"ABCDEFGHIJKLMNOP";

#[derive(Default)]
pub struct TestFs {
    /// Sleep before answering READ, to reorder pipelined completions.
    pub read_delay: Option<Duration>,
    pub panic_on_get_attr: bool,
}

impl TestFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn attr(&self) -> FileAttr {
        FileAttr {
            file_type: FileType::Regular,
            mode: 0o444,
            nlink: 1,
            uid: 0,
            gid: 0,
            size: FILE_CONTENT.len() as u64,
            used: FILE_CONTENT.len() as u64,
            device: Device::default(),
            fsid: 1,
            fileid: FILE_ID,
            atime: FileTime::default(),
            mtime: FileTime::default(),
            ctime: FileTime::default(),
        }
    }

    fn known(&self, handle: &FileHandle) -> bool {
        handle.to_id() == Some(FILE_ID)
    }
}

#[async_trait]
impl Vfs for TestFs {
    async fn mount(&self, dir_path: &str) -> NfsResult<MountOk, ()> {
        if dir_path == "/" {
            NfsResult::Ok(MountOk {
                handle: FileHandle::from_id(FILE_ID),
                auth_flavors: vec![AuthFlavor::Unix],
            })
        } else {
            NfsResult::Fail(Status::NoEnt, ())
        }
    }

    async fn unmount(&self, _dir_path: &str) {}

    async fn get_attr(&self, handle: &FileHandle) -> NfsResult<FileAttr, ()> {
        if self.panic_on_get_attr {
            panic!("get_attr exploded");
        }
        if self.known(handle) {
            NfsResult::Ok(self.attr())
        } else {
            NfsResult::Fail(Status::Stale, ())
        }
    }

    async fn lookup(&self, _args: LookupArgs) -> NfsResult<LookupOk, PostOpAttr> {
        NfsResult::Fail(Status::NoEnt, None)
    }

    async fn access(&self, args: AccessArgs) -> NfsResult<AccessOk, PostOpAttr> {
        NfsResult::Ok(AccessOk {
            attr: Some(self.attr()),
            access: args.access.intersect(Access::all_read_only()),
        })
    }

    async fn read_link(&self, _handle: &FileHandle) -> NfsResult<ReadLinkOk, PostOpAttr> {
        NfsResult::Fail(Status::Inval, None)
    }

    async fn read(&self, args: ReadArgs) -> NfsResult<ReadOk, PostOpAttr> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if !self.known(&args.handle) {
            return NfsResult::Fail(Status::Stale, None);
        }
        let start = (args.offset as usize).min(FILE_CONTENT.len());
        let end = start.saturating_add(args.count as usize).min(FILE_CONTENT.len());
        NfsResult::Ok(ReadOk {
            attr: None,
            count: (end - start) as u32,
            eof: end == FILE_CONTENT.len(),
            data: Bytes::from_static(&FILE_CONTENT[start..end]),
        })
    }

    async fn read_dir_plus(
        &self,
        _args: ReadDirPlusArgs,
    ) -> NfsResult<ReadDirPlusOk, PostOpAttr> {
        NfsResult::Ok(ReadDirPlusOk {
            dir_attr: None,
            verifier: CookieVerifier::default(),
            entries: Vec::new(),
            eof: true,
        })
    }

    async fn fs_stat(&self, _handle: &FileHandle) -> NfsResult<FsStatOk, PostOpAttr> {
        NfsResult::Ok(FsStatOk {
            attr: Some(self.attr()),
            total_bytes: FILE_CONTENT.len() as u64,
            free_bytes: 0,
            available_bytes: 0,
            total_files: 1,
            free_files: 0,
            available_files: 0,
            invarsec: 0,
        })
    }

    async fn fs_info(&self, _handle: &FileHandle) -> NfsResult<FsInfoOk, PostOpAttr> {
        NfsResult::Ok(FsInfoOk {
            attr: None,
            read_max: 1 << 20,
            read_pref: 1 << 16,
            read_mult: 512,
            write_max: 0,
            write_pref: 0,
            write_mult: 512,
            dir_pref: 1 << 16,
            max_file_size: u64::MAX,
            time_delta: FileTime { seconds: 0, nanos: 1 },
            properties: FsProperties::default(),
        })
    }

    async fn path_conf(&self, _handle: &FileHandle) -> NfsResult<PathConfOk, PostOpAttr> {
        NfsResult::Ok(PathConfOk {
            attr: None,
            link_max: 1,
            name_max: 255,
            no_trunc: true,
            chown_restricted: true,
            case_insensitive: false,
            case_preserving: true,
        })
    }
}
