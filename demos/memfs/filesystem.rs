//! A tiny read-only in-memory filesystem served over NFSv3.

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;

use nfswire::nfs3::{
    Access, CookieVerifier, FileAttr, FileHandle, FileTime, FileType, FsProperties, NfsResult,
    Status, MAX_NAME_LEN,
};
use nfswire::rpc::AuthFlavor;
use nfswire::vfs::{
    AccessArgs, AccessOk, DirPlusEntry, FsInfoOk, FsStatOk, LookupArgs, LookupOk, MountOk,
    PathConfOk, PostOpAttr, ReadArgs, ReadDirPlusArgs, ReadDirPlusOk, ReadLinkOk, ReadOk, Vfs,
};

const FSID: u64 = 0x6D65_6D66_7331;

enum NodeKind {
    File(Bytes),
    Directory(BTreeMap<String, u64>),
    Symlink(String),
}

struct Node {
    id: u64,
    kind: NodeKind,
    mtime: FileTime,
}

pub struct MemFs {
    export: String,
    nodes: HashMap<u64, Node>,
    root: u64,
}

fn now() -> FileTime {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    FileTime { seconds: since_epoch.as_secs() as u32, nanos: since_epoch.subsec_nanos() }
}

impl MemFs {
    /// Builds the demo tree:
    /// `/hello.txt`, `/README.md`, `/notes/todo.txt`, `/hello -> hello.txt`.
    pub fn demo(export: &str) -> Self {
        let stamp = now();
        let mut nodes = HashMap::new();
        let mut add = |id: u64, kind: NodeKind| {
            nodes.insert(id, Node { id, kind, mtime: stamp });
        };

        add(2, NodeKind::File(Bytes::from_static(b"hello, world\n")));
        add(3, NodeKind::File(Bytes::from_static(b"# memfs\n\nA demo export.\n")));
        add(5, NodeKind::File(Bytes::from_static(b"- mount me\n- read me\n")));
        add(4, NodeKind::Directory(BTreeMap::from([("todo.txt".to_string(), 5)])));
        add(6, NodeKind::Symlink("hello.txt".to_string()));
        add(
            1,
            NodeKind::Directory(BTreeMap::from([
                ("hello.txt".to_string(), 2),
                ("README.md".to_string(), 3),
                ("notes".to_string(), 4),
                ("hello".to_string(), 6),
            ])),
        );

        Self { export: export.to_string(), nodes, root: 1 }
    }

    fn node(&self, handle: &FileHandle) -> Result<&Node, Status> {
        let id = handle.to_id().ok_or(Status::BadHandle)?;
        self.nodes.get(&id).ok_or(Status::Stale)
    }

    fn attr_of(&self, node: &Node) -> FileAttr {
        let (file_type, size, nlink) = match &node.kind {
            NodeKind::File(data) => (FileType::Regular, data.len() as u64, 1),
            NodeKind::Directory(entries) => (FileType::Directory, entries.len() as u64, 2),
            NodeKind::Symlink(target) => (FileType::Symlink, target.len() as u64, 1),
        };
        let mode = match file_type {
            FileType::Directory => 0o555,
            _ => 0o444,
        };
        FileAttr {
            file_type,
            mode,
            nlink,
            uid: 65534,
            gid: 65534,
            size,
            used: size,
            device: Default::default(),
            fsid: FSID,
            fileid: node.id,
            atime: node.mtime,
            mtime: node.mtime,
            ctime: node.mtime,
        }
    }

    fn total_bytes(&self) -> u64 {
        self.nodes
            .values()
            .map(|node| match &node.kind {
                NodeKind::File(data) => data.len() as u64,
                _ => 0,
            })
            .sum()
    }
}

#[async_trait]
impl Vfs for MemFs {
    async fn mount(&self, dir_path: &str) -> NfsResult<MountOk, ()> {
        if dir_path == self.export {
            NfsResult::Ok(MountOk {
                handle: FileHandle::from_id(self.root),
                auth_flavors: vec![AuthFlavor::Unix],
            })
        } else {
            NfsResult::Fail(Status::NoEnt, ())
        }
    }

    async fn unmount(&self, _dir_path: &str) {}

    async fn get_attr(&self, handle: &FileHandle) -> NfsResult<FileAttr, ()> {
        match self.node(handle) {
            Ok(node) => NfsResult::Ok(self.attr_of(node)),
            Err(status) => NfsResult::Fail(status, ()),
        }
    }

    async fn lookup(&self, args: LookupArgs) -> NfsResult<LookupOk, PostOpAttr> {
        let dir = match self.node(&args.dir) {
            Ok(node) => node,
            Err(status) => return NfsResult::Fail(status, None),
        };
        let dir_attr = Some(self.attr_of(dir));
        let NodeKind::Directory(entries) = &dir.kind else {
            return NfsResult::Fail(Status::NotDir, dir_attr);
        };
        if args.name.len() > MAX_NAME_LEN {
            return NfsResult::Fail(Status::NameTooLong, dir_attr);
        }
        let target = if args.name == "." { Some(&dir.id) } else { entries.get(&args.name) };
        match target.and_then(|id| self.nodes.get(id)) {
            Some(node) => NfsResult::Ok(LookupOk {
                handle: FileHandle::from_id(node.id),
                attr: Some(self.attr_of(node)),
                dir_attr,
            }),
            None => NfsResult::Fail(Status::NoEnt, dir_attr),
        }
    }

    async fn access(&self, args: AccessArgs) -> NfsResult<AccessOk, PostOpAttr> {
        match self.node(&args.handle) {
            Ok(node) => NfsResult::Ok(AccessOk {
                attr: Some(self.attr_of(node)),
                access: args.access.intersect(Access::all_read_only()),
            }),
            Err(status) => NfsResult::Fail(status, None),
        }
    }

    async fn read_link(&self, handle: &FileHandle) -> NfsResult<ReadLinkOk, PostOpAttr> {
        let node = match self.node(handle) {
            Ok(node) => node,
            Err(status) => return NfsResult::Fail(status, None),
        };
        match &node.kind {
            NodeKind::Symlink(target) => NfsResult::Ok(ReadLinkOk {
                attr: Some(self.attr_of(node)),
                target: target.clone(),
            }),
            _ => NfsResult::Fail(Status::Inval, Some(self.attr_of(node))),
        }
    }

    async fn read(&self, args: ReadArgs) -> NfsResult<ReadOk, PostOpAttr> {
        let node = match self.node(&args.handle) {
            Ok(node) => node,
            Err(status) => return NfsResult::Fail(status, None),
        };
        let attr = Some(self.attr_of(node));
        let NodeKind::File(data) = &node.kind else {
            let status = if matches!(node.kind, NodeKind::Directory(_)) {
                Status::IsDir
            } else {
                Status::Inval
            };
            return NfsResult::Fail(status, attr);
        };
        let start = (args.offset as usize).min(data.len());
        let end = start.saturating_add(args.count as usize).min(data.len());
        let slice = data.slice(start..end);
        NfsResult::Ok(ReadOk {
            attr,
            count: slice.len() as u32,
            eof: end == data.len(),
            data: slice,
        })
    }

    async fn read_dir_plus(&self, args: ReadDirPlusArgs) -> NfsResult<ReadDirPlusOk, PostOpAttr> {
        let dir = match self.node(&args.dir) {
            Ok(node) => node,
            Err(status) => return NfsResult::Fail(status, None),
        };
        let dir_attr = Some(self.attr_of(dir));
        let NodeKind::Directory(entries) = &dir.kind else {
            return NfsResult::Fail(Status::NotDir, dir_attr);
        };

        let mut listed = Vec::new();
        for (position, (name, id)) in entries.iter().enumerate() {
            let cookie = position as u64 + 1;
            if cookie <= args.cookie {
                continue;
            }
            let node = &self.nodes[id];
            listed.push(DirPlusEntry {
                fileid: node.id,
                name: name.clone(),
                cookie,
                attr: Some(self.attr_of(node)),
                handle: Some(FileHandle::from_id(node.id)),
            });
        }
        NfsResult::Ok(ReadDirPlusOk {
            dir_attr,
            verifier: CookieVerifier::default(),
            entries: listed,
            eof: true,
        })
    }

    async fn fs_stat(&self, handle: &FileHandle) -> NfsResult<FsStatOk, PostOpAttr> {
        match self.node(handle) {
            Ok(node) => {
                let used = self.total_bytes();
                NfsResult::Ok(FsStatOk {
                    attr: Some(self.attr_of(node)),
                    total_bytes: used,
                    free_bytes: 0,
                    available_bytes: 0,
                    total_files: self.nodes.len() as u64,
                    free_files: 0,
                    available_files: 0,
                    invarsec: u32::MAX,
                })
            }
            Err(status) => NfsResult::Fail(status, None),
        }
    }

    async fn fs_info(&self, handle: &FileHandle) -> NfsResult<FsInfoOk, PostOpAttr> {
        match self.node(handle) {
            Ok(node) => NfsResult::Ok(FsInfoOk {
                attr: Some(self.attr_of(node)),
                read_max: 1 << 20,
                read_pref: 1 << 16,
                read_mult: 4096,
                write_max: 0,
                write_pref: 0,
                write_mult: 4096,
                dir_pref: 1 << 16,
                max_file_size: u64::MAX,
                time_delta: FileTime { seconds: 0, nanos: 1 },
                properties: FsProperties::default(),
            }),
            Err(status) => NfsResult::Fail(status, None),
        }
    }

    async fn path_conf(&self, handle: &FileHandle) -> NfsResult<PathConfOk, PostOpAttr> {
        match self.node(handle) {
            Ok(node) => NfsResult::Ok(PathConfOk {
                attr: Some(self.attr_of(node)),
                link_max: 1,
                name_max: MAX_NAME_LEN as u32,
                no_trunc: true,
                chown_restricted: true,
                case_insensitive: false,
                case_preserving: true,
            }),
            Err(status) => NfsResult::Fail(status, None),
        }
    }
}
