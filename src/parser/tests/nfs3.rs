use std::io::Cursor;

use crate::nfs3::{FileType, SetTime, Status};
use crate::parser::nfs3::{
    attr, entry_list, file_type, handle, set_attr, set_time, status, time, wcc_attr,
};
use crate::parser::primitive::u32;
use crate::parser::Error;

#[test]
fn test_handle_of_eight_bytes() {
    #[rustfmt::skip]
    const DATA: &[u8] = &[
        0x00, 0x00, 0x00, 0x08,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07,
    ];
    let result = handle(&mut Cursor::new(DATA)).unwrap();
    assert_eq!(result.to_id(), Some(7));
}

#[test]
fn test_handle_rejects_other_lengths() {
    for length in [0usize, 4, 7, 9, 64] {
        let mut data = vec![0, 0, 0, length as u8];
        data.extend(vec![0u8; length.next_multiple_of(4)]);
        let result = handle(&mut Cursor::new(&data));
        assert!(
            matches!(result, Err(Error::InvalidFileHandle(l)) if l == length),
            "length {length}",
        );
    }
}

#[test]
fn test_file_type_known_values() {
    for (raw, expected) in [
        (1u32, FileType::Regular),
        (2, FileType::Directory),
        (5, FileType::Symlink),
        (7, FileType::Fifo),
    ] {
        let data = raw.to_be_bytes();
        assert_eq!(file_type(&mut Cursor::new(&data)).unwrap(), expected);
    }
}

#[test]
fn test_file_type_unknown_value() {
    let data = 8u32.to_be_bytes();
    assert!(matches!(file_type(&mut Cursor::new(&data)), Err(Error::InvalidFileType(8))));
}

#[test]
fn test_status_known_values() {
    for (raw, expected) in [(0u32, Status::Ok), (70, Status::Stale), (10008, Status::Jukebox)] {
        let data = raw.to_be_bytes();
        assert_eq!(status(&mut Cursor::new(&data)).unwrap(), expected);
    }
}

#[test]
fn test_status_unknown_value() {
    let data = 42u32.to_be_bytes();
    assert!(matches!(status(&mut Cursor::new(&data)), Err(Error::InvalidStatus(42))));
}

#[test]
fn test_time() {
    const DATA: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02];
    let result = time(&mut Cursor::new(DATA)).unwrap();
    assert_eq!(result.seconds, 1);
    assert_eq!(result.nanos, 2);
}

#[test]
fn test_attr() {
    #[rustfmt::skip]
    const DATA: &[u8] = &[
        0x00, 0x00, 0x00, 0x01, // regular
        0x00, 0x00, 0x01, 0xA4, // mode 0o644
        0x00, 0x00, 0x00, 0x01, // nlink
        0x00, 0x00, 0x03, 0xE8, // uid 1000
        0x00, 0x00, 0x03, 0xE8, // gid 1000
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, // size 4096
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, // used 4096
        0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01, // rdev 8:1
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2A, // fsid 42
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, // fileid 9
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, // atime
        0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, // mtime
        0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, // ctime
    ];
    let result = attr(&mut Cursor::new(DATA)).unwrap();
    assert_eq!(result.file_type, FileType::Regular);
    assert_eq!(result.mode, 0o644);
    assert_eq!(result.size, 4096);
    assert_eq!(result.device.major, 8);
    assert_eq!(result.device.minor, 1);
    assert_eq!(result.fsid, 42);
    assert_eq!(result.fileid, 9);
    assert_eq!(result.ctime.seconds, 3);
}

#[test]
fn test_wcc_attr() {
    #[rustfmt::skip]
    const DATA: &[u8] = &[
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, // size
        0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, // mtime
        0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x00, // ctime
    ];
    let result = wcc_attr(&mut Cursor::new(DATA)).unwrap();
    assert_eq!(result.size, 16);
    assert_eq!(result.mtime.seconds, 5);
    assert_eq!(result.ctime.seconds, 6);
}

#[test]
fn test_set_time_all_arms() {
    let mut src = Cursor::new([0u8, 0, 0, 0]);
    assert_eq!(set_time(&mut src).unwrap(), SetTime::DontChange);

    let mut src = Cursor::new([0u8, 0, 0, 1]);
    assert_eq!(set_time(&mut src).unwrap(), SetTime::ServerTime);

    let mut src = Cursor::new([0u8, 0, 0, 2, 0, 0, 0, 9, 0, 0, 0, 1]);
    match set_time(&mut src).unwrap() {
        SetTime::ClientTime(t) => {
            assert_eq!(t.seconds, 9);
            assert_eq!(t.nanos, 1);
        }
        other => panic!("unexpected {other:?}"),
    }

    let mut src = Cursor::new([0u8, 0, 0, 3]);
    assert!(matches!(set_time(&mut src), Err(Error::InvalidSetTime(3))));
}

#[test]
fn test_set_attr_sparse_fields() {
    #[rustfmt::skip]
    const DATA: &[u8] = &[
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x01, 0xED, // mode = 0o755
        0x00, 0x00, 0x00, 0x00, // uid absent
        0x00, 0x00, 0x00, 0x00, // gid absent
        0x00, 0x00, 0x00, 0x01, // size present
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // size = 0
        0x00, 0x00, 0x00, 0x01, // atime: server time
        0x00, 0x00, 0x00, 0x00, // mtime: don't change
    ];
    let result = set_attr(&mut Cursor::new(DATA)).unwrap();
    assert_eq!(result.mode, Some(0o755));
    assert_eq!(result.uid, None);
    assert_eq!(result.gid, None);
    assert_eq!(result.size, Some(0));
    assert_eq!(result.atime, SetTime::ServerTime);
    assert_eq!(result.mtime, SetTime::DontChange);
}

#[test]
fn test_entry_list_linked_pattern() {
    #[rustfmt::skip]
    const DATA: &[u8] = &[
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x0A, // {1, 10}
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x0B, // {1, 11}
        0x00, 0x00, 0x00, 0x00, // terminator
    ];
    let result = entry_list(&mut Cursor::new(DATA), u32).unwrap();
    assert_eq!(result, vec![10, 11]);
}

#[test]
fn test_entry_list_empty() {
    const DATA: &[u8] = &[0x00, 0x00, 0x00, 0x00];
    let result = entry_list(&mut Cursor::new(DATA), u32).unwrap();
    assert!(result.is_empty());
}
