use std::io::Cursor;
use std::mem::size_of;

use byteorder::{BigEndian, WriteBytesExt};

use crate::parser::primitive::{
    array, bool, list, opaque, opaque_max, option, string, string_max, u32, u64,
};
use crate::parser::Error;

#[test]
fn test_u32() {
    let init = [0u32, 7, 788_965];
    let mut src = Vec::with_capacity(size_of::<u32>() * init.len());
    for value in init {
        src.write_u32::<BigEndian>(value).unwrap();
    }
    let mut src = Cursor::new(src);
    for expected in init {
        assert_eq!(u32(&mut src).unwrap(), expected);
    }
}

#[test]
fn test_u32_out_of_data() {
    let mut src = Cursor::new([0u8, 0, 1]);
    assert!(matches!(u32(&mut src), Err(Error::Io(_))));
}

#[test]
fn test_u64() {
    let init = [2u64, 0, 125, 78_569];
    let mut src = Vec::with_capacity(size_of::<u64>() * init.len());
    for value in init {
        src.write_u64::<BigEndian>(value).unwrap();
    }
    let mut src = Cursor::new(src);
    for expected in init {
        assert_eq!(u64(&mut src).unwrap(), expected);
    }
}

#[test]
fn test_bool() {
    let mut src = Cursor::new([0u8, 0, 0, 1, 0, 0, 0, 0]);
    assert!(bool(&mut src).unwrap());
    assert!(!bool(&mut src).unwrap());
}

#[test]
fn test_bool_bad_discriminant() {
    let mut src = Cursor::new([0u8, 0, 0, 2]);
    assert!(matches!(bool(&mut src), Err(Error::InvalidBool(2))));
}

#[test]
fn test_option() {
    let init = [None, Some(85u32), Some(0)];
    let mut src = Vec::new();
    for entry in init {
        match entry {
            Some(value) => {
                src.write_u32::<BigEndian>(1).unwrap();
                src.write_u32::<BigEndian>(value).unwrap();
            }
            None => src.write_u32::<BigEndian>(0).unwrap(),
        }
    }
    let mut src = Cursor::new(src);
    for expected in init {
        assert_eq!(option(&mut src, u32).unwrap(), expected);
    }
}

#[test]
fn test_opaque_with_padding() {
    let mut src = Cursor::new([0, 0, 0, 3, b'a', b'b', b'c', 0x42]);
    assert_eq!(opaque(&mut src).unwrap(), b"abc");
    assert_eq!(src.position(), 8);
}

#[test]
fn test_opaque_aligned_needs_no_padding() {
    let mut src = Cursor::new([0, 0, 0, 4, 1, 2, 3, 4]);
    assert_eq!(opaque(&mut src).unwrap(), [1, 2, 3, 4]);
}

#[test]
fn test_opaque_truncated_padding() {
    let mut src = Cursor::new([0, 0, 0, 3, b'a', b'b', b'c']);
    assert!(matches!(opaque(&mut src), Err(Error::IncorrectPadding)));
}

#[test]
fn test_opaque_max_rejects_oversize() {
    let mut src = Cursor::new([0, 0, 0, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert!(matches!(
        opaque_max(&mut src, 8),
        Err(Error::TooLong { length: 9, limit: 8 })
    ));
}

#[test]
fn test_array_with_padding() {
    let mut src = Cursor::new([1u8, 2, 3, 0x41, 9, 9, 9, 9]);
    assert_eq!(array::<3>(&mut src).unwrap(), [1, 2, 3]);
    assert_eq!(src.position(), 4);
}

#[test]
fn test_string() {
    let mut src = Cursor::new([0, 0, 0, 6, b't', b'e', b's', b't', b'4', b'2', 0, 0]);
    assert_eq!(string(&mut src).unwrap(), "test42");
}

#[test]
fn test_string_invalid_utf8() {
    let mut src = Cursor::new([0, 0, 0, 3, 0xFF, 0xFF, 0xFF, 0]);
    assert!(matches!(string(&mut src), Err(Error::InvalidString(_))));
}

#[test]
fn test_string_max_rejects_oversize() {
    let mut src = Cursor::new([0, 0, 0, 6, b't', b'e', b's', b't', b'4', b'2', 0, 0]);
    assert!(matches!(string_max(&mut src, 5), Err(Error::TooLong { .. })));
}

#[test]
fn test_list() {
    let mut src = Cursor::new([0, 0, 0, 3, 0, 0, 0, 7, 0, 0, 0, 8, 0, 0, 0, 9]);
    assert_eq!(list(&mut src, u32).unwrap(), vec![7, 8, 9]);
}
