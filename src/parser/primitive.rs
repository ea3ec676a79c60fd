//! Primitive XDR readers (RFC 4506): big-endian integers, booleans,
//! optionals and 4-byte-aligned counted opaques.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use num_traits::FromPrimitive;

use super::{Error, Result};

/// The XDR alignment in bytes.
pub const ALIGNMENT: usize = 4;

/// Reads and discards the 0..3 filler bytes that re-align the cursor
/// after a counted field of `n` bytes. Filler content is arbitrary.
pub fn padding(src: &mut impl Read, n: usize) -> Result<()> {
    let mut buf = [0u8; ALIGNMENT];
    let padding = (ALIGNMENT - n % ALIGNMENT) % ALIGNMENT;
    src.read_exact(&mut buf[..padding]).map_err(|_| Error::IncorrectPadding)
}

/// Reads an XDR `unsigned int` (big-endian u32).
pub fn u32(src: &mut impl Read) -> Result<u32> {
    src.read_u32::<BigEndian>().map_err(Error::Io)
}

/// Reads an XDR `unsigned hyper` (big-endian u64).
pub fn u64(src: &mut impl Read) -> Result<u64> {
    src.read_u64::<BigEndian>().map_err(Error::Io)
}

/// Reads an XDR boolean encoded as a u32.
pub fn bool(src: &mut impl Read) -> Result<bool> {
    match u32(src)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::InvalidBool(other)),
    }
}

/// Reads an XDR optional: boolean discriminator, then the value if present.
pub fn option<T, S: Read>(
    src: &mut S,
    cont: impl FnOnce(&mut S) -> Result<T>,
) -> Result<Option<T>> {
    match bool(src)? {
        true => Ok(Some(cont(src)?)),
        false => Ok(None),
    }
}

/// Reads a fixed-size opaque `[u8; N]` including alignment filler.
pub fn array<const N: usize>(src: &mut impl Read) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    src.read_exact(&mut buf).map_err(Error::Io)?;
    padding(src, N)?;
    Ok(buf)
}

/// Reads a counted opaque (`opaque<>`): u32 length, bytes, filler.
pub fn opaque(src: &mut impl Read) -> Result<Vec<u8>> {
    let size = u32(src)? as usize;
    let mut vec = vec![0u8; size];
    src.read_exact(vec.as_mut_slice()).map_err(Error::Io)?;
    padding(src, size)?;
    Ok(vec)
}

/// Reads a counted opaque with an explicit maximum length.
pub fn opaque_max(src: &mut impl Read, limit: usize) -> Result<Vec<u8>> {
    let size = u32(src)? as usize;
    if size > limit {
        return Err(Error::TooLong { length: size, limit });
    }
    let mut vec = vec![0u8; size];
    src.read_exact(vec.as_mut_slice()).map_err(Error::Io)?;
    padding(src, size)?;
    Ok(vec)
}

/// Reads an XDR string: UTF-8 bytes as a counted opaque.
pub fn string(src: &mut impl Read) -> Result<String> {
    Ok(String::from_utf8(opaque(src)?)?)
}

/// Reads an XDR string with an explicit maximum byte length.
pub fn string_max(src: &mut impl Read, limit: usize) -> Result<String> {
    Ok(String::from_utf8(opaque_max(src, limit)?)?)
}

/// Reads an XDR enum discriminant into `T`, reporting the raw value to
/// `mismatch` when it falls outside the enumeration.
pub fn variant<T: FromPrimitive>(
    src: &mut impl Read,
    mismatch: impl FnOnce(u32) -> Error,
) -> Result<T> {
    let raw = u32(src)?;
    FromPrimitive::from_u32(raw).ok_or_else(|| mismatch(raw))
}

/// Reads an XDR counted list: u32 count, then `count` entries.
pub fn list<T, S: Read>(
    src: &mut S,
    mut entry: impl FnMut(&mut S) -> Result<T>,
) -> Result<Vec<T>> {
    let count = u32(src)? as usize;
    let mut entries = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        entries.push(entry(src)?);
    }
    Ok(entries)
}
