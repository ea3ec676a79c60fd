//! XDR encoding for RPC, NFSv3 and MOUNT messages.
//!
//! Counterpart of [`crate::parser`]: big-endian integers, 4-byte alignment,
//! counted opaques. Encoders write into any `std::io::Write`; record
//! framing (fragment header) is applied afterwards by
//! [`crate::framing::record`] because the length is needed up front.

pub mod mount;
pub mod nfs3;
pub mod rpc;

#[cfg(test)]
mod tests;

use std::io::{self, Error, ErrorKind, Write};

use byteorder::{BigEndian, WriteBytesExt};
use num_traits::ToPrimitive;

/// The XDR alignment in bytes.
pub const ALIGNMENT: usize = 4;

/// Filler byte emitted to re-align the cursor. Readers must accept any
/// filler value; this implementation always writes zero.
pub const PAD: u8 = 0x00;

/// Writes alignment filler for an already-written field of `n` bytes.
fn padding(dest: &mut impl Write, n: usize) -> io::Result<()> {
    let fill = [PAD; ALIGNMENT];
    let padding = (ALIGNMENT - n % ALIGNMENT) % ALIGNMENT;
    dest.write_all(&fill[..padding])
}

/// Writes an XDR `unsigned int` (big-endian u32).
pub fn u32(dest: &mut impl Write, n: u32) -> io::Result<()> {
    dest.write_u32::<BigEndian>(n)
}

/// Writes an XDR `unsigned hyper` (big-endian u64).
pub fn u64(dest: &mut impl Write, n: u64) -> io::Result<()> {
    dest.write_u64::<BigEndian>(n)
}

/// Writes an XDR boolean as a u32.
pub fn bool(dest: &mut impl Write, b: bool) -> io::Result<()> {
    u32(dest, b as u32)
}

/// Writes an XDR optional: discriminator, then the value if present.
pub fn option<T, S: Write>(
    dest: &mut S,
    opt: Option<&T>,
    cont: impl FnOnce(&mut S, &T) -> io::Result<()>,
) -> io::Result<()> {
    match opt {
        Some(val) => {
            bool(dest, true)?;
            cont(dest, val)
        }
        None => bool(dest, false),
    }
}

/// Writes a fixed-size opaque including alignment filler.
pub fn array<const N: usize>(dest: &mut impl Write, bytes: &[u8; N]) -> io::Result<()> {
    dest.write_all(bytes)?;
    padding(dest, N)
}

/// Writes a counted opaque: u32 length, bytes, filler.
pub fn opaque(dest: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    let length = bytes
        .len()
        .try_into()
        .map_err(|_| Error::new(ErrorKind::InvalidInput, "opaque length exceeds u32"))?;
    u32(dest, length)?;
    dest.write_all(bytes)?;
    padding(dest, bytes.len())
}

/// Writes a counted opaque with an explicit maximum length check.
pub fn opaque_max(dest: &mut impl Write, bytes: &[u8], limit: usize) -> io::Result<()> {
    if bytes.len() > limit {
        return Err(Error::new(ErrorKind::InvalidInput, "opaque exceeds protocol bound"));
    }
    opaque(dest, bytes)
}

/// Writes an XDR string: UTF-8 bytes as a counted opaque.
pub fn string(dest: &mut impl Write, s: &str) -> io::Result<()> {
    opaque(dest, s.as_bytes())
}

/// Writes an XDR string with an explicit maximum byte length.
pub fn string_max(dest: &mut impl Write, s: &str, limit: usize) -> io::Result<()> {
    opaque_max(dest, s.as_bytes(), limit)
}

/// Writes an XDR enum discriminant as a u32.
pub fn variant<T: ToPrimitive>(dest: &mut impl Write, val: &T) -> io::Result<()> {
    u32(
        dest,
        val.to_u32()
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "discriminant exceeds u32"))?,
    )
}

/// Writes a Rust `usize` as an XDR u32, failing on overflow.
pub fn usize_as_u32(dest: &mut impl Write, n: usize) -> io::Result<()> {
    u32(
        dest,
        n.to_u32().ok_or_else(|| Error::new(ErrorKind::InvalidInput, "length exceeds u32"))?,
    )
}

/// Writes an XDR counted list: u32 count, then the entries.
pub fn list<T, S: Write>(
    dest: &mut S,
    entries: &[T],
    mut entry: impl FnMut(&mut S, &T) -> io::Result<()>,
) -> io::Result<()> {
    usize_as_u32(dest, entries.len())?;
    for item in entries {
        entry(dest, item)?;
    }
    Ok(())
}
