//
// rustar - POSIX ustar archiver
//
// @license GNU General Public License v2.0
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation; either version 2 of the License, or (at your
// option) any later version.

//! The ustar header codec.
//!
//! Header block layout (512 bytes):
//! - name:     100 bytes (offset 0)
//! - mode:       8 bytes (offset 100)
//! - uid:        8 bytes (offset 108)
//! - gid:        8 bytes (offset 116)
//! - size:      12 bytes (offset 124)
//! - mtime:     12 bytes (offset 136)
//! - chksum:     8 bytes (offset 148)
//! - typeflag:   1 byte  (offset 156)
//! - linkname: 100 bytes (offset 157)
//! - magic:      6 bytes (offset 257) "ustar\0"
//! - version:    2 bytes (offset 263) "00"
//! - uname:     32 bytes (offset 265)
//! - gname:     32 bytes (offset 297)
//! - devmajor:   8 bytes (offset 329) unused, zero
//! - devminor:   8 bytes (offset 337) unused, zero
//! - prefix:   155 bytes (offset 345)
//! - padding:   12 bytes (offset 500) reserved, zero
//!
//! Numeric fields carry either zero-padded octal ASCII or, when the value
//! exceeds the field's octal capacity, the base-256 "special int" form
//! signaled by the top bit of the field's first byte.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// One archive block; also the unit of padding and the terminator.
pub const BLOCK_SIZE: usize = 512;

pub const NAME_LEN: usize = 100;
pub const LINKNAME_LEN: usize = 100;
pub const PREFIX_LEN: usize = 155;
const UNAME_LEN: usize = 32;
const GNAME_LEN: usize = 32;

const NAME_OFF: usize = 0;
const MODE_OFF: usize = 100;
const UID_OFF: usize = 108;
const GID_OFF: usize = 116;
const SIZE_OFF: usize = 124;
const MTIME_OFF: usize = 136;
const CHKSUM_OFF: usize = 148;
const TYPEFLAG_OFF: usize = 156;
const LINKNAME_OFF: usize = 157;
const MAGIC_OFF: usize = 257;
const VERSION_OFF: usize = 263;
const UNAME_OFF: usize = 265;
const GNAME_OFF: usize = 297;
const PREFIX_OFF: usize = 345;

const REGTYPE: u8 = b'0';
const AREGTYPE: u8 = b'\0';
const SYMTYPE: u8 = b'2';
const DIRTYPE: u8 = b'5';

/// High-bit marker selecting base-256 over octal ASCII in a numeric field.
const SPECIAL_INT_MASK: u8 = 0x80;

/// A raw 512-byte header block.
pub type Block = [u8; BLOCK_SIZE];

// ===================================================================================
// ENTRY MODEL
// ===================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

impl EntryKind {
    fn typeflag(self) -> u8 {
        match self {
            EntryKind::File => REGTYPE,
            EntryKind::Symlink => SYMTYPE,
            EntryKind::Directory => DIRTYPE,
        }
    }

    fn from_typeflag(flag: u8) -> Result<Self> {
        match flag {
            REGTYPE | AREGTYPE => Ok(EntryKind::File),
            SYMTYPE => Ok(EntryKind::Symlink),
            DIRTYPE => Ok(EntryKind::Directory),
            other => Err(Error::InvalidTypeflag(other)),
        }
    }
}

/// The logical unit written to / read from the archive. Header blocks are
/// transient; an `Entry` is all that survives past a single block.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub kind: EntryKind,
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    pub size: u64,
    pub mtime: u64,
    pub link_target: Option<String>,
    pub uname: String,
    pub gname: String,
}

// ===================================================================================
// NUMERIC FIELD CODEC
// ===================================================================================

/// A decoded numeric header field, tagged with the on-disk regime so callers
/// never have to branch on raw bytes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numeric {
    /// Zero-padded octal ASCII.
    Octal(u64),
    /// Base-256: first byte 0x80, remaining bytes big-endian.
    SpecialInt(u64),
}

impl Numeric {
    pub fn value(self) -> u64 {
        match self {
            Numeric::Octal(v) | Numeric::SpecialInt(v) => v,
        }
    }
}

/// Decodes a numeric field, selecting the regime from the first byte's
/// top bit.
pub fn decode_numeric(field: &[u8]) -> Result<Numeric> {
    if field[0] & SPECIAL_INT_MASK != 0 {
        let mut value = u64::from(field[0] & !SPECIAL_INT_MASK);
        for &byte in &field[1..] {
            value = value
                .checked_mul(256)
                .and_then(|v| v.checked_add(u64::from(byte)))
                .ok_or(Error::Corrupt("base-256 field exceeds 64 bits".into()))?;
        }
        Ok(Numeric::SpecialInt(value))
    } else {
        Ok(Numeric::Octal(parse_octal(field)?))
    }
}

/// Encodes `value` into a numeric field: octal ASCII when it fits the
/// field's digit capacity, otherwise base-256 (or `FieldOverflow` under
/// strict mode).
fn encode_numeric(field: &mut [u8], name: &'static str, value: u64, strict: bool) -> Result<()> {
    let digits = field.len() - 1;
    let capacity = (1u64 << (3 * digits)) - 1;
    if value <= capacity {
        let text = format!("{:0width$o}", value, width = digits);
        field[..digits].copy_from_slice(text.as_bytes());
        field[digits] = 0;
        return Ok(());
    }
    if strict {
        return Err(Error::FieldOverflow(name));
    }
    // Base-256 fallback: marker byte, then the value big-endian.
    field.fill(0);
    field[0] = SPECIAL_INT_MASK;
    let payload = field.len() - 1;
    if payload >= 8 {
        let start = field.len() - 8;
        BigEndian::write_u64(&mut field[start..], value);
    } else {
        if value >> (8 * payload) != 0 {
            return Err(Error::FieldOverflow(name));
        }
        BigEndian::write_uint(&mut field[1..], value, payload);
    }
    Ok(())
}

/// Parses octal ASCII, tolerating leading spaces and a NUL or space
/// terminator. An empty field decodes to zero.
fn parse_octal(field: &[u8]) -> Result<u64> {
    let start = field.iter().position(|&b| b != b' ').unwrap_or(field.len());
    let rest = &field[start..];
    let end = rest
        .iter()
        .position(|&b| b == 0 || b == b' ')
        .unwrap_or(rest.len());
    let digits = &rest[..end];
    if digits.is_empty() {
        return Ok(0);
    }
    let mut value: u64 = 0;
    for &byte in digits {
        if !(b'0'..=b'7').contains(&byte) {
            return Err(Error::Corrupt(format!(
                "invalid octal digit {:#04x} in header field",
                byte
            )));
        }
        value = value
            .checked_mul(8)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or(Error::Corrupt("octal field exceeds 64 bits".into()))?;
    }
    Ok(value)
}

// ===================================================================================
// PATH CODEC
// ===================================================================================

/// Splits a path into the `(name, prefix)` storage pair.
///
/// Paths of 100 bytes or less go entirely into `name`. Longer paths are
/// spliced at the first `/` found scanning forward from `len - 101`, so
/// `name` is the longest suffix that fits and begins right after a slash;
/// the remainder goes to `prefix`, truncated to 155 bytes. No slash in
/// that window means the path cannot be stored at all.
pub fn split_path(path: &[u8]) -> Result<(&[u8], &[u8])> {
    if path.len() <= NAME_LEN {
        return Ok((path, &[]));
    }
    let window_start = path.len() - NAME_LEN - 1;
    let slash = path[window_start..]
        .iter()
        .position(|&b| b == b'/')
        .map(|i| window_start + i)
        .ok_or_else(|| Error::PathTooLong(String::from_utf8_lossy(path).into_owned()))?;
    let name = &path[slash + 1..];
    let prefix = &path[..slash];
    let prefix = &prefix[..prefix.len().min(PREFIX_LEN)];
    Ok((name, prefix))
}

/// Rejoins the stored `(name, prefix)` pair into an extraction target path.
/// The leading `./` normalizes the result to a safe relative path no
/// matter what was stored.
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        format!("./{}", name)
    } else {
        format!("./{}/{}", prefix, name)
    }
}

// ===================================================================================
// HEADER ENCODE / DECODE
// ===================================================================================

/// True for an all-zero block, the building unit of the archive terminator.
pub fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|&b| b == 0)
}

/// Simple sum of all 512 octets with the chksum field counted as eight
/// ASCII spaces. Encode and decode must agree byte for byte on this rule.
fn compute_checksum(block: &Block) -> u32 {
    let mut sum: u32 = 0;
    for (i, &byte) in block.iter().enumerate() {
        if (CHKSUM_OFF..CHKSUM_OFF + 8).contains(&i) {
            sum += u32::from(b' ');
        } else {
            sum += u32::from(byte);
        }
    }
    sum
}

fn put_bytes(block: &mut Block, offset: usize, len: usize, value: &[u8]) {
    let n = value.len().min(len);
    block[offset..offset + n].copy_from_slice(&value[..n]);
}

/// Reads a fixed-length field as bytes up to the first NUL. The field is
/// not guaranteed to be NUL-terminated, so the full length is the bound.
fn field_str(block: &Block, offset: usize, len: usize) -> String {
    let field = &block[offset..offset + len];
    let end = field.iter().position(|&b| b == 0).unwrap_or(len);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Encodes one entry's metadata into a header block.
///
/// Directories and symlinks always serialize `size` and carry no content;
/// mtime of 0-size entries is still the real mtime. The checksum is
/// computed last, over the fully populated block.
pub fn encode(entry: &Entry, strict: bool) -> Result<Block> {
    let mut block: Block = [0; BLOCK_SIZE];

    let (name, prefix) = split_path(entry.path.as_bytes())?;
    put_bytes(&mut block, NAME_OFF, NAME_LEN, name);
    put_bytes(&mut block, PREFIX_OFF, PREFIX_LEN, prefix);

    encode_numeric(&mut block[MODE_OFF..MODE_OFF + 8], "mode", u64::from(entry.mode), strict)?;
    encode_numeric(&mut block[UID_OFF..UID_OFF + 8], "uid", entry.uid, strict)?;
    encode_numeric(&mut block[GID_OFF..GID_OFF + 8], "gid", entry.gid, strict)?;

    let size = match entry.kind {
        EntryKind::File => entry.size,
        EntryKind::Directory | EntryKind::Symlink => 0,
    };
    encode_numeric(&mut block[SIZE_OFF..SIZE_OFF + 12], "size", size, strict)?;
    encode_numeric(&mut block[MTIME_OFF..MTIME_OFF + 12], "mtime", entry.mtime, strict)?;

    block[TYPEFLAG_OFF] = entry.kind.typeflag();

    if let Some(target) = &entry.link_target {
        if target.len() > LINKNAME_LEN {
            return Err(Error::LinkTargetTooLong(target.clone()));
        }
        put_bytes(&mut block, LINKNAME_OFF, LINKNAME_LEN, target.as_bytes());
    }

    put_bytes(&mut block, MAGIC_OFF, 6, b"ustar\0");
    put_bytes(&mut block, VERSION_OFF, 2, b"00");
    put_bytes(&mut block, UNAME_OFF, UNAME_LEN, entry.uname.as_bytes());
    put_bytes(&mut block, GNAME_OFF, GNAME_LEN, entry.gname.as_bytes());
    // devmajor/devminor stay zero-filled: device nodes are not archived.

    let checksum = compute_checksum(&block);
    let chk = format!("{:06o}\0 ", checksum);
    block[CHKSUM_OFF..CHKSUM_OFF + 8].copy_from_slice(chk.as_bytes());

    Ok(block)
}

/// Decodes a header block back into an entry.
///
/// The caller is expected to have screened out terminator blocks with
/// [`is_zero_block`] first; a zero block fed here fails the magic check.
pub fn decode(block: &Block, strict: bool) -> Result<Entry> {
    let stored = parse_octal(&block[CHKSUM_OFF..CHKSUM_OFF + 8])? as u32;
    let computed = compute_checksum(block);
    if stored != computed {
        return Err(Error::ChecksumMismatch { stored, computed });
    }

    if &block[MAGIC_OFF..MAGIC_OFF + 5] != b"ustar" {
        return Err(Error::BadMagic);
    }
    if strict && &block[VERSION_OFF..VERSION_OFF + 2] != b"00" {
        return Err(Error::BadVersion);
    }

    let kind = EntryKind::from_typeflag(block[TYPEFLAG_OFF])?;

    let name = field_str(block, NAME_OFF, NAME_LEN);
    let prefix = field_str(block, PREFIX_OFF, PREFIX_LEN);
    let path = if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    };

    let mode = decode_numeric(&block[MODE_OFF..MODE_OFF + 8])?.value() as u32;
    let uid = decode_numeric(&block[UID_OFF..UID_OFF + 8])?.value();
    let gid = decode_numeric(&block[GID_OFF..GID_OFF + 8])?.value();
    let size = decode_numeric(&block[SIZE_OFF..SIZE_OFF + 12])?.value();
    let mtime = decode_numeric(&block[MTIME_OFF..MTIME_OFF + 12])?.value();

    let link_target = match kind {
        EntryKind::Symlink => Some(field_str(block, LINKNAME_OFF, LINKNAME_LEN)),
        _ => None,
    };

    Ok(Entry {
        path,
        kind,
        mode,
        uid,
        gid,
        size,
        mtime,
        link_target,
        uname: field_str(block, UNAME_OFF, UNAME_LEN),
        gname: field_str(block, GNAME_OFF, GNAME_LEN),
    })
}

/// Content blocks needed for `size` bytes, padding included.
pub fn padded_size(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64) * BLOCK_SIZE as u64
}

// ===================================================================================
// TESTS
// ===================================================================================
