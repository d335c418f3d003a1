//
// rustar - POSIX ustar archiver
//
// @license GNU General Public License v2.0
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation; either version 2 of the License, or (at your
// option) any later version.

use std::io;

/// Errors surfaced by the archiver core.
///
/// Every kind is fatal for the operation that raised it; there is no
/// partial-failure recovery. `AlreadyExists` on directory/symlink creation
/// during extraction is filtered out before it ever becomes an `Error`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("header checksum mismatch: stored {stored:#o}, computed {computed:#o}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("bad magic: not a ustar header")]
    BadMagic,

    #[error("unsupported ustar version")]
    BadVersion,

    #[error("numeric value does not fit header field `{0}`")]
    FieldOverflow(&'static str),

    #[error("path too long to splice into name/prefix: {0}")]
    PathTooLong(String),

    #[error("symlink target too long for linkname field: {0}")]
    LinkTargetTooLong(String),

    #[error("no user name for uid {0}")]
    UserLookup(u32),

    #[error("no group name for gid {0}")]
    GroupLookup(u32),

    #[error("invalid typeflag {0:#04x}")]
    InvalidTypeflag(u8),

    #[error("corrupt archive: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
