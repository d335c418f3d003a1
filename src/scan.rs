//
// rustar - POSIX ustar archiver
//
// @license GNU General Public License v2.0
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation; either version 2 of the License, or (at your
// option) any later version.

//! Sequential block scanning shared by extraction and listing.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::header::{self, Entry, BLOCK_SIZE};

/// Walks an archive stream one header block at a time.
///
/// `next_entry` handles terminator detection: end of archive is exactly two
/// consecutive zero blocks with nothing after them. A lone zero block, a
/// truncated stream, or trailing bytes all count as corruption.
pub(crate) struct Scanner<'a, R: Read + Seek> {
    reader: &'a mut R,
    strict: bool,
}

impl<'a, R: Read + Seek> Scanner<'a, R> {
    pub fn new(reader: &'a mut R, strict: bool) -> Self {
        Scanner { reader, strict }
    }

    /// Returns the next entry, or `None` on a well-formed terminator.
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        let mut block = [0u8; BLOCK_SIZE];
        read_block(self.reader, &mut block)?;

        if !header::is_zero_block(&block) {
            return header::decode(&block, self.strict).map(Some);
        }

        read_block(self.reader, &mut block)?;
        if !header::is_zero_block(&block) {
            return Err(Error::Corrupt(
                "zero block followed by a non-zero block".into(),
            ));
        }

        // Strictly nothing may follow the two-block terminator.
        let mut residue = [0u8; 1];
        if self.reader.read(&mut residue)? != 0 {
            return Err(Error::Corrupt("trailing data after terminator".into()));
        }
        Ok(None)
    }

    /// Seeks past an entry's content blocks, padding included.
    pub fn skip_content(&mut self, size: u64) -> Result<()> {
        let padded = header::padded_size(size);
        if padded > 0 {
            self.reader.seek(SeekFrom::Current(padded as i64))?;
        }
        Ok(())
    }

    /// Copies exactly `size` content bytes to `out`, then seeks past the
    /// zero padding up to the next block boundary.
    pub fn copy_content<W: Write>(&mut self, out: &mut W, size: u64) -> Result<()> {
        let copied = std::io::copy(&mut self.reader.by_ref().take(size), out)?;
        if copied != size {
            return Err(Error::Corrupt("truncated file content".into()));
        }
        let pad = header::padded_size(size) - size;
        if pad > 0 {
            self.reader.seek(SeekFrom::Current(pad as i64))?;
        }
        Ok(())
    }
}

fn read_block<R: Read>(reader: &mut R, block: &mut [u8; BLOCK_SIZE]) -> Result<()> {
    reader.read_exact(block).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Corrupt("unexpected end of archive".into())
        } else {
            Error::Io(e)
        }
    })
}

/// True when `path` is selected by the caller-supplied prefix filters.
/// An empty filter list selects everything.
pub(crate) fn selected(filters: &[String], path: &str) -> bool {
    if filters.is_empty() {
        return true;
    }
    let path = path.trim_start_matches("./");
    filters
        .iter()
        .any(|f| path.starts_with(f.trim_start_matches("./")))
}
