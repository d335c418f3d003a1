//
// rustar - POSIX ustar archiver
//
// @license GNU General Public License v2.0
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation; either version 2 of the License, or (at your
// option) any later version.

//! A POSIX ustar archiver.
//!
//! Three operations over the 512-byte-block tape-archive format:
//! [`create`] packs directory trees into an archive stream, [`list`]
//! enumerates a stream's entries, and [`extract`] reconstructs the tree,
//! including a second pass that repairs directory mtimes disturbed by
//! writing children into them.
//!
//! Each operation is a single synchronous pass (extraction: two) over one
//! exclusively owned stream; any I/O or format error aborts the whole
//! operation with no cleanup of partial output.

pub mod create;
pub mod error;
pub mod extract;
pub mod header;
pub mod list;
pub mod owner;
mod scan;

pub use create::create;
pub use error::{Error, Result};
pub use extract::extract;
pub use header::{Entry, EntryKind, Numeric, BLOCK_SIZE};
pub use list::list;

/// Knobs shared by all three operations.
///
/// `strict` turns numeric-field overflow into an error instead of the
/// base-256 fallback and rejects headers whose version is not `"00"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub verbose: bool,
    pub strict: bool,
}
