//
// rustar - POSIX ustar archiver
//
// @license GNU General Public License v2.0
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation; either version 2 of the License, or (at your
// option) any later version.

//! Archive listing: decode headers and format them, never touching the
//! filesystem. Content blocks are always seeked past, not read.

use std::io::{Read, Seek, Write};

use crate::error::Result;
use crate::header::{Entry, EntryKind};
use crate::scan::{selected, Scanner};
use crate::Options;

pub fn list<R: Read + Seek, W: Write>(
    archive: &mut R,
    out: &mut W,
    filters: &[String],
    opts: &Options,
) -> Result<()> {
    let mut scanner = Scanner::new(archive, opts.strict);
    while let Some(entry) = scanner.next_entry()? {
        if selected(filters, &entry.path) {
            if opts.verbose {
                writeln!(out, "{}", format_verbose(&entry))?;
            } else {
                writeln!(out, "{}", entry.path)?;
            }
        }
        scanner.skip_content(entry.size)?;
    }
    Ok(())
}

/// One `tar tv`-style line: type marker and rwx bits, owner/group, size,
/// modification time, path, and the link target for symlinks.
fn format_verbose(entry: &Entry) -> String {
    let mut line = format!(
        "{} {:<17} {:>8} {} {}",
        mode_string(entry),
        owner_column(entry),
        entry.size,
        format_time(entry.mtime),
        entry.path,
    );
    if let Some(target) = &entry.link_target {
        line.push_str(" -> ");
        line.push_str(target);
    }
    line
}

/// Type marker plus nine permission characters, derived bit by bit.
fn mode_string(entry: &Entry) -> String {
    let marker = match entry.kind {
        EntryKind::Directory => 'd',
        EntryKind::Symlink => 'l',
        EntryKind::File => '-',
    };
    let mut out = String::with_capacity(10);
    out.push(marker);
    for shift in [6u32, 3, 0] {
        let bits = entry.mode >> shift;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// Resolved names when the header carries them, numeric ids otherwise.
fn owner_column(entry: &Entry) -> String {
    let user = if entry.uname.is_empty() {
        entry.uid.to_string()
    } else {
        entry.uname.clone()
    };
    let group = if entry.gname.is_empty() {
        entry.gid.to_string()
    } else {
        entry.gname.clone()
    };
    format!("{}/{}", user, group)
}

fn format_time(mtime: u64) -> String {
    match chrono::DateTime::from_timestamp(mtime as i64, 0) {
        Some(t) => t.format("%Y-%m-%d %H:%M").to_string(),
        None => "????-??-?? ??:??".into(),
    }
}
