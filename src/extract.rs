//
// rustar - POSIX ustar archiver
//
// @license GNU General Public License v2.0
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation; either version 2 of the License, or (at your
// option) any later version.

//! Archive extraction: filesystem reconstruction in two passes.
//!
//! Pass 1 materializes every selected entry and restores its mode and
//! mtime. Writing a file into a directory bumps that directory's mtime,
//! so pass 2 rescans the archive and re-applies the header mtime of every
//! directory entry. The second pass is an ordering guarantee, not an
//! optimization; it must not be folded into the first.

use std::fs;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::os::unix::fs::{symlink, DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use filetime::FileTime;

use crate::error::Result;
use crate::header::{self, Entry, EntryKind};
use crate::scan::{selected, Scanner};
use crate::Options;

/// Extracts the archive under `dest`, honoring the path-prefix filters.
pub fn extract<R: Read + Seek>(
    archive: &mut R,
    dest: &Path,
    filters: &[String],
    opts: &Options,
) -> Result<()> {
    materialize(archive, dest, filters, opts)?;
    log::debug!("pass 1 complete, rescanning for directory mtimes");
    archive.seek(SeekFrom::Start(0))?;
    fix_directory_mtimes(archive, dest, filters, opts)
}

/// Pass 1: create filesystem objects for each selected entry.
fn materialize<R: Read + Seek>(
    archive: &mut R,
    dest: &Path,
    filters: &[String],
    opts: &Options,
) -> Result<()> {
    let mut scanner = Scanner::new(archive, opts.strict);
    while let Some(entry) = scanner.next_entry()? {
        if !selected(filters, &entry.path) {
            scanner.skip_content(entry.size)?;
            continue;
        }
        if opts.verbose {
            println!("{}", entry.path);
        }

        let target = target_path(dest, &entry.path);
        if let Some(parent) = target.parent() {
            // Ancestors are created regardless of whether the archive
            // carries their own directory entries.
            fs::create_dir_all(parent)?;
        }

        match entry.kind {
            EntryKind::File => {
                let mode = materialize_mode(entry.mode);
                let mut file = fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .mode(mode)
                    .open(&target)?;
                scanner.copy_content(&mut file, entry.size)?;
                // The open(2) mode is masked by the umask; chmod afterwards
                // so the policy mode lands exactly.
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
            }
            EntryKind::Symlink => {
                let link = entry.link_target.as_deref().unwrap_or("");
                match symlink(link, &target) {
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                    other => other?,
                }
            }
            EntryKind::Directory => {
                let mode = materialize_mode(entry.mode);
                match fs::DirBuilder::new().mode(mode).create(&target) {
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                    other => other?,
                }
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
            }
        }

        restore_mtime(&target, &entry)?;
    }
    Ok(())
}

/// Pass 2: re-apply directory mtimes disturbed by pass 1's writes.
fn fix_directory_mtimes<R: Read + Seek>(
    archive: &mut R,
    dest: &Path,
    filters: &[String],
    opts: &Options,
) -> Result<()> {
    let mut scanner = Scanner::new(archive, opts.strict);
    while let Some(entry) = scanner.next_entry()? {
        if entry.kind == EntryKind::Directory && selected(filters, &entry.path) {
            restore_mtime(&target_path(dest, &entry.path), &entry)?;
        }
        scanner.skip_content(entry.size)?;
    }
    Ok(())
}

/// Resolves the stored path under `dest`. `stored` is already
/// prefix-merged, so joining with an empty prefix just applies the `./`
/// normalization that keeps the result relative even when the stored
/// path begins with a slash.
fn target_path(dest: &Path, stored: &str) -> PathBuf {
    dest.join(header::join_path("", stored))
}

/// Extraction modes always grant read and write to every class, and
/// execute to every class exactly when the header mode has any x bit.
fn materialize_mode(mode: u32) -> u32 {
    let mut out = mode | 0o666;
    if mode & 0o111 != 0 {
        out |= 0o111;
    }
    out
}

/// Preserves the object's current atime (fresh stat) and sets mtime to
/// the header value. Symlink entries are touched without following the
/// link.
fn restore_mtime(target: &Path, entry: &Entry) -> Result<()> {
    let meta = fs::symlink_metadata(target)?;
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_unix_time(entry.mtime as i64, 0);
    if entry.kind == EntryKind::Symlink {
        filetime::set_symlink_file_times(target, atime, mtime)?;
    } else {
        filetime::set_file_times(target, atime, mtime)?;
    }
    Ok(())
}
