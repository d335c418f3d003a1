//
// rustar - POSIX ustar archiver
//
// @license GNU General Public License v2.0
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation; either version 2 of the License, or (at your
// option) any later version.

//! Archive creation: directory walk to header + content blocks.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use walkdir::WalkDir;

use crate::error::Result;
use crate::header::{self, Entry, EntryKind, BLOCK_SIZE};
use crate::owner;
use crate::Options;

/// Archives every root in order, then appends the two-zero-block
/// terminator. Any failure aborts the run; a partially written archive is
/// not rolled back.
pub fn create<W: Write, P: AsRef<Path>>(roots: &[P], out: &mut W, opts: &Options) -> Result<()> {
    let mut archiver = Archiver {
        out,
        opts,
        users: HashMap::new(),
        groups: HashMap::new(),
    };
    for root in roots {
        archiver.archive_root(root.as_ref())?;
    }
    log::debug!("all roots archived, writing terminator");
    archiver.out.write_all(&[0u8; BLOCK_SIZE])?;
    archiver.out.write_all(&[0u8; BLOCK_SIZE])?;
    archiver.out.flush()?;
    Ok(())
}

struct Archiver<'a, W: Write> {
    out: &'a mut W,
    opts: &'a Options,
    // uname/gname resolutions, cached for the run.
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
}

impl<W: Write> Archiver<'_, W> {
    /// Walks one root depth-first, parent directories before their
    /// children. The walk is iterative, so tree depth is bounded by the
    /// walker, not the call stack. Symlinks are never followed.
    fn archive_root(&mut self, root: &Path) -> Result<()> {
        // Entry paths are stored relative to the root's parent, so the
        // archive names start at the root itself.
        let base = root.parent().unwrap_or(root);
        for step in WalkDir::new(root).follow_links(false) {
            let dir_entry = step.map_err(std::io::Error::from)?;
            let rel = dir_entry
                .path()
                .strip_prefix(base)
                .unwrap_or(dir_entry.path());
            self.archive_one(dir_entry.path(), rel)?;
        }
        Ok(())
    }

    fn archive_one(&mut self, full: &Path, rel: &Path) -> Result<()> {
        let meta = std::fs::symlink_metadata(full)?;
        let file_type = meta.file_type();

        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            // FIFOs, sockets and device nodes have no typeflag here.
            log::warn!("skipping unsupported file type: {}", full.display());
            return Ok(());
        };

        let mut path = rel.to_string_lossy().into_owned();
        if kind == EntryKind::Directory && !path.ends_with('/') {
            path.push('/');
        }

        if self.opts.verbose {
            println!("{}", path);
        }

        let link_target = match kind {
            EntryKind::Symlink => Some(
                std::fs::read_link(full)?
                    .to_string_lossy()
                    .into_owned(),
            ),
            _ => None,
        };

        let uid = meta.uid();
        let gid = meta.gid();
        let entry = Entry {
            path,
            kind,
            mode: meta.permissions().mode() & 0o7777,
            uid: u64::from(uid),
            gid: u64::from(gid),
            size: meta.len(),
            mtime: meta.mtime().max(0) as u64,
            link_target,
            uname: self.resolve_user(uid)?,
            gname: self.resolve_group(gid)?,
        };

        let block = header::encode(&entry, self.opts.strict)?;
        self.out.write_all(&block)?;

        if kind == EntryKind::File {
            self.write_content(full, entry.size)?;
        }
        Ok(())
    }

    /// Copies exactly `size` bytes in 512-byte blocks, the last one padded
    /// with zeros. The tail is re-zeroed on every short block so stale
    /// buffer bytes never reach the archive.
    fn write_content(&mut self, path: &Path, size: u64) -> Result<()> {
        let mut file = File::open(path)?;
        let mut remaining = size;
        let mut buf = [0u8; BLOCK_SIZE];
        while remaining > 0 {
            let want = remaining.min(BLOCK_SIZE as u64) as usize;
            file.read_exact(&mut buf[..want])?;
            if want < BLOCK_SIZE {
                buf[want..].fill(0);
            }
            self.out.write_all(&buf)?;
            remaining -= want as u64;
        }
        Ok(())
    }

    fn resolve_user(&mut self, uid: u32) -> Result<String> {
        if let Some(name) = self.users.get(&uid) {
            return Ok(name.clone());
        }
        let name = owner::user_name(uid)?;
        self.users.insert(uid, name.clone());
        Ok(name)
    }

    fn resolve_group(&mut self, gid: u32) -> Result<String> {
        if let Some(name) = self.groups.get(&gid) {
            return Ok(name.clone());
        }
        let name = owner::group_name(gid)?;
        self.groups.insert(gid, name.clone());
        Ok(name)
    }
}
