//
// rustar - POSIX ustar archiver
//
// @license GNU General Public License v2.0
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation; either version 2 of the License, or (at your
// option) any later version.

//! End-to-end archive tests: create a real tree, archive it, then list and
//! extract the stream.

use std::fs;
use std::io::Cursor;
use std::os::unix::fs::symlink;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use filetime::FileTime;
use tempfile::tempdir;

use rustar::{create, extract, list, Error, Options, BLOCK_SIZE};

const FILE_MTIME: i64 = 1_600_000_000;
const DIR_MTIME: i64 = 1_600_000_100;
const ROOT_MTIME: i64 = 1_600_000_200;

/// Builds the scenario tree: `a/b.txt` (17 bytes), `a/c/` and the symlink
/// `a/d -> b.txt`, with pinned mtimes.
fn build_tree(base: &Path) {
    let root = base.join("a");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("b.txt"), b"seventeen bytes!\n").unwrap();
    fs::create_dir(root.join("c")).unwrap();
    symlink("b.txt", root.join("d")).unwrap();

    let zero = FileTime::from_unix_time(FILE_MTIME, 0);
    filetime::set_file_times(root.join("b.txt"), zero, zero).unwrap();
    let dir_time = FileTime::from_unix_time(DIR_MTIME, 0);
    filetime::set_file_times(root.join("c"), dir_time, dir_time).unwrap();
    let link_time = FileTime::from_unix_time(FILE_MTIME, 0);
    filetime::set_symlink_file_times(root.join("d"), link_time, link_time).unwrap();
    // Root last: creating children above disturbed its mtime.
    let root_time = FileTime::from_unix_time(ROOT_MTIME, 0);
    filetime::set_file_times(&root, root_time, root_time).unwrap();
}

fn archive_tree(base: &Path) -> Vec<u8> {
    let mut out = Vec::new();
    create(&[base.join("a")], &mut out, &Options::default()).unwrap();
    out
}

fn list_lines(archive: &[u8], filters: &[String], verbose: bool) -> Vec<String> {
    let mut stream = Cursor::new(archive.to_vec());
    let mut out = Vec::new();
    let opts = Options {
        verbose,
        strict: false,
    };
    list(&mut stream, &mut out, filters, &opts).unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn archive_is_block_aligned_and_terminated() {
    let src = tempdir().unwrap();
    build_tree(src.path());
    let archive = archive_tree(src.path());

    assert_eq!(archive.len() % BLOCK_SIZE, 0);
    // 4 entry headers + 1 content block + 2 terminator blocks.
    assert_eq!(archive.len(), 7 * BLOCK_SIZE);
    assert!(archive[archive.len() - 2 * BLOCK_SIZE..]
        .iter()
        .all(|&b| b == 0));
}

#[test]
fn default_listing_shows_every_path() {
    let src = tempdir().unwrap();
    build_tree(src.path());
    let archive = archive_tree(src.path());

    let lines = list_lines(&archive, &[], false);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "a/");
    assert!(lines.contains(&"a/b.txt".to_string()));
    assert!(lines.contains(&"a/c/".to_string()));
    assert!(lines.contains(&"a/d".to_string()));
}

#[test]
fn verbose_listing_reports_type_size_and_target() {
    let src = tempdir().unwrap();
    build_tree(src.path());
    let archive = archive_tree(src.path());

    let lines = list_lines(&archive, &[], true);
    assert_eq!(lines.len(), 4);

    let file_line = lines.iter().find(|l| l.contains("a/b.txt")).unwrap();
    assert!(file_line.starts_with('-'));
    assert!(file_line.contains(" 17 "));

    let dir_line = lines.iter().find(|l| l.contains("a/c/")).unwrap();
    assert!(dir_line.starts_with('d'));
    assert!(dir_line.contains(" 0 "));

    let link_line = lines.iter().find(|l| l.contains("a/d")).unwrap();
    assert!(link_line.starts_with('l'));
    assert!(link_line.ends_with("a/d -> b.txt"));
}

#[test]
fn extraction_reproduces_the_tree() {
    let src = tempdir().unwrap();
    build_tree(src.path());
    let archive = archive_tree(src.path());

    let dest = tempdir().unwrap();
    let mut stream = Cursor::new(archive);
    extract(&mut stream, dest.path(), &[], &Options::default()).unwrap();

    let out_root = dest.path().join("a");
    assert_eq!(
        fs::read(out_root.join("b.txt")).unwrap(),
        b"seventeen bytes!\n"
    );
    assert!(out_root.join("c").is_dir());
    assert_eq!(
        fs::read_link(out_root.join("d")).unwrap(),
        Path::new("b.txt")
    );
    // The symlink resolves through its parent directory.
    assert_eq!(
        fs::read(out_root.join("d")).unwrap(),
        b"seventeen bytes!\n"
    );
}

#[test]
fn extraction_restores_mtimes_including_directories() {
    let src = tempdir().unwrap();
    build_tree(src.path());
    let archive = archive_tree(src.path());

    let dest = tempdir().unwrap();
    let mut stream = Cursor::new(archive);
    extract(&mut stream, dest.path(), &[], &Options::default()).unwrap();

    let out_root = dest.path().join("a");
    assert_eq!(
        fs::metadata(out_root.join("b.txt")).unwrap().mtime(),
        FILE_MTIME
    );
    assert_eq!(fs::metadata(out_root.join("c")).unwrap().mtime(), DIR_MTIME);
    // Pass 2 repairs the root's mtime after children were written into it.
    assert_eq!(fs::metadata(&out_root).unwrap().mtime(), ROOT_MTIME);
    assert_eq!(
        fs::symlink_metadata(out_root.join("d")).unwrap().mtime(),
        FILE_MTIME
    );
}

#[test]
fn extraction_mode_policy_applies() {
    let src = tempdir().unwrap();
    build_tree(src.path());
    let exe = src.path().join("a").join("run.sh");
    fs::write(&exe, b"#!/bin/sh\n").unwrap();
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(&exe, fs::Permissions::from_mode(0o750)).unwrap();
    let archive = archive_tree(src.path());

    let dest = tempdir().unwrap();
    let mut stream = Cursor::new(archive);
    extract(&mut stream, dest.path(), &[], &Options::default()).unwrap();

    let mode = fs::metadata(dest.path().join("a/run.sh")).unwrap().mode() & 0o777;
    // 0o750 | rw-for-all | x-for-all (an x bit was set).
    assert_eq!(mode, 0o777);
    let plain = fs::metadata(dest.path().join("a/b.txt")).unwrap().mode() & 0o777;
    assert_eq!(plain, 0o666);
}

#[test]
fn path_filters_select_a_subtree() {
    let src = tempdir().unwrap();
    build_tree(src.path());
    let archive = archive_tree(src.path());

    let filters = vec!["a/c".to_string()];
    let lines = list_lines(&archive, &filters, false);
    assert_eq!(lines, vec!["a/c/".to_string()]);

    let dest = tempdir().unwrap();
    let mut stream = Cursor::new(archive);
    extract(&mut stream, dest.path(), &filters, &Options::default()).unwrap();
    assert!(dest.path().join("a/c").is_dir());
    assert!(!dest.path().join("a/b.txt").exists());
    assert!(!dest.path().join("a/d").exists());
}

#[test]
fn two_zero_blocks_are_a_valid_empty_archive() {
    let empty = vec![0u8; BLOCK_SIZE * 2];

    let mut out = Vec::new();
    let mut stream = Cursor::new(empty.clone());
    list(&mut stream, &mut out, &[], &Options::default()).unwrap();
    assert!(out.is_empty());

    let dest = tempdir().unwrap();
    let mut stream = Cursor::new(empty);
    extract(&mut stream, dest.path(), &[], &Options::default()).unwrap();
    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
}

#[test]
fn zero_block_then_garbage_is_corrupt() {
    let mut data = vec![0u8; BLOCK_SIZE * 2];
    data[BLOCK_SIZE + 5] = b'z';
    let mut out = Vec::new();
    let mut stream = Cursor::new(data);
    let err = list(&mut stream, &mut out, &[], &Options::default()).unwrap_err();
    assert!(matches!(err, Error::Corrupt(_)));
}

#[test]
fn trailing_garbage_after_terminator_is_corrupt() {
    let src = tempdir().unwrap();
    build_tree(src.path());
    let mut archive = archive_tree(src.path());
    archive.push(b'!');

    let mut out = Vec::new();
    let mut stream = Cursor::new(archive);
    let err = list(&mut stream, &mut out, &[], &Options::default()).unwrap_err();
    assert!(matches!(err, Error::Corrupt(_)));
}

#[test]
fn corrupted_header_byte_fails_the_checksum() {
    let src = tempdir().unwrap();
    build_tree(src.path());
    let mut archive = archive_tree(src.path());
    archive[0] ^= 0xff;

    let mut out = Vec::new();
    let mut stream = Cursor::new(archive);
    let err = list(&mut stream, &mut out, &[], &Options::default()).unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));
}
