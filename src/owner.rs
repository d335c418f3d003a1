//
// rustar - POSIX ustar archiver
//
// @license GNU General Public License v2.0
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation; either version 2 of the License, or (at your
// option) any later version.

//! uid/gid to name resolution for the uname/gname header fields.
//!
//! Thin wrappers over the reentrant passwd/group lookups. An id with no
//! resolvable name is surfaced as an error, never silently skipped.

use std::ffi::CStr;
use std::mem;
use std::ptr;

use crate::error::{Error, Result};

const INITIAL_BUF: usize = 1024;
const MAX_BUF: usize = 1 << 20;

/// Resolves a uid to its user name.
pub fn user_name(uid: u32) -> Result<String> {
    let mut buf = vec![0u8; INITIAL_BUF];
    loop {
        let mut pwd: libc::passwd = unsafe { mem::zeroed() };
        let mut found: *mut libc::passwd = ptr::null_mut();
        let rc = unsafe {
            libc::getpwuid_r(
                uid,
                &mut pwd,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &mut found,
            )
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUF {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || found.is_null() {
            return Err(Error::UserLookup(uid));
        }
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        return Ok(name.to_string_lossy().into_owned());
    }
}

/// Resolves a gid to its group name.
pub fn group_name(gid: u32) -> Result<String> {
    let mut buf = vec![0u8; INITIAL_BUF];
    loop {
        let mut grp: libc::group = unsafe { mem::zeroed() };
        let mut found: *mut libc::group = ptr::null_mut();
        let rc = unsafe {
            libc::getgrgid_r(
                gid,
                &mut grp,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &mut found,
            )
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUF {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || found.is_null() {
            return Err(Error::GroupLookup(gid));
        }
        let name = unsafe { CStr::from_ptr(grp.gr_name) };
        return Ok(name.to_string_lossy().into_owned());
    }
}
