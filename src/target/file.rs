//! Backing file preparation
//!
//! Deletes, creates and opens the file that will be mapped, then settles on
//! the size to map. Each step is announced through the [`Tracer`] so a step
//! prompt can hold the process between filesystem operations.

use crate::config::workload::CreateMode;
use crate::config::TargetConfig;
use crate::error::MaptrapError;
use crate::util::trace::Tracer;
use crate::Result;
use anyhow::Context;
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// Contents written by [`CreateMode::Write`]
pub const CREATE_MARKER: &[u8] = b"AAAAAAAA";

/// An open read-write file and the number of bytes to map from it
#[derive(Debug)]
pub struct PreparedTarget {
    pub file: File,
    pub size: u64,
}

/// Prepare the target described by `config`
///
/// Without a create mode the file must already exist; its stat size wins
/// unless it is zero (character devices and the like), in which case the
/// configured size is used. With a create mode the configured size is
/// always used.
pub fn prepare_target(config: &TargetConfig, tracer: &Tracer) -> Result<PreparedTarget> {
    let path = config.path.as_path();
    let mut size = config.size;

    let created = match config.create {
        None => {
            let metadata = std::fs::metadata(path)
                .with_context(|| format!("Cannot access {}", path.display()))?;
            if metadata.len() != 0 {
                size = metadata.len();
            }
            None
        }
        Some(mode) => {
            if config.delete_first {
                remove_if_present(path, tracer)?;
            } else if path.symlink_metadata().is_ok() {
                return Err(MaptrapError::config(format!("{} already exists", path.display())).into());
            }

            let file = create(path, mode, config.size, tracer)?;
            match file {
                Some(file) if config.close_after_create => {
                    tracer.step(true, format_args!("close {}", path.display()));
                    drop(file);
                    None
                }
                other => other,
            }
        }
    };

    let mut file = match created {
        Some(file) => file,
        None => {
            tracer.step(true, format_args!("open {}", path.display()));
            OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .with_context(|| format!("Failed to open file: {}", path.display()))?
        }
    };

    if config.read_first {
        let mut word = [0u8; 4];
        match file.read(&mut word) {
            Ok(_) => println!("read() got {:#x}", u32::from_ne_bytes(word)),
            Err(err) => log::error!("read failed: {}", err),
        }
    }

    log::info!("{} prepared, mapping {} bytes (fd {})", path.display(), size, file.as_raw_fd());
    Ok(PreparedTarget { file, size })
}

/// Unlink `path`, treating a missing file as success
fn remove_if_present(path: &Path, tracer: &Tracer) -> Result<()> {
    tracer.step(true, format_args!("unlink {}", path.display()));
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("unlink failed: {}", path.display())),
    }
}

/// Create the file; returns the open handle unless the mode had to close it
fn create(path: &Path, mode: CreateMode, size: u64, tracer: &Tracer) -> Result<Option<File>> {
    match mode {
        CreateMode::Write => {
            tracer.step(
                true,
                format_args!(
                    "create {} containing \"{}\"",
                    path.display(),
                    String::from_utf8_lossy(CREATE_MARKER)
                ),
            );
            let mut file = open_created(path, tracer)?;
            file.write_all(CREATE_MARKER)
                .with_context(|| format!("fill file failed: {}", path.display()))?;
            Ok(Some(file))
        }
        CreateMode::Ftruncate => {
            let file = open_created(path, tracer)?;
            tracer.step(true, format_args!("ftruncate({}, {})", path.display(), size));
            let result = unsafe { libc::ftruncate(file.as_raw_fd(), size as libc::off_t) };
            if result < 0 {
                let err = std::io::Error::last_os_error();
                return Err(err).context(format!(
                    "ftruncate failed: path={}, size={}",
                    path.display(),
                    size
                ));
            }
            Ok(Some(file))
        }
        CreateMode::Truncate => {
            drop(open_created(path, tracer)?);
            tracer.step(true, format_args!("truncate({}, {})", path.display(), size));
            truncate_path(path, size)?;
            Ok(None)
        }
    }
}

fn open_created(path: &Path, tracer: &Tracer) -> Result<File> {
    tracer.step(true, format_args!("open({}, O_CREAT)", path.display()));
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(0o777)
        .open(path)
        .with_context(|| format!("file creation failed: {}", path.display()))
}

/// truncate(2) by path, without holding a descriptor
fn truncate_path(path: &Path, size: u64) -> Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("path contains a NUL byte: {}", path.display()))?;
    let result = unsafe { libc::truncate(c_path.as_ptr(), size as libc::off_t) };
    if result < 0 {
        let err = std::io::Error::last_os_error();
        return Err(err).context(format!(
            "truncate failed: path={}, size={}",
            path.display(),
            size
        ));
    }
    Ok(())
}
