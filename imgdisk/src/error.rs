// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error type for disk assembly, formatting, and mount lifecycle
//! failures.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// A child process exited with a non-zero status.
#[derive(Debug, Error)]
#[error("`{}` failed with {status}", argv.join(" "))]
pub struct ExternalToolFailed {
    /// The full argv, in the order passed to the process.
    pub argv: Vec<String>,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// The process's exit status.
    pub status: ExitStatus,
}

/// Failure modes for assembling, formatting, and mounting a disk.
#[derive(Debug, Error)]
pub enum ImgDiskError {
    /// Building the in-memory partition table failed.
    #[error(transparent)]
    PartitionTable(#[from] imgpart_io::PartitionTableError),

    /// A `kpartx`/`mkfs`/`mount`/`umount` invocation exited non-zero.
    #[error(transparent)]
    ExternalToolFailed(#[from] ExternalToolFailed),

    /// A file or directory operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path the failing operation was acting on.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// `mount`/`umount` was asked for a path this disk doesn't know
    /// about.
    #[error("mount path {0:?} is not registered on this disk")]
    UnknownMountPath(String),

    /// A mount was attempted before the partition's loop device mapping
    /// existed.
    #[error("partition {0} has no loop device mapping")]
    NotMapped(usize),
}
