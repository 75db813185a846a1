// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Assembles sparse VM disk images from a declarative [`DiskSpec`], then
//! carries them through the loopback-mapping, filesystem-formatting, and
//! mount/umount lifecycle a populated image needs before it's finalized.
//!
//! [`DiskAssembler`] owns one disk: it builds the partition table with
//! [`imgpart_io`], writes the sparse image file, and drives `kpartx`,
//! `mkfs`, `mount`, and `umount` through the [`external`] adapter.
//! [`DiskSet`] fans the same lifecycle out across several named disks
//! while keeping mount/umount ordering consistent across the whole set.
//!
//! This crate never parses a config file or owns a subvolume's contents;
//! callers build a [`DiskSpec`] however they like (YAML, a CLI, tests)
//! and hand it to [`DiskAssembler::new`].

#![warn(missing_docs)]
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod disk;
mod disk_set;
pub mod error;
pub mod external;
mod loopback;
pub mod spec;

pub use disk::DiskAssembler;
pub use disk_set::DiskSet;
pub use error::ImgDiskError;
pub use external::{CommandRunner, ProcessRunner};
pub use loopback::LoopMapping;
pub use spec::{DiskSpec, FsCode, PartitionFlag, PartitionSpec, TableLabel};
