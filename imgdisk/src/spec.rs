// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Declarative description of one or more disks: partition table type and
//! the partitions it should contain. Produced by a config loader outside
//! this crate; consumed by [`crate::DiskAssembler::new`].

use imgpart_types::PartitionCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Either a raw legacy MBR type byte or a partition-type catalog short
/// name such as `"linux/filesystem"` or `"esp"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FsCode {
    /// A catalog short name, resolved through
    /// [`imgpart_types::CATALOG`] at partition-registration time.
    Name(String),
    /// A raw MBR partition type byte.
    Byte(u8),
}

impl FsCode {
    /// View this code as the [`PartitionCode`] the partition-table
    /// builders expect.
    #[must_use]
    pub fn as_partition_code(&self) -> PartitionCode<'_> {
        match self {
            Self::Name(name) => PartitionCode::Name(name),
            Self::Byte(byte) => PartitionCode::Byte(*byte),
        }
    }

    /// The string used as the `mkfs -t` filesystem argument at format
    /// time. A raw byte code has no filesystem name, so it renders as
    /// its hex form; such a partition can't sensibly be auto-formatted
    /// and [`crate::DiskAssembler::format`] will pass this straight to
    /// `mkfs`, which will reject it.
    #[must_use]
    pub fn as_mkfs_arg(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Byte(byte) => format!("{byte:#04x}"),
        }
    }
}

/// A recognized partition flag. Only `bootable` has defined semantics;
/// unrecognized tokens are the config loader's concern, not this crate's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionFlag {
    /// Mark the partition bootable in the legacy MBR. Ignored by GPT.
    Bootable,
}

/// One partition within a [`DiskSpec`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartitionSpec {
    /// Partition size in MiB.
    pub size_mib: u64,
    /// Filesystem type, also used as the default partition-table code.
    pub fs_code: FsCode,
    /// Overrides `fs_code` for the partition-table entry, if present.
    #[serde(default)]
    pub partcode: Option<FsCode>,
    /// GPT partition name (ignored by MBR).
    #[serde(default)]
    pub name: Option<String>,
    /// Filesystem label, used only when formatting.
    #[serde(default)]
    pub label: Option<String>,
    /// Absolute POSIX mount path.
    #[serde(default)]
    pub mount: Option<String>,
    /// Recognized partition flags.
    #[serde(default)]
    pub flags: Vec<PartitionFlag>,
}

impl PartitionSpec {
    /// The code to register in the partition table: `partcode` if set,
    /// otherwise `fs_code`.
    #[must_use]
    pub fn table_code(&self) -> &FsCode {
        self.partcode.as_ref().unwrap_or(&self.fs_code)
    }

    /// Whether the `bootable` flag is set.
    #[must_use]
    pub fn is_bootable(&self) -> bool {
        self.flags.contains(&PartitionFlag::Bootable)
    }
}

/// Which partition table type a disk uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableLabel {
    /// Legacy MBR, up to 4 partitions.
    Mbr,
    /// GUID Partition Table, up to 128 partitions.
    Gpt,
}

/// A declarative description of a single disk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiskSpec {
    /// Which partition table type to build.
    pub label: TableLabel,
    /// Partitions keyed by their 1-based index.
    pub partitions: BTreeMap<usize, PartitionSpec>,
}
