// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A single disk: owns a partition-table builder, the sparse image file
//! it writes to, and (while mapped) a loop-device mapping and mount
//! table.

use crate::error::ImgDiskError;
use crate::external::{self, CommandRunner};
use crate::loopback::{LoopMapping, LoopbackScope};
use crate::spec::{DiskSpec, PartitionSpec, TableLabel};
use imgpart_io::{GptBuilder, MbrBuilder};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

enum PartitionTable {
    Mbr(MbrBuilder),
    Gpt(GptBuilder),
}

impl PartitionTable {
    fn disk_size(&self) -> u64 {
        match self {
            Self::Mbr(b) => b.disk_size(),
            Self::Gpt(b) => b.disk_size(),
        }
    }

    fn make_disk(&mut self, path: &Path) -> Result<(), ImgDiskError> {
        match self {
            Self::Mbr(b) => b.make_disk(path)?,
            Self::Gpt(b) => b.make_disk(path)?,
        }
        Ok(())
    }
}

fn io_err(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ImgDiskError {
    let path = path.into();
    move |source| ImgDiskError::Io { path, source }
}

/// Owns one disk's image file, partition table, and (while active) its
/// loop-device mapping and mount table.
///
/// Constructed once from a [`DiskSpec`], then carried through
/// [`format`](Self::format), [`mount`](Self::mount), and
/// [`umount`](Self::umount) in that order.
pub struct DiskAssembler {
    subvol: PathBuf,
    image_path: PathBuf,
    parts: BTreeMap<usize, PartitionSpec>,
    table: PartitionTable,
    loop_map: Option<BTreeMap<usize, LoopMapping>>,
    mounted: BTreeMap<String, PathBuf>,
}

impl DiskAssembler {
    /// Build the partition table from `spec` and write the sparse image
    /// to `<subvol>/disks/<id>.img`.
    pub fn new(
        subvol: impl Into<PathBuf>,
        id: &str,
        spec: &DiskSpec,
    ) -> Result<Self, ImgDiskError> {
        let subvol = subvol.into();
        let mut parts = BTreeMap::new();
        let mut table = match spec.label {
            TableLabel::Mbr => PartitionTable::Mbr(MbrBuilder::new()),
            TableLabel::Gpt => PartitionTable::Gpt(GptBuilder::new()),
        };

        for (&index, part) in &spec.partitions {
            match &mut table {
                PartitionTable::Mbr(builder) => {
                    let fs_byte = part
                        .table_code()
                        .as_partition_code()
                        .resolve_mbr_byte()
                        .map_err(|e| {
                            imgpart_io::PartitionTableError::UnknownPartitionCode(
                                e.to_string(),
                            )
                        })?;
                    builder.add_partition(
                        index,
                        part.size_mib,
                        fs_byte,
                        part.is_bootable(),
                    )?;
                }
                PartitionTable::Gpt(builder) => {
                    let code = part.table_code().as_partition_code();
                    let name = part.name.as_deref().or(part.label.as_deref());
                    builder.add_partition(index, part.size_mib, code, name)?;
                }
            }
            parts.insert(index, part.clone());
        }

        let disks_dir = subvol.join("disks");
        fs::create_dir_all(&disks_dir).map_err(io_err(disks_dir.clone()))?;
        let image_path = disks_dir.join(format!("{id}.img"));
        table.make_disk(&image_path)?;

        Ok(Self {
            subvol,
            image_path,
            parts,
            table,
            loop_map: None,
            mounted: BTreeMap::new(),
        })
    }

    /// The sparse image file's path.
    #[must_use]
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Total on-disk size of the image, in bytes.
    #[must_use]
    pub fn disk_size(&self) -> u64 {
        self.table.disk_size()
    }

    /// Every partition's mount path, in ascending lexicographic order
    /// (so `/` precedes `/home` precedes `/var`).
    #[must_use]
    pub fn mount_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> =
            self.parts.values().filter_map(|p| p.mount.as_deref()).collect();
        paths.sort_unstable();
        paths
    }

    /// Format every currently loopback-mapped partition's filesystem.
    /// Acquires the loopback mapping for the duration of the call and
    /// releases it again unless something else is already holding it
    /// open (e.g. a concurrent [`mount`](Self::mount) sequence).
    pub fn format(&mut self, runner: &dyn CommandRunner) -> Result<(), ImgDiskError> {
        let image_path = self.image_path.clone();
        let scope = LoopbackScope::enter(&mut self.loop_map, image_path, runner)?;
        for (index, mapping) in scope.map() {
            let Some(part) = self.parts.get(index) else {
                continue;
            };
            external::mkfs(runner, &part.fs_code.as_mkfs_arg(), &mapping.mapper_device)?;
        }
        Ok(())
    }

    /// Ensure the loopback mapping is present, acquiring it if this is
    /// the first caller to ask. Returns whether this call acquired it.
    fn losetup(&mut self, runner: &dyn CommandRunner) -> Result<bool, ImgDiskError> {
        if self.loop_map.is_some() {
            return Ok(false);
        }
        let stdout = external::kpartx_add(runner, &self.image_path)?;
        self.loop_map = Some(crate::loopback::parse_kpartx_add_output(&stdout));
        Ok(true)
    }

    /// Release the loopback mapping. A no-op if it isn't currently held.
    fn ulosetup(&mut self, runner: &dyn CommandRunner) -> Result<(), ImgDiskError> {
        if self.loop_map.is_none() {
            return Ok(());
        }
        external::kpartx_delete(runner, &self.image_path)?;
        self.loop_map = None;
        Ok(())
    }

    /// Mount one partition (`target`) or, if `target` is `None`, every
    /// partition that has a `mount` path, parent before child.
    pub fn mount(
        &mut self,
        runner: &dyn CommandRunner,
        target: Option<&str>,
    ) -> Result<(), ImgDiskError> {
        let paths: Vec<String> = match target {
            Some(path) => vec![path.to_owned()],
            None => self.mount_paths().into_iter().map(str::to_owned).collect(),
        };
        for mount_path in paths {
            self.mount_one(runner, &mount_path)?;
        }
        Ok(())
    }

    fn mount_one(
        &mut self,
        runner: &dyn CommandRunner,
        mount_path: &str,
    ) -> Result<(), ImgDiskError> {
        self.losetup(runner)?;

        let index = *self
            .parts
            .iter()
            .find(|(_, part)| part.mount.as_deref() == Some(mount_path))
            .map(|(index, _)| index)
            .ok_or_else(|| ImgDiskError::UnknownMountPath(mount_path.to_owned()))?;

        let device = self
            .loop_map
            .as_ref()
            .and_then(|map| map.get(&index))
            .map(|mapping| mapping.mapper_device.clone())
            .ok_or(ImgDiskError::NotMapped(index))?;

        let mnt_dir = self.subvol.join("mnt").join(mount_path.trim_start_matches('/'));
        fs::create_dir_all(&mnt_dir).map_err(io_err(mnt_dir.clone()))?;

        external::mount(runner, &device, &mnt_dir)?;
        self.mounted.insert(mount_path.to_owned(), mnt_dir);
        Ok(())
    }

    /// Unmount one partition (`target`) or, if `target` is `None`, every
    /// currently mounted partition, child before parent. Releases the
    /// loopback mapping once nothing remains mounted.
    pub fn umount(
        &mut self,
        runner: &dyn CommandRunner,
        target: Option<&str>,
    ) -> Result<(), ImgDiskError> {
        let mut paths: Vec<String> = match target {
            Some(path) => vec![path.to_owned()],
            None => self.mounted.keys().cloned().collect(),
        };
        paths.sort_unstable_by(|a, b| b.cmp(a));

        for mount_path in paths {
            let Some(mnt_dir) = self.mounted.get(&mount_path).cloned() else {
                continue;
            };
            external::umount(runner, &mnt_dir)?;
            self.mounted.remove(&mount_path);
        }

        if self.mounted.is_empty() {
            self.ulosetup(runner)?;
        }
        Ok(())
    }

    /// Best-effort cleanup for exception paths: lazily unmounts
    /// (`umount -l`) everything still in the mount table and releases
    /// the loopback mapping, logging rather than propagating any
    /// failure along the way.
    pub fn force_cleanup(&mut self, runner: &dyn CommandRunner) {
        let mount_dirs: Vec<PathBuf> = self.mounted.values().cloned().collect();
        for mnt_dir in mount_dirs {
            external::umount_lazy_best_effort(runner, &mnt_dir);
        }
        self.mounted.clear();

        if let Err(e) = self.ulosetup(runner) {
            log::warn!(
                "cleanup: releasing loopback mapping for {} failed: {e}",
                self.image_path.display()
            );
        }
    }
}
