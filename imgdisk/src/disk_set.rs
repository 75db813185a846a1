// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A named collection of [`DiskAssembler`]s, fanning format/mount/umount
//! out across disks while preserving mount-path ordering across the
//! union.

use crate::disk::DiskAssembler;
use crate::error::ImgDiskError;
use crate::external::CommandRunner;
use crate::spec::DiskSpec;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A set of named disks built from a top-level `id -> DiskSpec` mapping.
pub struct DiskSet {
    subvol: PathBuf,
    disks: BTreeMap<String, DiskAssembler>,
}

impl DiskSet {
    /// Build every disk in `specs` under `<subvol>/disks/<id>.img`.
    pub fn new(
        subvol: impl Into<PathBuf>,
        specs: &BTreeMap<String, DiskSpec>,
    ) -> Result<Self, ImgDiskError> {
        let subvol = subvol.into();
        let mut disks = BTreeMap::new();
        for (id, spec) in specs {
            disks.insert(id.clone(), DiskAssembler::new(&subvol, id, spec)?);
        }
        Ok(Self { subvol, disks })
    }

    /// The root of any mount operation performed through this set.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.subvol.join("mnt")
    }

    /// Access a disk by id.
    #[must_use]
    pub fn disk(&self, id: &str) -> Option<&DiskAssembler> {
        self.disks.get(id)
    }

    /// Format every disk's mapped partitions.
    pub fn format(&mut self, runner: &dyn CommandRunner) -> Result<(), ImgDiskError> {
        for disk in self.disks.values_mut() {
            disk.format(runner)?;
        }
        Ok(())
    }

    /// The union of every disk's mount paths, paired with the owning
    /// disk id, sorted ascending by mount path.
    fn mount_plan(&self) -> Vec<(String, String)> {
        let mut plan: Vec<(String, String)> = self
            .disks
            .iter()
            .flat_map(|(id, disk)| {
                disk.mount_paths()
                    .into_iter()
                    .map(move |path| (path.to_owned(), id.clone()))
            })
            .collect();
        plan.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        plan
    }

    /// Mount every disk's partitions, ascending by mount path across the
    /// whole set (so `/` mounts before `/home` before `/home/ftp`).
    pub fn mount(&mut self, runner: &dyn CommandRunner) -> Result<(), ImgDiskError> {
        for (mount_path, disk_id) in self.mount_plan() {
            if let Some(disk) = self.disks.get_mut(&disk_id) {
                disk.mount(runner, Some(&mount_path))?;
            }
        }
        Ok(())
    }

    /// Unmount every disk's partitions in the exact reverse order of
    /// [`mount`](Self::mount).
    pub fn umount(&mut self, runner: &dyn CommandRunner) -> Result<(), ImgDiskError> {
        let mut plan = self.mount_plan();
        plan.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        for (mount_path, disk_id) in plan {
            if let Some(disk) = self.disks.get_mut(&disk_id) {
                disk.umount(runner, Some(&mount_path))?;
            }
        }
        Ok(())
    }

    /// Best-effort cleanup across every disk in the set; see
    /// [`DiskAssembler::force_cleanup`].
    pub fn force_cleanup(&mut self, runner: &dyn CommandRunner) {
        for disk in self.disks.values_mut() {
            disk.force_cleanup(runner);
        }
    }
}
