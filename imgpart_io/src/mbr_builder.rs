// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! In-memory builder for a legacy 512-byte MBR partition table.

use crate::error::PartitionTableError;
use crate::rng::{OsRandomSource, RandomSource};
use bytemuck::bytes_of;
use imgpart_types::{Chs, MasterBootRecord, MbrPartitionRecord, SparseList, U32Le};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

const MIB: u64 = 1024 * 1024;
const SECTORS_PER_MIB: u64 = MIB / 512;
const FIRST_PARTITION_LBA: u64 = 2048;
const PROTECTIVE_MBR_START_LBA: u64 = 1;
const PROTECTIVE_MBR_TYPE: u8 = 0xee;

#[derive(Clone, Copy, Debug)]
struct MbrSlot {
    size_mib: u64,
    fs_byte: u8,
}

fn too_large(reason: &str) -> PartitionTableError {
    PartitionTableError::PartitionTooLarge {
        reason: reason.to_owned(),
    }
}

/// Builder for a legacy master boot record with up to four primary
/// partitions.
///
/// Partitions are registered in any order with [`add_partition`], which
/// rebuilds the four 16-byte PTE records from scratch every time so the
/// serialized buffer always reflects the committed table. A registration
/// that doesn't fit the on-disk fields is rolled back rather than left
/// half-applied.
///
/// [`add_partition`]: Self::add_partition
#[derive(Clone)]
pub struct MbrBuilder {
    table: SparseList<MbrSlot, 4>,
    bootable: Option<usize>,
    mbr: MasterBootRecord,
}

impl MbrBuilder {
    /// Create an empty MBR with a random disk signature drawn from the
    /// OS RNG.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_rng(&mut OsRandomSource)
    }

    /// Create an empty MBR, drawing the disk signature from `rng`
    /// instead of the OS RNG. Used by tests that need deterministic
    /// output.
    pub fn new_with_rng(rng: &mut dyn RandomSource) -> Self {
        let mut mbr = MasterBootRecord {
            signature: [0x55, 0xaa],
            ..MasterBootRecord::default()
        };
        rng.fill_bytes(&mut mbr.unique_mbr_disk_signature);

        Self {
            table: SparseList::new(),
            bootable: None,
            mbr,
        }
    }

    /// Register (or replace) the partition at 1-based `index` (1..=4).
    ///
    /// `fs_byte` is the legacy MBR partition type. If `bootable` is
    /// true this becomes the sole bootable partition, overwriting any
    /// previous one. On [`PartitionTooLarge`](PartitionTableError::PartitionTooLarge)
    /// the table is left exactly as it was before the call.
    pub fn add_partition(
        &mut self,
        index: usize,
        size_mib: u64,
        fs_byte: u8,
        bootable: bool,
    ) -> Result<(), PartitionTableError> {
        if !(1..=4).contains(&index) {
            return Err(PartitionTableError::InvalidPartitionNumber {
                index,
                max: 4,
            });
        }
        let slot_index = index - 1;

        let prior_entry = self.table.get(slot_index).copied();
        let prior_bootable = self.bootable;

        self.table.set(slot_index, MbrSlot { size_mib, fs_byte });
        if bootable {
            self.bootable = Some(slot_index);
        }

        if let Err(e) = self.rebuild() {
            match prior_entry {
                Some(prior) => {
                    self.table.set(slot_index, prior);
                }
                None => self.table.clear(slot_index),
            }
            self.bootable = prior_bootable;
            self.rebuild()
                .expect("rebuilding the prior committed state cannot fail");
            return Err(e);
        }

        Ok(())
    }

    /// Total disk size in bytes: a 1 MiB prefix plus the sum of every
    /// registered partition's size.
    #[must_use]
    pub fn disk_size(&self) -> u64 {
        let partitions_mib: u64 = self
            .table
            .iter()
            .filter_map(|s| s.map(|s| s.size_mib))
            .sum();
        (1 + partitions_mib) * MIB
    }

    /// Write the 512-byte MBR to offset 0 of `path`. The file must
    /// already exist and be large enough.
    pub fn write(&self, path: &Path) -> Result<(), PartitionTableError> {
        let mut file = OpenOptions::new().write(true).open(path)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(bytes_of(&self.mbr))?;
        Ok(())
    }

    /// Create a sparse file sized to [`disk_size`](Self::disk_size) and
    /// write the MBR into it.
    pub fn make_disk(&self, path: &Path) -> Result<(), PartitionTableError> {
        let file = OpenOptions::new().create(true).write(true).open(path)?;
        file.set_len(self.disk_size())?;
        drop(file);
        self.write(path)
    }

    fn rebuild(&mut self) -> Result<(), PartitionTableError> {
        let occupied: u32 = self
            .table
            .iter()
            .filter(|s| matches!(s, Some(s) if s.size_mib > 0))
            .count()
            .try_into()
            .unwrap_or(u32::MAX);
        let sole_occupant = if occupied == 1 {
            self.table.iter().flatten().find(|s| s.size_mib > 0).copied()
        } else {
            None
        };
        let is_protective = matches!(
            sole_occupant,
            Some(s) if s.fs_byte == PROTECTIVE_MBR_TYPE
        );

        let mut next_start: u64 = if is_protective {
            PROTECTIVE_MBR_START_LBA
        } else {
            FIRST_PARTITION_LBA
        };

        let mut records = [MbrPartitionRecord::default(); 4];
        for (index, record) in records.iter_mut().enumerate() {
            let Some(slot) = self.table.get(index).copied() else {
                continue;
            };
            if slot.size_mib == 0 {
                continue;
            }

            let start_lba = next_start;
            let sector_count = slot
                .size_mib
                .checked_mul(SECTORS_PER_MIB)
                .ok_or_else(|| too_large("partition size overflows sector count"))?;

            let start_lba_u32 = u32::try_from(start_lba)
                .map_err(|_| too_large("the start sector is greater than 2^32-1"))?;
            let sector_count_u32 = u32::try_from(sector_count)
                .map_err(|_| too_large("the partition size is more than 2^32-1 sectors"))?;

            let chs = Chs([0xfe, 0xff, 0xff]);
            *record = MbrPartitionRecord {
                boot_indicator: if self.bootable == Some(index) {
                    0x80
                } else {
                    0x00
                },
                start_chs: chs,
                os_indicator: slot.fs_byte,
                end_chs: chs,
                starting_lba: U32Le::from_u32(start_lba_u32),
                size_in_lba: U32Le::from_u32(sector_count_u32),
            };

            next_start = start_lba + sector_count;
        }

        self.mbr.partitions = records;
        Ok(())
    }
}

impl Default for MbrBuilder {
    fn default() -> Self {
        Self::new()
    }
}
