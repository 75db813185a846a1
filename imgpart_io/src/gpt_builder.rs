// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! In-memory builder for a dual-header GPT partition table.

use crate::error::PartitionTableError;
use crate::rng::{OsRandomSource, RandomSource};
use crate::std_support::StdBlockIo;
use crate::{Disk, DiskError};
use bytemuck::cast_slice;
use imgpart_types::{
    BlockSize, Crc32, GptHeader, GptPartitionAttributes, GptPartitionEntry,
    GptPartitionName, GptPartitionType, Guid, Lba, LbaLe, PartitionCode,
    SparseList, U32Le,
};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;

const MIB: u64 = 1024 * 1024;
const SECTORS_PER_MIB: u64 = MIB / 512;
const FIRST_PARTITION_LBA: u64 = 2048;
const MIN_DISK_MIB: u64 = 16;
const ENTS: usize = 128;
const PTE_MIN_RESERVATION: u64 = 16384;

fn from_disk_error(e: DiskError<io::Error>) -> PartitionTableError {
    match e {
        DiskError::BufferTooSmall => PartitionTableError::Io(io::Error::new(
            io::ErrorKind::Other,
            "block buffer too small",
        )),
        DiskError::Io(io_err) => PartitionTableError::Io(io_err),
    }
}

#[derive(Clone, Copy, Debug)]
struct GptSlot {
    size_mib: u64,
    type_guid: Guid,
    name: GptPartitionName,
}

/// Builder for a GUID Partition Table with up to 128 entries.
///
/// Every mutation runs the full UEFI-mandated update dance: rebuild the
/// partition entry array, recompute its CRC32, recompute both header
/// CRC32s independently, and keep the secondary header a byte-for-byte
/// mirror of the primary with `my_lba`/`alternate_lba`/`partition_entry_lba`
/// swapped. See [`GptBuilder::write`] for the on-disk layout this
/// produces.
pub struct GptBuilder {
    sector_size: BlockSize,
    partitions: SparseList<GptSlot, ENTS>,
    unique_guids: SparseList<Guid, ENTS>,
    primary_header: GptHeader,
    secondary_header: GptHeader,
    pte_array: [GptPartitionEntry; ENTS],
    rng: Box<dyn RandomSource>,
}

impl GptBuilder {
    /// Create an empty GPT with 512-byte sectors and a random disk GUID
    /// drawn from the OS RNG.
    #[must_use]
    pub fn new() -> Self {
        Self::with_block_size_and_rng(BlockSize::B512, Box::new(OsRandomSource))
    }

    /// Create an empty GPT using `sector_size` and drawing all random
    /// bytes (disk GUID, per-partition unique GUIDs, and the
    /// protective MBR's disk signature) from `rng` instead of the OS
    /// RNG. Used by tests that need deterministic output.
    pub fn with_block_size_and_rng(
        sector_size: BlockSize,
        mut rng: Box<dyn RandomSource>,
    ) -> Self {
        let mut guid_bytes = [0u8; 16];
        rng.fill_bytes(&mut guid_bytes);
        let disk_guid = Guid::from_random_bytes(guid_bytes);

        let mut builder = Self {
            sector_size,
            partitions: SparseList::new(),
            unique_guids: SparseList::new(),
            primary_header: GptHeader {
                my_lba: LbaLe::from_u64(1),
                partition_entry_lba: LbaLe::from_u64(2),
                number_of_partition_entries: U32Le::from_u32(
                    u32::try_from(ENTS).unwrap(),
                ),
                disk_guid,
                ..GptHeader::default()
            },
            secondary_header: GptHeader::default(),
            pte_array: [GptPartitionEntry::default(); ENTS],
            rng,
        };
        builder.update();
        builder
    }

    /// Number of sectors reserved for the partition entry array.
    #[must_use]
    pub fn pte_sectors(&self) -> u64 {
        let entry_size = u64::try_from(core::mem::size_of::<GptPartitionEntry>())
            .unwrap();
        let ents = u64::try_from(ENTS).unwrap();
        let reservation = (ents * entry_size).max(PTE_MIN_RESERVATION);
        reservation.div_ceil(self.sector_size.to_u64())
    }

    /// Register (or replace) the partition at 1-based `index`
    /// (1..=128). `code` resolves through the partition-type catalog to
    /// a GPT type GUID.
    pub fn add_partition(
        &mut self,
        index: usize,
        size_mib: u64,
        code: PartitionCode<'_>,
        name: Option<&str>,
    ) -> Result<(), PartitionTableError> {
        if !(1..=ENTS).contains(&index) {
            return Err(PartitionTableError::InvalidPartitionNumber {
                index,
                max: ENTS,
            });
        }

        let type_guid = code
            .resolve_gpt_type()
            .map_err(|e| PartitionTableError::UnknownPartitionCode(e.to_string()))?;
        let name = match name {
            Some(n) => n.parse::<GptPartitionName>().map_err(|e| {
                PartitionTableError::InvalidPartitionName(e.to_string())
            })?,
            None => GptPartitionName::default(),
        };

        self.partitions.set(
            index - 1,
            GptSlot {
                size_mib,
                type_guid,
                name,
            },
        );
        self.update();
        Ok(())
    }

    /// Total disk size in bytes: `max(16, 2 + sum(size_mib)) MiB`.
    #[must_use]
    pub fn disk_size(&self) -> u64 {
        let partitions_mib: u64 = self
            .partitions
            .iter()
            .filter_map(|s| s.map(|s| s.size_mib))
            .sum();
        (2 + partitions_mib).max(MIN_DISK_MIB) * MIB
    }

    fn unique_guid_for_slot(&mut self, slot_index: usize) -> Guid {
        if let Some(guid) = self.unique_guids.get(slot_index) {
            return *guid;
        }
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        let guid = Guid::from_random_bytes(bytes);
        self.unique_guids.set(slot_index, guid);
        guid
    }

    fn rebuild_pte_array(&mut self) {
        let mut start_sector: u64 = FIRST_PARTITION_LBA;
        for index in 0..ENTS {
            let slot = self.partitions.get(index).copied();
            self.pte_array[index] = match slot {
                Some(s) if s.size_mib > 0 => {
                    let sectors = s.size_mib * SECTORS_PER_MIB;
                    let unique_guid = self.unique_guid_for_slot(index);
                    let entry = GptPartitionEntry {
                        partition_type_guid: GptPartitionType(s.type_guid),
                        unique_partition_guid: unique_guid,
                        starting_lba: LbaLe::from_u64(start_sector),
                        ending_lba: LbaLe::from_u64(start_sector + sectors - 1),
                        attributes: GptPartitionAttributes::default(),
                        name: s.name,
                    };
                    start_sector += sectors;
                    entry
                }
                _ => {
                    self.unique_guids.clear(index);
                    GptPartitionEntry::default()
                }
            };
        }
    }

    fn update(&mut self) {
        let disk_sectors = self.disk_size() / self.sector_size.to_u64();
        let secondary_lba = disk_sectors - 1;
        let pte_sectors = self.pte_sectors();
        let pte_sec_lba = disk_sectors - 1 - pte_sectors;

        self.primary_header.alternate_lba = LbaLe::from_u64(secondary_lba);
        self.primary_header.first_usable_lba = LbaLe::from_u64(2 + pte_sectors);
        self.primary_header.last_usable_lba = LbaLe::from_u64(pte_sec_lba - 1);

        self.rebuild_pte_array();

        let pte_bytes: &[u8] = cast_slice(&self.pte_array);
        let crc = crc::Crc::<u32>::new(&Crc32::ALGORITHM).checksum(pte_bytes);
        self.primary_header.partition_entry_array_crc32 =
            Crc32(U32Le::from_u32(crc));
        self.primary_header.update_header_crc32();

        let mut secondary = self.primary_header;
        secondary.my_lba = LbaLe::from_u64(secondary_lba);
        secondary.alternate_lba = LbaLe::from_u64(1);
        secondary.partition_entry_lba = LbaLe::from_u64(pte_sec_lba);
        secondary.update_header_crc32();
        self.secondary_header = secondary;
    }

    fn build_protective_mbr(&self) -> imgpart_types::MasterBootRecord {
        let disk_sectors = self.disk_size() / self.sector_size.to_u64();
        imgpart_types::MasterBootRecord::protective_mbr(disk_sectors)
    }

    /// Serialize the protective MBR, both GPT headers, and both copies
    /// of the partition entry array into `path` at their documented
    /// LBAs. The file must already be sized to
    /// [`disk_size`](Self::disk_size).
    pub fn write(&mut self, path: &Path) -> Result<(), PartitionTableError> {
        let protective_mbr = self.build_protective_mbr();

        let disk_sectors = self.disk_size() / self.sector_size.to_u64();
        let pte_sectors = self.pte_sectors();
        let pte_sec_lba = disk_sectors - 1 - pte_sectors;

        let mut file = OpenOptions::new().write(true).open(path)?;
        let mut block_buf =
            vec![0u8; self.sector_size.to_usize().expect("valid block size")];
        let mut disk = Disk::new(StdBlockIo::new(&mut file, self.sector_size));

        disk.write_mbr(Lba(0), &protective_mbr, &mut block_buf)
            .map_err(from_disk_error)?;
        disk.write_gpt_header(Lba(1), &self.primary_header, &mut block_buf)
            .map_err(from_disk_error)?;

        let pte_bytes: &[u8] = cast_slice(&self.pte_array);
        disk.write_gpt_partition_entry_array(Lba(2), pte_bytes)
            .map_err(from_disk_error)?;

        disk.write_gpt_header(
            Lba(disk_sectors - 1),
            &self.secondary_header,
            &mut block_buf,
        )
        .map_err(from_disk_error)?;
        disk.write_gpt_partition_entry_array(Lba(pte_sec_lba), pte_bytes)
            .map_err(from_disk_error)?;

        disk.flush().map_err(PartitionTableError::Io)
    }

    /// Create a sparse file sized to [`disk_size`](Self::disk_size) and
    /// write the full GPT layout into it.
    pub fn make_disk(&mut self, path: &Path) -> Result<(), PartitionTableError> {
        let file = OpenOptions::new().create(true).write(true).open(path)?;
        file.set_len(self.disk_size())?;
        drop(file);
        self.write(path)
    }
}

impl Default for GptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
