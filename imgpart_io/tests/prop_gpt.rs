// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![cfg(feature = "std")]

use imgpart_io::GptBuilder;
use imgpart_types::BlockSize;
use proptest::prelude::*;
use rand::rngs::mock::StepRng;
use tempfile::tempdir;

const SECTOR: u64 = 512;

fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn le_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

fn header_at(bytes: &[u8], lba: u64) -> &[u8] {
    let start = (lba * SECTOR) as usize;
    &bytes[start..start + 92]
}

fn header_crc32(header: &[u8]) -> u32 {
    let mut zeroed = header.to_vec();
    zeroed[16..20].copy_from_slice(&[0; 4]);
    crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC).checksum(&zeroed)
}

proptest! {
    /// The documented GPT geometry relationships hold for any single
    /// partition size, and both header CRCs and the PTE-array CRC
    /// recompute to the stored values.
    #[test]
    fn geometry_and_crcs_are_self_consistent(size_mib in 1u64..2048) {
        let mut builder =
            GptBuilder::with_block_size_and_rng(BlockSize::B512, Box::new(StepRng::new(0, 1)));
        builder
            .add_partition(1, size_mib, imgpart_types::PartitionCode::Name("linux/filesystem"), None)
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("disk.img");
        builder.make_disk(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();

        let disk_sectors = bytes.len() as u64 / SECTOR;
        let pte_sectors = builder.pte_sectors();
        let secondary_lba = disk_sectors - 1;
        let pte_sec_lba = disk_sectors - 1 - pte_sectors;

        let primary = header_at(&bytes, 1);
        let secondary = header_at(&bytes, secondary_lba);

        prop_assert_eq!(le_u64(primary, 24), 1);
        prop_assert_eq!(le_u64(primary, 32), secondary_lba);
        prop_assert_eq!(le_u64(primary, 72), 2);
        prop_assert_eq!(le_u64(secondary, 24), secondary_lba);
        prop_assert_eq!(le_u64(secondary, 32), 1);
        prop_assert_eq!(le_u64(secondary, 72), pte_sec_lba);
        prop_assert_eq!(le_u64(primary, 40), 2 + pte_sectors);
        prop_assert_eq!(le_u64(primary, 48), disk_sectors - 2 - pte_sectors);

        prop_assert_eq!(header_crc32(primary), le_u32(primary, 16));
        prop_assert_eq!(header_crc32(secondary), le_u32(secondary, 16));

        let pte_primary = &bytes[(2 * SECTOR) as usize..(2 * SECTOR + pte_sectors * SECTOR) as usize];
        let pte_secondary = &bytes[(pte_sec_lba * SECTOR) as usize
            ..(pte_sec_lba * SECTOR + pte_sectors * SECTOR) as usize];
        prop_assert_eq!(pte_primary, pte_secondary);

        let crc = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC).checksum(pte_primary);
        prop_assert_eq!(crc, le_u32(primary, 88));
        prop_assert_eq!(crc, le_u32(secondary, 88));
    }

    /// The protective MBR always has exactly one non-empty record, of
    /// type 0xEE, starting at LBA 1, with a zeroed disk signature and
    /// the CHS-head tickle byte set.
    #[test]
    fn protective_mbr_shape_is_invariant(size_mib in 1u64..4096) {
        let mut builder =
            GptBuilder::with_block_size_and_rng(BlockSize::B512, Box::new(StepRng::new(0, 1)));
        builder
            .add_partition(1, size_mib, imgpart_types::PartitionCode::Name("linux/filesystem"), None)
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("disk.img");
        builder.make_disk(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();

        let mbr = &bytes[0..512];
        prop_assert_eq!(&mbr[0..4], &[0, 0, 0, 0]);

        let records: Vec<&[u8]> = (0..4).map(|i| &mbr[0x1be + i * 16..0x1be + i * 16 + 16]).collect();
        let non_empty: Vec<&&[u8]> = records.iter().filter(|r| r[4] != 0).collect();
        prop_assert_eq!(non_empty.len(), 1);

        let pte0 = records[0];
        prop_assert_eq!(pte0[4], 0xee);
        prop_assert_eq!(pte0[1], 0xff);
        prop_assert_eq!(le_u32(pte0, 8), 1);
    }
}
