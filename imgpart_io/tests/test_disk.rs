// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![cfg(feature = "std")]

use imgpart_io::{GptBuilder, OsRandomSource};
use imgpart_types::BlockSize;
use rand::rngs::mock::StepRng;
use tempfile::tempdir;

const MIB: u64 = 1024 * 1024;
const ENTS: u64 = 128;
const ENTRY_SIZE: u64 = 128;

fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn le_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

/// Byte offsets within a 92-byte GPT header, matching the UEFI-defined
/// field layout.
mod header_offset {
    pub const SIGNATURE: usize = 0;
    pub const HEADER_CRC32: usize = 16;
    pub const MY_LBA: usize = 24;
    pub const ALTERNATE_LBA: usize = 32;
    pub const FIRST_USABLE_LBA: usize = 40;
    pub const LAST_USABLE_LBA: usize = 48;
    pub const DISK_GUID: usize = 56;
    pub const PARTITION_ENTRY_LBA: usize = 72;
    pub const NUMBER_OF_PARTITION_ENTRIES: usize = 80;
    pub const PARTITION_ENTRY_ARRAY_CRC32: usize = 88;
}

fn header_at<'a>(bytes: &'a [u8], lba: u64) -> &'a [u8] {
    let start = (lba * 512) as usize;
    &bytes[start..start + 92]
}

fn header_crc32(header: &[u8]) -> u32 {
    let mut zeroed = header.to_vec();
    zeroed[header_offset::HEADER_CRC32..header_offset::HEADER_CRC32 + 4]
        .copy_from_slice(&[0; 4]);
    crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC).checksum(&zeroed)
}

fn build(size_mib: u64, name: Option<&str>) -> (GptBuilder, Vec<u8>) {
    let mut builder =
        GptBuilder::with_block_size_and_rng(BlockSize::B512, Box::new(StepRng::new(0, 1)));
    builder
        .add_partition(1, size_mib, imgpart_types::PartitionCode::Name("linux/filesystem"), name)
        .unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");
    builder.make_disk(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    (builder, bytes)
}

/// A GPT disk with one 512 MiB Linux filesystem partition: exact header
/// and partition-entry field values.
#[test]
fn gpt_one_512mib_linux_partition() {
    let (_builder, bytes) = build(512, Some("root"));

    let disk_mib: u64 = 2 + 512;
    assert_eq!(bytes.len(), (disk_mib * MIB) as usize);

    let disk_sectors = disk_mib * MIB / 512;
    let secondary_lba = disk_sectors - 1;
    let pte_sectors = (ENTS * ENTRY_SIZE).max(16384).div_ceil(512);
    let pte_sec_lba = disk_sectors - 1 - pte_sectors;
    let first_usable_lba = 2 + pte_sectors;
    let last_usable_lba = pte_sec_lba - 1;

    assert_eq!(pte_sectors, 32);
    assert_eq!(secondary_lba, 1_052_671);
    assert_eq!(pte_sec_lba, 1_052_639);
    assert_eq!(first_usable_lba, 34);
    assert_eq!(last_usable_lba, 1_052_638);

    // Protective MBR.
    let mbr = &bytes[0..512];
    assert_eq!(&mbr[0x1fe..0x200], &[0x55, 0xaa]);
    assert_eq!(&mbr[0..4], &[0, 0, 0, 0]); // disk signature zeroed
    let pte0 = &mbr[0x1be..0x1ce];
    assert_eq!(pte0[0], 0x00); // not bootable
    assert_eq!(pte0[4], 0xee); // protective type
    assert_eq!(le_u32(pte0, 8), 1); // starting LBA
    assert_eq!(le_u32(pte0, 12), (disk_sectors - 1) as u32); // size in LBA

    // Primary header.
    let primary = header_at(&bytes, 1);
    assert_eq!(&primary[header_offset::SIGNATURE..header_offset::SIGNATURE + 8], b"EFI PART");
    assert_eq!(le_u64(primary, header_offset::MY_LBA), 1);
    assert_eq!(le_u64(primary, header_offset::ALTERNATE_LBA), secondary_lba);
    assert_eq!(le_u64(primary, header_offset::FIRST_USABLE_LBA), first_usable_lba);
    assert_eq!(le_u64(primary, header_offset::LAST_USABLE_LBA), last_usable_lba);
    assert_eq!(le_u64(primary, header_offset::PARTITION_ENTRY_LBA), 2);
    assert_eq!(le_u32(primary, header_offset::NUMBER_OF_PARTITION_ENTRIES), 128);
    assert_eq!(header_crc32(primary), le_u32(primary, header_offset::HEADER_CRC32));

    // Secondary header mirrors the primary with the LBA fields swapped.
    let secondary = header_at(&bytes, secondary_lba);
    assert_eq!(le_u64(secondary, header_offset::MY_LBA), secondary_lba);
    assert_eq!(le_u64(secondary, header_offset::ALTERNATE_LBA), 1);
    assert_eq!(le_u64(secondary, header_offset::PARTITION_ENTRY_LBA), pte_sec_lba);
    assert_eq!(
        le_u64(secondary, header_offset::FIRST_USABLE_LBA),
        le_u64(primary, header_offset::FIRST_USABLE_LBA)
    );
    assert_eq!(
        le_u32(secondary, header_offset::PARTITION_ENTRY_ARRAY_CRC32),
        le_u32(primary, header_offset::PARTITION_ENTRY_ARRAY_CRC32)
    );
    assert_eq!(header_crc32(secondary), le_u32(secondary, header_offset::HEADER_CRC32));

    // Partition entry 0: Linux filesystem type, start/end LBA, UCS-2 name.
    let pte_primary = &bytes[(2 * 512) as usize..(2 * 512 + 128) as usize];
    let pte_secondary =
        &bytes[(pte_sec_lba * 512) as usize..(pte_sec_lba * 512 + 128) as usize];
    assert_eq!(pte_primary, pte_secondary);

    let type_guid = &pte_primary[0..16];
    // 0FC63DAF-8483-4772-8E79-3D69D8477DE4, mixed-endian on-disk form.
    assert_eq!(
        type_guid,
        &[
            0xaf, 0x3d, 0xc6, 0x0f, 0x83, 0x84, 0x72, 0x47, 0x8e, 0x79, 0x3d, 0x69, 0xd8, 0x47,
            0x7d, 0xe4,
        ]
    );
    assert_eq!(le_u64(pte_primary, 32), 2048); // starting_lba
    assert_eq!(le_u64(pte_primary, 40), 2048 + 512 * 2048 - 1); // ending_lba

    let name_bytes = &pte_primary[56..56 + 8];
    let expected_name: Vec<u8> = "root".encode_utf16().flat_map(u16::to_le_bytes).collect();
    assert_eq!(&name_bytes[..expected_name.len()], expected_name.as_slice());
}

/// Past the protective MBR's 32-bit sector limit, the protective
/// partition's `size_in_lba` clamps to `2^31 - 1` instead of
/// overflowing or wrapping, while the real GPT headers keep describing
/// the full disk.
#[test]
fn gpt_beyond_protective_mbr_range_clamps() {
    let eight_tib_mib: u64 = 8 * 1024 * 1024;
    let (_builder, bytes) = build(eight_tib_mib - 2, None);

    assert_eq!(bytes.len(), (eight_tib_mib * MIB) as usize);

    let mbr = &bytes[0..512];
    let pte0 = &mbr[0x1be..0x1ce];
    assert_eq!(pte0[4], 0xee);
    assert_eq!(le_u32(pte0, 8), 1);
    assert_eq!(le_u32(pte0, 12), (u32::MAX >> 1));

    let disk_sectors = eight_tib_mib * MIB / 512;
    let primary = header_at(&bytes, 1);
    assert_eq!(
        le_u64(primary, header_offset::ALTERNATE_LBA),
        disk_sectors - 1
    );
}

/// Adding a partition that doesn't fit is rejected without mutating the
/// builder's committed state.
#[test]
fn add_partition_rejects_out_of_range_index() {
    let mut builder = GptBuilder::with_block_size_and_rng(
        BlockSize::B512,
        Box::new(OsRandomSource),
    );
    assert!(builder
        .add_partition(0, 1, imgpart_types::PartitionCode::Name("esp"), None)
        .is_err());
    assert!(builder
        .add_partition(129, 1, imgpart_types::PartitionCode::Name("esp"), None)
        .is_err());
}

#[test]
fn unknown_partition_code_is_rejected() {
    let mut builder =
        GptBuilder::with_block_size_and_rng(BlockSize::B512, Box::new(StepRng::new(0, 1)));
    assert!(builder
        .add_partition(1, 8, imgpart_types::PartitionCode::Name("not/a/real/code"), None)
        .is_err());
}
