// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![cfg(feature = "std")]

use imgpart_io::MbrBuilder;
use imgpart_types::{Chs, DiskGeometry, Lba, MasterBootRecord, MbrPartitionRecord, U32Le};
use rand::rngs::mock::StepRng;
use tempfile::tempdir;

#[test]
fn test_chs() {
    assert_eq!(
        Chs::from_lba(Lba(8191), DiskGeometry::UNKNOWN)
            .unwrap()
            .as_tuple(),
        (0, 130, 2)
    );

    // Out of range errors.
    assert!(Chs::new(0xf000, 1, 1).is_none());
    assert!(Chs::new(1, 1, 0xf0).is_none());
}

#[test]
fn test_disk_geometry() {
    assert_eq!(DiskGeometry::default(), DiskGeometry::UNKNOWN);
    assert_eq!(DiskGeometry::UNKNOWN.to_string(), "HPC=255/SPT=63");
}

#[test]
fn test_mbr_display() {
    let mut mbr = MasterBootRecord {
        boot_strap_code: [0; 440],
        unique_mbr_disk_signature: [0x12, 0x34, 0x56, 0x78],
        unknown: [0x12, 0x34],
        partitions: [
            MbrPartitionRecord {
                boot_indicator: 0x12,
                start_chs: Chs::new(1, 2, 3).unwrap(),
                os_indicator: 0xab,
                end_chs: Chs::new(4, 5, 6).unwrap(),
                starting_lba: U32Le::from_u32(123),
                size_in_lba: U32Le::from_u32(456),
            },
            MbrPartitionRecord::default(),
            MbrPartitionRecord::default(),
            MbrPartitionRecord::default(),
        ],
        signature: [0x12, 0x34],
    };
    let expected = "MasterBootRecord {
boot_strap_code: [0; 440],
unique_mbr_disk_signature: 0x78563412,
unknown: 3412,
partitions: [MbrPartitionRecord {
boot_indicator: 0x12,
start_chs: CHS=1/2/3,
os_indicator: 0xab,
end_chs: CHS=4/5/6,
starting_lba: 123,
size_in_lba: 456 },
MbrPartitionRecord {
boot_indicator: 0x0,
start_chs: CHS=0/0/0,
os_indicator: 0x0,
end_chs: CHS=0/0/0,
starting_lba: 0,
size_in_lba: 0 },
MbrPartitionRecord {
boot_indicator: 0x0,
start_chs: CHS=0/0/0,
os_indicator: 0x0,
end_chs: CHS=0/0/0,
starting_lba: 0,
size_in_lba: 0 },
MbrPartitionRecord {
boot_indicator: 0x0,
start_chs: CHS=0/0/0,
os_indicator: 0x0,
end_chs: CHS=0/0/0,
starting_lba: 0,
size_in_lba: 0 }],
signature: 0x3412
}";
    assert_eq!(mbr.to_string(), expected.replace('\n', " "));

    mbr.boot_strap_code[0] = 1;
    assert!(mbr
        .to_string()
        .starts_with("MasterBootRecord { boot_strap_code: <non-zero>,"));
}

fn image_bytes(builder: &MbrBuilder) -> Vec<u8> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");
    builder.make_disk(&path).unwrap();
    std::fs::read(&path).unwrap()
}

/// Empty MBR: a 1 MiB file with the boot signature present and the PTE
/// region all zero.
#[test]
fn empty_mbr_is_one_mib_with_zeroed_pte_region() {
    let builder = MbrBuilder::new_with_rng(&mut StepRng::new(0, 1));
    let bytes = image_bytes(&builder);

    assert_eq!(bytes.len(), 1024 * 1024);
    assert_eq!(&bytes[0x1fe..0x200], &[0x55, 0xaa]);
    assert!(bytes[0x1be..0x1fe].iter().all(|&b| b == 0));
}

/// MBR with a single bootable partition.
#[test]
fn single_bootable_partition() {
    let mut builder = MbrBuilder::new_with_rng(&mut StepRng::new(0, 1));
    builder.add_partition(1, 8, 0x83, true).unwrap();
    let bytes = image_bytes(&builder);

    assert_eq!(bytes.len(), 9 * 1024 * 1024);
    let record = &bytes[0x1be..0x1ce];
    assert_eq!(record[0], 0x80);
    assert_eq!(record[4], 0x83);
    assert_eq!(u32::from_le_bytes(record[8..12].try_into().unwrap()), 2048);
    assert_eq!(u32::from_le_bytes(record[12..16].try_into().unwrap()), 16384);
    assert!(bytes[0x1ce..0x1fe].iter().all(|&b| b == 0));
}

/// Index-skip: registering slots 1 and 3 leaves slot 2 zeroed and slot
/// 3 starting right after slot 1's extent.
#[test]
fn index_skip_leaves_gap_zeroed() {
    let mut builder = MbrBuilder::new_with_rng(&mut StepRng::new(0, 1));
    builder.add_partition(1, 8, 0x83, true).unwrap();
    builder.add_partition(3, 12, 0x83, false).unwrap();
    let bytes = image_bytes(&builder);

    assert_eq!(bytes.len(), (1 + 8 + 12) * 1024 * 1024);

    let slot2 = &bytes[0x1ce..0x1de];
    assert!(slot2.iter().all(|&b| b == 0));

    let slot3 = &bytes[0x1de..0x1ee];
    assert_eq!(slot3[0], 0x00);
    assert_eq!(slot3[4], 0x83);
    assert_eq!(
        u32::from_le_bytes(slot3[8..12].try_into().unwrap()),
        2048 + 16384
    );
    assert_eq!(u32::from_le_bytes(slot3[12..16].try_into().unwrap()), 24576);
}

/// A partition too large to fit a u32 sector count is rejected, and the
/// builder's committed state is left exactly as it was before the call.
#[test]
fn overflow_rolls_back_to_prior_state() {
    let mut builder = MbrBuilder::new_with_rng(&mut StepRng::new(0, 1));
    builder.add_partition(1, 8, 0x83, true).unwrap();
    let before = image_bytes(&builder);

    let err = builder.add_partition(2, 3 * 1024 * 1024, 0x83, false);
    assert!(err.is_err());

    let after = image_bytes(&builder);
    assert_eq!(before, after);
}

#[test]
fn invalid_partition_number_is_rejected() {
    let mut builder = MbrBuilder::new_with_rng(&mut StepRng::new(0, 1));
    assert!(builder.add_partition(0, 1, 0x83, false).is_err());
    assert!(builder.add_partition(5, 1, 0x83, false).is_err());
}
