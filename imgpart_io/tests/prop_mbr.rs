// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![cfg(feature = "std")]

use imgpart_io::MbrBuilder;
use proptest::prelude::*;
use rand::rngs::mock::StepRng;
use tempfile::tempdir;

fn image_bytes(builder: &MbrBuilder) -> Vec<u8> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");
    builder.make_disk(&path).unwrap();
    std::fs::read(&path).unwrap()
}

proptest! {
    /// `disk_bytes = (1 + sum(size_mib)) * 1 MiB` for any set of
    /// partitions small enough to fit the table's four slots.
    #[test]
    fn disk_size_matches_sum_of_partitions(
        sizes in proptest::collection::vec(1u64..64, 1..=4),
    ) {
        let mut builder = MbrBuilder::new_with_rng(&mut StepRng::new(0, 1));
        for (i, size_mib) in sizes.iter().enumerate() {
            builder.add_partition(i + 1, *size_mib, 0x83, false).unwrap();
        }
        let expected = (1 + sizes.iter().sum::<u64>()) * 1024 * 1024;
        prop_assert_eq!(builder.disk_size(), expected);
    }

    /// Start LBA and sector count of every registered partition fit a
    /// u32, and partitions remain contiguous in index order.
    #[test]
    fn partitions_are_contiguous_and_fit_u32(
        sizes in proptest::collection::vec(1u64..1024, 1..=4),
    ) {
        let mut builder = MbrBuilder::new_with_rng(&mut StepRng::new(0, 1));
        for (i, size_mib) in sizes.iter().enumerate() {
            builder.add_partition(i + 1, *size_mib, 0x83, false).unwrap();
        }
        let bytes = image_bytes(&builder);
        let mut expected_start: u64 = 2048;
        for (i, size_mib) in sizes.iter().enumerate() {
            let record = &bytes[0x1be + i * 16..0x1be + i * 16 + 16];
            let start = u32::from_le_bytes(record[8..12].try_into().unwrap());
            let count = u32::from_le_bytes(record[12..16].try_into().unwrap());
            prop_assert_eq!(u64::from(start), expected_start);
            prop_assert!(u64::from(start) <= u64::from(u32::MAX));
            prop_assert!(u64::from(count) <= u64::from(u32::MAX));
            expected_start += size_mib * 2048;
        }
    }

    /// A `PartitionTooLarge` rejection never mutates the builder's
    /// serialized bytes.
    #[test]
    fn overflow_never_mutates_committed_state(size_mib in 8u64..64) {
        let mut builder = MbrBuilder::new_with_rng(&mut StepRng::new(0, 1));
        builder.add_partition(1, size_mib, 0x83, true).unwrap();
        let before = image_bytes(&builder);

        let result = builder.add_partition(2, 3 * 1024 * 1024, 0x83, false);
        prop_assert!(result.is_err());

        let after = image_bytes(&builder);
        prop_assert_eq!(before, after);
    }
}
