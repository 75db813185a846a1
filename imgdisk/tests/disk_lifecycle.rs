// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use imgdisk::{CommandRunner, DiskAssembler, DiskSpec, FsCode, ImgDiskError, PartitionFlag, PartitionSpec, TableLabel};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Output};

/// Fake process launcher that answers `kpartx -avs` with a canned
/// mapping and records every other command's argv for assertions.
struct FakeRunner {
    calls: RefCell<Vec<Vec<String>>>,
}

impl FakeRunner {
    fn new() -> Self {
        Self { calls: RefCell::new(vec![]) }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

fn argv(cmd: &Command) -> Vec<String> {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

fn ok(stdout: &[u8]) -> Output {
    Output {
        status: ExitStatus::from_raw(0),
        stdout: stdout.to_vec(),
        stderr: vec![],
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, cmd: Command) -> Result<Output, ImgDiskError> {
        let args = argv(&cmd);
        self.calls.borrow_mut().push(args.clone());
        if args[0] == "kpartx" && args.contains(&"-avs".to_owned()) {
            return Ok(ok(b"add map loop0p1 (253:0): 0 16384 linear 7:0 2048\n\
add map loop0p2 (253:1): 0 24576 linear 7:0 18432\n"));
        }
        Ok(ok(b""))
    }
}

fn mbr_spec_two_partitions() -> DiskSpec {
    let mut partitions = BTreeMap::new();
    partitions.insert(
        1,
        PartitionSpec {
            size_mib: 8,
            fs_code: FsCode::Name("ext4".to_owned()),
            partcode: Some(FsCode::Byte(0x83)),
            name: None,
            label: None,
            mount: Some("/".to_owned()),
            flags: vec![PartitionFlag::Bootable],
        },
    );
    partitions.insert(
        2,
        PartitionSpec {
            size_mib: 12,
            fs_code: FsCode::Name("ext4".to_owned()),
            partcode: Some(FsCode::Byte(0x83)),
            name: None,
            label: None,
            mount: Some("/home".to_owned()),
            flags: vec![],
        },
    );
    DiskSpec { label: TableLabel::Mbr, partitions }
}

#[test]
fn construction_writes_sparse_image_of_expected_size() {
    let dir = tempfile::tempdir().unwrap();
    let spec = mbr_spec_two_partitions();
    let disk = DiskAssembler::new(dir.path(), "root", &spec).unwrap();

    assert_eq!(disk.disk_size(), (1 + 8 + 12) * 1024 * 1024);
    let metadata = std::fs::metadata(disk.image_path()).unwrap();
    assert_eq!(metadata.len(), disk.disk_size());
}

#[test]
fn mount_paths_are_ascending() {
    let dir = tempfile::tempdir().unwrap();
    let spec = mbr_spec_two_partitions();
    let disk = DiskAssembler::new(dir.path(), "root", &spec).unwrap();
    assert_eq!(disk.mount_paths(), vec!["/", "/home"]);
}

#[test]
fn format_maps_then_formats_each_partition_then_releases() {
    let dir = tempfile::tempdir().unwrap();
    let spec = mbr_spec_two_partitions();
    let mut disk = DiskAssembler::new(dir.path(), "root", &spec).unwrap();
    let runner = FakeRunner::new();

    disk.format(&runner).unwrap();

    let calls = runner.calls();
    assert_eq!(calls[0][0], "kpartx");
    assert!(calls[0].contains(&"-avs".to_owned()));
    assert!(calls.iter().any(|c| c[0] == "mkfs" && c.contains(&"/dev/mapper/loop0p1".to_owned())));
    assert!(calls.iter().any(|c| c[0] == "mkfs" && c.contains(&"/dev/mapper/loop0p2".to_owned())));
    assert_eq!(calls.last().unwrap()[0], "kpartx");
    assert!(calls.last().unwrap().contains(&"-dvs".to_owned()));
}

#[test]
fn mount_then_umount_is_parent_before_child_and_its_exact_reverse() {
    let dir = tempfile::tempdir().unwrap();
    let spec = mbr_spec_two_partitions();
    let mut disk = DiskAssembler::new(dir.path(), "root", &spec).unwrap();
    let runner = FakeRunner::new();

    disk.mount(&runner, None).unwrap();
    disk.umount(&runner, None).unwrap();

    let root_mnt = dir.path().join("mnt").to_string_lossy().into_owned();
    let home_mnt = dir.path().join("mnt").join("home").to_string_lossy().into_owned();

    let mount_targets: Vec<String> = runner
        .calls()
        .into_iter()
        .filter(|c| c[0] == "mount")
        .map(|c| c.last().unwrap().clone())
        .collect();
    let umount_targets: Vec<String> = runner
        .calls()
        .into_iter()
        .filter(|c| c[0] == "umount")
        .map(|c| c.last().unwrap().clone())
        .collect();

    assert_eq!(mount_targets, vec![root_mnt.clone(), home_mnt.clone()]);
    assert_eq!(umount_targets, vec![home_mnt, root_mnt]);
}
