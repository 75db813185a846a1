// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Loopback partition mapping via `kpartx`, and a scoped guard that
//! releases the mapping only if it acquired it.

use crate::error::ImgDiskError;
use crate::external::{self, CommandRunner};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single partition's loop device mapping, as reported by
/// `kpartx -avs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopMapping {
    /// The `/dev/mapper/...` device kpartx created for this partition.
    pub mapper_device: PathBuf,
    /// The whole-disk `/dev/loopN` device backing the mapping.
    pub loop_device: PathBuf,
}

/// Parse `kpartx -avs` stdout into a table keyed by 1-based partition
/// index. Lines that don't match the documented `add map loopNpK ...`
/// shape are ignored rather than treated as a parse failure, since
/// `kpartx` is free to emit other diagnostic lines alongside them.
#[must_use]
pub fn parse_kpartx_add_output(stdout: &[u8]) -> BTreeMap<usize, LoopMapping> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter_map(parse_add_map_line)
        .collect()
}

fn parse_add_map_line(line: &str) -> Option<(usize, LoopMapping)> {
    let rest = line.strip_prefix("add map ")?;
    let map_name = rest.split_whitespace().next()?;
    let p_pos = map_name.rfind('p')?;
    let (loop_name, part_suffix) = map_name.split_at(p_pos);
    let index: usize = part_suffix[1..].parse().ok()?;
    Some((
        index,
        LoopMapping {
            mapper_device: PathBuf::from(format!("/dev/mapper/{map_name}")),
            loop_device: PathBuf::from(format!("/dev/{loop_name}")),
        },
    ))
}

/// RAII guard for a loopback mapping scope.
///
/// Entering acquires the mapping only if `loop_map` is not already
/// populated; dropping releases it only if this guard performed the
/// acquisition, so nested scopes compose without double-mapping or an
/// inner scope tearing down a mapping an outer scope still needs.
pub struct LoopbackScope<'a> {
    loop_map: &'a mut Option<BTreeMap<usize, LoopMapping>>,
    image_path: PathBuf,
    runner: &'a dyn CommandRunner,
    acquired_here: bool,
}

impl<'a> LoopbackScope<'a> {
    /// Enter the scope, invoking `kpartx -avs` only if `loop_map` is
    /// currently `None`.
    pub fn enter(
        loop_map: &'a mut Option<BTreeMap<usize, LoopMapping>>,
        image_path: impl Into<PathBuf>,
        runner: &'a dyn CommandRunner,
    ) -> Result<Self, ImgDiskError> {
        let image_path = image_path.into();
        let acquired_here = if loop_map.is_some() {
            false
        } else {
            let stdout = external::kpartx_add(runner, &image_path)?;
            *loop_map = Some(parse_kpartx_add_output(&stdout));
            true
        };
        Ok(Self {
            loop_map,
            image_path,
            runner,
            acquired_here,
        })
    }

    /// The current partition-index-to-mapping table.
    #[must_use]
    pub fn map(&self) -> &BTreeMap<usize, LoopMapping> {
        self.loop_map
            .as_ref()
            .expect("a LoopbackScope always holds an acquired mapping")
    }
}

impl Drop for LoopbackScope<'_> {
    fn drop(&mut self) {
        if self.acquired_here {
            match external::kpartx_delete(self.runner, &self.image_path) {
                Ok(()) => *self.loop_map = None,
                Err(e) => log::warn!(
                    "releasing loopback mapping for {} failed: {e}",
                    self.image_path.display()
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_map_lines_by_partition_index() {
        let stdout = b"add map loop0p1 (253:0): 0 1048576 linear 7:0 2048\n\
add map loop0p2 (253:1): 0 2097152 linear 7:0 1050624\n";
        let map = parse_kpartx_add_output(stdout);
        assert_eq!(
            map.get(&1).unwrap().mapper_device,
            PathBuf::from("/dev/mapper/loop0p1")
        );
        assert_eq!(map.get(&1).unwrap().loop_device, PathBuf::from("/dev/loop0"));
        assert_eq!(
            map.get(&2).unwrap().mapper_device,
            PathBuf::from("/dev/mapper/loop0p2")
        );
    }

    #[test]
    fn ignores_unrelated_lines() {
        let stdout = b"loop deleted : /dev/loop0\nadd map loop3p1 (253:2): junk\n";
        let map = parse_kpartx_add_output(stdout);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&1));
    }
}
