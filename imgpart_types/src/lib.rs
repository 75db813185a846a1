// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Data types for legacy MBR and GPT partition tables.
//!
//! # Disk components
//!
//! ```text
//! ┌───┬───────┬─────────────────┬─────────┬───────────────────┬─────────┐
//! │MBR│Primary│Primary partition│Partition│Secondary partition│Secondary│
//! │   │header │entry array      │data     │entry array        │header   │
//! └───┴───────┴─────────────────┴─────────┴───────────────────┴─────────┘
//! ```
//!
//! 1. The first block of a GPT disk contains a protective MBR. See
//! [`MasterBootRecord::protective_mbr`].
//! 2. The second block of the disk contains the primary GPT header. See
//! [`GptHeader`].
//! 3. Additional blocks after the header contain the partition entry
//! array. See [`GptPartitionEntry`].
//! 4. At the end of the disk is a secondary GPT header and partition
//! entry array.
//!
//! This crate only builds these structures; it does not read or parse
//! partition tables from an existing disk.
//!
//! # Endianness
//!
//! Unless otherwise noted, all fields in this library are little
//! endian, matching the UEFI Specification (section 1.8.1 "Data
//! Structure Descriptions"). This is true even when running the code
//! on a big-endian architecture; the [`U16Le`], [`U32Le`], [`U64Le`],
//! and [`LbaLe`] types help enforce this. The little-endian convention
//! is also used for [`Display`] implementations.
//!
//! One notable exception is the [`Guid`] type, which is partially
//! little endian and partially big endian as described in Appendix A of
//! the UEFI Specification.
//!
//! # Features
//!
//! * `bytemuck`: Enables zero-copy conversion between these types and
//!   raw bytes via the [`bytemuck`] crate. Enabled by default.
//! * `std`: Lifts the `no_std` restriction. Off by default; error types
//!   implement [`core::error::Error`] regardless of this feature.
//!
//! [`Display`]: core::fmt::Display

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_copy_implementations)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::as_conversions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

mod block;
mod catalog;
mod crc32;
mod guid;
mod header;
mod mbr;
mod num;
mod partition_entry;
mod sparse_list;

// Re-export dependencies.
#[cfg(feature = "bytemuck")]
pub use bytemuck;
pub use crc;
pub use ucs2;

pub use block::{BlockSize, Lba, LbaLe, LbaRangeInclusive};
pub use catalog::{
    by_gpt_code, by_short_name, CatalogEntry, PartitionCode,
    UnknownPartitionCode, CATALOG,
};
pub use crc32::Crc32;
pub use guid::{Guid, GuidFromStrError};
pub use header::{GptHeader, GptHeaderRevision, GptHeaderSignature};
pub use mbr::{Chs, DiskGeometry, MasterBootRecord, MbrPartitionRecord};
pub use num::{U16Le, U32Le, U64Le};
pub use partition_entry::{
    GptPartitionAttributes, GptPartitionEntry, GptPartitionEntrySize,
    GptPartitionEntrySizeError, GptPartitionName, GptPartitionNameFromStrError,
    GptPartitionNameSetCharError, GptPartitionType,
};
pub use sparse_list::SparseList;
