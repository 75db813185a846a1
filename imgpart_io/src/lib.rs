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

//! Builds MBR and GPT partition tables and writes them to a block
//! device through a block IO interface.
//!
//! This crate adds [`MbrBuilder`] and [`GptBuilder`], which own a
//! partition table in memory, maintain it transactionally as
//! partitions are registered, and know how to serialize it to a file.
//! Lower down, [`Disk`] writes the GPT/MBR types defined in the
//! [`imgpart_types`] crate through a [`BlockIo`] implementation. The
//! disk can be backed by:
//! * [`MutSliceBlockIo`]: a mutable byte slice, handy for tests that
//!   don't want to touch the filesystem.
//! * [`StdBlockIo`] (only available if the `std` feature is enabled):
//!   wraps any type that implements [`Write`] + [`Seek`], such as a
//!   [`File`].
//! * A custom implementation of the [`BlockIo`] trait.
//!
//! This crate only builds partition tables; it never reads or parses
//! one back off an existing disk.
//!
//! # Features
//!
//! * `std`: Enables [`StdBlockIo`], [`MbrBuilder`], and [`GptBuilder`]
//!   (the builders need to create and truncate files), as well as
//!   `std::error::Error` implementations for the error types. Off by
//!   default.
//!
//! [`File`]: std::fs::File
//! [`Seek`]: std::io::Seek
//! [`Write`]: std::io::Write

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::as_conversions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod block_io;
mod disk;
#[cfg(feature = "std")]
mod gpt_builder;
#[cfg(feature = "std")]
mod mbr_builder;
mod rng;
mod slice_block_io;
#[cfg(feature = "std")]
mod std_support;

#[cfg(feature = "std")]
pub mod error;

// Re-export dependencies.
pub use imgpart_types;

pub use block_io::BlockIo;
pub use disk::{Disk, DiskError};
pub use rng::{OsRandomSource, RandomSource};
pub use slice_block_io::{MutSliceBlockIo, SliceTooSmall};

#[cfg(feature = "std")]
pub use error::PartitionTableError;
#[cfg(feature = "std")]
pub use gpt_builder::GptBuilder;
#[cfg(feature = "std")]
pub use mbr_builder::MbrBuilder;
#[cfg(feature = "std")]
pub use std_support::StdBlockIo;
