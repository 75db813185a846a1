// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error type shared by [`crate::MbrBuilder`] and [`crate::GptBuilder`].

use thiserror::Error;

/// Failure modes for building and serializing a partition table.
#[derive(Debug, Error)]
pub enum PartitionTableError {
    /// Partition index is outside the table's valid range.
    #[error("partition index {index} is out of range (table holds {max} entries)")]
    InvalidPartitionNumber {
        /// The rejected, 1-based index.
        index: usize,
        /// Maximum valid index.
        max: usize,
    },

    /// A start LBA or sector count does not fit the on-disk field width.
    #[error("partition does not fit on disk: {reason}")]
    PartitionTooLarge {
        /// Human-readable description of which field overflowed.
        reason: String,
    },

    /// A partition code did not resolve to a catalog entry.
    #[error("unknown partition code: {0}")]
    UnknownPartitionCode(String),

    /// A partition name does not fit the 36-character UCS-2 field.
    #[error("invalid partition name: {0}")]
    InvalidPartitionName(String),

    /// Underlying file or directory operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
