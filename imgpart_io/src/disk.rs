// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::BlockIo;
use bytemuck::bytes_of;
use core::fmt::{self, Debug, Display, Formatter};
use imgpart_types::{GptHeader, Lba, MasterBootRecord};

/// Error type used by [`Disk`] methods.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug)]
pub enum DiskError<IoError: Debug + Display> {
    /// The storage buffer is not large enough.
    BufferTooSmall,

    /// Error from a [`BlockIo`] implementation (see [`BlockIo::Error`]).
    ///
    /// [`BlockIo`]: crate::BlockIo
    /// [`BlockIo::Error`]: crate::BlockIo::Error
    Io(IoError),
}

impl<IoError> From<IoError> for DiskError<IoError>
where
    IoError: Debug + Display,
{
    fn from(err: IoError) -> Self {
        DiskError::Io(err)
    }
}

impl<IoError> Display for DiskError<IoError>
where
    IoError: Debug + Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => f.write_str("storage buffer is too small"),
            Self::Io(io) => Display::fmt(io, f),
        }
    }
}

/// Write MBR and GPT data structures to a block device.
///
/// The disk is accessed via an object implementing the [`BlockIo`]
/// trait, so all writes are on block boundaries. Writes are not
/// guaranteed to be completed until [`flush`] is called, which happens
/// automatically (errors silently ignored) when the `Disk` is dropped.
///
/// [`flush`]: Self::flush
pub struct Disk<Io: BlockIo> {
    io: Io,
}

impl<Io: BlockIo> Disk<Io> {
    /// Create a `Disk`.
    pub fn new(io: Io) -> Self {
        Self { io }
    }

    /// Clip the size of `block_buf` to a single block. Return
    /// `BufferTooSmall` if the buffer isn't big enough.
    fn clip_block_buf_size<'buf>(
        &self,
        block_buf: &'buf mut [u8],
    ) -> Result<&'buf mut [u8], DiskError<Io::Error>> {
        if let Some(block_size) = self.io.block_size().to_usize() {
            block_buf
                .get_mut(..block_size)
                .ok_or(DiskError::BufferTooSmall)
        } else {
            Err(DiskError::BufferTooSmall)
        }
    }

    /// Write an MBR to the given [`Lba`]. If the block size is bigger
    /// than the MBR, the rest of the block is filled with zeroes.
    ///
    /// `block_buf` is a mutable byte buffer with a length of at least one block.
    pub fn write_mbr(
        &mut self,
        lba: Lba,
        mbr: &MasterBootRecord,
        mut block_buf: &mut [u8],
    ) -> Result<(), DiskError<Io::Error>> {
        block_buf = self.clip_block_buf_size(block_buf)?;

        let mbr_bytes = bytes_of(mbr);
        assert!(block_buf.len() >= mbr_bytes.len());

        let (left, right) = block_buf.split_at_mut(mbr_bytes.len());
        left.copy_from_slice(mbr_bytes);
        right.fill(0);

        self.io.write_blocks(lba, block_buf)?;
        Ok(())
    }

    /// Write a [`GptHeader`] to the specified [`Lba`].
    ///
    /// The header is written to the beginning of the block, and all
    /// remaining bytes in the block are set to zero (see Table 5-5 "GPT
    /// Header" in the UEFI Specification: "The rest of the block is
    /// reserved by UEFI and must be zero").
    ///
    /// `block_buf` is a mutable byte buffer with a length of at least one block.
    pub fn write_gpt_header(
        &mut self,
        lba: Lba,
        header: &GptHeader,
        mut block_buf: &mut [u8],
    ) -> Result<(), DiskError<Io::Error>> {
        block_buf = self.clip_block_buf_size(block_buf)?;

        let header_bytes = bytes_of(header);
        assert!(block_buf.len() >= header_bytes.len());

        let (left, right) = block_buf.split_at_mut(header_bytes.len());
        left.copy_from_slice(header_bytes);
        right.fill(0);

        self.io.write_blocks(lba, block_buf)?;
        Ok(())
    }

    /// Write a raw partition entry array to the given starting [`Lba`].
    /// `bytes` must already be padded to a whole number of blocks.
    pub fn write_gpt_partition_entry_array(
        &mut self,
        start_lba: Lba,
        bytes: &[u8],
    ) -> Result<(), DiskError<Io::Error>> {
        self.io.write_blocks(start_lba, bytes)?;
        Ok(())
    }

    /// Flush any pending writes to the disk.
    pub fn flush(&mut self) -> Result<(), Io::Error> {
        self.io.flush()
    }
}

impl<Io: BlockIo> Drop for Disk<Io> {
    fn drop(&mut self) {
        let _r = self.flush();
    }
}
