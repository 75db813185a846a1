// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::BlockIo;
use core::fmt::{self, Display, Formatter};
use imgpart_types::{BlockSize, Lba};

/// Error for out-of-bounds writes via [`MutSliceBlockIo`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SliceTooSmall;

impl Display for SliceTooSmall {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("write would go past the end of the backing slice")
    }
}

impl core::error::Error for SliceTooSmall {}

/// [`BlockIo`] implementation backed by a mutable byte slice.
///
/// Useful for tests that want to inspect the exact bytes a builder
/// would write, without touching the filesystem.
pub struct MutSliceBlockIo<'a> {
    data: &'a mut [u8],
    block_size: BlockSize,
}

impl<'a> MutSliceBlockIo<'a> {
    /// Wrap `data` as a block device with the given `block_size`.
    pub fn new(data: &'a mut [u8], block_size: BlockSize) -> Self {
        Self { data, block_size }
    }
}

impl BlockIo for MutSliceBlockIo<'_> {
    type Error = SliceTooSmall;

    fn block_size(&self) -> BlockSize {
        self.block_size
    }

    fn write_blocks(
        &mut self,
        start_lba: Lba,
        src: &[u8],
    ) -> Result<(), Self::Error> {
        self.assert_valid_buffer(src);

        let start_byte = usize::try_from(start_lba.to_u64())
            .ok()
            .and_then(|lba| lba.checked_mul(self.block_size.to_usize()?))
            .ok_or(SliceTooSmall)?;
        let end_byte = start_byte.checked_add(src.len()).ok_or(SliceTooSmall)?;

        let dest = self
            .data
            .get_mut(start_byte..end_byte)
            .ok_or(SliceTooSmall)?;
        dest.copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
