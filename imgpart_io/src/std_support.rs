// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{BlockIo, DiskError};
use imgpart_types::{BlockSize, Lba};
use std::error::Error;
use std::fmt::{Debug, Display};
use std::io::{self, Seek, SeekFrom, Write};

/// Wrapper type that implements the [`BlockIo`] trait for a file-like
/// type that implements [`Write`] and [`Seek`].
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use imgpart_io::imgpart_types::BlockSize;
/// use imgpart_io::StdBlockIo;
/// use std::fs::File;
///
/// let mut file = File::create("disk.img")?;
/// let block_io = StdBlockIo::new(&mut file, BlockSize::B512);
/// # Ok(())
/// # }
/// ```
pub struct StdBlockIo<'a, T>
where
    T: Write + Seek,
{
    file: &'a mut T,
    block_size: BlockSize,
}

impl<'a, T> StdBlockIo<'a, T>
where
    T: Write + Seek,
{
    /// Create a `StdBlockIo` from a file-like input. The input type must
    /// implement [`Write`] and [`Seek`].
    pub fn new(file: &'a mut T, block_size: BlockSize) -> Self {
        Self { file, block_size }
    }
}

impl<'a, T> BlockIo for StdBlockIo<'a, T>
where
    T: Write + Seek,
{
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        self.block_size
    }

    fn write_blocks(
        &mut self,
        start_lba: Lba,
        src: &[u8],
    ) -> Result<(), Self::Error> {
        self.assert_valid_buffer(src);

        self.file.seek(SeekFrom::Start(
            start_lba.to_u64() * self.block_size().to_u64(),
        ))?;
        self.file.write_all(src)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.file.flush()
    }
}

impl<Custom> Error for DiskError<Custom> where Custom: Debug + Display {}
