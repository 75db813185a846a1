// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Injectable randomness for disk signatures and GUIDs.
//!
//! [`MbrBuilder`] and [`GptBuilder`] need fresh random bytes for the
//! MBR disk signature and for GPT disk/unique-partition GUIDs. Pulling
//! straight from [`rand::thread_rng`] would make every serialized byte
//! non-deterministic, which rules out exact-bytes tests. [`RandomSource`]
//! is the seam: production code uses [`OsRandomSource`], tests supply a
//! fixed or counting source instead.
//!
//! [`MbrBuilder`]: crate::MbrBuilder
//! [`GptBuilder`]: crate::GptBuilder

use rand::RngCore;

/// Source of random bytes used when building a partition table.
pub trait RandomSource {
    /// Fill `buf` with random bytes.
    fn fill_bytes(&mut self, buf: &mut [u8]);
}

/// [`RandomSource`] backed by the thread-local OS-seeded RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn fill_bytes(&mut self, buf: &mut [u8]) {
        RngCore::fill_bytes(&mut rand::thread_rng(), buf);
    }
}

impl<R: RngCore> RandomSource for R {
    fn fill_bytes(&mut self, buf: &mut [u8]) {
        RngCore::fill_bytes(self, buf);
    }
}
