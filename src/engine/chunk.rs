// SmartBackup library for resumable backups to S3 compatible storage
// Copyright 2024 the SmartBackup authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Chunk planning: maps a source size to part boundaries.

use crate::error::Error;

pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024; // 5 MiB
pub const MAX_PART_SIZE: u64 = 1024 * MIN_PART_SIZE; // 5 GiB
pub const MAX_OBJECT_SIZE: u64 = 1024 * MAX_PART_SIZE; // 5 TiB
pub const MAX_MULTIPART_COUNT: u16 = 10_000;

/// One contiguous byte range of the source, uploaded as a single part.
/// Part numbers are 1-based and contiguous.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartSpec {
    pub number: u16,
    pub offset: u64,
    pub length: u64,
}

/// Part size and count derived from the source size alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    pub part_size: u64,
    pub part_count: u16,
}

/// Returns the part size for a source of given size.
///
/// Scales with the square root of the source size so that the part count
/// grows sub-linearly: small files use the 5 MiB floor, huge files get
/// proportionally larger parts.
pub fn chunk_size(size: u64) -> u64 {
    let scaled = ((MIN_PART_SIZE as f64).sqrt() * (size as f64).sqrt()) as u64;
    scaled.max(MIN_PART_SIZE)
}

impl ChunkPlan {
    /// Derives the plan for a source of given non-zero size. Zero-length
    /// sources must bypass multipart entirely and use a whole-object put.
    pub fn for_size(size: u64) -> Result<ChunkPlan, Error> {
        if size == 0 || size > MAX_OBJECT_SIZE {
            return Err(Error::InvalidObjectSize(size));
        }

        let part_size = chunk_size(size);
        let part_count = size.div_ceil(part_size);
        if part_count > MAX_MULTIPART_COUNT as u64 {
            return Err(Error::InvalidPartCount(
                size,
                part_size,
                MAX_MULTIPART_COUNT,
            ));
        }

        Ok(ChunkPlan {
            part_size,
            part_count: part_count as u16,
        })
    }

    /// Yields the part ranges for a source of given size. The ranges
    /// partition `[0, size)` exactly; only the last part may be short.
    pub fn parts(&self, size: u64) -> impl Iterator<Item = PartSpec> + '_ {
        let part_size = self.part_size;
        (1..=self.part_count).map(move |number| {
            let offset = (number as u64 - 1) * part_size;
            PartSpec {
                number,
                offset,
                length: part_size.min(size - offset),
            }
        })
    }
}
