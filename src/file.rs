// Author: Lukas Bower
// Purpose: Sparse block-paged byte storage backing regular files.

use std::collections::HashMap;

use crate::FsError;

/// In-memory file contents, paged into blocks of at most `block_size` bytes.
///
/// Block `i` covers byte offsets `[i * block_size, (i + 1) * block_size)`.
/// The last written block may be shorter than `block_size`; it grows lazily
/// as writes extend it. `size` is the high-water mark of every write, never
/// reduced.
#[derive(Debug)]
pub(crate) struct BlockFile {
    size: u64,
    block_size: u64,
    blocks: HashMap<u64, Vec<u8>>,
}

impl BlockFile {
    pub fn new(block_size: u64) -> Self {
        Self {
            size: 0,
            block_size,
            blocks: HashMap::new(),
        }
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    /// Record `p` at `offset`, cut along block boundaries.
    ///
    /// Offsets past the current tail clamp to it: the buffer never exposes
    /// holes to readers. Returns the number of bytes consumed, always the
    /// full input.
    pub fn write_at(&mut self, p: &[u8], offset: u64) -> Result<usize, FsError> {
        let start = offset.min(self.size);
        let mut num = start / self.block_size;
        let mut off = (start % self.block_size) as usize;
        let mut rest = p;
        while !rest.is_empty() {
            let room = self.block_size as usize - off;
            let consume = room.min(rest.len());
            let block = self.blocks.entry(num).or_default();
            let need = off + consume;
            if block.len() < need {
                block.resize(need, 0);
            }
            block[off..need].copy_from_slice(&rest[..consume]);
            rest = &rest[consume..];
            off = 0;
            num += 1;
        }
        self.size = self.size.max(start + p.len() as u64);
        Ok(p.len())
    }

    /// Copy bytes starting at `offset` into `buf`.
    ///
    /// Fails with end-of-stream when `offset` lies strictly past the tail.
    /// Otherwise the count is clamped to the bytes remaining and the copy
    /// stops early at the first missing or short block.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        if offset > self.size {
            return Err(FsError::EndOfFile);
        }
        let count = (buf.len() as u64).min(self.size - offset) as usize;
        let mut num = offset / self.block_size;
        let mut off = (offset % self.block_size) as usize;
        let mut n = 0;
        while n < count {
            let Some(block) = self.blocks.get(&num) else {
                break;
            };
            if off >= block.len() {
                break;
            }
            let m = (block.len() - off).min(count - n);
            buf[n..n + m].copy_from_slice(&block[off..off + m]);
            n += m;
            off = 0;
            num += 1;
        }
        Ok(n)
    }

    pub fn close(&mut self) {}
}
