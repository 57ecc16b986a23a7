//! Per-stage scratch memory.
//!
//! Each stage owns one growable byte buffer laid out as `blocks` equal
//! regions:
//!
//! ```text
//! ┌──────────────┬──────────────┬─────┬──────────────┐
//! │   Block 0    │   Block 1    │ ... │  Block N-1   │
//! └──────────────┴──────────────┴─────┴──────────────┘
//!  capacity × stride bytes each
//! ```
//!
//! Buffers only grow, to the largest frame count seen, and are released
//! with the converter.

use crate::error::{Error, Result};
use crate::kernels::{Blocks, BlocksMut};

#[derive(Debug, Default)]
struct ScratchBuffer {
    data: Vec<u8>,
    stride: usize,
    blocks: usize,
    /// Frames each block can hold.
    capacity: usize,
}

impl ScratchBuffer {
    fn block_size(&self) -> usize {
        self.capacity * self.stride
    }

    fn check(&self, count: usize, len: usize) -> Result<()> {
        if count > self.blocks || len > self.block_size() {
            return Err(Error::Buffer(format!(
                "scratch view of {count} x {len} bytes exceeds {} x {} bytes",
                self.blocks,
                self.block_size()
            )));
        }
        Ok(())
    }

    fn view(&self, count: usize, len: usize) -> Result<Blocks<'_>> {
        self.check(count, len)?;
        Ok(self
            .data
            .chunks(self.block_size().max(1))
            .take(count)
            .map(|block| &block[..len])
            .collect())
    }

    fn view_mut(&mut self, count: usize, len: usize) -> Result<BlocksMut<'_>> {
        self.check(count, len)?;
        let size = self.block_size().max(1);
        Ok(self
            .data
            .chunks_mut(size)
            .take(count)
            .map(|block| &mut block[..len])
            .collect())
    }
}

/// Scratch buffers indexed by stage.
#[derive(Debug)]
pub(crate) struct ScratchArena {
    buffers: Vec<ScratchBuffer>,
}

impl ScratchArena {
    pub(crate) fn new(stages: usize) -> Self {
        Self {
            buffers: (0..stages).map(|_| ScratchBuffer::default()).collect(),
        }
    }

    /// Make room for `frames` frames in the buffer of `stage`.
    pub(crate) fn ensure(
        &mut self,
        stage: usize,
        stride: usize,
        blocks: usize,
        frames: usize,
    ) -> Result<()> {
        let buffer = &mut self.buffers[stage];
        if frames <= buffer.capacity && stride == buffer.stride && blocks == buffer.blocks {
            return Ok(());
        }
        let capacity = buffer.capacity.max(frames);
        let size = blocks
            .checked_mul(stride)
            .and_then(|n| n.checked_mul(capacity))
            .ok_or_else(|| {
                Error::Buffer(format!(
                    "stage {stage} scratch of {capacity} frames overflows"
                ))
            })?;
        buffer
            .data
            .try_reserve(size.saturating_sub(buffer.data.len()))
            .map_err(|e| Error::Buffer(format!("stage {stage} scratch: {e}")))?;

        buffer.stride = stride;
        buffer.blocks = blocks;
        buffer.capacity = capacity;
        buffer.data.resize(size, 0);
        tracing::debug!(
            "stage {} scratch grown to {} frames ({} bytes)",
            stage,
            buffer.capacity,
            buffer.data.len()
        );
        Ok(())
    }

    /// Frames the buffer of `stage` currently holds.
    #[cfg(test)]
    pub(crate) fn capacity(&self, stage: usize) -> usize {
        self.buffers[stage].capacity
    }

    /// Read view of the first `count` blocks, `len` bytes each.
    pub(crate) fn blocks(&self, stage: usize, count: usize, len: usize) -> Result<Blocks<'_>> {
        self.buffers[stage].view(count, len)
    }

    /// Write view of the first `count` blocks, `len` bytes each.
    pub(crate) fn blocks_mut(
        &mut self,
        stage: usize,
        count: usize,
        len: usize,
    ) -> Result<BlocksMut<'_>> {
        self.buffers[stage].view_mut(count, len)
    }

    /// Read view of `src` alongside a write view of a different stage `dst`.
    pub(crate) fn pair(
        &mut self,
        src: (usize, usize, usize),
        dst: (usize, usize, usize),
    ) -> Result<(Blocks<'_>, BlocksMut<'_>)> {
        let (src_stage, src_count, src_len) = src;
        let (dst_stage, dst_count, dst_len) = dst;
        if src_stage == dst_stage {
            return Err(Error::Buffer(format!(
                "stage {src_stage} scratch cannot be both source and destination"
            )));
        }

        let (src_buf, dst_buf) = if src_stage < dst_stage {
            let (head, tail) = self.buffers.split_at_mut(dst_stage);
            (&head[src_stage], &mut tail[0])
        } else {
            let (head, tail) = self.buffers.split_at_mut(src_stage);
            (&tail[0], &mut head[dst_stage])
        };
        Ok((
            src_buf.view(src_count, src_len)?,
            dst_buf.view_mut(dst_count, dst_len)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grows_monotonically() {
        let mut arena = ScratchArena::new(2);
        arena.ensure(0, 8, 2, 100).unwrap();
        assert_eq!(arena.capacity(0), 100);
        arena.ensure(0, 8, 2, 10).unwrap();
        assert_eq!(arena.capacity(0), 100, "scratch must not shrink");
        arena.ensure(0, 8, 2, 400).unwrap();
        assert_eq!(arena.capacity(0), 400);
        assert_eq!(arena.capacity(1), 0);
    }

    #[test]
    fn test_oversized_scratch_is_rejected() {
        let mut arena = ScratchArena::new(1);
        arena.ensure(0, 8, 2, 4).unwrap();
        let result = arena.ensure(0, 8, 2, usize::MAX / 4);
        assert!(matches!(result, Err(Error::Buffer(_))));
        assert_eq!(arena.capacity(0), 4, "failed growth must keep the old buffer");
        assert!(arena.blocks(0, 2, 32).is_ok());
    }

    #[test]
    fn test_blocks_are_disjoint() {
        let mut arena = ScratchArena::new(1);
        arena.ensure(0, 4, 2, 3).unwrap();
        {
            let mut blocks = arena.blocks_mut(0, 2, 12).unwrap();
            blocks[0].fill(1);
            blocks[1].fill(2);
        }
        let blocks = arena.blocks(0, 2, 12).unwrap();
        assert!(blocks[0].iter().all(|&b| b == 1));
        assert!(blocks[1].iter().all(|&b| b == 2));
    }

    #[test]
    fn test_view_beyond_capacity_fails() {
        let mut arena = ScratchArena::new(1);
        arena.ensure(0, 4, 1, 3).unwrap();
        assert!(matches!(arena.blocks(0, 1, 16), Err(Error::Buffer(_))));
        assert!(matches!(arena.blocks(0, 2, 4), Err(Error::Buffer(_))));
    }

    #[test]
    fn test_pair_in_both_orders() {
        let mut arena = ScratchArena::new(3);
        arena.ensure(0, 4, 1, 2).unwrap();
        arena.ensure(2, 8, 1, 2).unwrap();
        arena.blocks_mut(2, 1, 16).unwrap()[0].fill(7);

        {
            let (src, mut dst) = arena.pair((2, 1, 16), (0, 1, 8)).unwrap();
            dst[0].copy_from_slice(&src[0][..8]);
        }
        assert_eq!(arena.blocks(0, 1, 8).unwrap()[0], &[7u8; 8]);

        {
            let (src, dst) = arena.pair((0, 1, 8), (2, 1, 16)).unwrap();
            assert_eq!(src[0].len(), 8);
            assert_eq!(dst[0].len(), 16);
        }

        assert!(arena.pair((1, 1, 0), (1, 1, 0)).is_err());
    }
}
