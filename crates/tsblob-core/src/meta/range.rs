//! Block range math.

/// Byte range `[start, end)` covered by one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl BlockRange {
    /// Length of this block in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Number of `block_size` blocks needed to cover `size` bytes: `ceil(size / block_size)`.
///
/// Panics if `block_size` is 0; callers validate block sizes up front.
pub fn block_count(size: u64, block_size: u64) -> u64 {
    assert!(block_size > 0, "block size must be positive");
    size / block_size + u64::from(size % block_size != 0)
}

/// Range of block `index`. Every block is `block_size` long except the last,
/// which holds the remainder.
///
/// Panics if `index` is not below `block_count(size, block_size)`.
pub fn block_range(size: u64, block_size: u64, index: u64) -> BlockRange {
    let count = block_count(size, block_size);
    assert!(
        index < count,
        "block index {index} out of range for {count} blocks"
    );
    let start = index * block_size;
    let end = start.saturating_add(block_size).min(size);
    BlockRange { start, end }
}

/// All block ranges of a file, in index order. Empty when `size` is 0.
pub fn plan_blocks(size: u64, block_size: u64) -> Vec<BlockRange> {
    (0..block_count(size, block_size))
        .map(|i| block_range(size, block_size, i))
        .collect()
}
