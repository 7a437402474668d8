use std::num::NonZeroUsize;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use lru::LruCache;
use tokio::sync::Mutex;

use super::range_reader::{check_range, RangeReader};
use crate::error::IoError;

/// Default block size: 256KB
pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

/// Default number of cached blocks per slide (25.6MB at the default block size).
pub const DEFAULT_CACHE_BLOCKS: usize = 100;

/// Block-aligned LRU cache in front of a [`RangeReader`].
///
/// Opening a slide walks the IFD chain and reads dozens of small tag
/// values; tile reads then hit neighbouring offsets. Reads are served from
/// fixed-size blocks, and only missing blocks go to the inner reader.
///
/// The lock is never held across the inner read, so concurrent misses on
/// the same block may both fetch it. The second insert wins.
pub struct BlockCache<R> {
    inner: R,
    block_size: usize,
    blocks: Mutex<LruCache<u64, Bytes>>,
}

impl<R: RangeReader> BlockCache<R> {
    /// Wrap `inner` with the default block size and capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS)
    }

    /// Wrap `inner` caching at most `capacity` blocks of `block_size` bytes.
    pub fn with_capacity(inner: R, block_size: usize, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            block_size: block_size.max(1),
            blocks: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The wrapped reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn block(&self, index: u64) -> Result<Bytes, IoError> {
        if let Some(block) = self.blocks.lock().await.get(&index) {
            return Ok(block.clone());
        }

        let start = index * self.block_size as u64;
        let len = (self.inner.size().saturating_sub(start)).min(self.block_size as u64) as usize;
        let block = self.inner.read_exact_at(start, len).await?;

        self.blocks.lock().await.put(index, block.clone());
        Ok(block)
    }
}

#[async_trait]
impl<R: RangeReader> RangeReader for BlockCache<R> {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.inner.size())?;
        if len == 0 {
            return Ok(Bytes::new());
        }

        let block_size = self.block_size as u64;
        let first = offset / block_size;
        let last = (offset + len as u64 - 1) / block_size;
        let skip = (offset % block_size) as usize;

        if first == last {
            let block = self.block(first).await?;
            return Ok(block.slice(skip..skip + len));
        }

        let mut out = BytesMut::with_capacity(len);
        for index in first..=last {
            let block = self.block(index).await?;
            let from = if index == first { skip } else { 0 };
            let take = (block.len() - from).min(len - out.len());
            out.extend_from_slice(&block[from..from + take]);
        }
        Ok(out.freeze())
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}
