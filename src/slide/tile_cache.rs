//! LRU cache of decoded native tiles.
//!
//! Output tiles rarely line up with the slide's own JPEG tiles, so one
//! native tile is typically needed by up to four neighbouring output tiles.
//! Keeping recently decoded tiles avoids decoding them again.
//!
//! Capacity is bounded in bytes of decoded RGBA pixels.

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::RgbaImage;
use lru::LruCache;
use tokio::sync::Mutex;

/// Default capacity: 64MB of decoded pixels
pub const DEFAULT_DECODED_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Bounds LRU bookkeeping when tiles are tiny
const MAX_ENTRIES: usize = 4096;

/// `(level, tile_x, tile_y)`
pub type TileKey = (usize, u32, u32);

struct Inner {
    tiles: LruCache<TileKey, Arc<RgbaImage>>,
    bytes: usize,
}

/// Size-bounded LRU of decoded tiles, shared between tile workers.
pub struct DecodedTileCache {
    inner: Mutex<Inner>,
    max_bytes: usize,
}

impl DecodedTileCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_DECODED_CACHE_BYTES)
    }

    pub fn with_capacity(max_bytes: usize) -> Self {
        Self::with_capacity_and_entries(max_bytes, MAX_ENTRIES)
    }

    pub fn with_capacity_and_entries(max_bytes: usize, max_entries: usize) -> Self {
        let entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                tiles: LruCache::new(entries),
                bytes: 0,
            }),
            max_bytes,
        }
    }

    pub async fn get(&self, key: &TileKey) -> Option<Arc<RgbaImage>> {
        self.inner.lock().await.tiles.get(key).cloned()
    }

    /// Insert a tile, evicting least recently used tiles while over capacity.
    ///
    /// A tile larger than the whole capacity is not cached.
    pub async fn put(&self, key: TileKey, tile: Arc<RgbaImage>) {
        let size = tile.as_raw().len();
        if size > self.max_bytes {
            return;
        }

        let mut inner = self.inner.lock().await;
        if let Some((_, evicted)) = inner.tiles.push(key, tile) {
            inner.bytes = inner.bytes.saturating_sub(evicted.as_raw().len());
        }
        inner.bytes += size;

        while inner.bytes > self.max_bytes {
            match inner.tiles.pop_lru() {
                Some((_, evicted)) => {
                    inner.bytes = inner.bytes.saturating_sub(evicted.as_raw().len())
                }
                None => {
                    inner.bytes = 0;
                    break;
                }
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.tiles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Bytes of decoded pixels currently held.
    pub async fn size(&self) -> usize {
        self.inner.lock().await.bytes
    }
}

impl Default for DecodedTileCache {
    fn default() -> Self {
        Self::new()
    }
}
