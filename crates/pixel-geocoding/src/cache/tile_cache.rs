//! LRU cache for decoded lat/lon tiles.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{CacheStats, PixelRect};

/// Cache key for tiles: (tile_x, tile_y).
pub type TileKey = (usize, usize);

/// Latitude and longitude samples of one tile, row-major within `rect`.
#[derive(Debug, Clone, PartialEq)]
pub struct LatLonTile {
    pub rect: PixelRect,
    pub lat: Vec<f32>,
    pub lon: Vec<f32>,
}

impl LatLonTile {
    /// Memory held by the sample buffers.
    pub fn byte_size(&self) -> usize {
        (self.lat.len() + self.lon.len()) * std::mem::size_of::<f32>()
    }

    /// Buffer index of an absolute pixel inside `rect`.
    pub fn index(&self, x: usize, y: usize) -> usize {
        let col = x - self.rect.x as usize;
        let row = y - self.rect.y as usize;
        row * self.rect.width as usize + col
    }
}

/// LRU cache for decoded tiles with memory-bounded eviction.
///
/// Tiles are shared out as `Arc`s, so an evicted tile stays alive for any
/// search still reading it.
pub struct TileCache {
    cache: LruCache<TileKey, Arc<LatLonTile>>,
    memory_limit: usize,
    current_memory: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TileCache {
    /// Create a cache bounded to `memory_limit` bytes of tiles of
    /// `tile_size x tile_size` pixels.
    pub fn new(memory_limit: usize, tile_size: usize) -> Self {
        let tile_bytes = (tile_size * tile_size * 2 * std::mem::size_of::<f32>()).max(1);
        let max_entries = (memory_limit / tile_bytes).max(16);

        Self {
            cache: LruCache::new(NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)),
            memory_limit,
            current_memory: 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Try to get a tile from the cache, counting the hit or miss.
    pub fn get(&mut self, key: &TileKey) -> Option<Arc<LatLonTile>> {
        if let Some(tile) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(Arc::clone(tile))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Insert a tile, evicting least recently used tiles to stay within the
    /// memory limit. A tile larger than the whole budget is not cached.
    pub fn insert(&mut self, key: TileKey, tile: Arc<LatLonTile>) {
        let size = tile.byte_size();

        if let Some(previous) = self.cache.pop(&key) {
            self.current_memory = self.current_memory.saturating_sub(previous.byte_size());
        }

        while self.current_memory + size > self.memory_limit && !self.cache.is_empty() {
            if let Some((_, evicted)) = self.cache.pop_lru() {
                self.current_memory = self.current_memory.saturating_sub(evicted.byte_size());
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        if size <= self.memory_limit {
            if let Some((_, evicted)) = self.cache.push(key, tile) {
                // Entry-count bound hit before the memory bound.
                self.current_memory = self.current_memory.saturating_sub(evicted.byte_size());
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
            self.current_memory += size;
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            memory_bytes: self.current_memory as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Get the current memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }
}
