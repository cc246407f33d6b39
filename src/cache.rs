//! Rendered page cache

use crate::render::Bitmap;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identifies one rendered page: which document, which page, at which width
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub document: PathBuf,
    pub index: u32,
    pub width: u32,
}

impl PageKey {
    pub fn new<P: Into<PathBuf>>(document: P, index: u32, width: u32) -> Self {
        Self {
            document: document.into(),
            index,
            width,
        }
    }
}

struct CacheInner {
    lru: LruCache<PageKey, Arc<Bitmap>>,
    total_bytes: usize,
}

/// Cache of rendered pages with entry count and byte budget limits
pub struct BitmapCache {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl BitmapCache {
    /// Create a new cache with the specified entry capacity and byte budget
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store a bitmap.
    /// Rejects bitmaps larger than max_bytes entirely.
    /// Evicts LRU entries until byte budget is satisfied.
    pub fn put(&self, key: PageKey, bitmap: Arc<Bitmap>) {
        let new_size = bitmap.byte_len();

        if new_size > self.max_bytes {
            tracing::debug!(page = key.index, bytes = new_size, "Bitmap exceeds cache budget");
            return;
        }

        let mut inner = self.inner.lock();

        if let Some(old) = inner.lru.pop(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.byte_len());
        }

        while inner.total_bytes + new_size > self.max_bytes {
            if let Some((_evicted_key, evicted)) = inner.lru.pop_lru() {
                inner.total_bytes = inner.total_bytes.saturating_sub(evicted.byte_len());
            } else {
                break;
            }
        }

        // Entry-capacity eviction happens inside the LRU; account for it
        if let Some((_evicted_key, evicted)) = inner.lru.push(key, bitmap) {
            inner.total_bytes = inner.total_bytes.saturating_sub(evicted.byte_len());
        }
        inner.total_bytes += new_size;
    }

    pub fn get(&self, key: &PageKey) -> Option<Arc<Bitmap>> {
        self.inner.lock().lru.get(key).cloned()
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        self.inner.lock().lru.contains(key)
    }

    pub fn remove(&self, key: &PageKey) -> Option<Arc<Bitmap>> {
        let mut inner = self.inner.lock();
        let removed = inner.lru.pop(key)?;
        inner.total_bytes = inner.total_bytes.saturating_sub(removed.byte_len());
        Some(removed)
    }

    /// Drop every page of `document`, at any width
    pub fn remove_document(&self, document: &Path) -> usize {
        let mut inner = self.inner.lock();
        let keys: Vec<PageKey> = inner
            .lru
            .iter()
            .filter(|(key, _)| key.document == document)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            if let Some(removed) = inner.lru.pop(key) {
                inner.total_bytes = inner.total_bytes.saturating_sub(removed.byte_len());
            }
        }
        keys.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Total bytes currently stored
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }
}
