//! # Buffered Page Cache
//!
//! [`CacheStorage`] wraps any [`Storage`] and buffers it in fixed-size
//! pages. All reads and writes go through resident page buffers; the
//! inner storage is only touched to fetch a missing page, to write back
//! evicted or flushed pages, and to resize on flush.
//!
//! ```text
//!   read/write ──> pages: HashMap<page_idx, Page>
//!                     │                │
//!                     │ fetch miss     │ flush / evict
//!                     v                v
//!                  inner.read      inner.write
//! ```
//!
//! ## Why
//!
//! The trie patches the file in 5- and 7-byte pieces. Buffering turns
//! those into page-sized writes, and it gives the engine one commit
//! point: nothing the trie wrote is visible in the inner storage until
//! [`Storage::flush`], and [`CacheStorage::clear`] with `dirty_only` can
//! still throw the whole batch away.
//!
//! Pages come out of a [`PagePool`] budget that may be shared between
//! several caches. When the pool is exhausted the cache evicts its own
//! least-recently-used evictable page. A page that has buffered writes is
//! only evictable when `auto_commit_evicted_pages` is set, because
//! evicting it must write it back ahead of the flush; with auto-commit
//! off and every resident page dirty, allocation fails with
//! [`NoPageAvailableError`].

use std::sync::Arc;

use eyre::Result;
use hashbrown::HashMap;
use lru::LruCache;

use crate::config::CacheSettings;

use super::pool::Page;
use super::{NoPageAvailableError, PagePool, Storage};

/// Page-buffering layer over an inner [`Storage`].
pub struct CacheStorage<S: Storage> {
    inner: S,
    pool: Arc<PagePool>,
    pages: HashMap<u64, Page>,
    /// Recency order over the evictable subset of `pages`.
    lru: LruCache<u64, ()>,
    /// Logical length; tracks buffered appends ahead of the inner storage.
    length: u64,
    /// The inner storage must be resized to `length` on the next flush.
    length_changed: bool,
    auto_commit_evicted_pages: bool,
}

fn page_extent(len: u64, page_size: usize) -> (Option<u64>, usize) {
    if len == 0 {
        (None, 0)
    } else {
        let last = (len - 1) / page_size as u64;
        let used = (len - last * page_size as u64) as usize;
        (Some(last), used)
    }
}

impl<S: Storage> CacheStorage<S> {
    /// Wraps `inner` with a private page pool built from `settings`.
    pub fn new(inner: S, settings: CacheSettings) -> Self {
        let pool = PagePool::bounded(
            settings.page_size,
            settings.max_page_count.unwrap_or(usize::MAX),
        )
        .shared();
        Self::with_pool(inner, pool, settings.auto_commit_evicted_pages)
    }

    /// Wraps `inner` drawing pages from a shared pool.
    pub fn with_pool(inner: S, pool: Arc<PagePool>, auto_commit_evicted_pages: bool) -> Self {
        let length = inner.len();
        Self {
            inner,
            pool,
            pages: HashMap::new(),
            lru: LruCache::unbounded(),
            length,
            length_changed: false,
            auto_commit_evicted_pages,
        }
    }

    pub fn page_size(&self) -> usize {
        self.pool.page_size()
    }

    pub fn pool(&self) -> &Arc<PagePool> {
        &self.pool
    }

    /// Number of currently resident pages.
    pub fn mapped_page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Drops resident pages without writing them back.
    ///
    /// With `dirty_only` set, only pages holding buffered writes are
    /// dropped and the logical length reverts to the inner storage's
    /// length, discarding everything since the last flush. Otherwise all
    /// resident pages are dropped and the logical length is kept.
    /// Returns whether any page was dropped.
    pub fn clear(&mut self, dirty_only: bool) -> bool {
        let targets: Vec<u64> = self
            .pages
            .iter()
            .filter_map(|(idx, page)| (!dirty_only || page.dirty()).then_some(*idx))
            .collect();
        let dropped = !targets.is_empty();
        for idx in targets {
            self.discard(idx);
        }
        if dirty_only {
            let inner_len = self.inner.len();
            if self.length != inner_len {
                self.set_length(inner_len);
            }
            self.length_changed = false;
        }
        dropped
    }

    /// Returns the resident page for `page_idx`, fetching it from the
    /// inner storage on a miss.
    fn page_mut(&mut self, page_idx: u64) -> Result<&mut Page> {
        if !self.pages.contains_key(&page_idx) {
            self.reserve_slot()?;
            let page_size = self.pool.page_size();
            let mut page = Page::new(page_size);
            self.inner.read(page_idx * page_size as u64, page.buf_mut())?;
            page.can_evict = true;
            self.pages.insert(page_idx, page);
            self.lru.put(page_idx, ());
            tracing::trace!(page = page_idx, "fetched page");
        } else if self.pages[&page_idx].can_evict {
            self.lru.promote(&page_idx);
        }
        Ok(self
            .pages
            .get_mut(&page_idx)
            .expect("page resident after fetch"))
    }

    /// Reserves one pool slot, evicting own pages until one is free.
    fn reserve_slot(&mut self) -> Result<()> {
        while !self.pool.try_reserve() {
            let Some((victim, ())) = self.lru.pop_lru() else {
                return Err(eyre::Report::new(NoPageAvailableError {
                    max_page_count: self.pool.max_page_count(),
                }));
            };
            self.evict(victim)?;
        }
        Ok(())
    }

    /// Removes `page_idx`, writing it back first when dirty.
    fn evict(&mut self, page_idx: u64) -> Result<()> {
        if let Some(page) = self.pages.remove(&page_idx) {
            if let Some((start, end)) = page.dirty_range() {
                debug_assert!(self.auto_commit_evicted_pages);
                let base = page_idx * self.pool.page_size() as u64;
                self.inner.write(base + start as u64, &page.buf()[start..end])?;
            }
            self.pool.release(1);
            tracing::trace!(page = page_idx, "evicted page");
        }
        Ok(())
    }

    /// Removes `page_idx` unconditionally discarding its contents.
    fn discard(&mut self, page_idx: u64) {
        if self.pages.remove(&page_idx).is_some() {
            self.lru.pop(&page_idx);
            self.pool.release(1);
        }
    }

    fn set_length(&mut self, value: u64) {
        if value == self.length {
            return;
        }
        let shrinking = value < self.length;
        self.length = value;
        self.length_changed = true;
        if !shrinking {
            return;
        }
        let page_size = self.pool.page_size();
        let (last_page, last_page_len) = page_extent(value, page_size);
        let drop: Vec<u64> = self
            .pages
            .keys()
            .copied()
            .filter(|&idx| match last_page {
                None => true,
                Some(last) => idx > last,
            })
            .collect();
        for idx in drop {
            self.discard(idx);
        }
        // The straddling page keeps its head; its tail is dead data now.
        if let Some(last) = last_page {
            if let Some(page) = self.pages.get_mut(&last) {
                page.buf_mut()[last_page_len..].fill(0);
                page.clip_dirty(last_page_len);
            }
        }
    }
}

impl<S: Storage> Storage for CacheStorage<S> {
    fn len(&self) -> u64 {
        self.length
    }

    fn read(&mut self, offset: u64, out: &mut [u8]) -> Result<()> {
        let page_size = self.pool.page_size() as u64;
        let mut done = 0;
        while done < out.len() {
            let pos = offset + done as u64;
            if pos >= self.length {
                out[done..].fill(0);
                break;
            }
            let page_idx = pos / page_size;
            let page_off = (pos % page_size) as usize;
            let chunk = (out.len() - done)
                .min(page_size as usize - page_off)
                .min((self.length - pos) as usize);
            let page = self.page_mut(page_idx)?;
            out[done..done + chunk].copy_from_slice(&page.buf()[page_off..page_off + chunk]);
            done += chunk;
        }
        Ok(())
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let page_size = self.pool.page_size();
        let auto_commit = self.auto_commit_evicted_pages;
        let mut done = 0;
        while done < data.len() {
            let pos = offset + done as u64;
            let page_idx = pos / page_size as u64;
            let page_off = (pos % page_size as u64) as usize;
            let chunk = (data.len() - done).min(page_size - page_off);
            {
                let page = self.page_mut(page_idx)?;
                page.buf_mut()[page_off..page_off + chunk]
                    .copy_from_slice(&data[done..done + chunk]);
                page.record_write(page_off, page_off + chunk);
                page.can_evict = auto_commit;
            }
            if auto_commit {
                self.lru.put(page_idx, ());
            } else {
                self.lru.pop(&page_idx);
            }
            done += chunk;
        }
        let end = offset + data.len() as u64;
        if end > self.length {
            self.set_length(end);
        }
        Ok(())
    }

    fn resize(&mut self, new_len: u64) -> Result<()> {
        self.set_length(new_len);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.length_changed {
            self.inner.resize(self.length)?;
            self.length_changed = false;
        }
        let mut dirty: Vec<u64> = self
            .pages
            .iter()
            .filter_map(|(idx, page)| page.dirty().then_some(*idx))
            .collect();
        dirty.sort_unstable();
        let page_size = self.pool.page_size() as u64;
        for page_idx in dirty {
            if let Some(page) = self.pages.get_mut(&page_idx) {
                if let Some((start, end)) = page.dirty_range() {
                    let at = page_idx * page_size + start as u64;
                    self.inner.write(at, &page.buf()[start..end])?;
                    page.reset_dirty();
                    page.can_evict = true;
                }
                self.lru.put(page_idx, ());
            }
        }
        self.inner.flush()?;
        tracing::trace!(resident = self.pages.len(), "flushed page cache");
        Ok(())
    }

    fn try_direct_read(&mut self, offset: u64, len: usize) -> Option<&[u8]> {
        if len == 0 {
            return None;
        }
        let end = offset.checked_add(len as u64)?;
        if end > self.length {
            return None;
        }
        let page_size = self.pool.page_size() as u64;
        let page_idx = offset / page_size;
        if (end - 1) / page_size != page_idx {
            return None;
        }
        if !self.pages.contains_key(&page_idx) {
            return None;
        }
        if self.pages[&page_idx].can_evict {
            self.lru.promote(&page_idx);
        }
        let page_off = (offset % page_size) as usize;
        self.pages
            .get(&page_idx)
            .map(|page| &page.buf()[page_off..page_off + len])
    }
}

impl<S: Storage> Drop for CacheStorage<S> {
    fn drop(&mut self) {
        self.pool.release(self.pages.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemStorage, StorageExt};

    fn small_cache(inner: MemStorage) -> CacheStorage<MemStorage> {
        CacheStorage::new(inner, CacheSettings::default().with_page_size(16))
    }

    #[test]
    fn writes_stay_buffered_until_flush() {
        let mut cache = small_cache(MemStorage::new());
        cache.write(0, b"abcdef").unwrap();
        assert_eq!(cache.inner().as_bytes(), b"");
        assert_eq!(cache.len(), 6);
        cache.flush().unwrap();
        assert_eq!(cache.inner().as_bytes(), b"abcdef");
    }

    #[test]
    fn read_spans_pages_and_zero_fills_past_end() {
        let mut cache = small_cache(MemStorage::new());
        cache.write(12, &[7; 8]).unwrap();
        let mut out = [0xFFu8; 24];
        cache.read(10, &mut out).unwrap();
        assert_eq!(&out[..2], &[0, 0]);
        assert_eq!(&out[2..10], &[7; 8]);
        assert_eq!(&out[10..], &[0; 14]);
        assert!(cache.mapped_page_count() >= 2);
    }

    #[test]
    fn flush_writes_only_dirty_ranges() {
        let mut inner = MemStorage::new();
        inner.write(0, &[1; 32]).unwrap();
        let mut cache = small_cache(inner);
        cache.write(4, &[9, 9]).unwrap();
        cache.flush().unwrap();
        let bytes = cache.inner().as_bytes();
        assert_eq!(bytes[3], 1);
        assert_eq!(&bytes[4..6], &[9, 9]);
        assert_eq!(bytes[6], 1);
    }

    #[test]
    fn shrink_drops_tail_pages_and_zeroes_partial_page() {
        let mut cache = small_cache(MemStorage::new());
        cache.write(0, &[3; 48]).unwrap();
        cache.resize(20).unwrap();
        assert_eq!(cache.len(), 20);
        let mut out = [0xFFu8; 32];
        cache.read(0, &mut out).unwrap();
        assert_eq!(&out[..20], &[3; 20]);
        assert_eq!(&out[20..], &[0; 12]);
        cache.flush().unwrap();
        assert_eq!(cache.inner().len(), 20);
    }

    #[test]
    fn clear_dirty_only_rolls_back_appends() {
        let mut cache = small_cache(MemStorage::new());
        cache.write(0, b"committed").unwrap();
        cache.flush().unwrap();
        cache.write_to_end(b"pending").unwrap();
        assert_eq!(cache.len(), 16);
        assert!(cache.clear(true));
        assert_eq!(cache.len(), 9);
        let mut out = [0u8; 9];
        cache.read(0, &mut out).unwrap();
        assert_eq!(&out, b"committed");
    }

    #[test]
    fn bounded_pool_evicts_clean_pages() {
        let inner = {
            let mut inner = MemStorage::new();
            inner.write(0, &[8; 64]).unwrap();
            inner
        };
        let settings = CacheSettings::bounded(2).with_page_size(16);
        let mut cache = CacheStorage::new(inner, settings);
        let mut out = [0u8; 16];
        for page in 0..4 {
            cache.read(page * 16, &mut out).unwrap();
            assert_eq!(out, [8; 16]);
        }
        assert_eq!(cache.mapped_page_count(), 2);
        assert_eq!(cache.pool().allocated_pages(), 2);
    }

    #[test]
    fn bounded_pool_fails_when_everything_is_dirty() {
        let settings = CacheSettings::bounded(2).with_page_size(16);
        let mut cache = CacheStorage::new(MemStorage::new(), settings);
        cache.write(0, &[1; 16]).unwrap();
        cache.write(16, &[2; 16]).unwrap();
        let err = cache.write(32, &[3; 16]).unwrap_err();
        assert!(err.downcast_ref::<NoPageAvailableError>().is_some());
    }

    #[test]
    fn auto_commit_eviction_writes_back() {
        let settings = CacheSettings::bounded(2)
            .with_page_size(16)
            .with_auto_commit_evicted_pages(true);
        let mut cache = CacheStorage::new(MemStorage::new(), settings);
        for page in 0..4u64 {
            cache.write(page * 16, &[page as u8 + 1; 16]).unwrap();
        }
        // Evicted pages reached the inner storage ahead of the flush.
        assert!(cache.inner().len() > 0);
        cache.flush().unwrap();
        let mut out = [0u8; 16];
        for page in 0..4u64 {
            cache.read(page * 16, &mut out).unwrap();
            assert_eq!(out, [page as u8 + 1; 16]);
        }
    }

    #[test]
    fn direct_read_requires_resident_single_page() {
        let mut cache = small_cache(MemStorage::from_bytes(vec![4; 40]));
        assert!(cache.try_direct_read(0, 8).is_none());
        let mut out = [0u8; 8];
        cache.read(0, &mut out).unwrap();
        assert_eq!(cache.try_direct_read(0, 8), Some(&[4u8; 8][..]));
        // Crosses a page boundary.
        assert!(cache.try_direct_read(12, 8).is_none());
        // Past the logical end.
        assert!(cache.try_direct_read(36, 8).is_none());
    }
}
