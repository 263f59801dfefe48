//! Tunable settings for the storage stack.

pub mod constants;

use crate::config::constants::DEFAULT_PAGE_SIZE;

/// Configuration of the buffering page cache that sits between a trie and
/// its backing storage.
///
/// The defaults give an unbounded cache with 8 KiB pages, which keeps every
/// touched page in memory until the next flush. Setting `max_page_count`
/// bounds memory and turns on LRU eviction; evicting a dirty page is only
/// legal when `auto_commit_evicted_pages` is set, otherwise the cache
/// reports exhaustion instead of silently committing buffered writes.
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    /// Size of a cache page in bytes.
    pub page_size: usize,
    /// Maximum number of resident pages, or `None` for unbounded.
    pub max_page_count: Option<usize>,
    /// Allow dirty pages to be written back to the inner storage when they
    /// are evicted, ahead of an explicit flush.
    pub auto_commit_evicted_pages: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_page_count: None,
            auto_commit_evicted_pages: false,
        }
    }
}

impl CacheSettings {
    /// Settings for a cache bounded to `max_page_count` resident pages.
    pub fn bounded(max_page_count: usize) -> Self {
        Self {
            max_page_count: Some(max_page_count),
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        assert!(page_size > 0, "page size must be non-zero");
        self.page_size = page_size;
        self
    }

    pub fn with_auto_commit_evicted_pages(mut self, enable: bool) -> Self {
        self.auto_commit_evicted_pages = enable;
        self
    }
}
