use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use nftsnap_source::{Cursor, Page, PageSource, SourceError};

/// Serves a fixed item list in pages of `page_size`. The cursor is the offset
/// of the next page.
///
/// `fail_pages` scripts transient failures: each entry `(page, n)` makes the
/// n first fetches of that page fail before it succeeds.
pub struct VecPageSource<T> {
    items: Vec<T>,
    page_size: usize,
    failures: Mutex<Vec<(usize, u32)>>,
    fetches: AtomicUsize,
}

impl<T: Clone + Send + Sync> VecPageSource<T> {
    pub fn new(items: Vec<T>, page_size: usize) -> Self {
        Self {
            items,
            page_size: page_size.max(1),
            failures: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, page: usize, times: u32) -> Self {
        if let Ok(f) = self.failures.get_mut() {
            f.push((page, times));
        }
        self
    }

    /// Total fetch attempts, failed ones included.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn page_count(&self) -> usize {
        self.items.len().div_ceil(self.page_size).max(1)
    }

    fn take_failure(&self, page: usize) -> bool {
        let mut failures = match self.failures.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match failures.iter_mut().find(|(p, n)| *p == page && *n > 0) {
            Some((_, n)) => {
                *n -= 1;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> PageSource for VecPageSource<T> {
    type Item = T;

    fn name(&self) -> &str {
        "vec"
    }

    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        _size_hint: Option<usize>,
    ) -> Result<Page<T>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let offset = match cursor {
            None => 0,
            Some(c) => c
                .params()
                .get("offset")
                .and_then(Value::as_u64)
                .ok_or_else(|| SourceError::Decode("cursor without offset".to_string()))?
                as usize,
        };
        let page = offset / self.page_size;
        if self.take_failure(page) {
            return Err(SourceError::HttpStatus {
                status: 502,
                body: format!("scripted failure on page {page}"),
            });
        }

        let end = (offset + self.page_size).min(self.items.len());
        let items = self.items[offset.min(end)..end].to_vec();
        let next = (end < self.items.len()).then(|| {
            let mut m = Map::new();
            m.insert("offset".to_string(), Value::from(end as u64));
            Cursor::new(m)
        });
        Ok(Page { items, next })
    }
}
