//! Draining paginated sources.
//!
//! Two shapes:
//! - cursor pages ([`PageSource`]): each page carries an opaque continuation;
//!   no continuation means the last page.
//! - index reads ([`IndexedSource`]): one record per sequential index, bounded
//!   either by a known count or by the first "not found" answer.
//!
//! Per page: check cancellation, wait the pacing delay (not before the first
//! page), fetch with [`retry_fixed_or_cancel`], append. A page that still fails after
//! the retry budget ends the drain with [`DrainError`], which carries the
//! records accumulated so far. Callers must treat that as "incomplete" and
//! never persist it as a snapshot.

use std::fmt;
use std::time::Duration;

use alloy_primitives::U256;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::SourceError;
use crate::retry::{retry_fixed_or_cancel, RetryExhausted, RetryPolicy};

// ---------------------------------------------------------------------------
// Cursor pages
// ---------------------------------------------------------------------------

/// Continuation token handed back by a source. The drainer never looks inside.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor(Map<String, Value>);

impl Cursor {
    pub fn new(params: Map<String, Value>) -> Self {
        Self(params)
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// Label used in logs and error messages.
    fn name(&self) -> &str;

    /// Fetch one page. `cursor == None` requests the first page.
    /// `size_hint` is advisory; sources may ignore it.
    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        size_hint: Option<usize>,
    ) -> Result<Page<Self::Item>, SourceError>;
}

// ---------------------------------------------------------------------------
// Options / errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DrainOptions {
    pub retry: RetryPolicy,
    /// Sleep between consecutive successful page (or index) fetches.
    pub page_delay: Duration,
    pub size_hint: Option<usize>,
    /// Index drains log an info line every this many indices (0 = never).
    pub progress_every: u64,
    pub cancel: Option<CancelToken>,
}

impl DrainOptions {
    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainFailure {
    Exhausted(RetryExhausted),
    Cancelled,
}

impl From<RetryExhausted> for DrainFailure {
    fn from(e: RetryExhausted) -> Self {
        if e.is_cancelled() {
            DrainFailure::Cancelled
        } else {
            DrainFailure::Exhausted(e)
        }
    }
}

impl fmt::Display for DrainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainFailure::Exhausted(e) => write!(f, "{e}"),
            DrainFailure::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Drain aborted. `partial` is what was fetched before the failing page; it is
/// never a complete result.
#[derive(Debug, Clone)]
pub struct DrainError<T> {
    pub source_name: String,
    pub pages_completed: usize,
    pub partial: Vec<T>,
    pub cause: DrainFailure,
}

impl<T> fmt::Display for DrainError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "drain of {} aborted after {} page(s) with {} partial record(s): {}",
            self.source_name,
            self.pages_completed,
            self.partial.len(),
            self.cause
        )
    }
}

impl<T: fmt::Debug> std::error::Error for DrainError<T> {}

// ---------------------------------------------------------------------------
// Lazy cursor iteration
// ---------------------------------------------------------------------------

/// Pull-based page iterator. Each call to [`CursorDrain::next_page`] performs
/// at most one (retried) fetch.
pub struct CursorDrain<'a, S: PageSource + ?Sized> {
    source: &'a S,
    opts: &'a DrainOptions,
    next: Option<Cursor>,
    pages: usize,
    records: usize,
    done: bool,
}

impl<'a, S: PageSource + ?Sized> CursorDrain<'a, S> {
    pub fn new(source: &'a S, opts: &'a DrainOptions) -> Self {
        Self {
            source,
            opts,
            next: None,
            pages: 0,
            records: 0,
            done: false,
        }
    }

    pub fn pages_completed(&self) -> usize {
        self.pages
    }

    /// `None` once the final page has been returned or after a failure.
    pub async fn next_page(&mut self) -> Option<Result<Vec<S::Item>, DrainFailure>> {
        if self.done {
            return None;
        }
        if self.opts.cancelled() {
            self.done = true;
            return Some(Err(DrainFailure::Cancelled));
        }
        if self.pages > 0 && !self.opts.page_delay.is_zero() {
            tokio::time::sleep(self.opts.page_delay).await;
        }

        let source = self.source;
        let cursor = self.next.as_ref();
        let hint = self.opts.size_hint;
        let fetched = retry_fixed_or_cancel(
            &self.opts.retry,
            source.name(),
            self.opts.cancel.as_ref(),
            move |_| source.fetch_page(cursor, hint),
        )
        .await;

        match fetched {
            Ok(page) => {
                self.pages += 1;
                self.records += page.items.len();
                debug!(
                    source = source.name(),
                    page = self.pages,
                    fetched = page.items.len(),
                    total = self.records,
                    "page fetched"
                );
                self.next = page.next;
                if self.next.is_none() {
                    self.done = true;
                }
                Some(Ok(page.items))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

/// Fetch every page until the source reports no continuation.
pub async fn drain_cursor<S>(
    source: &S,
    opts: &DrainOptions,
) -> Result<Vec<S::Item>, DrainError<S::Item>>
where
    S: PageSource + ?Sized,
{
    let mut drain = CursorDrain::new(source, opts);
    let mut out = Vec::new();
    while let Some(page) = drain.next_page().await {
        match page {
            Ok(items) => out.extend(items),
            Err(cause) => {
                warn!(
                    source = source.name(),
                    pages = drain.pages_completed(),
                    partial = out.len(),
                    error = %cause,
                    "drain aborted"
                );
                return Err(DrainError {
                    source_name: source.name().to_string(),
                    pages_completed: drain.pages_completed(),
                    partial: out,
                    cause,
                });
            }
        }
    }
    info!(
        source = source.name(),
        pages = drain.pages_completed(),
        records = out.len(),
        "drain complete"
    );
    Ok(out)
}

// ---------------------------------------------------------------------------
// Index reads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRead<T> {
    Found(T),
    /// The source answered definitively that nothing exists at this index.
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBound {
    /// Read `[start, end)`. A not-found index inside the range is recorded as
    /// missing and the drain continues.
    Until(U256),
    /// Read from `start` until the first not-found index.
    UntilNotFound,
    /// Read until this many records were found. Ids can be sparse (burned
    /// tokens), so the walk may run past `start + count`: not-found indices
    /// below that mark are recorded as missing, the first not-found at or
    /// above it ends the walk.
    Count(U256),
}

#[async_trait]
pub trait IndexedSource: Send + Sync {
    type Item: Send;

    fn name(&self) -> &str;

    async fn fetch_index(&self, index: U256) -> Result<IndexRead<Self::Item>, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDrain<T> {
    pub items: Vec<T>,
    /// Indices inside a known bound (or below a count's nominal end) that
    /// answered not-found.
    pub missing: Vec<U256>,
    /// First index that was not read.
    pub next_index: U256,
}

pub async fn drain_indexed<S>(
    source: &S,
    start: U256,
    bound: IndexBound,
    opts: &DrainOptions,
) -> Result<IndexedDrain<S::Item>, DrainError<S::Item>>
where
    S: IndexedSource + ?Sized,
{
    let mut items = Vec::new();
    let mut missing = Vec::new();
    let mut index = start;
    let mut reads: u64 = 0;

    let abort = |items: Vec<S::Item>, reads: u64, cause: DrainFailure| {
        warn!(source = source.name(), reads, partial = items.len(), error = %cause, "index drain aborted");
        DrainError {
            source_name: source.name().to_string(),
            pages_completed: reads as usize,
            partial: items,
            cause,
        }
    };

    loop {
        match bound {
            IndexBound::Until(end) if index >= end => break,
            IndexBound::Count(n) if U256::from(items.len()) >= n => break,
            _ => {}
        }
        if opts.cancelled() {
            return Err(abort(items, reads, DrainFailure::Cancelled));
        }
        if reads > 0 && !opts.page_delay.is_zero() {
            tokio::time::sleep(opts.page_delay).await;
        }

        let at = index;
        let read = retry_fixed_or_cancel(&opts.retry, source.name(), opts.cancel.as_ref(), move |_| {
            source.fetch_index(at)
        })
        .await;
        reads += 1;

        match read {
            Ok(IndexRead::Found(item)) => items.push(item),
            Ok(IndexRead::NotFound(reason)) => match bound {
                IndexBound::UntilNotFound => {
                    debug!(source = source.name(), index = %at, reason = %reason, "end of index range");
                    break;
                }
                IndexBound::Count(n) if at >= start.saturating_add(n) => {
                    debug!(source = source.name(), index = %at, reason = %reason, "end of sparse index range");
                    break;
                }
                IndexBound::Until(_) | IndexBound::Count(_) => {
                    warn!(source = source.name(), index = %at, reason = %reason, "index not found inside bound");
                    missing.push(at);
                }
            },
            Err(e) => {
                return Err(abort(items, reads - 1, e.into()));
            }
        }

        if opts.progress_every > 0 && reads % opts.progress_every == 0 {
            info!(source = source.name(), reads, found = items.len(), "index drain progress");
        }

        if index == U256::MAX {
            break;
        }
        index += U256::from(1u8);
    }

    let next_index = index;
    info!(
        source = source.name(),
        found = items.len(),
        missing = missing.len(),
        "index drain complete"
    );
    Ok(IndexedDrain {
        items,
        missing,
        next_index,
    })
}
