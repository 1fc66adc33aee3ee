//! In-process source doubles. Compiled for this crate's tests and behind the
//! `testkit` feature for other crates' tests; never in production builds.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tna_schemas::{RawRecord, SourceTag};

use crate::provider::{Source, SourceError};

/// Returns the same records on every call.
pub struct StaticSource<T> {
    records: Vec<RawRecord<T>>,
    calls: AtomicUsize,
}

impl<T: SourceTag> StaticSource<T> {
    pub fn new(records: Vec<RawRecord<T>>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<T: SourceTag> Source for StaticSource<T> {
    type Tag = T;

    async fn fetch(&self) -> Result<Vec<RawRecord<T>>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

/// Fails every call with the configured error.
pub struct FailingSource<T> {
    error: SourceError,
    calls: AtomicUsize,
    _feed: PhantomData<fn() -> T>,
}

impl<T: SourceTag> FailingSource<T> {
    pub fn new(error: SourceError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
            _feed: PhantomData,
        }
    }

    /// `Unavailable` error tagged with this feed's name.
    pub fn unavailable() -> Self {
        Self::new(SourceError::unavailable(T::NAME, "connection refused"))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<T: SourceTag> Source for FailingSource<T> {
    type Tag = T;

    async fn fetch(&self) -> Result<Vec<RawRecord<T>>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Sleeps before answering; used to exercise fetch timeouts.
pub struct SlowSource<T> {
    delay: Duration,
    records: Vec<RawRecord<T>>,
}

impl<T: SourceTag> SlowSource<T> {
    pub fn new(delay: Duration, records: Vec<RawRecord<T>>) -> Self {
        Self { delay, records }
    }
}

#[async_trait::async_trait]
impl<T: SourceTag> Source for SlowSource<T> {
    type Tag = T;

    async fn fetch(&self) -> Result<Vec<RawRecord<T>>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.records.clone())
    }
}

/// Plays back a script of results, one per call; repeats `fallback` after.
pub struct ScriptedSource<T> {
    script: Mutex<VecDeque<Result<Vec<RawRecord<T>>, SourceError>>>,
    fallback: Result<Vec<RawRecord<T>>, SourceError>,
    calls: AtomicUsize,
}

impl<T: SourceTag> ScriptedSource<T> {
    pub fn new(
        script: Vec<Result<Vec<RawRecord<T>>, SourceError>>,
        fallback: Result<Vec<RawRecord<T>>, SourceError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<T: SourceTag> Source for ScriptedSource<T> {
    type Tag = T;

    async fn fetch(&self) -> Result<Vec<RawRecord<T>>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
