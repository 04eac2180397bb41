//! Test doubles shared by the unit tests of this crate.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{Disposable, Error, Reporter, Subscription};

/// A subscription that counts how it is used.
#[derive(Debug, Default)]
pub(crate) struct CountingSubscription {
    cancelled: AtomicBool,
    cancel_calls: AtomicUsize,
    releases: AtomicUsize,
    requested: AtomicU64,
}

impl CountingSubscription {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn handle(self: &Arc<Self>) -> Arc<dyn Subscription> {
        let handle = Arc::clone(self);
        handle
    }

    /// How many times `cancel()` was called, including no-op repeats.
    pub(crate) fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::Acquire)
    }

    /// How many times the underlying resource was released. Must never exceed 1.
    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }

    /// Total demand requested, saturating at `u64::MAX`.
    pub(crate) fn requested(&self) -> u64 {
        self.requested.load(Ordering::Acquire)
    }
}

impl Subscription for CountingSubscription {
    fn request(&self, n: NonZeroU64) {
        // Lost updates are impossible with fetch_update; saturate like a real producer would.
        drop(
            self.requested
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    Some(current.saturating_add(n.get()))
                }),
        );
    }

    fn cancel(&self) {
        self.cancel_calls.fetch_add(1, Ordering::AcqRel);

        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.releases.fetch_add(1, Ordering::AcqRel);
        }
    }
}

/// A disposable that counts how it is used.
#[derive(Debug, Default)]
pub(crate) struct CountingDisposable {
    disposed: AtomicBool,
    releases: AtomicUsize,
}

impl CountingDisposable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn handle(self: &Arc<Self>) -> Arc<dyn Disposable> {
        let handle = Arc::clone(self);
        handle
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }
}

impl Disposable for CountingDisposable {
    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.releases.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// Errors captured by a reporter created with [`recording_reporter()`].
#[derive(Clone, Debug, Default)]
pub(crate) struct Reports {
    errors: Arc<Mutex<Vec<Error>>>,
}

impl Reports {
    pub(crate) fn len(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub(crate) fn kinds(&self) -> Vec<&'static str> {
        self.errors.lock().unwrap().iter().map(Error::kind).collect()
    }
}

/// Creates an independent reporter that captures every error it receives.
pub(crate) fn recording_reporter() -> (Reporter, Reports) {
    let reporter = Reporter::new();
    let reports = Reports::default();

    reporter.replace({
        let reports = reports.clone();
        move |error| reports.errors.lock().unwrap().push(error)
    });

    (reporter, reports)
}
