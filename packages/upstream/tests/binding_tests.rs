//! Integration tests for binding, cancellation and violation reporting through the public API.
//!
//! Every test uses its own `Reporter`, so tests can run in parallel without observing each
//! other's reports.

use std::any::type_name;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use testing::{race, with_watchdog};
use upstream::{
    DefaultSubscriber, Error, Reporter, Subscriber, SubscriberHandler, Subscription,
    SubscriptionSlot, Upstream,
};

/// Releases an imaginary resource at most once, no matter how often it is cancelled.
#[derive(Debug, Default)]
struct Resource {
    cancelled: AtomicBool,
    cancel_calls: AtomicUsize,
    releases: AtomicUsize,
}

impl Resource {
    fn handle(self: &Arc<Self>) -> Arc<dyn Subscription> {
        let handle = Arc::clone(self);
        handle
    }

    fn releases(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }

    /// Raw `cancel()` calls, including no-op repeats. The slot never cancels a handle twice.
    fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::Acquire)
    }
}

impl Subscription for Resource {
    fn request(&self, _n: NonZeroU64) {}

    fn cancel(&self) {
        self.cancel_calls.fetch_add(1, Ordering::AcqRel);

        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.releases.fetch_add(1, Ordering::AcqRel);
        }
    }
}

fn recording_reporter() -> (Reporter, Arc<Mutex<Vec<String>>>) {
    let reporter = Reporter::new();
    let reports = Arc::new(Mutex::new(Vec::new()));

    reporter.replace({
        let reports = Arc::clone(&reports);
        move |error: Error| reports.lock().unwrap().push(error.to_string())
    });

    (reporter, reports)
}

struct Ignore;

impl SubscriberHandler for Ignore {
    type Item = u64;

    fn on_next(&mut self, _item: u64, _upstream: &Upstream) {}
}

#[test]
fn bind_violate_cancel_then_late_bind() {
    let (reporter, reports) = recording_reporter();
    let mut subscriber = DefaultSubscriber::with_reporter(Ignore, reporter);
    let a = Arc::new(Resource::default());
    let b = Arc::new(Resource::default());
    let c = Arc::new(Resource::default());

    subscriber.on_subscribe(a.handle());
    assert_eq!(a.releases(), 0);

    subscriber.on_subscribe(b.handle());
    assert_eq!(b.releases(), 1);
    assert_eq!(
        *reports.lock().unwrap(),
        vec![format!(
            "It is not allowed to subscribe with a(n) {name} multiple times. \
             Please create a fresh instance of {name} and subscribe that to the target \
             source instead.",
            name = type_name::<Ignore>()
        )]
    );

    subscriber.cancel();
    assert_eq!(a.releases(), 1);
    assert!(subscriber.upstream().is_cancelled());

    subscriber.on_subscribe(c.handle());
    assert_eq!(c.releases(), 1);
    assert_eq!(reports.lock().unwrap().len(), 1);
}

#[test]
fn cancel_without_bind_then_late_bind() {
    let (reporter, reports) = recording_reporter();
    let mut subscriber = DefaultSubscriber::with_reporter(Ignore, reporter);
    let d = Arc::new(Resource::default());

    subscriber.cancel();
    assert!(subscriber.upstream().is_cancelled());

    subscriber.on_subscribe(d.handle());

    assert_eq!(d.releases(), 1);
    assert!(reports.lock().unwrap().is_empty());
}

#[test]
fn concurrent_binds_single_winner() {
    with_watchdog(|| {
        for binders in [1, 2, 4, 16] {
            let (reporter, reports) = recording_reporter();
            let slot = Arc::new(SubscriptionSlot::new());
            let barrier = Arc::new(Barrier::new(binders));
            let resources = (0..binders)
                .map(|_| Arc::new(Resource::default()))
                .collect::<Vec<_>>();

            let threads = resources
                .iter()
                .map(|resource| {
                    let slot = Arc::clone(&slot);
                    let barrier = Arc::clone(&barrier);
                    let reporter = reporter.clone();
                    let handle = resource.handle();

                    thread::spawn(move || {
                        barrier.wait();
                        slot.set_once_reporting(handle, "Consumer", &reporter)
                    })
                })
                .collect::<Vec<_>>();

            let wins = threads
                .into_iter()
                .map(|thread| thread.join().unwrap())
                .filter(|won| *won)
                .count();

            let losers = binders - 1;
            assert_eq!(wins, 1);
            assert_eq!(resources.iter().map(|r| r.releases()).sum::<usize>(), losers);
            assert_eq!(resources.iter().map(|r| r.cancel_calls()).sum::<usize>(), losers);
            assert_eq!(reports.lock().unwrap().len(), losers);
        }
    });
}

#[test]
fn concurrent_cancels_release_once() {
    with_watchdog(|| {
        let slot = Arc::new(SubscriptionSlot::new());
        let resource = Arc::new(Resource::default());
        assert!(slot.set_once_reporting(resource.handle(), "Consumer", &Reporter::new()));

        let transitions = Arc::new(AtomicUsize::new(0));
        let threads = (0..8)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let transitions = Arc::clone(&transitions);
                thread::spawn(move || {
                    for _ in 0..100 {
                        if slot.cancel() {
                            transitions.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(resource.cancel_calls(), 1);
        assert_eq!(transitions.load(Ordering::Relaxed), 1);
        assert!(slot.is_terminal());
    });
}

#[test]
fn emission_cancel_race_never_leaks() {
    with_watchdog(|| {
        for _ in 0..1000 {
            let (reporter, reports) = recording_reporter();
            let mut subscriber = DefaultSubscriber::with_reporter(Ignore, reporter);
            let resource = Arc::new(Resource::default());
            subscriber.on_subscribe(resource.handle());

            let upstream = subscriber.upstream().clone();
            let observer = upstream.clone();

            race(
                move || {
                    for item in 0..10 {
                        subscriber.on_next(item);
                    }
                    subscriber.on_complete();
                },
                move || upstream.cancel(),
            );

            assert_eq!(resource.releases(), 1);
            assert_eq!(resource.cancel_calls(), 1);
            assert!(observer.is_cancelled());
            assert!(reports.lock().unwrap().is_empty());
        }
    });
}

#[test]
fn bind_cancel_race_releases_loser() {
    with_watchdog(|| {
        for _ in 0..1000 {
            let (reporter, reports) = recording_reporter();
            let mut subscriber = DefaultSubscriber::with_reporter(Ignore, reporter);
            let resource = Arc::new(Resource::default());
            let upstream = subscriber.upstream().clone();
            let observer = upstream.clone();

            race(
                {
                    let handle = resource.handle();
                    move || subscriber.on_subscribe(handle)
                },
                move || upstream.cancel(),
            );

            // Whichever side lost the race released the resource; never both, never neither.
            assert_eq!(resource.cancel_calls(), 1);
            assert_eq!(resource.releases(), 1);
            assert!(observer.is_cancelled());
            assert!(reports.lock().unwrap().is_empty());
        }
    });
}
