//! Consumers without flow control: the producer pushes items as fast as it produces them and
//! the consumer can only stop it.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::{BoxError, Disposable, DisposableSlot, Error, Reporter};

/// The consumer side of a sequence without flow control.
///
/// A producer calls [`on_subscribe()`][Self::on_subscribe] exactly once per subscription
/// attempt, then any number of [`on_next()`][Self::on_next] calls, then at most one of
/// [`on_error()`][Self::on_error] or [`on_complete()`][Self::on_complete].
pub trait Observer<T> {
    /// Receives the handle used to stop the producer.
    fn on_subscribe(&mut self, disposable: Arc<dyn Disposable>);

    /// Receives the next item.
    fn on_next(&mut self, item: T);

    /// Receives the failure that terminated the sequence.
    fn on_error(&mut self, error: BoxError);

    /// Receives notice that the sequence completed successfully.
    fn on_complete(&mut self);
}

/// The user-supplied behavior of a [`DefaultObserver`].
pub trait ObserverHandler {
    /// The type of item received.
    type Item;

    /// Called once, right after the observer has been bound to its producer. Does nothing
    /// by default.
    fn on_start(&mut self, _upstream: &DisposableUpstream) {}

    /// Receives the next item.
    fn on_next(&mut self, item: Self::Item, upstream: &DisposableUpstream);

    /// Receives the failure that terminated the sequence.
    ///
    /// The default delivers the error to the reporter as [`Error::OnErrorNotImplemented`].
    fn on_error(&mut self, error: BoxError, upstream: &DisposableUpstream) {
        upstream.report(Error::OnErrorNotImplemented { source: error });
    }

    /// Receives notice that the sequence completed successfully.
    fn on_complete(&mut self) {}
}

/// Clonable handle to the producer a [`DefaultObserver`] is bound to.
#[derive(Clone)]
pub struct DisposableUpstream {
    inner: Arc<Inner>,
}

struct Inner {
    slot: DisposableSlot,
    consumer: &'static str,
    reporter: Reporter,
}

impl DisposableUpstream {
    fn new(consumer: &'static str, reporter: Reporter) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: DisposableSlot::new(),
                consumer,
                reporter,
            }),
        }
    }

    fn bind(&self, disposable: Arc<dyn Disposable>) -> bool {
        self.inner
            .slot
            .set_once_reporting(disposable, self.inner.consumer, &self.inner.reporter)
    }

    /// Stops the producer, releasing its handle if one is bound. Idempotent.
    pub fn dispose(&self) {
        self.inner.slot.cancel();
    }

    /// Whether [`dispose()`][Self::dispose] has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.slot.is_terminal()
    }

    /// Delivers an error with no other destination to this observer's reporter.
    pub fn report(&self, error: Error) {
        self.inner.reporter.report(error);
    }
}

impl fmt::Debug for DisposableUpstream {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableUpstream")
            .field("consumer", &self.inner.consumer)
            .field("slot", &self.inner.slot)
            .finish_non_exhaustive()
    }
}

/// A single-use [`Observer`] that binds its producer exactly once and forwards items to an
/// [`ObserverHandler`].
///
/// Follows the same rules as [`DefaultSubscriber`][crate::DefaultSubscriber], minus demand.
pub struct DefaultObserver<H> {
    handler: H,
    upstream: DisposableUpstream,
    done: bool,
}

impl<H> DefaultObserver<H> {
    /// Creates an observer that reports to the [global reporter][Reporter::global].
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self::with_reporter(handler, Reporter::global().clone())
    }

    /// Creates an observer that reports to `reporter`.
    #[must_use]
    pub fn with_reporter(handler: H, reporter: Reporter) -> Self {
        Self {
            handler,
            upstream: DisposableUpstream::new(type_name::<H>(), reporter),
            done: false,
        }
    }

    /// The handle to the producer, for disposing from outside the handler.
    #[must_use]
    pub fn upstream(&self) -> &DisposableUpstream {
        &self.upstream
    }

    /// Stops the producer. See [`DisposableUpstream::dispose()`].
    pub fn dispose(&self) {
        self.upstream.dispose();
    }

    /// The handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Consumes the observer, returning the handler.
    #[must_use]
    pub fn into_handler(self) -> H {
        self.handler
    }

    fn is_inactive(&self) -> bool {
        self.done || self.upstream.is_disposed()
    }
}

impl<H> Observer<H::Item> for DefaultObserver<H>
where
    H: ObserverHandler,
{
    fn on_subscribe(&mut self, disposable: Arc<dyn Disposable>) {
        if self.upstream.bind(disposable) {
            self.handler.on_start(&self.upstream);
        }
    }

    fn on_next(&mut self, item: H::Item) {
        if self.is_inactive() {
            return;
        }

        self.handler.on_next(item, &self.upstream);
    }

    fn on_error(&mut self, error: BoxError) {
        if self.is_inactive() {
            self.upstream.report(Error::Undeliverable { source: error });
            return;
        }

        self.done = true;
        self.handler.on_error(error, &self.upstream);
    }

    fn on_complete(&mut self) {
        if self.is_inactive() {
            return;
        }

        self.done = true;
        self.handler.on_complete();
    }
}

impl<H> fmt::Debug for DefaultObserver<H> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("upstream", &self.upstream)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
