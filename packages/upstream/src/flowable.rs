//! Flow-controlled consumers: the consumer decides how many items it is ready to receive.

use std::any::type_name;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use crate::{BoxError, Error, Reporter, Subscription, SubscriptionSlot, UNBOUNDED, error};

/// The consumer side of a flow-controlled sequence.
///
/// A producer calls [`on_subscribe()`][Self::on_subscribe] exactly once per subscription
/// attempt, then any number of [`on_next()`][Self::on_next] calls (never more than requested),
/// then at most one of [`on_error()`][Self::on_error] or [`on_complete()`][Self::on_complete].
/// Calls are serialized, which is why they take `&mut self`; cancellation from other threads
/// goes through the [`Subscription`] instead.
pub trait Subscriber<T> {
    /// Receives the handle used to request items from and cancel the producer.
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>);

    /// Receives the next item.
    fn on_next(&mut self, item: T);

    /// Receives the failure that terminated the sequence.
    fn on_error(&mut self, error: BoxError);

    /// Receives notice that the sequence completed successfully.
    fn on_complete(&mut self);
}

/// The user-supplied behavior of a [`DefaultSubscriber`].
pub trait SubscriberHandler {
    /// The type of item received.
    type Item;

    /// Called once, right after the subscriber has been bound to its producer.
    ///
    /// The default requests an [`UNBOUNDED`] number of items.
    fn on_start(&mut self, upstream: &Upstream) {
        upstream.request(UNBOUNDED.get());
    }

    /// Receives the next item.
    fn on_next(&mut self, item: Self::Item, upstream: &Upstream);

    /// Receives the failure that terminated the sequence.
    ///
    /// The default delivers the error to the reporter as [`Error::OnErrorNotImplemented`].
    fn on_error(&mut self, error: BoxError, upstream: &Upstream) {
        upstream.report(Error::OnErrorNotImplemented { source: error });
    }

    /// Receives notice that the sequence completed successfully.
    fn on_complete(&mut self) {}
}

/// Clonable handle to the producer a [`DefaultSubscriber`] is bound to.
///
/// Clones may be moved to other threads to cancel the subscription at any time, including
/// while an item is being delivered or before the subscriber has been bound at all.
#[derive(Clone)]
pub struct Upstream {
    inner: Arc<UpstreamInner>,
}

struct UpstreamInner {
    slot: SubscriptionSlot,
    consumer: &'static str,
    reporter: Reporter,
}

impl Upstream {
    fn new(consumer: &'static str, reporter: Reporter) -> Self {
        Self {
            inner: Arc::new(UpstreamInner {
                slot: SubscriptionSlot::new(),
                consumer,
                reporter,
            }),
        }
    }

    fn bind(&self, subscription: Arc<dyn Subscription>) -> bool {
        self.inner
            .slot
            .set_once_reporting(subscription, self.inner.consumer, &self.inner.reporter)
    }

    /// Requests `n` more items from the producer.
    ///
    /// Does nothing if the subscriber is not bound or has been cancelled. A request for zero
    /// items is a contract violation: nothing is requested and an
    /// [`Error::InvalidArgument`] is delivered to the reporter.
    pub fn request(&self, n: u64) {
        let n = match demand(n) {
            Ok(n) => n,
            Err(error) => {
                self.report(error);
                return;
            }
        };

        if let Some(subscription) = self.inner.slot.current() {
            subscription.request(n);
        }
    }

    /// Cancels the subscription, releasing the producer's handle if one is bound.
    ///
    /// Idempotent. If the producer has not bound the subscriber yet, the handle it eventually
    /// delivers is released on arrival.
    pub fn cancel(&self) {
        self.inner.slot.cancel();
    }

    /// Whether [`cancel()`][Self::cancel] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.slot.is_terminal()
    }

    /// Delivers an error with no other destination to this subscriber's reporter.
    pub fn report(&self, error: Error) {
        self.inner.reporter.report(error);
    }
}

impl fmt::Debug for Upstream {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("consumer", &self.inner.consumer)
            .field("slot", &self.inner.slot)
            .finish_non_exhaustive()
    }
}

fn demand(n: u64) -> error::Result<NonZeroU64> {
    NonZeroU64::new(n).ok_or_else(|| Error::InvalidArgument {
        problem: format!("n > 0 required but it was {n}"),
    })
}

/// A single-use [`Subscriber`] that binds its producer exactly once and forwards items to a
/// [`SubscriberHandler`].
///
/// * A second `on_subscribe()` releases the new subscription and reports a
///   [`Error::ProtocolViolation`] naming the handler type.
/// * Items and completion arriving after cancellation or after a terminal event are dropped.
/// * An error arriving after cancellation or after a terminal event is delivered to the
///   reporter as [`Error::Undeliverable`].
///
/// # Example
///
/// ```rust
/// use std::num::NonZeroU64;
/// use std::sync::Arc;
///
/// use upstream::{DefaultSubscriber, Subscriber, SubscriberHandler, Subscription, Upstream};
///
/// struct Sum(u64);
///
/// impl SubscriberHandler for Sum {
///     type Item = u64;
///
///     fn on_next(&mut self, item: u64, _upstream: &Upstream) {
///         self.0 += item;
///     }
/// }
///
/// struct Ignored;
///
/// impl Subscription for Ignored {
///     fn request(&self, _n: NonZeroU64) {}
///     fn cancel(&self) {}
/// }
///
/// let mut subscriber = DefaultSubscriber::new(Sum(0));
/// subscriber.on_subscribe(Arc::new(Ignored));
/// subscriber.on_next(1);
/// subscriber.on_next(2);
/// subscriber.on_complete();
///
/// assert_eq!(subscriber.handler().0, 3);
/// ```
pub struct DefaultSubscriber<H> {
    handler: H,
    upstream: Upstream,
    done: bool,
}

impl<H> DefaultSubscriber<H> {
    /// Creates a subscriber that reports to the [global reporter][Reporter::global].
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self::with_reporter(handler, Reporter::global().clone())
    }

    /// Creates a subscriber that reports to `reporter`.
    #[must_use]
    pub fn with_reporter(handler: H, reporter: Reporter) -> Self {
        Self {
            handler,
            upstream: Upstream::new(type_name::<H>(), reporter),
            done: false,
        }
    }

    /// The handle to the producer, for requesting and cancelling from outside the handler.
    #[must_use]
    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    /// Cancels the subscription. See [`Upstream::cancel()`].
    pub fn cancel(&self) {
        self.upstream.cancel();
    }

    /// The handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Consumes the subscriber, returning the handler.
    #[must_use]
    pub fn into_handler(self) -> H {
        self.handler
    }

    fn is_inactive(&self) -> bool {
        self.done || self.upstream.is_cancelled()
    }
}

impl<H> Subscriber<H::Item> for DefaultSubscriber<H>
where
    H: SubscriberHandler,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        if self.upstream.bind(subscription) {
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

impl<H> fmt::Debug for DefaultSubscriber<H> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("upstream", &self.upstream)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
