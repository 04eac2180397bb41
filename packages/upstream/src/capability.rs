//! The handles a producer gives to a consumer, through which the consumer controls the producer.
//!
//! Two variants exist:
//!
//! * [`Subscription`] - flow-controlled; the consumer signals demand via
//!   [`request()`][Subscription::request] and stops the flow via
//!   [`cancel()`][Subscription::cancel].
//! * [`Disposable`] - the consumer can only release the resource via
//!   [`dispose()`][Disposable::dispose].
//!
//! Implementations are supplied by producers. For both variants, the release operation must be
//! safe to call any number of times from any number of threads, with the underlying resource
//! released at most once. Calls after the first are silent no-ops.

use std::any::type_name;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Demand value meaning "send everything, I will never ask to slow down".
pub const UNBOUNDED: NonZeroU64 = NonZeroU64::MAX;

/// A flow-controlled handle to a producer.
pub trait Subscription: Send + Sync {
    /// Asks the producer for up to `n` more items.
    ///
    /// This is advisory and never blocks; items arrive later through the consumer's callbacks.
    /// Demand is additive and saturates at [`UNBOUNDED`].
    fn request(&self, n: NonZeroU64);

    /// Asks the producer to stop sending items and release its resources.
    ///
    /// Idempotent. Calls after the first have no effect.
    fn cancel(&self);
}

/// A handle to a resource that can only be released.
pub trait Disposable: Send + Sync {
    /// Releases the resource.
    ///
    /// Idempotent. Calls after the first have no effect.
    fn dispose(&self);

    /// Whether [`dispose()`][Self::dispose] has been called.
    fn is_disposed(&self) -> bool;
}

/// The release operation shared by both handle variants, which is all a
/// [`Slot`][crate::Slot] needs to know about what it stores.
pub trait Capability: Send + Sync {
    /// Cancels or disposes the handle.
    fn release(&self);
}

impl Capability for dyn Subscription {
    fn release(&self) {
        self.cancel();
    }
}

impl Capability for dyn Disposable {
    fn release(&self) {
        self.dispose();
    }
}

/// A [`Disposable`] that runs a closure the first time it is disposed.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use upstream::{ActionDisposable, Disposable};
///
/// let runs = Arc::new(AtomicUsize::new(0));
/// let disposable = ActionDisposable::new({
///     let runs = Arc::clone(&runs);
///     move || {
///         runs.fetch_add(1, Ordering::Relaxed);
///     }
/// });
///
/// disposable.dispose();
/// disposable.dispose();
///
/// assert!(disposable.is_disposed());
/// assert_eq!(runs.load(Ordering::Relaxed), 1);
/// ```
pub struct ActionDisposable<F>
where
    F: FnOnce() + Send,
{
    disposed: AtomicBool,

    // Taken exactly once, by whoever wins the `disposed` flag.
    action: Mutex<Option<F>>,
}

impl<F> ActionDisposable<F>
where
    F: FnOnce() + Send,
{
    /// Creates a disposable that will run `action` when first disposed.
    #[must_use]
    pub fn new(action: F) -> Self {
        Self {
            disposed: AtomicBool::new(false),
            action: Mutex::new(Some(action)),
        }
    }
}

impl<F> Disposable for ActionDisposable<F>
where
    F: FnOnce() + Send,
{
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Only the winner of the flag ever gets here, so the lock is uncontended.
        // A poisoned lock means the action already panicked once; we never retry it.
        let action = match self.action.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        if let Some(action) = action {
            action();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<F> fmt::Debug for ActionDisposable<F>
where
    F: FnOnce() + Send,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
