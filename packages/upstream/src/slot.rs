//! Single-assignment storage for the handle a consumer receives from its producer.
//!
//! A slot moves through these states:
//!
//! ```text
//! Unset ──set_once──▶ Active(handle) ──cancel──▶ Terminal
//!   │                                              ▲
//!   └────────────────────cancel────────────────────┘
//! ```
//!
//! `Terminal` is absorbing. Any handle offered to a slot that is not `Unset` is released on
//! the spot. If the slot was `Active`, the consumer has been bound twice, which is a protocol
//! violation and is delivered to a [`Reporter`]. If the slot was `Terminal`, the consumer was
//! cancelled before the producer got around to binding it, which is a legitimate race and is
//! absorbed silently.

use std::{fmt, mem};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::{Capability, Disposable, Error, Reporter, Subscription};

/// A slot holding a flow-controlled [`Subscription`].
pub type SubscriptionSlot = Slot<dyn Subscription>;

/// A slot holding a dispose-only [`Disposable`].
pub type DisposableSlot = Slot<dyn Disposable>;

/// The content of a [`Slot`].
#[expect(
    clippy::exhaustive_enums,
    reason = "these three states are the entire binding protocol"
)]
pub enum State<C>
where
    C: ?Sized,
{
    /// No handle has been offered yet.
    Unset,

    /// A handle has been bound and is live.
    Active(Arc<C>),

    /// The slot was cancelled and will never hold a live handle again.
    Terminal,
}

impl<C> State<C>
where
    C: ?Sized + Capability,
{
    /// Binds `incoming` if this state is [`Unset`][Self::Unset].
    ///
    /// This is the non-atomic counterpart of [`Slot::set_once()`] for code that has exclusive
    /// access to the state, for example while a consumer is still being constructed.
    /// The rules for rejected handles are those of [`validate()`].
    pub fn bind(
        &mut self,
        incoming: Arc<C>,
        consumer: &str,
        reporter: &Reporter,
    ) -> bool {
        if !validate(self, &incoming, consumer, reporter) {
            return false;
        }

        *self = Self::Active(incoming);
        true
    }

    /// Releases the active handle, if any, and moves to [`Terminal`][Self::Terminal].
    ///
    /// Returns `true` if this call performed the transition.
    pub fn cancel(&mut self) -> bool {
        match mem::replace(self, Self::Terminal) {
            Self::Active(handle) => {
                handle.release();
                true
            }
            Self::Unset => true,
            Self::Terminal => false,
        }
    }

    /// Whether the state is [`Terminal`][Self::Terminal].
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }
}

impl<C> fmt::Debug for State<C>
where
    C: ?Sized,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "Unset"),
            Self::Active(_) => write!(f, "Active(..)"),
            Self::Terminal => write!(f, "Terminal"),
        }
    }
}

/// Checks whether `incoming` may be stored into `current`, given exclusive access to `current`.
///
/// Returns `true` if `current` is [`State::Unset`]; the caller is then responsible for storing
/// `incoming`. Otherwise `incoming` is released immediately and `false` is returned. If
/// `current` holds a live handle, a [`Error::ProtocolViolation`] naming `consumer` is
/// additionally delivered to `reporter`.
pub fn validate<C>(
    current: &State<C>,
    incoming: &Arc<C>,
    consumer: &str,
    reporter: &Reporter,
) -> bool
where
    C: ?Sized + Capability,
{
    match current {
        State::Unset => true,
        State::Active(_) => {
            incoming.release();
            report_double_binding(consumer, reporter);
            false
        }
        State::Terminal => {
            incoming.release();
            false
        }
    }
}

/// Atomic single-assignment cell for the handle a consumer receives from its producer.
///
/// Any number of threads may race to bind, cancel and read the slot. Exactly one bind
/// succeeds, and every handle that does not end up stored in the slot is released exactly
/// once: either by the bind that was rejected or by the cancellation that displaced it.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use upstream::{ActionDisposable, Disposable, DisposableSlot};
///
/// let slot = DisposableSlot::new();
///
/// let first: Arc<dyn Disposable> = Arc::new(ActionDisposable::new(|| {}));
/// let second: Arc<dyn Disposable> = Arc::new(ActionDisposable::new(|| {}));
///
/// assert!(slot.set_once(Arc::clone(&first), "Example"));
///
/// // Rejected; `second` is disposed and a violation is reported.
/// assert!(!slot.set_once(Arc::clone(&second), "Example"));
/// assert!(second.is_disposed());
///
/// slot.cancel();
/// assert!(first.is_disposed());
/// assert!(slot.is_terminal());
/// ```
pub struct Slot<C>
where
    C: ?Sized + Capability,
{
    state: ArcSwap<State<C>>,
}

impl<C> Slot<C>
where
    C: ?Sized + Capability,
{
    /// Creates an unset slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(State::Unset),
        }
    }

    /// Atomically binds `incoming` if the slot is unset, reporting violations to the
    /// [global reporter][Reporter::global].
    ///
    /// See [`set_once_reporting()`][Self::set_once_reporting].
    pub fn set_once(&self, incoming: Arc<C>, consumer: &str) -> bool {
        self.set_once_reporting(incoming, consumer, Reporter::global())
    }

    /// Atomically binds `incoming` if the slot is unset.
    ///
    /// Returns `true` if `incoming` is now the active handle. Otherwise `incoming` has been
    /// released and `false` is returned:
    ///
    /// * If the slot is terminal, that is all that happens.
    /// * If the slot holds a live handle (even if it is the very same handle as `incoming`),
    ///   a [`Error::ProtocolViolation`] naming `consumer` is delivered to `reporter`.
    ///
    /// `consumer` is the type name of the consumer that owns the slot, typically obtained from
    /// [`std::any::type_name()`].
    pub fn set_once_reporting(
        &self,
        incoming: Arc<C>,
        consumer: &str,
        reporter: &Reporter,
    ) -> bool {
        let current = self.state.load();

        let observed = if matches!(**current, State::Unset) {
            let previous = self
                .state
                .compare_and_swap(&current, Arc::new(State::Active(Arc::clone(&incoming))));

            if Arc::ptr_eq(&previous, &current) {
                tracing::trace!(consumer, "upstream bound");
                return true;
            }

            previous
        } else {
            current
        };

        // Whatever is in there now, it is not us. Once a slot leaves `Unset` it never
        // returns, so `observed` cannot be `Unset` here.
        incoming.release();

        if let State::Active(_) = **observed {
            report_double_binding(consumer, reporter);
        } else {
            tracing::debug!(consumer, "upstream arrived after cancellation and was released");
        }

        false
    }

    /// Moves the slot to the terminal state, releasing the active handle if there is one.
    ///
    /// Returns `true` if this call performed the transition, `false` if the slot was
    /// already terminal. Any later bind attempt is guaranteed to observe the terminal state.
    pub fn cancel(&self) -> bool {
        if self.is_terminal() {
            return false;
        }

        let previous = self.state.swap(Arc::new(State::Terminal));

        match &*previous {
            State::Active(handle) => {
                tracing::trace!("upstream cancelled");
                handle.release();
                true
            }
            State::Unset => true,
            State::Terminal => false,
        }
    }

    /// The active handle, if the slot currently holds one.
    #[must_use]
    pub fn current(&self) -> Option<Arc<C>> {
        match &**self.state.load() {
            State::Active(handle) => Some(Arc::clone(handle)),
            State::Unset | State::Terminal => None,
        }
    }

    /// Whether the slot has been cancelled.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.load().is_terminal()
    }
}

impl<C> Default for Slot<C>
where
    C: ?Sized + Capability,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Slot<C>
where
    C: ?Sized + Capability,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("state", &**self.state.load())
            .finish()
    }
}

fn report_double_binding(consumer: &str, reporter: &Reporter) {
    tracing::debug!(consumer, "rejected second upstream for already bound consumer");
    reporter.report(Error::protocol_violation(consumer));
}
