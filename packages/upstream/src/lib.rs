#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Exactly-once binding of cancellable upstream handles for reactive consumers.
//!
//! In a reactive pipeline, a producer hands each consumer a handle through which the consumer
//! controls the producer: a [`Subscription`] (request more items, cancel) or a [`Disposable`]
//! (stop). This crate is the lifecycle core that every consumer uses to accept that handle:
//!
//! * A [`Slot`] accepts exactly one handle, atomically, even if many threads race to bind it.
//! * Cancelling a slot releases its handle exactly once and makes the slot terminal. A handle
//!   that arrives after cancellation is released on arrival.
//! * A second live handle offered to a bound slot is a protocol violation. It is released and
//!   the violation is delivered to a [`Reporter`], never returned to the caller.
//! * [`DefaultSubscriber`] and [`DefaultObserver`] are ready-made single-use consumers built on
//!   top of slots, to which you supply the item handling logic.
//!
//! # Example
//!
//! ```rust
//! use std::num::NonZeroU64;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! use upstream::{Reporter, Subscription, SubscriptionSlot};
//!
//! #[derive(Default)]
//! struct Producer {
//!     cancelled: AtomicBool,
//! }
//!
//! impl Subscription for Producer {
//!     fn request(&self, _n: NonZeroU64) {}
//!
//!     fn cancel(&self) {
//!         self.cancelled.store(true, Ordering::Relaxed);
//!     }
//! }
//!
//! let reporter = Reporter::new();
//! let slot = SubscriptionSlot::new();
//!
//! let first = Arc::new(Producer::default());
//! assert!(slot.set_once_reporting(first.clone(), "Consumer", &reporter));
//!
//! slot.cancel();
//! assert!(first.cancelled.load(Ordering::Relaxed));
//!
//! // Cancelled before it could bind: released on arrival, not a violation.
//! let late = Arc::new(Producer::default());
//! assert!(!slot.set_once_reporting(late.clone(), "Consumer", &reporter));
//! assert!(late.cancelled.load(Ordering::Relaxed));
//! ```

mod capability;
mod error;
mod flowable;
mod observable;
mod reporter;
mod slot;

#[cfg(test)]
mod test_utils;

pub use capability::*;
pub use error::{BoxError, Error};
pub use flowable::*;
pub use observable::*;
pub use reporter::*;
pub use slot::*;
