#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing the upstream packages.

use std::{env, panic};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// Runs a test on a separate thread and fails it if it does not finish within the timeout.
///
/// The race tests in this workspace loop many times over code that would deadlock or spin
/// forever if a cancellation were lost, so every multithreaded test goes through here.
///
/// The timeout is 10 seconds under normal conditions and 60 seconds under Miri.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled
/// and the test function is executed directly, so that mutation testing can detect hangs.
///
/// # Panics
///
/// Panics if the test panics or exceeds the timeout.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let answer = with_watchdog(|| 2 + 2);
/// assert_eq!(answer, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    let (tx, rx) = mpsc::channel();

    let test_thread = thread::spawn(move || {
        // If this fails, the watchdog has already given up on us.
        drop(tx.send(test_fn()));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_thread.join().expect("test thread finished sending, cannot have panicked");
            result
        }
        Err(RecvTimeoutError::Timeout) => {
            panic!("test exceeded the {timeout:?} watchdog timeout");
        }
        Err(RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread disconnected without a result"),
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// Runs `first` and `second` on two threads, releasing both at the same instant to maximize
/// the chance that they interleave.
///
/// Returns once both have finished. A panic on either thread is propagated.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use testing::race;
///
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// race(
///     {
///         let counter = Arc::clone(&counter);
///         move || {
///             counter.fetch_add(1, Ordering::Relaxed);
///         }
///     },
///     {
///         let counter = Arc::clone(&counter);
///         move || {
///             counter.fetch_add(1, Ordering::Relaxed);
///         }
///     },
/// );
///
/// assert_eq!(counter.load(Ordering::Relaxed), 2);
/// ```
pub fn race<A, B>(first: A, second: B)
where
    A: FnOnce() + Send + 'static,
    B: FnOnce() + Send + 'static,
{
    let barrier = Arc::new(Barrier::new(2));

    let other = thread::spawn({
        let barrier = Arc::clone(&barrier);
        move || {
            barrier.wait();
            second();
        }
    });

    barrier.wait();
    first();

    if let Err(payload) = other.join() {
        panic::resume_unwind(payload);
    }
}
