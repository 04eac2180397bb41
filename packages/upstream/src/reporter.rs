//! Delivery of errors that have no synchronous recipient.

use std::fmt;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwapOption;

use crate::Error;

static GLOBAL: LazyLock<Reporter> = LazyLock::new(Reporter::new);

struct Hook(Box<dyn Fn(Error) + Send + Sync>);

/// A swappable sink for errors that cannot be delivered to the code that caused them.
///
/// Double-binding violations and errors that arrive after a consumer has already terminated
/// end up here. The binding operations never return these errors to their caller.
///
/// A reporter starts out with the default hook, which logs each error via `tracing` at the
/// error level (or writes it to standard error if no `tracing` subscriber has been installed).
/// The hook can be swapped at any time with [`replace()`][Self::replace] and restored with
/// [`reset()`][Self::reset]. A report that races with a swap uses exactly one of the two hooks.
///
/// Most code uses the process-wide instance from [`global()`][Self::global]. Cloning a
/// reporter produces another handle to the same hook, so independent instances created via
/// [`new()`][Self::new] can be passed to slots and consumers to isolate them, e.g. in tests.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use upstream::{Error, Reporter};
///
/// let reporter = Reporter::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// reporter.replace({
///     let seen = Arc::clone(&seen);
///     move |error: Error| seen.lock().unwrap().push(error.to_string())
/// });
///
/// reporter.report(Error::protocol_violation("Collector"));
///
/// assert_eq!(seen.lock().unwrap().len(), 1);
/// ```
#[derive(Clone)]
pub struct Reporter {
    // `None` means the default hook is active.
    hook: Arc<ArcSwapOption<Hook>>,
}

impl Reporter {
    /// Creates an independent reporter with the default hook installed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hook: Arc::new(ArcSwapOption::const_empty()),
        }
    }

    /// The process-wide reporter used by every slot and consumer not given one explicitly.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Delivers `error` to the active hook.
    ///
    /// Never panics. If the hook itself panics, the panic is contained and a description of
    /// the error is written to standard error instead.
    pub fn report(&self, error: Error) {
        // Loaded once, so this call sees one hook even if another thread is swapping it.
        let Some(hook) = self.hook.load_full() else {
            report_default(&error);
            return;
        };

        let description = error.to_string();

        if panic::catch_unwind(AssertUnwindSafe(|| (hook.0)(error))).is_err() {
            report_last_resort(&description);
        }
    }

    /// Replaces the active hook. Takes effect for all reports that start after this returns.
    pub fn replace<F>(&self, hook: F)
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        self.hook.store(Some(Arc::new(Hook(Box::new(hook)))));
    }

    /// Restores the default hook.
    pub fn reset(&self) {
        self.hook.store(None);
    }

    /// Whether a custom hook is currently installed.
    #[must_use]
    pub fn is_replaced(&self) -> bool {
        self.hook.load().is_some()
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Reporter {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("is_replaced", &self.is_replaced())
            .finish()
    }
}

#[cfg_attr(test, mutants::skip)] // Output goes to the log, nothing to assert on.
fn report_default(error: &Error) {
    if tracing::dispatcher::has_been_set() {
        tracing::error!(kind = error.kind(), %error, "undeliverable error");
    } else {
        report_last_resort(&error.to_string());
    }
}

#[cfg_attr(test, mutants::skip)] // Output goes to stderr, nothing to assert on.
fn report_last_resort(description: &str) {
    // If even stderr is gone there is nowhere left to report to.
    drop(writeln!(io::stderr().lock(), "undeliverable error: {description}"));
}
