use thiserror::Error;

/// An error from some other component, carried without knowledge of its concrete type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that have no synchronous recipient and are therefore delivered to a [`Reporter`].
///
/// None of these are ever returned from the binding operations themselves. Binding
/// returns `bool` and hands any error it detects to the reporter as a value.
///
/// [`Reporter`]: crate::Reporter
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A second live handle was offered to a consumer that is already bound to one.
    ///
    /// Consumers are single-use. The fix is always to create a fresh consumer instance.
    #[error(
        "It is not allowed to subscribe with a(n) {consumer} multiple times. \
         Please create a fresh instance of {consumer} and subscribe that to the target source instead."
    )]
    ProtocolViolation {
        /// Fully qualified type name of the consumer that was bound twice.
        consumer: String,
    },

    /// The caller supplied an argument that the contract does not permit,
    /// such as a demand of zero items.
    #[error("{problem}")]
    InvalidArgument {
        /// A human-readable description of the problem.
        problem: String,
    },

    /// An error arrived after the consumer's sequence had already terminated.
    #[error("the consumer has already terminated: {source}")]
    Undeliverable {
        /// The error that could not be delivered.
        source: BoxError,
    },

    /// A consumer received an error but does not handle errors.
    #[error("{source}")]
    OnErrorNotImplemented {
        /// The error that was not handled.
        source: BoxError,
    },
}

impl Error {
    /// Creates the double-binding violation record for the consumer type `consumer`.
    #[must_use]
    pub fn protocol_violation(consumer: &str) -> Self {
        Self::ProtocolViolation {
            consumer: consumer.to_owned(),
        }
    }

    /// A short stable identifier of the error kind, suitable as a structured log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProtocolViolation { .. } => "protocol_violation",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Undeliverable { .. } => "undeliverable",
            Self::OnErrorNotImplemented { .. } => "on_error_not_implemented",
        }
    }
}

/// A specialized `Result` type for fallible operations in this crate.
pub(crate) type Result<T> = std::result::Result<T, Error>;
