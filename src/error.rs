use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Invariant {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Invariant {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// How a caller is expected to react to an [`Error`].
///
/// Navigation requests distinguish between failures that only lower the fidelity of
/// the result (the provider falls back to signature stubs) and failures that must be
/// surfaced to the user. Keeping the classification on the error type prevents the
/// two from being conflated by whoever catches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The current strategy failed, a lesser strategy can still produce a result.
    Degrade,
    /// The request cannot be completed; the error must be reported.
    Fatal,
    /// The operation was cancelled cooperatively.
    Cancelled,
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - Corrupted or inconsistent metadata
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a binary image
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// ## Decompilation Errors
/// - [`Error::TypeNotFound`] - A type token does not resolve inside the module
/// - [`Error::Decompile`] - A work unit failed; wraps the cause with the output path
///
/// ## Navigation Errors
/// - [`Error::Invariant`] - Generation and lookup disagree; a programming error
/// - [`Error::Fatal`] - The request cannot be satisfied (e.g. broken type forwards)
/// - [`Error::Cancelled`] - The operation was cancelled
///
/// # Examples
///
/// ```rust
/// use dotsource::{Error, Severity};
///
/// let error = Error::Cancelled;
/// assert_eq!(error.severity(), Severity::Cancelled);
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The metadata is inconsistent and could not be processed.
    ///
    /// The error includes the source location where the problem was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted on a binary image.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur during file operations such as
    /// reading images, creating the generated directory tree or marking files
    /// read-only.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Failed to find a type definition in the module being decompiled.
    ///
    /// The associated [`Token`] identifies which type was not found.
    #[error("Failed to find type definition - {0}")]
    TypeNotFound(Token),

    /// Decompiling one work unit failed.
    ///
    /// Carries the relative output path of the unit so the failing file can be
    /// identified; aborts the whole decompilation run.
    #[error("Error decompiling for '{path}': {source}")]
    Decompile {
        /// Relative path of the file that was being generated
        path: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Generation and lookup disagree about the generated file set.
    ///
    /// This can only happen if the naming algorithm used when registering files
    /// differs from the one used when looking them up, and is never a user error.
    #[error("Invariant violated - {file}:{line}: {message}")]
    Invariant {
        /// Description of the violated invariant
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A navigation request cannot be completed.
    #[error("{0}")]
    Fatal(String),

    /// The operation was cancelled.
    #[error("The operation was cancelled")]
    Cancelled,

    /// Failed to lock target.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Classifies the error for callers deciding between fallback and failure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dotsource::{Error, Severity};
    ///
    /// let error = Error::Decompile {
    ///     path: "Widget.cs".to_string(),
    ///     source: Box::new(Error::Error("boom".to_string())),
    /// };
    /// assert_eq!(error.severity(), Severity::Degrade);
    /// ```
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Error::Cancelled => Severity::Cancelled,
            Error::Decompile { source, .. } if matches!(**source, Error::Cancelled) => {
                Severity::Cancelled
            }
            Error::Invariant { .. } | Error::Fatal(_) | Error::LockError => Severity::Fatal,
            _ => Severity::Degrade,
        }
    }

    /// Returns `true` if the error must be reported instead of degraded.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
