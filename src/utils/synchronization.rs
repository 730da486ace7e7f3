//! Synchronization utilities for multi-threaded operations.
//!
//! This module provides the cancellation primitive threaded through a whole
//! decompilation run. Workers poll it before starting a unit and between the
//! types and members they build; units that are already rendering are never
//! force-terminated.
//!
//! # Key Components
//!
//! - [`CancellationToken`] - A cloneable flag that can be raised once and observed by
//!   every clone

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{Error, Result};

/// Cooperative cancellation signal.
///
/// Clones share the same flag, so a token handed to a decompilation run can be
/// cancelled from the thread that started it.
///
/// # Examples
///
/// ```rust
/// use dotsource::utils::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// assert!(!observer.is_cancelled());
///
/// token.cancel();
/// assert!(observer.is_cancelled());
/// assert!(observer.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is never cancelled by anybody else.
    ///
    /// Used for the final registration step of a navigation request, which must
    /// always complete once started.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once [`CancellationToken::cancel`] was called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns [`Error::Cancelled`] if cancellation was requested.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] once the token is cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
