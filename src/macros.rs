#![allow(unused_macros)]

/// Helper macro for locking items inside functions returning [`crate::Result`]
///
/// A poisoned mutex is reported as [`crate::Error::LockError`].
///
/// ```rust, ignore
///  let mut pending = lock!(self.pending);
///  pending.insert(token);
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for checking a [`crate::utils::CancellationToken`]
///
/// Returns [`crate::Error::Cancelled`] from the enclosing function once
/// cancellation was requested.
///
/// ```rust, ignore
///  check_cancelled!(cancellation);
/// ```
macro_rules! check_cancelled {
    ($token:expr) => {
        if $token.is_cancelled() {
            return Err(crate::Error::Cancelled);
        }
    };
}
