//! Shared utilities used across the decompilation pipeline.
//!
//! # Key Components
//!
//! - [`CancellationToken`] - Cooperative cancellation shared between the provider, the
//!   orchestrator and its parallel workers

mod synchronization;

pub use synchronization::CancellationToken;
