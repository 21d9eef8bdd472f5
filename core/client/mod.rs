//! The HTTP client decorator stack: each layer wraps the
//! one below it and owns its immediate delegate's lifecycle.
//!
//! Composition order, outermost to innermost: `RetryableClient` picks a
//! candidate endpoint → `RedirectingClient` resolves any 3xx chain and pins
//! to the terminal IP → `SessionedClient` enforces periodic reconnection →
//! wire transport.

pub mod call;
pub mod redirecting;
pub mod retryable;
pub mod sessioned;
pub mod status_evaluator;

pub use call::{apply_call, Call};
pub use redirecting::{RedirectingClient, RedirectingClientFactory};
pub use retryable::{RetryableClient, RetryableClientConfig};
pub use sessioned::{SessionedClient, SessionedClientFactory};
pub use status_evaluator::{LegacyStatusEvaluator, StatusEvaluator, StrictStatusEvaluator};
