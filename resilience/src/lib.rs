//! Shared retry and cancellation primitives for every external call.
//!
//! All provider traffic (platform API, LLM, embeddings) goes through the
//! single [`retry`] helper so attempt caps, backoff growth, jitter and the
//! "rate-limit vs transient vs fatal" classification live in one place.
//! Cancellation uses one shared [`CancellationToken`] per run; helpers for
//! deriving a deadline-bound token are in [`cancel`].

pub mod cancel;
pub mod retry;

pub use cancel::deadline_token;
pub use retry::{Classify, RetryClass, RetryError, RetryPolicy, retry};
pub use tokio_util::sync::CancellationToken;
