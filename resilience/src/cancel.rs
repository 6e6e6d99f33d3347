//! Run-wide cancellation helpers.
//!
//! Every suspension point in the pipeline (platform call, LLM call, store
//! write) selects against one shared token. A fired token aborts the
//! current phase; the orchestrator still serializes the partial report.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Creates a token that auto-cancels after `deadline`, when given.
///
/// Without a deadline this is just a fresh token the caller can cancel
/// manually (e.g. from a ctrl-c handler).
pub fn deadline_token(deadline: Option<Duration>) -> CancellationToken {
    let token = CancellationToken::new();
    if let Some(limit) = deadline {
        let armed = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            if !armed.is_cancelled() {
                info!("run deadline of {:?} reached, cancelling", limit);
                armed.cancel();
            }
        });
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_after_the_limit() {
        let token = deadline_token(Some(Duration::from_secs(5)));
        assert!(!token.is_cancelled());
        tokio::time::sleep(Duration::from_secs(6)).await;
        // Let the spawned task run.
        tokio::task::yield_now().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn no_deadline_means_manual_only() {
        let token = deadline_token(None);
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }
}
