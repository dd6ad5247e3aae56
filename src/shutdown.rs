//! Graceful shutdown for the watch loop.
//!
//! The first SIGINT or SIGTERM cancels a
//! [`tokio_util::sync::CancellationToken`] so the loop can finish the cycle
//! in flight; a second signal exits immediately.

use tokio_util::sync::CancellationToken;

pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();

    let handler_token = token.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut sigterm = {
            use tokio::signal::unix::{signal, SignalKind};
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler")
        };

        let mut received = 0u32;
        loop {
            #[cfg(unix)]
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }

            #[cfg(not(unix))]
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for Ctrl+C");

            received += 1;
            if received == 1 {
                tracing::info!("shutdown requested, finishing current cycle (signal again to force)");
                handler_token.cancel();
            } else {
                tracing::warn!("force exit");
                std::process::exit(130);
            }
        }
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_returns_live_token() {
        // Signal delivery itself can't be exercised safely in a shared test
        // binary; assert the token starts uncancelled.
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn child_tokens_observe_parent_cancel() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
