//! `teaforge-net` – network collaborators of the platform core.
//!
//! The platform core itself never spawns threads or awaits anything. All
//! socket I/O happens on a [`NetworkRuntime`] owned by the platform state;
//! the core talks to it through plain synchronous calls that either return
//! immediately ([`WebSocketSession::try_recv_text`]) or block for a bounded
//! time (handshake and close).

pub mod forward;
pub mod websocket;

pub use forward::PortForward;
pub use websocket::WebSocketSession;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

/// Failures reported by the network layer.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("failed to start network runtime: {0}")]
    Runtime(String),

    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("cannot bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

/// Multi-threaded Tokio runtime hosting every socket the platform opens.
///
/// Cloning is cheap and shares the runtime.
#[derive(Clone)]
pub struct NetworkRuntime {
    runtime: Arc<Runtime>,
}

impl NetworkRuntime {
    /// Start a runtime with `worker_threads` I/O workers.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Runtime`] when the OS refuses to create the
    /// worker threads.
    pub fn new(worker_threads: usize) -> Result<Self, NetError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("teaforge-net")
            .enable_all()
            .build()
            .map_err(|e| NetError::Runtime(e.to_string()))?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    /// Drive `future` to completion from synchronous code, giving up after
    /// `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Timeout`] naming `operation` when the bound
    /// elapses first.
    pub fn block_on_bounded<F: Future>(
        &self,
        operation: &'static str,
        limit: Duration,
        future: F,
    ) -> Result<F::Output, NetError> {
        self.runtime
            .block_on(async { tokio::time::timeout(limit, future).await })
            .map_err(|_| NetError::Timeout {
                operation,
                after: limit,
            })
    }

    pub(crate) fn handle(&self) -> &tokio::runtime::Handle {
        self.runtime.handle()
    }
}

impl std::fmt::Debug for NetworkRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkRuntime").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_block_on_returns_output() {
        let net = NetworkRuntime::new(1).unwrap();
        let out = net
            .block_on_bounded("add", Duration::from_secs(1), async { 2 + 2 })
            .unwrap();
        assert_eq!(out, 4);
    }

    #[test]
    fn bounded_block_on_times_out() {
        let net = NetworkRuntime::new(1).unwrap();
        let err = net
            .block_on_bounded(
                "sleep",
                Duration::from_millis(10),
                async { tokio::time::sleep(Duration::from_secs(5)).await },
            )
            .unwrap_err();
        assert!(matches!(err, NetError::Timeout { operation: "sleep", .. }));
    }
}
