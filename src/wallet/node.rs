//! WalletNode - one wallet subsystem instance, scoped to a logged-in key.
//!
//! Owns the dispatcher (registry + backend) and the trade coordinator.
//! Exactly one instance exists at a time; `LifecycleManager` replaces it on
//! login and the teardown here must fully complete before a successor is
//! built.

use crate::runtime::Shutdown;
use crate::trade::{TradeManager, TradeOfferCoordinator};
use crate::wallet::backend::NodeBackend;
use crate::wallet::confirm::ConfirmationTracker;
use crate::wallet::dispatcher::WalletDispatcher;
use std::sync::Arc;

pub struct WalletNode {
    pub fingerprint: u32,
    pub dispatcher: WalletDispatcher,
    pub trade: TradeOfferCoordinator,
    backend: Arc<dyn NodeBackend>,
    shutdown: Shutdown,
}

impl WalletNode {
    pub fn start(
        fingerprint: u32,
        backend: Arc<dyn NodeBackend>,
        trade_manager: Arc<dyn TradeManager>,
        tracker: ConfirmationTracker,
    ) -> Self {
        tracing::info!(fingerprint, "starting wallet subsystem");
        Self {
            fingerprint,
            dispatcher: WalletDispatcher::new(backend.clone(), tracker),
            trade: TradeOfferCoordinator::new(trade_manager),
            backend,
            shutdown: Shutdown::new(),
        }
    }

    /// Subscribe to this subsystem's shutdown signal. Networking tasks hold
    /// a receiver and drop their connections when it fires.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn backend(&self) -> &Arc<dyn NodeBackend> {
        &self.backend
    }

    /// Ordered teardown: stop networking first, then flush and close the
    /// persistent stores. Callers must await this to completion before
    /// constructing a replacement subsystem.
    pub async fn stop(&self) {
        tracing::info!(fingerprint = self.fingerprint, "stopping wallet subsystem");
        self.shutdown.trigger().await;
        if let Err(e) = self.backend.close().await {
            tracing::warn!(error = %e, "backend close failed during teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::{SimBackend, SimTradeManager};

    #[tokio::test]
    async fn test_stop_signals_then_closes_stores() {
        let backend = Arc::new(SimBackend::new(0));
        let node = WalletNode::start(
            42,
            backend.clone(),
            Arc::new(SimTradeManager::new()),
            ConfirmationTracker::default(),
        );
        let mut rx = node.shutdown_handle().subscribe();

        node.stop().await;
        assert!(node.shutdown_handle().is_triggered().await);
        assert!(rx.recv().await.is_ok());
        assert!(backend.is_closed());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let backend = Arc::new(SimBackend::new(0));
        let node = WalletNode::start(
            7,
            backend.clone(),
            Arc::new(SimTradeManager::new()),
            ConfirmationTracker::default(),
        );
        node.stop().await;
        // Second stop finds the store already closed and only logs.
        node.stop().await;
        assert!(backend.is_closed());
    }
}
