//! TradeOfferCoordinator - offer files on disk, bundles from the trade manager.
//!
//! The file at the caller-supplied path is the only persistence for an
//! in-flight offer; there is no in-memory offer registry. Bundle encoding is
//! owned by the trade manager and opaque here.

use crate::error::{Result, WalletError};
use crate::wallet::registry::WalletId;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

/// External trade manager: builds, inspects and settles cryptographic offer
/// bundles. Bundles are opaque bytes to the coordinator.
#[async_trait]
pub trait TradeManager: Send + Sync {
    /// Build an offer bundle for the given wallet-id → amount map (negative
    /// amounts are requested, positive offered).
    async fn create_offer(&self, ids: &BTreeMap<WalletId, i64>) -> anyhow::Result<Vec<u8>>;

    /// Assets where the offer's stated exchange differs from current wallet
    /// state, keyed by colour.
    async fn discrepancies(&self, bundle: &[u8]) -> anyhow::Result<BTreeMap<String, i64>>;

    /// Accept and settle the offer. No rollback: a failure after partial
    /// settlement leaves external state as the manager left it.
    async fn respond(&self, bundle: &[u8]) -> anyhow::Result<()>;
}

pub struct TradeOfferCoordinator {
    manager: std::sync::Arc<dyn TradeManager>,
}

impl TradeOfferCoordinator {
    pub fn new(manager: std::sync::Arc<dyn TradeManager>) -> Self {
        Self { manager }
    }

    /// Build an offer and serialize it to `path`, overwriting silently.
    pub async fn create_offer_for_ids(
        &self,
        ids: &BTreeMap<WalletId, i64>,
        path: &Path,
    ) -> Result<()> {
        let bundle = self
            .manager
            .create_offer(ids)
            .await
            .map_err(|e| WalletError::Trade(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, bundle)?;
        tracing::info!(path = %path.display(), "offer written");
        Ok(())
    }

    /// Read the bundle at `path` and report the discrepancies it states.
    pub async fn get_discrepancies(&self, path: &Path) -> Result<BTreeMap<String, i64>> {
        let bundle = std::fs::read(path)
            .map_err(|e| WalletError::OfferParse(format!("{}: {e}", path.display())))?;
        self.manager
            .discrepancies(&bundle)
            .await
            .map_err(|e| WalletError::OfferParse(e.to_string()))
    }

    /// Accept and settle the offer at `path`. Reports the manager's reason
    /// verbatim on failure; never attempts to undo partial settlement.
    pub async fn respond_to_offer(&self, path: &Path) -> Result<()> {
        let bundle = std::fs::read(path)
            .map_err(|e| WalletError::OfferParse(format!("{}: {e}", path.display())))?;
        self.manager
            .respond(&bundle)
            .await
            .map_err(|e| WalletError::Trade(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimTradeManager;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn coordinator() -> (TradeOfferCoordinator, Arc<SimTradeManager>) {
        let manager = Arc::new(SimTradeManager::new());
        (TradeOfferCoordinator::new(manager.clone()), manager)
    }

    fn ids() -> BTreeMap<WalletId, i64> {
        BTreeMap::from([(2, 100), (3, -50)])
    }

    #[tokio::test]
    async fn test_create_then_inspect() {
        let (coordinator, _) = coordinator();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("offer.trade");

        coordinator.create_offer_for_ids(&ids(), &path).await.unwrap();
        assert!(path.exists());

        let discrepancies = coordinator.get_discrepancies(&path).await.unwrap();
        assert!(!discrepancies.is_empty());
    }

    #[tokio::test]
    async fn test_create_overwrites_silently() {
        let (coordinator, _) = coordinator();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("offer.trade");
        std::fs::write(&path, b"stale contents").unwrap();

        coordinator.create_offer_for_ids(&ids(), &path).await.unwrap();
        let written = std::fs::read(&path).unwrap();
        assert_ne!(written, b"stale contents");
    }

    #[tokio::test]
    async fn test_unparseable_file_is_offer_parse_error() {
        let (coordinator, _) = coordinator();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.trade");
        std::fs::write(&path, b"\xff\xfe not a bundle").unwrap();

        let err = coordinator.get_discrepancies(&path).await.unwrap_err();
        assert!(matches!(err, WalletError::OfferParse(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_offer_parse_error() {
        let (coordinator, _) = coordinator();
        let err = coordinator
            .get_discrepancies(Path::new("/nonexistent/offer.trade"))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::OfferParse(_)));
    }

    #[tokio::test]
    async fn test_respond_reports_manager_reason() {
        let (coordinator, manager) = coordinator();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("offer.trade");
        coordinator.create_offer_for_ids(&ids(), &path).await.unwrap();

        manager.reject_with("insufficient coloured coins");
        let err = coordinator.respond_to_offer(&path).await.unwrap_err();
        match err {
            WalletError::Trade(reason) => assert_eq!(reason, "insufficient coloured coins"),
            other => panic!("expected Trade error, got {other:?}"),
        }

        manager.accept();
        coordinator.respond_to_offer(&path).await.unwrap();
    }
}
