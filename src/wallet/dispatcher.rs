//! WalletDispatcher - variant-tagged dispatch over the wallet registry.
//!
//! Every operation resolves the handle first and fails `UnknownWallet`
//! without touching the backend if the id is absent. Variant-specific
//! operations invoked on the wrong variant return `Unsupported`.

use crate::error::{Result, WalletError};
use crate::wallet::backend::{Balances, NodeBackend, SpendRequest, SubmittedTransaction};
use crate::wallet::confirm::{ConfirmationOutcome, ConfirmationTracker};
use crate::wallet::registry::{
    ColourInfo, RlInfo, WalletData, WalletHandle, WalletId, WalletKind, WalletRegistry,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-wallet line of the get_wallets / get_wallet_summaries responses.
#[derive(Debug, Clone)]
pub struct WalletSummary {
    pub id: WalletId,
    pub kind: WalletKind,
    pub balance: u64,
    pub name: Option<String>,
    pub colour: Option<String>,
}

pub struct WalletDispatcher {
    registry: RwLock<WalletRegistry>,
    backend: Arc<dyn NodeBackend>,
    tracker: ConfirmationTracker,
}

impl WalletDispatcher {
    pub fn new(backend: Arc<dyn NodeBackend>, tracker: ConfirmationTracker) -> Self {
        Self { registry: RwLock::new(WalletRegistry::new()), backend, tracker }
    }

    pub fn backend(&self) -> &Arc<dyn NodeBackend> {
        &self.backend
    }

    async fn resolve(&self, id: WalletId) -> Result<WalletHandle> {
        self.registry
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(WalletError::UnknownWallet(id))
    }

    /// Next unused address commitment. Standard and rate-limited wallets use
    /// the outer derivation sequence; coloured wallets the inner one.
    pub async fn new_receive_address(&self, id: WalletId) -> Result<String> {
        let wallet = self.resolve(id).await?;
        let hash = match wallet.kind() {
            WalletKind::Standard | WalletKind::RateLimited => self
                .backend
                .next_puzzle_hash(&wallet)
                .await
                .map_err(|e| WalletError::Backend(e.to_string()))?,
            WalletKind::ColouredCoin => self
                .backend
                .next_inner_hash(&wallet)
                .await
                .map_err(|e| WalletError::Backend(e.to_string()))?,
        };
        Ok(hash)
    }

    /// Balance facets plus the frozen amount, which is forced to zero for
    /// coloured wallets (no age-lock concept there).
    pub async fn balances(&self, id: WalletId) -> Result<(Balances, u64)> {
        let wallet = self.resolve(id).await?;
        let balances = self
            .backend
            .balances(&wallet)
            .await
            .map_err(|e| WalletError::Backend(e.to_string()))?;
        let frozen = match wallet.kind() {
            WalletKind::ColouredCoin => 0,
            _ => self
                .backend
                .frozen_amount(&wallet)
                .await
                .map_err(|e| WalletError::Backend(e.to_string()))?,
        };
        Ok((balances, frozen))
    }

    pub async fn transactions(&self, id: WalletId) -> Result<Vec<crate::wallet::backend::TransactionRecord>> {
        let wallet = self.resolve(id).await?;
        self.backend
            .transactions(wallet.id)
            .await
            .map_err(|e| WalletError::Backend(e.to_string()))
    }

    /// Build, broadcast and track a generic spend. Coloured wallets must use
    /// `coloured_spend`.
    pub async fn spend(&self, id: WalletId, request: SpendRequest) -> Result<ConfirmationOutcome> {
        let wallet = self.resolve(id).await?;
        if wallet.kind() == WalletKind::ColouredCoin {
            return Err(WalletError::Unsupported { op: "send_transaction", kind: wallet.kind() });
        }
        let tx = self
            .backend
            .build_signed_transaction(&wallet, &request)
            .await
            .map_err(|e| WalletError::BuildFailed(e.to_string()))?
            .ok_or_else(|| WalletError::BuildFailed("wallet returned no transaction".into()))?;
        self.submit(tx).await
    }

    /// Colour-aware spend against an inner puzzle commitment.
    pub async fn coloured_spend(
        &self,
        id: WalletId,
        amount: u64,
        inner_hash: &str,
    ) -> Result<ConfirmationOutcome> {
        let wallet = self.resolve(id).await?;
        if wallet.kind() != WalletKind::ColouredCoin {
            return Err(WalletError::Unsupported { op: "cc_spend", kind: wallet.kind() });
        }
        let tx = self
            .backend
            .build_coloured_spend(&wallet, amount, inner_hash)
            .await
            .map_err(|e| WalletError::BuildFailed(e.to_string()))?
            .ok_or_else(|| WalletError::BuildFailed("wallet returned no transaction".into()))?;
        self.submit(tx).await
    }

    /// Broadcast then poll. Submission is never retried; the tracker only
    /// watches the status of a transaction the broadcast step accepted.
    async fn submit(&self, tx: SubmittedTransaction) -> Result<ConfirmationOutcome> {
        self.backend
            .broadcast(&tx)
            .await
            .map_err(|e| WalletError::BroadcastFailed(e.to_string()))?;
        tracing::debug!(tx_id = %tx.tx_id, wallet_id = tx.wallet_id, "transaction broadcast");
        Ok(self.tracker.track(self.backend.as_ref(), &tx.tx_id).await)
    }

    pub async fn configure_rl_admin(
        &self,
        id: WalletId,
        interval: u64,
        limit: u64,
        user_pubkey: &str,
        amount: u64,
    ) -> Result<bool> {
        let wallet = self.resolve(id).await?;
        if wallet.kind() != WalletKind::RateLimited {
            return Err(WalletError::Unsupported { op: "rl_set_admin_info", kind: wallet.kind() });
        }
        let accepted = self
            .backend
            .configure_rl_admin(&wallet, interval, limit, user_pubkey, amount)
            .await
            .map_err(|e| WalletError::Backend(e.to_string()))?;
        if accepted {
            let mut registry = self.registry.write().await;
            if let Some(WalletData::RateLimited(info)) = registry.get_mut(id).map(|w| &mut w.data) {
                info.interval = Some(interval);
                info.limit = Some(limit);
                info.user_pubkey = Some(user_pubkey.to_string());
            }
        }
        Ok(accepted)
    }

    pub async fn configure_rl_user(
        &self,
        id: WalletId,
        interval: u64,
        limit: u64,
        origin_id: &str,
        admin_pubkey: &str,
    ) -> Result<bool> {
        let wallet = self.resolve(id).await?;
        if wallet.kind() != WalletKind::RateLimited {
            return Err(WalletError::Unsupported { op: "rl_set_user_info", kind: wallet.kind() });
        }
        let accepted = self
            .backend
            .configure_rl_user(&wallet, interval, limit, origin_id, admin_pubkey)
            .await
            .map_err(|e| WalletError::Backend(e.to_string()))?;
        if accepted {
            let mut registry = self.registry.write().await;
            if let Some(WalletData::RateLimited(info)) = registry.get_mut(id).map(|w| &mut w.data) {
                info.interval = Some(interval);
                info.limit = Some(limit);
                info.origin_id = Some(origin_id.to_string());
                info.admin_pubkey = Some(admin_pubkey.to_string());
            }
        }
        Ok(accepted)
    }

    pub async fn set_colour_name(&self, id: WalletId, name: &str) -> Result<()> {
        let mut registry = self.registry.write().await;
        let wallet = registry.get_mut(id).ok_or(WalletError::UnknownWallet(id))?;
        match &mut wallet.data {
            WalletData::Coloured(info) => {
                info.name = name.to_string();
                Ok(())
            }
            _ => Err(WalletError::Unsupported { op: "cc_set_name", kind: wallet.kind() }),
        }
    }

    pub async fn colour_name(&self, id: WalletId) -> Result<String> {
        let wallet = self.resolve(id).await?;
        match wallet.data {
            WalletData::Coloured(info) => Ok(info.name),
            _ => Err(WalletError::Unsupported { op: "cc_get_name", kind: wallet.kind() }),
        }
    }

    pub async fn colour(&self, id: WalletId) -> Result<String> {
        let wallet = self.resolve(id).await?;
        match wallet.data {
            WalletData::Coloured(info) => Ok(info.colour),
            _ => Err(WalletError::Unsupported { op: "cc_get_colour", kind: wallet.kind() }),
        }
    }

    /// Create a coloured wallet around a freshly minted colour.
    pub async fn create_coloured_new(&self, amount: u64) -> Result<WalletId> {
        let colour = self
            .backend
            .issue_colour(amount)
            .await
            .map_err(|e| WalletError::Backend(e.to_string()))?;
        let mut registry = self.registry.write().await;
        Ok(registry.create(WalletData::Coloured(ColourInfo { colour, name: "CC Wallet".into() })))
    }

    /// Create a coloured wallet tracking an existing colour.
    pub async fn create_coloured_existing(&self, colour: &str) -> Result<WalletId> {
        let mut registry = self.registry.write().await;
        Ok(registry.create(WalletData::Coloured(ColourInfo {
            colour: colour.to_string(),
            name: "CC Wallet".into(),
        })))
    }

    /// Create an unconfigured rate-limited wallet; the rl_set_* calls
    /// establish its spend contract afterwards.
    pub async fn create_rate_limited(&self) -> Result<WalletId> {
        let mut registry = self.registry.write().await;
        Ok(registry.create(WalletData::RateLimited(RlInfo::default())))
    }

    pub async fn kind_of(&self, id: WalletId) -> Result<WalletKind> {
        Ok(self.resolve(id).await?.kind())
    }

    /// One summary line per wallet, with the confirmed balance.
    pub async fn summaries(&self) -> Result<Vec<WalletSummary>> {
        let handles: Vec<WalletHandle> = self.registry.read().await.iter().cloned().collect();
        let mut out = Vec::with_capacity(handles.len());
        for wallet in handles {
            let balance = self
                .backend
                .balances(&wallet)
                .await
                .map_err(|e| WalletError::Backend(e.to_string()))?
                .confirmed;
            let (name, colour) = match &wallet.data {
                WalletData::Coloured(info) => (Some(info.name.clone()), Some(info.colour.clone())),
                _ => (None, None),
            };
            out.push(WalletSummary { id: wallet.id, kind: wallet.kind(), balance, name, colour });
        }
        Ok(out)
    }
}
