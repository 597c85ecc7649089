//! NodeBackend - the external wallet-state-manager contract.
//!
//! Balance accounting, coin selection, signing, chain sync and the peer
//! registry all live behind these traits; this crate sequences calls into
//! them and normalizes results. Implementations return `anyhow::Result` and
//! callers convert to typed `WalletError` variants at the operation
//! boundary, keeping the message as the diagnostic.

use crate::wallet::registry::{WalletHandle, WalletId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Acceptance of a broadcast transaction by a peer's pending pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InclusionStatus {
    Success,
    Pending,
    Failed,
}

/// One peer's view of a submitted transaction.
#[derive(Debug, Clone)]
pub struct PeerStatus {
    pub peer: String,
    pub status: InclusionStatus,
    pub reason: Option<String>,
}

/// The four balance facets every wallet reports. `frozen` is queried
/// separately because coloured wallets force it to zero.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Balances {
    pub confirmed: u64,
    pub unconfirmed: u64,
    pub spendable: u64,
    pub pending_change: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub tx_id: String,
    pub wallet_id: WalletId,
    pub amount: u64,
    pub to_puzzle_hash: String,
    pub confirmed: bool,
    pub created_at: i64,
}

/// Parameters of a spend, as they arrive on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct SpendRequest {
    pub amount: u64,
    pub puzzle_hash: String,
    #[serde(default)]
    pub fee: u64,
}

/// A signed transaction accepted by the broadcast step. The identity is
/// content-derived and immutable; it is the join key for status polling.
#[derive(Debug, Clone)]
pub struct SubmittedTransaction {
    pub tx_id: String,
    pub wallet_id: WalletId,
    pub amount: u64,
    pub to_puzzle_hash: String,
}

/// A connected full-node peer, for get_connection_info.
#[derive(Debug, Clone, Serialize)]
pub struct PeerInfo {
    pub host: String,
    pub port: u16,
    pub node_type: String,
}

/// Pull-based status source for submitted transactions. Split out of
/// `NodeBackend` so the confirmation tracker can be exercised against a
/// bare status stub.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Per-peer status records for a transaction; empty while no peer has
    /// processed it yet.
    async fn transaction_status(&self, tx_id: &str) -> anyhow::Result<Vec<PeerStatus>>;
}

#[async_trait]
pub trait NodeBackend: StatusSource {
    async fn balances(&self, wallet: &WalletHandle) -> anyhow::Result<Balances>;
    async fn frozen_amount(&self, wallet: &WalletHandle) -> anyhow::Result<u64>;

    /// Next unused address commitment; advances the derivation cursor.
    async fn next_puzzle_hash(&self, wallet: &WalletHandle) -> anyhow::Result<String>;
    /// Next unused inner puzzle commitment for a coloured wallet.
    async fn next_inner_hash(&self, wallet: &WalletHandle) -> anyhow::Result<String>;

    async fn transactions(&self, wallet_id: WalletId) -> anyhow::Result<Vec<TransactionRecord>>;

    /// Build a generic signed transaction. `Ok(None)` means the builder
    /// produced nothing (reported as a build failure by the caller).
    async fn build_signed_transaction(
        &self,
        wallet: &WalletHandle,
        request: &SpendRequest,
    ) -> anyhow::Result<Option<SubmittedTransaction>>;

    /// Colour-aware spend builder for coloured wallets.
    async fn build_coloured_spend(
        &self,
        wallet: &WalletHandle,
        amount: u64,
        inner_hash: &str,
    ) -> anyhow::Result<Option<SubmittedTransaction>>;

    /// Submit a built transaction for broadcast. Not retried on failure.
    async fn broadcast(&self, tx: &SubmittedTransaction) -> anyhow::Result<()>;

    /// Mint a new colour backed by `amount` (create_new_wallet, mode "new").
    async fn issue_colour(&self, amount: u64) -> anyhow::Result<String>;

    async fn configure_rl_admin(
        &self,
        wallet: &WalletHandle,
        interval: u64,
        limit: u64,
        user_pubkey: &str,
        amount: u64,
    ) -> anyhow::Result<bool>;

    async fn configure_rl_user(
        &self,
        wallet: &WalletHandle,
        interval: u64,
        limit: u64,
        origin_id: &str,
        admin_pubkey: &str,
    ) -> anyhow::Result<bool>;

    /// Broadcast a block-production directive. Simulation environments only.
    async fn farm_block(&self, puzzle_hash: &str) -> anyhow::Result<()>;

    async fn sync_status(&self) -> anyhow::Result<bool>;
    async fn height(&self) -> anyhow::Result<u32>;
    async fn peers(&self) -> anyhow::Result<Vec<PeerInfo>>;

    /// Flush and close persistent stores. After this every other call fails.
    async fn close(&self) -> anyhow::Result<()>;
}
