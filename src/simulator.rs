//! In-memory simulator backend.
//!
//! Stands in for the full wallet-state-manager / full-node stack: balances,
//! a derivation cursor, a mempool whose entries confirm after a configured
//! number of polls, and a farm_block directive that credits a local puzzle
//! hash. This is what the `walletd` binary runs and what the integration
//! tests drive end to end.

use crate::lifecycle::{BackendSet, NodeFactory};
use crate::trade::TradeManager;
use crate::wallet::backend::{
    Balances, InclusionStatus, NodeBackend, PeerInfo, PeerStatus, SpendRequest, StatusSource,
    SubmittedTransaction, TransactionRecord,
};
use crate::wallet::registry::{WalletHandle, WalletId};
use anyhow::bail;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Amount credited to a puzzle hash per farmed block.
pub const BLOCK_REWARD: u64 = 1_000_000_000_000;

#[derive(Debug, Default, Clone, Copy)]
struct Funds {
    confirmed: u64,
    pending_outgoing: u64,
    pending_incoming: u64,
    pending_change: u64,
}

struct MempoolEntry {
    tx: SubmittedTransaction,
    polls: u32,
}

#[derive(Default)]
struct SimState {
    funds: HashMap<WalletId, Funds>,
    derivation_index: HashMap<WalletId, u64>,
    owners: HashMap<String, WalletId>,
    mempool: HashMap<String, MempoolEntry>,
    records: Vec<TransactionRecord>,
    frozen: u64,
    height: u32,
    tx_nonce: u64,
    colour_nonce: u64,
    broadcast_error: Option<String>,
}

pub struct SimBackend {
    state: Mutex<SimState>,
    /// Empty polls returned before a mempool entry reports SUCCESS.
    confirm_after: u32,
    calls: AtomicU64,
    closed: AtomicBool,
}

impl SimBackend {
    pub fn new(confirm_after: u32) -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            confirm_after,
            calls: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Total backend calls observed, across all methods.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn set_frozen(&self, amount: u64) {
        self.lock().frozen = amount;
    }

    pub fn set_broadcast_error(&self, reason: impl Into<String>) {
        self.lock().broadcast_error = Some(reason.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            bail!("wallet store is closed");
        }
        Ok(())
    }

    fn settle(state: &mut SimState, tx_id: &str) {
        let Some(entry) = state.mempool.remove(tx_id) else { return };
        let tx = entry.tx;
        let sender = state.funds.entry(tx.wallet_id).or_default();
        sender.confirmed = sender.confirmed.saturating_sub(tx.amount);
        sender.pending_outgoing = sender.pending_outgoing.saturating_sub(tx.amount);
        if let Some(&owner) = state.owners.get(&tx.to_puzzle_hash) {
            state.funds.entry(owner).or_default().confirmed += tx.amount;
        }
        for record in state.records.iter_mut().filter(|r| r.tx_id == tx.tx_id) {
            record.confirmed = true;
        }
    }

    fn next_hash(state: &mut SimState, tag: &str, wallet_id: WalletId) -> String {
        let index = state.derivation_index.entry(wallet_id).or_insert(0);
        *index += 1;
        let mut hasher = Sha256::new();
        hasher.update(tag.as_bytes());
        hasher.update(wallet_id.to_be_bytes());
        hasher.update(index.to_be_bytes());
        let hash = hex::encode(hasher.finalize());
        state.owners.insert(hash.clone(), wallet_id);
        hash
    }

    fn build(
        state: &mut SimState,
        wallet_id: WalletId,
        amount: u64,
        to_puzzle_hash: &str,
    ) -> anyhow::Result<SubmittedTransaction> {
        let funds = state.funds.entry(wallet_id).or_default();
        let spendable = funds.confirmed.saturating_sub(funds.pending_outgoing);
        if amount > spendable {
            bail!("insufficient funds: spendable {spendable}, requested {amount}");
        }
        state.tx_nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(wallet_id.to_be_bytes());
        hasher.update(amount.to_be_bytes());
        hasher.update(to_puzzle_hash.as_bytes());
        hasher.update(state.tx_nonce.to_be_bytes());
        Ok(SubmittedTransaction {
            tx_id: hex::encode(hasher.finalize()),
            wallet_id,
            amount,
            to_puzzle_hash: to_puzzle_hash.to_string(),
        })
    }
}

#[async_trait]
impl StatusSource for SimBackend {
    async fn transaction_status(&self, tx_id: &str) -> anyhow::Result<Vec<PeerStatus>> {
        self.enter()?;
        let mut state = self.lock();
        let Some(entry) = state.mempool.get_mut(tx_id) else {
            return Ok(vec![]);
        };
        entry.polls += 1;
        if entry.polls > self.confirm_after {
            Self::settle(&mut state, tx_id);
            Ok(vec![PeerStatus {
                peer: "sim-node".into(),
                status: InclusionStatus::Success,
                reason: None,
            }])
        } else {
            Ok(vec![])
        }
    }
}

#[async_trait]
impl NodeBackend for SimBackend {
    async fn balances(&self, wallet: &WalletHandle) -> anyhow::Result<Balances> {
        self.enter()?;
        let state = self.lock();
        let funds = state.funds.get(&wallet.id).copied().unwrap_or_default();
        Ok(Balances {
            confirmed: funds.confirmed,
            unconfirmed: funds.confirmed + funds.pending_incoming - funds.pending_outgoing.min(funds.confirmed),
            spendable: funds.confirmed.saturating_sub(funds.pending_outgoing),
            pending_change: funds.pending_change,
        })
    }

    async fn frozen_amount(&self, _wallet: &WalletHandle) -> anyhow::Result<u64> {
        self.enter()?;
        Ok(self.lock().frozen)
    }

    async fn next_puzzle_hash(&self, wallet: &WalletHandle) -> anyhow::Result<String> {
        self.enter()?;
        Ok(Self::next_hash(&mut self.lock(), "puzzle", wallet.id))
    }

    async fn next_inner_hash(&self, wallet: &WalletHandle) -> anyhow::Result<String> {
        self.enter()?;
        Ok(Self::next_hash(&mut self.lock(), "inner", wallet.id))
    }

    async fn transactions(&self, wallet_id: WalletId) -> anyhow::Result<Vec<TransactionRecord>> {
        self.enter()?;
        Ok(self.lock().records.iter().filter(|r| r.wallet_id == wallet_id).cloned().collect())
    }

    async fn build_signed_transaction(
        &self,
        wallet: &WalletHandle,
        request: &SpendRequest,
    ) -> anyhow::Result<Option<SubmittedTransaction>> {
        self.enter()?;
        let mut state = self.lock();
        let tx = Self::build(&mut state, wallet.id, request.amount, &request.puzzle_hash)?;
        Ok(Some(tx))
    }

    async fn build_coloured_spend(
        &self,
        wallet: &WalletHandle,
        amount: u64,
        inner_hash: &str,
    ) -> anyhow::Result<Option<SubmittedTransaction>> {
        self.enter()?;
        let mut state = self.lock();
        let tx = Self::build(&mut state, wallet.id, amount, inner_hash)?;
        Ok(Some(tx))
    }

    async fn broadcast(&self, tx: &SubmittedTransaction) -> anyhow::Result<()> {
        self.enter()?;
        let mut state = self.lock();
        if let Some(reason) = state.broadcast_error.clone() {
            bail!("{reason}");
        }
        state.funds.entry(tx.wallet_id).or_default().pending_outgoing += tx.amount;
        state.records.push(TransactionRecord {
            tx_id: tx.tx_id.clone(),
            wallet_id: tx.wallet_id,
            amount: tx.amount,
            to_puzzle_hash: tx.to_puzzle_hash.clone(),
            confirmed: false,
            created_at: chrono::Utc::now().timestamp(),
        });
        state.mempool.insert(tx.tx_id.clone(), MempoolEntry { tx: tx.clone(), polls: 0 });
        Ok(())
    }

    async fn issue_colour(&self, amount: u64) -> anyhow::Result<String> {
        self.enter()?;
        let mut state = self.lock();
        state.colour_nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(b"colour");
        hasher.update(amount.to_be_bytes());
        hasher.update(state.colour_nonce.to_be_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    async fn configure_rl_admin(
        &self,
        _wallet: &WalletHandle,
        _interval: u64,
        _limit: u64,
        _user_pubkey: &str,
        _amount: u64,
    ) -> anyhow::Result<bool> {
        self.enter()?;
        Ok(true)
    }

    async fn configure_rl_user(
        &self,
        _wallet: &WalletHandle,
        _interval: u64,
        _limit: u64,
        _origin_id: &str,
        _admin_pubkey: &str,
    ) -> anyhow::Result<bool> {
        self.enter()?;
        Ok(true)
    }

    async fn farm_block(&self, puzzle_hash: &str) -> anyhow::Result<()> {
        self.enter()?;
        let mut state = self.lock();
        state.height += 1;
        // Confirm everything sitting in the mempool, then pay the reward.
        let pending: Vec<String> = state.mempool.keys().cloned().collect();
        for tx_id in pending {
            Self::settle(&mut state, &tx_id);
        }
        if let Some(&owner) = state.owners.get(puzzle_hash) {
            state.funds.entry(owner).or_default().confirmed += BLOCK_REWARD;
        }
        Ok(())
    }

    async fn sync_status(&self) -> anyhow::Result<bool> {
        self.enter()?;
        Ok(false)
    }

    async fn height(&self) -> anyhow::Result<u32> {
        self.enter()?;
        Ok(self.lock().height)
    }

    async fn peers(&self) -> anyhow::Result<Vec<PeerInfo>> {
        self.enter()?;
        Ok(vec![PeerInfo { host: "127.0.0.1".into(), port: 8444, node_type: "FULL_NODE".into() }])
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Offer bundles for the simulator: a versioned JSON body listing the
/// wallet-id → amount exchange. Opaque to the coordinator.
#[derive(serde::Serialize, serde::Deserialize)]
struct SimBundle {
    version: u32,
    exchange: BTreeMap<String, i64>,
}

pub struct SimTradeManager {
    reject: Mutex<Option<String>>,
}

impl Default for SimTradeManager {
    fn default() -> Self { Self::new() }
}

impl SimTradeManager {
    pub fn new() -> Self {
        Self { reject: Mutex::new(None) }
    }

    /// Make subsequent respond() calls fail with this reason.
    pub fn reject_with(&self, reason: impl Into<String>) {
        *self.reject.lock().unwrap_or_else(|p| p.into_inner()) = Some(reason.into());
    }

    pub fn accept(&self) {
        *self.reject.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    fn parse(bundle: &[u8]) -> anyhow::Result<SimBundle> {
        let parsed: SimBundle = serde_json::from_slice(bundle)?;
        if parsed.version != 1 {
            bail!("unsupported bundle version {}", parsed.version);
        }
        Ok(parsed)
    }
}

#[async_trait]
impl TradeManager for SimTradeManager {
    async fn create_offer(&self, ids: &BTreeMap<WalletId, i64>) -> anyhow::Result<Vec<u8>> {
        if ids.is_empty() {
            bail!("offer lists no wallets");
        }
        let exchange = ids.iter().map(|(id, amount)| (format!("wallet:{id}"), *amount)).collect();
        Ok(serde_json::to_vec(&SimBundle { version: 1, exchange })?)
    }

    async fn discrepancies(&self, bundle: &[u8]) -> anyhow::Result<BTreeMap<String, i64>> {
        Ok(Self::parse(bundle)?.exchange)
    }

    async fn respond(&self, bundle: &[u8]) -> anyhow::Result<()> {
        Self::parse(bundle)?;
        if let Some(reason) = self.reject.lock().unwrap_or_else(|p| p.into_inner()).clone() {
            bail!("{reason}");
        }
        Ok(())
    }
}

/// NodeFactory over the simulator. Keeps every backend it built so tests
/// can assert the previous subsystem's stores were closed.
pub struct SimNodeFactory {
    confirm_after: u32,
    built: Mutex<Vec<Arc<SimBackend>>>,
}

impl SimNodeFactory {
    pub fn new(confirm_after: u32) -> Self {
        Self { confirm_after, built: Mutex::new(Vec::new()) }
    }

    pub fn backends(&self) -> Vec<Arc<SimBackend>> {
        self.built.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl NodeFactory for SimNodeFactory {
    fn build(&self, fingerprint: u32) -> BackendSet {
        tracing::debug!(fingerprint, "building simulator backend");
        let backend = Arc::new(SimBackend::new(self.confirm_after));
        self.built.lock().unwrap_or_else(|p| p.into_inner()).push(backend.clone());
        BackendSet { backend, trade: Arc::new(SimTradeManager::new()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::registry::{WalletData, WalletHandle};

    fn handle(id: WalletId) -> WalletHandle {
        WalletHandle { id, data: WalletData::Standard }
    }

    #[tokio::test]
    async fn test_farm_block_credits_owner() {
        let backend = SimBackend::new(0);
        let hash = backend.next_puzzle_hash(&handle(1)).await.unwrap();
        backend.farm_block(&hash).await.unwrap();
        let balances = backend.balances(&handle(1)).await.unwrap();
        assert_eq!(balances.confirmed, BLOCK_REWARD);
        assert_eq!(backend.height().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_spend_confirms_after_configured_polls() {
        let backend = SimBackend::new(1);
        let hash = backend.next_puzzle_hash(&handle(1)).await.unwrap();
        backend.farm_block(&hash).await.unwrap();

        let request = SpendRequest { amount: 100, puzzle_hash: "elsewhere".into(), fee: 0 };
        let tx = backend.build_signed_transaction(&handle(1), &request).await.unwrap().unwrap();
        backend.broadcast(&tx).await.unwrap();

        assert!(backend.transaction_status(&tx.tx_id).await.unwrap().is_empty());
        let statuses = backend.transaction_status(&tx.tx_id).await.unwrap();
        assert_eq!(statuses[0].status, InclusionStatus::Success);

        let balances = backend.balances(&handle(1)).await.unwrap();
        assert_eq!(balances.confirmed, BLOCK_REWARD - 100);
    }

    #[tokio::test]
    async fn test_closed_backend_rejects_calls() {
        let backend = SimBackend::new(0);
        backend.close().await.unwrap();
        assert!(backend.balances(&handle(1)).await.is_err());
        assert!(backend.is_closed());
    }
}
