//! LifecycleManager - owns the single active wallet subsystem.
//!
//! Login, add-key and delete-key all go through the same sequence: empty the
//! active slot, await the old subsystem's teardown to completion, then (for
//! login paths) construct a replacement. The slot is emptied *before* the
//! teardown awaits anything, so concurrently scheduled handlers observe "no
//! active wallet" and fail fast instead of racing a half-torn-down
//! subsystem.

use crate::config::ServiceConfig;
use crate::error::{Result, WalletError};
use crate::keys::{seed_from_mnemonic, ExtendedKey, Keychain, EXTENDED_KEY_LEN, SECRET_KEY_LEN};
use crate::trade::TradeManager;
use crate::wallet::backend::NodeBackend;
use crate::wallet::confirm::ConfirmationTracker;
use crate::wallet::node::WalletNode;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Collaborator handles for one subsystem instance.
pub struct BackendSet {
    pub backend: Arc<dyn NodeBackend>,
    pub trade: Arc<dyn TradeManager>,
}

/// Builds the external collaborators for a key. The service binary installs
/// the simulator factory; tests install instrumented ones.
pub trait NodeFactory: Send + Sync {
    fn build(&self, fingerprint: u32) -> BackendSet;
}

pub struct LifecycleManager {
    config: ServiceConfig,
    keychain: Mutex<Keychain>,
    factory: Arc<dyn NodeFactory>,
    active: RwLock<Option<Arc<WalletNode>>>,
}

impl LifecycleManager {
    pub fn new(config: ServiceConfig, factory: Arc<dyn NodeFactory>) -> Result<Self> {
        let keychain = Keychain::load(config.keys_path())?;
        Ok(Self { config, keychain: Mutex::new(keychain), factory, active: RwLock::new(None) })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The active subsystem, or `NoActiveWallet` when logged out or mid-teardown.
    pub async fn active(&self) -> Result<Arc<WalletNode>> {
        self.active.read().await.clone().ok_or(WalletError::NoActiveWallet)
    }

    pub async fn is_logged_in(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Tear down whatever is active, then start a subsystem for
    /// `fingerprint`. `false` (unknown key) leaves the system logged out.
    pub async fn log_in(&self, fingerprint: u32) -> Result<bool> {
        self.stop_wallet().await;
        self.start_wallet(fingerprint).await
    }

    /// Tear down the active subsystem, leaving the system logged out.
    pub async fn log_out(&self) {
        self.stop_wallet().await;
    }

    async fn stop_wallet(&self) {
        // take() releases the slot before the teardown awaits anything.
        let previous = self.active.write().await.take();
        if let Some(node) = previous {
            node.stop().await;
        }
    }

    async fn start_wallet(&self, fingerprint: u32) -> Result<bool> {
        let known = self.lock_keychain()?.contains(fingerprint)?;
        if !known {
            tracing::warn!(fingerprint, "login refused: key not in keychain");
            return Ok(false);
        }
        let set = self.factory.build(fingerprint);
        let tracker =
            ConfirmationTracker::new(self.config.poll_interval, self.config.confirm_deadline);
        let node = Arc::new(WalletNode::start(fingerprint, set.backend, set.trade, tracker));
        *self.active.write().await = Some(node);
        Ok(true)
    }

    /// Add a key from a 24-word mnemonic and log in with it.
    pub async fn add_key_mnemonic(&self, words: &str) -> Result<bool> {
        let seed = seed_from_mnemonic(words)?;
        let key = ExtendedKey::from_seed(&seed)?;
        let fingerprint = self.persist_key(&key, Some(words))?;
        self.stop_wallet().await;
        self.start_wallet(fingerprint).await
    }

    /// Add a key from hex: either a full 77-byte extended encoding (154
    /// chars) or a bare 32-byte key (64 chars) embedded into the trailing
    /// bytes of a freshly randomized extended-key envelope. Any other
    /// length fails without touching the keychain.
    pub async fn add_key_hex(&self, hexkey: &str) -> Result<bool> {
        let key = match hexkey.len() {
            len if len == EXTENDED_KEY_LEN * 2 => ExtendedKey::from_hex(hexkey)?,
            len if len == SECRET_KEY_LEN * 2 => {
                let key_bytes =
                    hex::decode(hexkey).map_err(|e| WalletError::KeyFormat(e.to_string()))?;
                let entropy: [u8; 32] = rand::random();
                let mut envelope = ExtendedKey::from_seed(&entropy)?.to_bytes();
                envelope[EXTENDED_KEY_LEN - SECRET_KEY_LEN..].copy_from_slice(&key_bytes);
                ExtendedKey::from_bytes(&envelope)?
            }
            other => {
                return Err(WalletError::KeyFormat(format!(
                    "hex key must be {} or {} characters, got {other}",
                    SECRET_KEY_LEN * 2,
                    EXTENDED_KEY_LEN * 2,
                )))
            }
        };
        let fingerprint = self.persist_key(&key, None)?;
        self.stop_wallet().await;
        self.start_wallet(fingerprint).await
    }

    fn persist_key(&self, key: &ExtendedKey, mnemonic: Option<&str>) -> Result<u32> {
        let mut keychain = self.lock_keychain()?;
        let fingerprint = keychain.add_key(key, mnemonic)?;
        // Re-validate the on-disk state before the new key is used.
        keychain.reload()?;
        Ok(fingerprint)
    }

    pub async fn delete_key(&self, fingerprint: u32) -> Result<()> {
        self.stop_wallet().await;
        self.lock_keychain()?.delete(fingerprint)
    }

    /// Tear down, empty the keychain and delete the wallet database file.
    pub async fn delete_all_keys(&self) -> Result<()> {
        self.stop_wallet().await;
        self.lock_keychain()?.delete_all()?;
        let db = self.config.database_path();
        if db.exists() {
            std::fs::remove_file(db)?;
        }
        Ok(())
    }

    pub fn fingerprints(&self) -> Result<Vec<(u32, bool)>> {
        self.lock_keychain()?.fingerprints()
    }

    pub fn find_key(&self, fingerprint: u32) -> Result<Option<(ExtendedKey, Option<String>)>> {
        self.lock_keychain()?.find(fingerprint)
    }

    fn lock_keychain(&self) -> Result<std::sync::MutexGuard<'_, Keychain>> {
        self.keychain.lock().map_err(|_| WalletError::Keychain("keychain lock".into()))
    }
}
