//! WalletRegistry - wallet identifiers and variant handles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Small positive integer identifying a wallet within a subsystem instance.
/// Assigned monotonically; never reused while the instance lives. The main
/// wallet is always id 1.
pub type WalletId = u32;

pub const MAIN_WALLET_ID: WalletId = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletKind {
    Standard,
    RateLimited,
    ColouredCoin,
}

impl WalletKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletKind::Standard => "STANDARD_WALLET",
            WalletKind::RateLimited => "RATE_LIMITED",
            WalletKind::ColouredCoin => "COLOURED_COIN",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spend-rate contract of a rate-limited wallet. Populated by the
/// rl_set_admin_info / rl_set_user_info setup calls; a repeat call
/// overwrites (the backend's own validation is authoritative).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RlInfo {
    pub interval: Option<u64>,
    pub limit: Option<u64>,
    pub admin_pubkey: Option<String>,
    pub user_pubkey: Option<String>,
    pub origin_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColourInfo {
    pub colour: String,
    pub name: String,
}

/// Variant-specific wallet data. Closed set: dispatch is by tag, and an
/// operation invoked on the wrong variant gets a typed `Unsupported` error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletData {
    Standard,
    RateLimited(RlInfo),
    Coloured(ColourInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletHandle {
    pub id: WalletId,
    pub data: WalletData,
}

impl WalletHandle {
    pub fn kind(&self) -> WalletKind {
        match self.data {
            WalletData::Standard => WalletKind::Standard,
            WalletData::RateLimited(_) => WalletKind::RateLimited,
            WalletData::Coloured(_) => WalletKind::ColouredCoin,
        }
    }
}

/// Owner of all wallet handles. Created with the main standard wallet and
/// destroyed only when the subsystem is torn down.
#[derive(Debug)]
pub struct WalletRegistry {
    next_id: WalletId,
    wallets: BTreeMap<WalletId, WalletHandle>,
}

impl Default for WalletRegistry {
    fn default() -> Self { Self::new() }
}

impl WalletRegistry {
    pub fn new() -> Self {
        let mut registry = Self { next_id: MAIN_WALLET_ID, wallets: BTreeMap::new() };
        registry.create(WalletData::Standard);
        registry
    }

    pub fn create(&mut self, data: WalletData) -> WalletId {
        let id = self.next_id;
        self.next_id += 1;
        self.wallets.insert(id, WalletHandle { id, data });
        id
    }

    pub fn get(&self, id: WalletId) -> Option<&WalletHandle> {
        self.wallets.get(&id)
    }

    pub fn get_mut(&mut self, id: WalletId) -> Option<&mut WalletHandle> {
        self.wallets.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WalletHandle> {
        self.wallets.values()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}
