//! walletd - wallet RPC service.
//!
//! A key-scoped wallet subsystem (registry, variant dispatch, confirmation
//! tracking, trade offers) behind a JSON command surface. Exactly one
//! subsystem is active at a time; the lifecycle manager tears it down and
//! rebuilds it on login and key changes.
//!
//! # Architecture
//!
//! ```text
//! WalletRpc (command surface)
//!   │
//!   ├── LifecycleManager
//!   │     ├── Keychain (keys.json on disk)
//!   │     └── Option<WalletNode>   ← the single active subsystem
//!   │           ├── WalletDispatcher (registry + NodeBackend)
//!   │           │     └── ConfirmationTracker (bounded status poll)
//!   │           └── TradeOfferCoordinator (offer files on disk)
//!   │
//!   └── EventHub (state_changed broadcast to the UI)
//! ```

pub mod config;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod logging;
pub mod rpc;
pub mod runtime;
pub mod simulator;
pub mod trade;
pub mod wallet;

pub use config::ServiceConfig;
pub use error::{Result, WalletError};
pub use lifecycle::{BackendSet, LifecycleManager, NodeFactory};
pub use rpc::{create_router, EventHub, WalletRpc};
pub use trade::{TradeManager, TradeOfferCoordinator};
pub use wallet::backend::NodeBackend;
pub use wallet::node::WalletNode;
