//! Error taxonomy. Typed at the operation boundary, stringified at the RPC edge.
//!
//! External collaborators (`NodeBackend`, `TradeManager`) return `anyhow::Error`;
//! each call site converts to a `WalletError` variant that preserves the message
//! as a diagnostic. No error type crosses the RPC boundary: `WalletRpc` turns
//! everything into a `success: false` / `status: "FAILED"` record.

use crate::wallet::registry::{WalletId, WalletKind};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("unknown wallet id {0}")]
    UnknownWallet(WalletId),

    #[error("no active wallet key; log in first")]
    NoActiveWallet,

    #[error("{op} is not supported for {kind} wallets")]
    Unsupported { op: &'static str, kind: WalletKind },

    #[error("Failed to generate signed transaction: {0}")]
    BuildFailed(String),

    #[error("Failed to push transaction: {0}")]
    BroadcastFailed(String),

    #[error("invalid offer file: {0}")]
    OfferParse(String),

    #[error("trade manager: {0}")]
    Trade(String),

    #[error("invalid key: {0}")]
    KeyFormat(String),

    #[error("keychain: {0}")]
    Keychain(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("wallet backend: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WalletError {
    /// Normalized failure record for commands that report `success`.
    pub fn to_response(&self) -> Value {
        json!({ "success": false, "error": self.to_string() })
    }

    /// Normalized failure record for spend-style commands that report `status`.
    pub fn to_status_response(&self) -> Value {
        json!({ "status": "FAILED", "reason": self.to_string() })
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
