//! Wallet subsystem: registry, variant dispatch, confirmation tracking.

pub mod backend;
pub mod confirm;
pub mod dispatcher;
pub mod node;
pub mod registry;
