//! RPC layer: command dispatch, HTTP transport, UI event stream.

pub mod events;
pub mod server;
pub mod service;

pub use events::EventHub;
pub use server::{create_router, create_router_with_name};
pub use service::WalletRpc;
