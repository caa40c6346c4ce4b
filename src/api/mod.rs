//! API Module
//!
//! This module exposes the nonce registry over JSON-RPC so an out-of-process
//! submission path can reserve and release nonces.

mod server;
pub use server::{AppState, Server};
