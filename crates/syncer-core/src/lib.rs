//! Core mirroring pipeline for the channel syncer.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind the
//! `MirrorPort` trait implemented in the adapter crate.

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod executor;
pub mod grouper;
pub mod logging;
pub mod messaging;
pub mod pipeline;
pub mod queue;
pub mod reconcile;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
