//! Inbound event model and the outbound client port.

pub mod port;
pub mod types;
