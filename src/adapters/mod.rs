//! Adapters Layer
//!
//! Inbound adapters drive the application (the status API); outbound
//! adapters implement domain ports.

pub mod inbound;
pub mod outbound;
