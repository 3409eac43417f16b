//! # silvia-channels
//!
//! Messaging platform integrations for Silvia.

pub mod bridge;
pub mod qr;

pub use bridge::WhatsAppBridgeChannel;
