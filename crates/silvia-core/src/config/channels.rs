use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// WhatsApp channel config.
///
/// The session itself (pairing, auth, transport) lives in the web bridge
/// process; Silvia only speaks JSON frames to it over a WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// WebSocket URL of the WhatsApp web bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bridge_url: default_bridge_url(),
        }
    }
}
