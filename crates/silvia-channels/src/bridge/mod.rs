//! WhatsApp channel backed by a WhatsApp web bridge.
//!
//! The bridge process owns the WhatsApp Web session (QR pairing, auth,
//! transport) and exposes it over a local WebSocket as JSON frames. This
//! channel connects to it, turns frames into [`ChannelEvent`]s and writes
//! replies back as `send` frames. There is no automatic reconnect: when the
//! socket closes a `disconnected` event is emitted and the stream ends.
//!
//! [`ChannelEvent`]: silvia_core::message::ChannelEvent

mod channel;
mod events;


use silvia_core::{config::WhatsAppConfig, error::SilviaError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

/// A frame queued for the writer task, with a slot for the write result.
pub(super) type Outbound = (String, oneshot::Sender<Result<(), SilviaError>>);

/// WhatsApp channel speaking to a web bridge over WebSocket.
pub struct WhatsAppBridgeChannel {
    pub(super) config: WhatsAppConfig,
    /// Writer queue, set while the socket is open.
    pub(super) outbound: Arc<Mutex<Option<mpsc::Sender<Outbound>>>>,
    pub(super) tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WhatsAppBridgeChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            outbound: Arc::new(Mutex::new(None)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Whether the bridge socket is currently open.
    pub async fn is_connected(&self) -> bool {
        self.outbound.lock().await.is_some()
    }
}
