//! Channel trait implementation for the WhatsApp web bridge.

use super::events::{decode_frame, encode_send, CHANNEL_NAME};
use super::{Outbound, WhatsAppBridgeChannel};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use silvia_core::{
    error::SilviaError,
    message::{ChannelEvent, OutgoingMessage},
    state::LifecycleEvent,
    traits::Channel,
};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

#[async_trait]
impl Channel for WhatsAppBridgeChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<mpsc::Receiver<ChannelEvent>, SilviaError> {
        let url = self.config.bridge_url.as_str();
        let (ws_stream, _) = connect_async(url).await.map_err(|e| {
            SilviaError::Channel(format!("whatsapp bridge connect to {url} failed: {e}"))
        })?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent>(64);
        let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(64);
        *self.outbound.lock().await = Some(out_tx);

        let writer = tokio::spawn(async move {
            while let Some((frame, done)) = out_rx.recv().await {
                let result = ws_tx
                    .send(WsMessage::Text(frame))
                    .await
                    .map_err(|e| SilviaError::Channel(format!("whatsapp bridge write failed: {e}")));
                let failed = result.is_err();
                let _ = done.send(result);
                if failed {
                    break;
                }
            }
            let _ = ws_tx.close().await;
            debug!("whatsapp bridge writer stopped");
        });

        let outbound = self.outbound.clone();
        let reader = tokio::spawn(async move {
            let reason = loop {
                match ws_rx.next().await {
                    Some(Ok(WsMessage::Text(text))) => match decode_frame(&text) {
                        Ok(Some(event)) => {
                            if event_tx.send(event).await.is_err() {
                                info!("whatsapp event receiver dropped");
                                break "receiver dropped".to_string();
                            }
                        }
                        Ok(None) => debug!("whatsapp bridge: ignoring unknown frame"),
                        Err(e) => warn!("whatsapp bridge: undecodable frame: {e}"),
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "bridge closed".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break format!("bridge socket error: {e}"),
                    None => break "bridge closed".to_string(),
                }
            };

            *outbound.lock().await = None;
            let _ = event_tx
                .send(ChannelEvent::Lifecycle(LifecycleEvent::Disconnected(reason)))
                .await;
        });

        self.tasks.lock().await.extend([writer, reader]);
        info!("WhatsApp bridge channel started ({url})");
        Ok(event_rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), SilviaError> {
        let target = message
            .reply_target
            .as_deref()
            .ok_or_else(|| SilviaError::Channel("no reply_target on outgoing message".into()))?;
        let frame = encode_send(target, &message.text)?;

        let sender = self
            .outbound
            .lock()
            .await
            .clone()
            .ok_or_else(|| SilviaError::Channel("whatsapp bridge not connected".into()))?;

        let (done_tx, done_rx) = oneshot::channel();
        sender
            .send((frame, done_tx))
            .await
            .map_err(|_| SilviaError::Channel("whatsapp bridge writer closed".into()))?;
        done_rx
            .await
            .map_err(|_| SilviaError::Channel("whatsapp bridge writer dropped the reply".into()))?
    }

    async fn stop(&self) -> Result<(), SilviaError> {
        *self.outbound.lock().await = None;
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        info!("WhatsApp bridge channel stopped");
        Ok(())
    }
}
