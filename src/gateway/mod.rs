//! Gateway: the main event loop connecting the WhatsApp channel, the
//! knowledge source, the provider, and the status notifier.
//!
//! Lifecycle events are applied inline, in order. Every inbound message is
//! handled on its own task, so messages run concurrently with no per-sender
//! ordering.

mod pipeline;


use crate::notifier::StatusNotifier;
use silvia_core::{
    config::{ApiConfig, BotConfig},
    message::ChannelEvent,
    traits::{Channel, KnowledgeSource, Provider},
};
use silvia_memory::HistoryRecorder;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// The central gateway that routes messages between the channel and the provider.
pub struct Gateway {
    pub(super) provider: Arc<dyn Provider>,
    pub(super) channel: Arc<dyn Channel>,
    pub(super) knowledge: Arc<dyn KnowledgeSource>,
    pub(super) history: Option<HistoryRecorder>,
    pub(super) notifier: Arc<StatusNotifier>,
    pub(super) bot: BotConfig,
    pub(super) api_config: ApiConfig,
    pub(super) uptime: Instant,
}

impl Gateway {
    /// Create a new gateway.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn Provider>,
        channel: Arc<dyn Channel>,
        knowledge: Arc<dyn KnowledgeSource>,
        history: Option<HistoryRecorder>,
        notifier: Arc<StatusNotifier>,
        bot: BotConfig,
        api_config: ApiConfig,
    ) -> Self {
        Self {
            provider,
            channel,
            knowledge,
            history,
            notifier,
            bot,
            api_config,
            uptime: Instant::now(),
        }
    }

    /// Run the main event loop until the channel closes or Ctrl-C.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "Silvia gateway running | provider: {} | channel: {} | knowledge: {} | history: {} | prefix: {}",
            self.provider.name(),
            self.channel.name(),
            self.knowledge.kind(),
            if self.history.is_some() { "on" } else { "off" },
            self.bot.active_prefix().unwrap_or("<none>"),
        );

        let mut rx = self
            .channel
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start channel {}: {e}", self.channel.name()))?;

        let api_handle = if self.api_config.enabled {
            let api_cfg = self.api_config.clone();
            let api_notifier = self.notifier.clone();
            let api_uptime = self.uptime;
            Some(tokio::spawn(async move {
                crate::api::serve(api_cfg, api_notifier, api_uptime).await;
            }))
        } else {
            None
        };

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(ChannelEvent::Lifecycle(ev)) => {
                        self.notifier.handle(&ev).await;
                    }
                    Some(ChannelEvent::Message(incoming)) => {
                        let gw = self.clone();
                        tokio::spawn(async move {
                            gw.handle_message(incoming).await;
                        });
                    }
                    None => {
                        warn!("channel {} closed its event stream", self.channel.name());
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown(&api_handle).await;
        Ok(())
    }

    async fn shutdown(&self, api_handle: &Option<tokio::task::JoinHandle<()>>) {
        info!("Shutting down...");
        if let Some(h) = api_handle {
            h.abort();
        }
        if let Err(e) = self.channel.stop().await {
            warn!("failed to stop channel {}: {e}", self.channel.name());
        }
        info!("Shutdown complete.");
    }
}
