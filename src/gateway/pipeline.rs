//! Message processing pipeline (`handle_message`).
//!
//! filter → query extraction → knowledge → completion (or apology) → reply →
//! history. Each integration failure is reported once through
//! `report_failure` and never stops the steps that can still run.

use super::Gateway;
use silvia_core::{
    error::SilviaError,
    filter::{self, Rejection},
    message::{IncomingMessage, MessageMetadata, OutgoingMessage},
    prompt,
};
use tracing::{debug, error, info, warn};

/// Which integration failed while handling a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Failure {
    Knowledge,
    Completion,
    Delivery,
    History,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Outcome {
    Filtered(Rejection),
    MissingPrefix,
    /// Reply sent. `fallback` = apology instead of a model answer.
    Replied { fallback: bool, recorded: bool },
    Undelivered,
}

/// Log an integration failure at the level its kind deserves.
pub(super) fn report_failure(kind: Failure, sender: &str, err: &SilviaError) {
    match kind {
        Failure::Knowledge => {
            warn!("knowledge unavailable for {sender}, answering without it: {err}")
        }
        Failure::Completion => error!("completion failed for {sender}, sending apology: {err}"),
        Failure::Delivery => error!("reply to {sender} not delivered: {err}"),
        Failure::History => warn!("chat history for {sender} not recorded: {err}"),
    }
}

impl Gateway {
    /// Process a single incoming message through the full pipeline.
    pub(super) async fn handle_message(&self, incoming: IncomingMessage) -> Outcome {
        if let Err(reason) = filter::check(&incoming) {
            debug!("ignored message from {}: {}", incoming.sender_id, reason.as_str());
            return Outcome::Filtered(reason);
        }

        let Some(query) = prompt::extract_query(&incoming.text, self.bot.active_prefix()) else {
            debug!("ignored message from {}: no prefix", incoming.sender_id);
            return Outcome::MissingPrefix;
        };

        info!(
            "[{}] {} asks ({}): {}",
            incoming.channel,
            incoming.sender_id,
            incoming.message_id.as_deref().unwrap_or("no id"),
            incoming.preview(60)
        );

        let knowledge = match self.knowledge.knowledge().await {
            Ok(text) => text,
            Err(e) => {
                report_failure(Failure::Knowledge, &incoming.sender_id, &e);
                String::new()
            }
        };
        let composed = prompt::compose(&knowledge, &query);

        let (answer, fallback) = match self.provider.complete(&composed).await {
            Ok(resp) => {
                info!(
                    "answered {} via {} in {} ms ({} chunks)",
                    incoming.sender_id,
                    resp.metadata.provider_used,
                    resp.metadata.processing_time_ms,
                    resp.metadata.chunks
                );
                (resp, false)
            }
            Err(e) => {
                report_failure(Failure::Completion, &incoming.sender_id, &e);
                (
                    OutgoingMessage {
                        text: self.bot.apology.clone(),
                        metadata: MessageMetadata::default(),
                        reply_target: None,
                    },
                    true,
                )
            }
        };

        let reply = OutgoingMessage {
            reply_target: Some(incoming.sender_id.clone()),
            ..answer
        };
        let answer_text = reply.text.clone();
        if let Err(e) = self.channel.send(reply).await {
            report_failure(Failure::Delivery, &incoming.sender_id, &e);
            return Outcome::Undelivered;
        }

        let recorded = match &self.history {
            Some(history) => match history
                .record(&incoming.sender_id, &query, &answer_text)
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    report_failure(Failure::History, &incoming.sender_id, &e);
                    false
                }
            },
            None => false,
        };

        Outcome::Replied { fallback, recorded }
    }
}
