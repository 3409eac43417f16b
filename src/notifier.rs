//! Status notifier: mirrors WhatsApp lifecycle events to observers.
//!
//! Observers are WebSocket clients of the API server, fed through a
//! `broadcast` channel. When a webhook URL is configured, QR codes and
//! connected/disconnected changes are also POSTed there, with the QR code
//! sealed (see `silvia_core::crypto`) when a secret is set.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use silvia_channels::qr;
use silvia_core::{
    config::NotifierConfig,
    crypto,
    error::SilviaError,
    state::{ConnectionState, ConnectionStatus, LifecycleEvent, Notice, Transition},
};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

/// Buffered frames per observer before a slow observer starts skipping.
const OBSERVER_BUFFER: usize = 32;

/// Frame pushed to real-time observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ObserverFrame {
    Status { status: ConnectionStatus },
    Qr(String),
}

impl From<&Notice> for ObserverFrame {
    fn from(notice: &Notice) -> Self {
        match notice {
            Notice::Status(status) => Self::Status { status: *status },
            Notice::Qr(code) => Self::Qr(code.clone()),
        }
    }
}

/// Current session state as seen by late joiners.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub state: ConnectionState,
    /// Pairing code waiting to be scanned, if any.
    pub qr: Option<String>,
}

impl Snapshot {
    /// Frames that bring a freshly connected observer up to date.
    ///
    /// Status frames only ever carry `connected` or `disconnected`; a pending
    /// pairing shows up as `disconnected` followed by the `qr` frame.
    pub fn frames(&self) -> Vec<ObserverFrame> {
        let status = match self.state.status() {
            ConnectionStatus::QrPending => ConnectionStatus::Disconnected,
            status => status,
        };
        let mut frames = vec![ObserverFrame::Status { status }];
        if let Some(code) = &self.qr {
            frames.push(ObserverFrame::Qr(code.clone()));
        }
        frames
    }
}

/// Body of the webhook POST.
#[derive(Debug, Serialize)]
pub(crate) struct WebhookPayload {
    pub qr_code: Option<String>,
    pub status: ConnectionStatus,
    pub timestamp: String,
}

struct Webhook {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl Webhook {
    fn payload(&self, notice: &Notice) -> Result<WebhookPayload, SilviaError> {
        let (qr_code, status) = match notice {
            Notice::Qr(code) => {
                let code = match self.secret.as_deref() {
                    Some(secret) => crypto::seal_qr(secret, code)?,
                    None => code.clone(),
                };
                (Some(code), ConnectionStatus::QrPending)
            }
            Notice::Status(status) => (None, *status),
        };
        Ok(WebhookPayload {
            qr_code,
            status,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    async fn post(&self, payload: &WebhookPayload) -> Result<(), SilviaError> {
        let resp = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| SilviaError::Webhook(format!("POST {} failed: {e}", self.url)))?;
        if !resp.status().is_success() {
            return Err(SilviaError::Webhook(format!(
                "POST {} returned {}",
                self.url,
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Fans lifecycle events out to observers and the optional webhook.
pub struct StatusNotifier {
    snapshot: RwLock<Snapshot>,
    tx: broadcast::Sender<ObserverFrame>,
    webhook: Option<Arc<Webhook>>,
}

impl StatusNotifier {
    pub fn new(config: &NotifierConfig) -> Self {
        let (tx, _) = broadcast::channel(OBSERVER_BUFFER);
        let webhook = config
            .webhook_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .map(|url| {
                Arc::new(Webhook {
                    client: reqwest::Client::new(),
                    url: url.to_string(),
                    secret: config.qr_secret.clone().filter(|s| !s.is_empty()),
                })
            });
        Self {
            snapshot: RwLock::new(Snapshot::default()),
            tx,
            webhook,
        }
    }

    /// Subscribe to future frames.
    pub fn subscribe(&self) -> broadcast::Receiver<ObserverFrame> {
        self.tx.subscribe()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Apply one lifecycle event: update state, log, broadcast, and fire the
    /// webhook in the background.
    pub async fn handle(&self, event: &LifecycleEvent) -> Transition {
        let transition = {
            let mut snap = self.snapshot.write().await;
            let transition = snap.state.transition(event);
            snap.state = transition.to;
            snap.qr = match event {
                LifecycleEvent::Qr(code) => Some(code.clone()),
                _ => None,
            };
            transition
        };

        match event {
            LifecycleEvent::Qr(code) => match qr::render_terminal(code) {
                Ok(rendered) => info!("WhatsApp QR received, scan to pair:\n{rendered}"),
                Err(e) => warn!("WhatsApp QR received but could not be rendered: {e}"),
            },
            LifecycleEvent::Authenticated => info!("WhatsApp authenticated"),
            LifecycleEvent::AuthFailure(msg) => error!("WhatsApp authentication failed: {msg}"),
            LifecycleEvent::Ready => info!("WhatsApp client is ready"),
            LifecycleEvent::Disconnected(reason) => warn!("WhatsApp disconnected: {reason}"),
        }

        for notice in &transition.notices {
            // No observers is not an error.
            let _ = self.tx.send(ObserverFrame::from(notice));
            self.fire_webhook(notice);
        }
        transition
    }

    fn fire_webhook(&self, notice: &Notice) {
        let Some(webhook) = self.webhook.clone() else {
            return;
        };
        let payload = match webhook.payload(notice) {
            Ok(p) => p,
            Err(e) => {
                warn!("webhook payload not built: {e}");
                return;
            }
        };
        tokio::spawn(async move {
            match webhook.post(&payload).await {
                Ok(()) => info!("webhook delivered ({})", payload.status),
                Err(e) => warn!("{e}"),
            }
        });
    }
}
