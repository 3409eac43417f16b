//! WhatsApp session lifecycle as an explicit state machine.
//!
//! The channel reports raw lifecycle events; `ConnectionState::transition`
//! is the single place that decides the next state and what observers are
//! told about it.

use serde::{Deserialize, Serialize};

/// Raw lifecycle event reported by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A (new) pairing code is waiting to be scanned.
    Qr(String),
    /// The session credentials were accepted.
    Authenticated,
    /// The session credentials were rejected.
    AuthFailure(String),
    /// The client finished loading and can send/receive.
    Ready,
    /// The session dropped.
    Disconnected(String),
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Qr(_) => "qr",
            Self::Authenticated => "authenticated",
            Self::AuthFailure(_) => "auth_failure",
            Self::Ready => "ready",
            Self::Disconnected(_) => "disconnected",
        }
    }
}

/// Internal session state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Uninitialized,
    AwaitingPairing,
    Authenticated,
    Connected,
    Disconnected,
}

/// Status as published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    QrPending,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::QrPending => "qr_pending",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something observers must be told after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Connection status changed.
    Status(ConnectionStatus),
    /// A raw pairing code to display.
    Qr(String),
}

/// Result of applying one lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub notices: Vec<Notice>,
}

impl ConnectionState {
    /// Project the internal state onto the published status.
    pub fn status(&self) -> ConnectionStatus {
        match self {
            Self::Uninitialized | Self::Disconnected => ConnectionStatus::Disconnected,
            Self::AwaitingPairing => ConnectionStatus::QrPending,
            Self::Authenticated | Self::Connected => ConnectionStatus::Connected,
        }
    }

    /// Apply `event` and return the resulting transition.
    ///
    /// Auth failures move to `Disconnected` without notices: they are
    /// logged only, never broadcast.
    pub fn transition(self, event: &LifecycleEvent) -> Transition {
        let (to, notices) = match event {
            LifecycleEvent::Qr(code) => (Self::AwaitingPairing, vec![Notice::Qr(code.clone())]),
            LifecycleEvent::Authenticated => (
                Self::Authenticated,
                vec![Notice::Status(ConnectionStatus::Connected)],
            ),
            LifecycleEvent::Ready => (
                Self::Connected,
                vec![Notice::Status(ConnectionStatus::Connected)],
            ),
            LifecycleEvent::AuthFailure(_) => (Self::Disconnected, Vec::new()),
            LifecycleEvent::Disconnected(_) => (
                Self::Disconnected,
                vec![Notice::Status(ConnectionStatus::Disconnected)],
            ),
        };
        Transition {
            from: self,
            to,
            notices,
        }
    }
}
