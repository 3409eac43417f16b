//! JSON frames exchanged with the WhatsApp web bridge.

use serde::{Deserialize, Serialize};
use silvia_core::{
    error::SilviaError,
    message::{ChannelEvent, IncomingMessage},
    state::LifecycleEvent,
};

pub(super) const CHANNEL_NAME: &str = "whatsapp";

/// Frame sent by the bridge, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum InboundFrame {
    Qr {
        code: String,
    },
    Authenticated,
    AuthFailure {
        #[serde(default)]
        message: String,
    },
    Ready,
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    #[serde(alias = "message_create")]
    Message(BridgeMessage),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BridgeMessage {
    #[serde(default)]
    id: Option<String>,
    from: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    has_quoted_msg: bool,
}

/// Frame sent to the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum OutboundFrame<'a> {
    Send { to: &'a str, text: &'a str },
}

impl From<BridgeMessage> for IncomingMessage {
    fn from(m: BridgeMessage) -> Self {
        let mut msg = IncomingMessage::new(CHANNEL_NAME, &m.from, &m.body);
        msg.message_id = m.id;
        msg.from_me = m.from_me;
        msg.has_quoted_msg = m.has_quoted_msg;
        msg
    }
}

/// Decode one text frame. Unknown frame types yield `None`.
pub(super) fn decode_frame(text: &str) -> Result<Option<ChannelEvent>, SilviaError> {
    let frame: InboundFrame = serde_json::from_str(text)?;
    Ok(match frame {
        InboundFrame::Qr { code } => Some(ChannelEvent::Lifecycle(LifecycleEvent::Qr(code))),
        InboundFrame::Authenticated => Some(ChannelEvent::Lifecycle(LifecycleEvent::Authenticated)),
        InboundFrame::AuthFailure { message } => {
            Some(ChannelEvent::Lifecycle(LifecycleEvent::AuthFailure(message)))
        }
        InboundFrame::Ready => Some(ChannelEvent::Lifecycle(LifecycleEvent::Ready)),
        InboundFrame::Disconnected { reason } => {
            Some(ChannelEvent::Lifecycle(LifecycleEvent::Disconnected(reason)))
        }
        InboundFrame::Message(m) => Some(ChannelEvent::Message(m.into())),
        InboundFrame::Unknown => None,
    })
}

/// Encode an outgoing text message for `to`.
pub(super) fn encode_send(to: &str, text: &str) -> Result<String, SilviaError> {
    Ok(serde_json::to_string(&OutboundFrame::Send { to, text })?)
}
