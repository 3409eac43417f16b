//! Inbound message filter: decides which chat events reach the pipeline.

use crate::message::IncomingMessage;

/// Pseudo-address WhatsApp uses for status (stories) updates.
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// Why a message was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    StatusBroadcast,
    QuotedMessage,
    FromSelf,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusBroadcast => "status broadcast",
            Self::QuotedMessage => "quotes another message",
            Self::FromSelf => "sent by the bot account",
        }
    }
}

/// Check whether an inbound message qualifies for processing.
///
/// Returns `Err` with the first matching rejection reason. Pure: no I/O.
pub fn check(msg: &IncomingMessage) -> Result<(), Rejection> {
    if msg.sender_id == STATUS_BROADCAST {
        return Err(Rejection::StatusBroadcast);
    }
    if msg.has_quoted_msg {
        return Err(Rejection::QuotedMessage);
    }
    if msg.from_me {
        return Err(Rejection::FromSelf);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> IncomingMessage {
        IncomingMessage::new("whatsapp", "628123456789@c.us", "!silvia hi")
    }

    #[test]
    fn test_plain_message_accepted() {
        assert_eq!(check(&msg()), Ok(()));
    }

    #[test]
    fn test_status_broadcast_rejected() {
        let mut m = msg();
        m.sender_id = STATUS_BROADCAST.to_string();
        assert_eq!(check(&m), Err(Rejection::StatusBroadcast));
    }

    #[test]
    fn test_quoted_message_rejected() {
        let mut m = msg();
        m.has_quoted_msg = true;
        assert_eq!(check(&m), Err(Rejection::QuotedMessage));
    }

    #[test]
    fn test_own_message_rejected() {
        let mut m = msg();
        m.from_me = true;
        assert_eq!(check(&m), Err(Rejection::FromSelf));
    }

    #[test]
    fn test_every_combination_with_a_reject_flag_is_rejected() {
        for broadcast in [false, true] {
            for quoted in [false, true] {
                for from_me in [false, true] {
                    let mut m = msg();
                    if broadcast {
                        m.sender_id = STATUS_BROADCAST.to_string();
                    }
                    m.has_quoted_msg = quoted;
                    m.from_me = from_me;
                    let expected_ok = !broadcast && !quoted && !from_me;
                    assert_eq!(check(&m).is_ok(), expected_ok, "{broadcast} {quoted} {from_me}");
                }
            }
        }
    }
}
