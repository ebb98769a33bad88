use chrono::NaiveDateTime;
use std::fmt;

/// Longest payload prefix shown in log lines.
const PREVIEW_CHARS: usize = 32;

/// A message received from a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
    pub received_at: NaiveDateTime,
}

impl InboundMessage {
    /// Payload bytes are decoded lossily; the command formats are plain ASCII.
    pub fn from_topic(topic: impl Into<String>, payload: &[u8]) -> Self {
        InboundMessage {
            topic: topic.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            received_at: chrono::Local::now().naive_local(),
        }
    }

    pub fn preview(&self) -> String {
        let mut preview: String = self.payload.chars().take(PREVIEW_CHARS).collect();
        if self.payload.chars().count() > PREVIEW_CHARS {
            preview.push('…');
        }
        preview
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} [{}] {:?}",
            self.received_at.format("%H:%M:%S%.3f"),
            self.topic,
            self.preview()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let message = InboundMessage::from_topic("esp/cmd", b"fan,\xff1");
        assert_eq!(message.payload, "fan,\u{fffd}1");
    }

    #[test]
    fn test_preview_truncates_long_payloads() {
        let long = "x".repeat(100);
        let message = InboundMessage::from_topic("t", long.as_bytes());
        assert_eq!(message.preview().chars().count(), PREVIEW_CHARS + 1);

        let short = InboundMessage::from_topic("t", b"light,1");
        assert_eq!(short.preview(), "light,1");
    }
}
