//! Opaque channel payloads.

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message as WsFrame;

/// A single payload carried over the channel in either direction.
///
/// The manager never interprets the contents. One transport data frame maps to
/// exactly one [`Message`]; control frames (PING, PONG, CLOSE) never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
}

impl Message {
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Text content, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Raw bytes of the payload regardless of its kind.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => &data[..],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert an inbound transport frame, dropping control frames.
    pub(crate) fn from_frame(frame: WsFrame) -> Option<Self> {
        match frame {
            WsFrame::Text(text) => Some(Self::Text(text.as_str().to_owned())),
            WsFrame::Binary(data) => Some(Self::Binary(data)),
            _ => None,
        }
    }

    pub(crate) fn into_frame(self) -> WsFrame {
        match self {
            Self::Text(text) => WsFrame::text(text),
            Self::Binary(data) => WsFrame::binary(data),
        }
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(data))
    }
}

impl From<Bytes> for Message {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}
