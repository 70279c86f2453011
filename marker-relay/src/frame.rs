use axum::extract::ws::Message;

/// Text payload sent to the one member selected in a broadcast round.
pub const MARKER: &str = "WHITE";

/// Text payload every other member receives in the greeting variant.
pub const GREETING: &str = "HELLO";

/// A data frame as seen by the relay. Control frames never become a `Frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn marker() -> Self {
        Frame::Text(MARKER.to_string())
    }

    pub fn greeting() -> Self {
        Frame::Text(GREETING.to_string())
    }

    /// Extracts the data frame carried by a transport message.
    ///
    /// Ping, pong and close messages return `None`; they are handled by the
    /// session and never trigger a broadcast round.
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Frame::Text(text)),
            Message::Binary(data) => Some(Frame::Binary(data)),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data),
        }
    }
}
