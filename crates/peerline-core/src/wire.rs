//! Data channel wire format
//!
//! Every data channel write carries exactly one JSON frame tagged by `kind`.
//! Only `chat` frames are defined; frames of any other kind decode to
//! [`Frame::Unknown`] and are ignored by receivers.

use serde::{Deserialize, Serialize};

use crate::errors::WireError;

/// Frame written on a data channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    /// `{"kind": "chat", "text": "..."}`
    Chat { text: String },
    #[serde(other)]
    Unknown,
}

impl Frame {
    pub fn chat(text: impl Into<String>) -> Self {
        Frame::Chat { text: text.into() }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Encode)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(payload).map_err(WireError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_frame_layout() {
        let bytes = Frame::chat("hi").encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["kind"], "chat");
        assert_eq!(value["text"], "hi");
    }

    #[test]
    fn test_decode_foreign_chat_frame() {
        let frame = Frame::decode(br#"{"text":"hola","kind":"chat"}"#).unwrap();
        assert_eq!(frame, Frame::chat("hola"));
    }

    #[test]
    fn test_unknown_kind_is_tolerated() {
        let frame = Frame::decode(br#"{"kind":"typing"}"#).unwrap();
        assert_eq!(frame, Frame::Unknown);
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(Frame::decode(b"not json"), Err(WireError::Decode(_))));
        assert!(Frame::decode(br#"{"kind":"chat"}"#).is_err());
    }
}
