//! Messaging Channel Manager
//!
//! Per-peer chat logs with optimistic local echo. Sending appends the message
//! immediately and hands one framed payload to the broker task, which opens a
//! short-lived data channel for it. Delivery is fire-and-forget: a failure is
//! reported once and the local message stays in the log.

use std::collections::HashMap;
use tracing::{debug, warn};

use peerline_core::{
    AppEvent, ChatMessage, Effect, Failure, Frame, LocalAddress, PeerlineResult, Timestamp,
    TransportError,
};

use super::Outcome;

#[derive(Debug, Default)]
pub struct MessagingChannelManager {
    logs: HashMap<LocalAddress, Vec<ChatMessage>>,
}

impl MessagingChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages exchanged with `remote`, in send/receive order
    pub fn log(&self, remote: &LocalAddress) -> &[ChatMessage] {
        self.logs.get(remote).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn message_count(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    fn append(&mut self, message: ChatMessage) {
        self.logs
            .entry(message.remote.clone())
            .or_default()
            .push(message);
    }

    /// Echo locally, then ask for delivery
    pub fn send(&mut self, target: LocalAddress, text: String, now: Timestamp) -> PeerlineResult<Outcome> {
        if text.trim().is_empty() {
            return Ok(Outcome::new());
        }
        let payload = Frame::chat(text.clone()).encode()?;
        let message = ChatMessage::new(target.clone(), text, now, true);
        self.append(message.clone());
        debug!(target = %target, "Chat message queued for delivery");

        Ok(Outcome::new()
            .effect(Effect::SendChat { target, payload })
            .event(AppEvent::ChatAppended {
                message,
                sender_name: None,
            }))
    }

    /// Decode one inbound payload
    pub fn on_inbound(
        &mut self,
        from: LocalAddress,
        payload: &[u8],
        sender_name: Option<String>,
        now: Timestamp,
    ) -> Outcome {
        match Frame::decode(payload) {
            Ok(Frame::Chat { text }) => {
                let message = ChatMessage::new(from, text, now, false);
                self.append(message.clone());
                Outcome::new().event(AppEvent::ChatAppended {
                    message,
                    sender_name,
                })
            }
            Ok(Frame::Unknown) => {
                debug!(from = %from, "Ignoring frame of unknown kind");
                Outcome::new()
            }
            Err(e) => {
                warn!(from = %from, "Dropping malformed payload: {}", e);
                Outcome::new()
            }
        }
    }

    pub fn on_delivery_failed(&mut self, target: LocalAddress, error: &TransportError) -> Outcome {
        warn!(target = %target, "Message delivery failed: {}", error);
        Outcome::new().event(AppEvent::Failure {
            failure: Failure::DeliveryFailed { target },
        })
    }

    pub fn clear(&mut self) -> Outcome {
        self.logs.clear();
        Outcome::new().event(AppEvent::ChatCleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> LocalAddress {
        LocalAddress::from_number(654_321)
    }

    #[test]
    fn test_send_echoes_locally_and_emits_frame() {
        let mut manager = MessagingChannelManager::new();
        let outcome = manager
            .send(peer(), "hi".to_string(), Timestamp::new(0))
            .unwrap();

        let log = manager.log(&peer());
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].text, "hi");
        assert!(log[0].is_own);

        match &outcome.effects[..] {
            [Effect::SendChat { target, payload }] => {
                assert_eq!(target, &peer());
                assert_eq!(Frame::decode(payload).unwrap(), Frame::chat("hi"));
            }
            other => panic!("unexpected effects: {:?}", other),
        }
    }

    #[test]
    fn test_blank_text_is_ignored() {
        let mut manager = MessagingChannelManager::new();
        assert!(manager
            .send(peer(), "   ".to_string(), Timestamp::new(0))
            .unwrap()
            .is_empty());
        assert_eq!(manager.message_count(), 0);
    }

    #[test]
    fn test_delivery_failure_keeps_message() {
        let mut manager = MessagingChannelManager::new();
        manager
            .send(peer(), "hi".to_string(), Timestamp::new(0))
            .unwrap();
        let outcome = manager.on_delivery_failed(
            peer(),
            &TransportError::PeerUnavailable { address: peer() },
        );
        assert_eq!(
            outcome.app_events,
            vec![AppEvent::Failure {
                failure: Failure::DeliveryFailed { target: peer() }
            }]
        );
        assert_eq!(manager.log(&peer()).len(), 1);
    }

    #[test]
    fn test_inbound_frames() {
        let mut manager = MessagingChannelManager::new();
        let chat = Frame::chat("hola").encode().unwrap();
        let outcome = manager.on_inbound(peer(), &chat, Some("Ana".to_string()), Timestamp::new(0));
        assert!(matches!(
            &outcome.app_events[..],
            [AppEvent::ChatAppended { sender_name: Some(name), message }]
                if name == "Ana" && !message.is_own && message.text == "hola"
        ));

        assert!(manager
            .on_inbound(peer(), br#"{"kind":"typing"}"#, None, Timestamp::new(0))
            .is_empty());
        assert!(manager
            .on_inbound(peer(), b"\xff\x00", None, Timestamp::new(0))
            .is_empty());
        assert_eq!(manager.log(&peer()).len(), 1);

        manager.clear();
        assert_eq!(manager.message_count(), 0);
    }
}
