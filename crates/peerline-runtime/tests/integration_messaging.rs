//! Integration tests for chat delivery and the notification surface

mod common;

use std::sync::atomic::Ordering;

use common::{addr, TestPeer};
use peerline_core::{AppTag, Failure, Frame};
use peerline_harness::{EchoPeer, SimulatedNetwork};
use peerline_runtime::{AppEvent, Command};

fn chat_text(event: &AppEvent) -> Option<(&str, bool)> {
    match event {
        AppEvent::ChatAppended { message, .. } => Some((message.text.as_str(), message.is_own)),
        _ => None,
    }
}

#[tokio::test]
async fn test_chat_between_two_engines() {
    let network = SimulatedNetwork::new();
    let mut alice = TestPeer::spawn(&network, 111_111).await;
    let mut bob = TestPeer::spawn(&network, 222_222).await;

    alice
        .send(Command::SendMessage {
            target: addr(222_222),
            text: "hello bob".to_string(),
        })
        .await;
    let echoed = alice.wait_for(|e| chat_text(e).is_some()).await;
    assert_eq!(chat_text(&echoed), Some(("hello bob", true)));

    let received = bob.wait_for(|e| chat_text(e).is_some()).await;
    match &received {
        AppEvent::ChatAppended {
            message,
            sender_name,
        } => {
            assert_eq!(message.remote, addr(111_111));
            assert_eq!(message.text, "hello bob");
            assert!(!message.is_own);
            assert_eq!(sender_name, &None);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    let notification = bob.notification("Message from 111111").await;
    assert_eq!(notification.message, "hello bob");
    assert_eq!(notification.app, AppTag::Messages);

    alice.shutdown().await;
    bob.shutdown().await;
    assert_eq!(network.stats().open_channels(), 0);
}

#[tokio::test]
async fn test_echo_peer_replies() {
    let network = SimulatedNetwork::new();
    let echo = EchoPeer::spawn(&network, addr(555_555)).await.unwrap();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    phone
        .send(Command::SendMessage {
            target: echo.address().clone(),
            text: "ping".to_string(),
        })
        .await;
    let reply = phone
        .wait_for(|e| matches!(chat_text(e), Some((_, false))))
        .await;
    assert_eq!(chat_text(&reply), Some(("echo: ping", false)));
    phone.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_peer_reports_once_and_keeps_message() {
    let network = SimulatedNetwork::new();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    phone
        .send(Command::SendMessage {
            target: addr(999_999),
            text: "anyone there?".to_string(),
        })
        .await;
    phone.wait_for(|e| chat_text(e).is_some()).await;
    let failure = phone
        .wait_for(|e| {
            assert!(
                !matches!(e, AppEvent::ChatCleared),
                "local message was retracted"
            );
            matches!(e, AppEvent::Failure { .. })
        })
        .await;
    assert_eq!(
        failure,
        AppEvent::Failure {
            failure: Failure::DeliveryFailed {
                target: addr(999_999)
            }
        }
    );
    let notification = phone.notification("Message not delivered").await;
    assert_eq!(notification.app, AppTag::Messages);
    assert_eq!(network.stats().channels_opened.load(Ordering::SeqCst), 0);
    phone.shutdown().await;
}

#[tokio::test]
async fn test_blank_message_is_not_sent() {
    let network = SimulatedNetwork::new();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    phone
        .send(Command::SendMessage {
            target: addr(222_222),
            text: "   ".to_string(),
        })
        .await;
    phone.status().await;
    assert_eq!(network.stats().channels_opened.load(Ordering::SeqCst), 0);
    phone.shutdown().await;
}

#[tokio::test]
async fn test_malformed_and_unknown_frames_are_ignored() {
    let network = SimulatedNetwork::new();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    network
        .inject_data(addr(333_333), &addr(111_111), b"not json".to_vec())
        .unwrap();
    network
        .inject_data(
            addr(333_333),
            &addr(111_111),
            br#"{"kind":"typing"}"#.to_vec(),
        )
        .unwrap();
    network
        .inject_data(
            addr(333_333),
            &addr(111_111),
            Frame::chat("real one").encode().unwrap(),
        )
        .unwrap();

    let first = phone.wait_for(|e| chat_text(e).is_some()).await;
    assert_eq!(chat_text(&first), Some(("real one", false)));
    phone.shutdown().await;
}

#[tokio::test]
async fn test_notifications_mark_read_and_downloads() {
    let network = SimulatedNetwork::new();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    let connected = phone.notification("Connected to network").await;
    assert_eq!(connected.message, "Your number is 111111");
    assert_eq!(connected.app, AppTag::Settings);

    phone
        .send(Command::RecordDownload {
            name: "report.pdf".to_string(),
            kind: "pdf".to_string(),
            size_bytes: 42_000,
        })
        .await;
    phone
        .wait_for(|e| matches!(e, AppEvent::FileDownloaded { file } if file.name == "report.pdf"))
        .await;
    let download = phone.notification("Download complete").await;
    assert_eq!(download.app, AppTag::Browser);

    let AppEvent::StatusReport {
        unread_notifications,
        ..
    } = phone.status().await
    else {
        unreachable!()
    };
    assert_eq!(unread_notifications, 2);

    phone
        .send(Command::MarkNotificationRead { id: download.id })
        .await;
    phone
        .wait_for(|e| matches!(e, AppEvent::NotificationRead { id } if *id == download.id))
        .await;
    let AppEvent::StatusReport {
        unread_notifications,
        ..
    } = phone.status().await
    else {
        unreachable!()
    };
    assert_eq!(unread_notifications, 1);

    phone.send(Command::ClearMessages).await;
    phone
        .wait_for(|e| matches!(e, AppEvent::ChatCleared))
        .await;
    phone.shutdown().await;
}
