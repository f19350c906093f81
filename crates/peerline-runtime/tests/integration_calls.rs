//! Integration tests for voice calls
//!
//! Runs full engines against the simulated rendezvous network and checks the
//! call lifecycle end to end, including microphone release on every exit path.

mod common;

use std::sync::Arc;
use tokio::time::{timeout, Duration};

use common::{addr, builder, TestPeer};
use peerline_core::{AppTag, CallSignal, ContactBook, Failure};
use peerline_harness::{EchoPeer, ManualClock, MicMode, SimulatedMicrophone, SimulatedNetwork};
use peerline_runtime::{AppEvent, CallStatus, Command};

#[tokio::test]
async fn test_call_between_two_engines_releases_media_once() {
    let network = SimulatedNetwork::new();
    let mut alice = TestPeer::spawn(&network, 111_111).await;
    let mut bob = TestPeer::spawn(&network, 222_222).await;

    alice
        .send(Command::Dial {
            target: addr(222_222),
        })
        .await;
    let dialing = alice.call_status(CallStatus::Dialing).await;
    assert_eq!(dialing.remote, addr(222_222));

    let ringing = bob.call_status(CallStatus::Incoming).await;
    assert_eq!(ringing.remote, addr(111_111));
    let notification = bob.notification("Incoming call").await;
    assert_eq!(notification.app, AppTag::Phone);

    bob.send(Command::AcceptIncoming).await;
    bob.call_status(CallStatus::Connected).await;
    alice.call_status(CallStatus::Connected).await;

    alice.send(Command::HangUp).await;
    alice.call_ended().await;
    bob.call_ended().await;

    for mic in [&alice.mic, &bob.mic] {
        assert_eq!(mic.captures(), 1);
        assert!(mic.all_released_once());
    }

    alice.shutdown().await;
    bob.shutdown().await;
}

#[tokio::test]
async fn test_second_incoming_call_is_rejected_while_busy() {
    let network = SimulatedNetwork::new();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    let mut first = network
        .ring(addr(333_333), &addr(111_111), "remote-1")
        .unwrap();
    phone.call_status(CallStatus::Incoming).await;

    let mut second = network
        .ring(addr(444_444), &addr(111_111), "remote-2")
        .unwrap();
    let rejected = timeout(Duration::from_secs(2), second.signals.recv())
        .await
        .expect("second call was never closed");
    assert_eq!(rejected, Some(CallSignal::Closed));

    match phone.status().await {
        AppEvent::StatusReport {
            call: Some(call), ..
        } => {
            assert_eq!(call.remote, addr(333_333));
            assert_eq!(call.status, CallStatus::Incoming);
        }
        other => panic!("unexpected status: {:?}", other),
    }

    phone.send(Command::AcceptIncoming).await;
    phone.call_status(CallStatus::Connected).await;
    let answered = timeout(Duration::from_secs(2), first.signals.recv())
        .await
        .unwrap();
    assert!(matches!(answered, Some(CallSignal::RemoteStream(_))));

    first.control.close();
    phone.call_ended().await;
    assert!(phone.mic.all_released_once());
    phone.shutdown().await;
}

#[tokio::test]
async fn test_dial_while_in_call_is_refused() {
    let network = SimulatedNetwork::new();
    let echo = EchoPeer::spawn(&network, addr(555_555)).await.unwrap();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    phone
        .send(Command::Dial {
            target: echo.address().clone(),
        })
        .await;
    phone.call_status(CallStatus::Connected).await;

    phone
        .send(Command::Dial {
            target: addr(666_666),
        })
        .await;
    phone
        .wait_for(|e| {
            matches!(
                e,
                AppEvent::Failure {
                    failure: Failure::CallInProgress
                }
            )
        })
        .await;
    assert_eq!(phone.mic.captures(), 1);

    phone.send(Command::HangUp).await;
    phone.call_ended().await;
    phone.shutdown().await;
}

#[tokio::test]
async fn test_capture_denied_then_granted() {
    let network = SimulatedNetwork::new();
    let echo = EchoPeer::spawn(&network, addr(555_555)).await.unwrap();
    let mut phone =
        TestPeer::spawn_with_mic(&network, 111_111, SimulatedMicrophone::new(MicMode::Deny)).await;

    phone
        .send(Command::Dial {
            target: echo.address().clone(),
        })
        .await;
    phone
        .wait_for(|e| {
            matches!(
                e,
                AppEvent::Failure {
                    failure: Failure::CaptureDenied
                }
            )
        })
        .await;
    phone.notification("Microphone blocked").await;
    assert!(matches!(
        phone.status().await,
        AppEvent::StatusReport { call: None, .. }
    ));

    phone.mic.set_mode(MicMode::Grant);
    phone
        .send(Command::Dial {
            target: echo.address().clone(),
        })
        .await;
    phone.call_status(CallStatus::Connected).await;
    phone.shutdown().await;
}

#[tokio::test]
async fn test_unsupported_capture_reports_calls_unavailable() {
    let network = SimulatedNetwork::new();
    let mut phone = TestPeer::spawn_with_mic(
        &network,
        111_111,
        SimulatedMicrophone::new(MicMode::Unsupported),
    )
    .await;

    phone
        .send(Command::Dial {
            target: addr(222_222),
        })
        .await;
    let notification = phone.notification("Calls unavailable").await;
    assert_eq!(notification.app, AppTag::Phone);
    phone.shutdown().await;
}

#[tokio::test]
async fn test_transport_error_tears_down_call() {
    let network = SimulatedNetwork::new();
    let echo = EchoPeer::spawn(&network, addr(555_555)).await.unwrap();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    phone
        .send(Command::Dial {
            target: echo.address().clone(),
        })
        .await;
    phone.call_status(CallStatus::Connected).await;

    assert_eq!(network.fail_active_calls("ice failed"), 1);
    let failure = phone
        .wait_for(|e| matches!(e, AppEvent::Failure { .. }))
        .await;
    assert_eq!(
        failure,
        AppEvent::Failure {
            failure: Failure::CallTransport {
                reason: "ice failed".to_string()
            }
        }
    );
    phone.notification("Call failed").await;
    assert!(matches!(
        phone.status().await,
        AppEvent::StatusReport { call: None, .. }
    ));
    assert!(phone.mic.all_released_once());
    phone.shutdown().await;
}

#[tokio::test]
async fn test_dial_unreachable_peer_fails_and_releases_media() {
    let network = SimulatedNetwork::new();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    phone
        .send(Command::Dial {
            target: addr(999_999),
        })
        .await;
    phone
        .wait_for(|e| {
            matches!(
                e,
                AppEvent::Failure {
                    failure: Failure::CallTransport { .. }
                }
            )
        })
        .await;
    assert_eq!(phone.mic.captures(), 1);
    assert!(phone.mic.all_released_once());
    phone.shutdown().await;
}

#[tokio::test]
async fn test_dial_without_network_fails_fast() {
    let network = SimulatedNetwork::new();
    network.set_outage(Some("rendezvous down"));
    let mic = Arc::new(SimulatedMicrophone::granting());
    let mut phone = TestPeer::start(builder(&network, 111_111, mic.clone()), mic).await;
    phone
        .connection_status(peerline_runtime::ConnectionStatus::Error)
        .await;

    phone
        .send(Command::Dial {
            target: addr(222_222),
        })
        .await;
    phone
        .wait_for(|e| {
            matches!(
                e,
                AppEvent::Failure {
                    failure: Failure::NoNetwork
                }
            )
        })
        .await;
    assert_eq!(phone.mic.captures(), 0);
    phone.shutdown().await;
}

#[tokio::test]
async fn test_recording_duration_and_contact_names() {
    let network = SimulatedNetwork::new();
    let clock = ManualClock::starting_at(1_700_000_000_000);
    let contacts = Arc::new(ContactBook::new());
    contacts.add("Echo", addr(555_555));
    let echo = EchoPeer::spawn(&network, addr(555_555)).await.unwrap();

    let mic = Arc::new(SimulatedMicrophone::granting());
    let mut phone = TestPeer::start(
        builder(&network, 111_111, mic.clone())
            .with_time_source(Arc::new(clock.clone()))
            .with_contacts(contacts),
        mic,
    )
    .await;
    phone.identity().await;

    phone
        .send(Command::Dial {
            target: echo.address().clone(),
        })
        .await;
    let connected = phone.call_status(CallStatus::Connected).await;
    assert_eq!(connected.display_name.as_deref(), Some("Echo"));

    clock.advance(Duration::from_secs(5));
    phone
        .wait_for(|e| matches!(e, AppEvent::CallDurationChanged { seconds: 5 }))
        .await;

    phone.send(Command::ToggleRecord).await;
    phone
        .wait_for(|e| {
            matches!(e, AppEvent::CallStateChanged { snapshot: Some(s) } if s.is_recording)
        })
        .await;
    phone.send(Command::ToggleRecord).await;
    let recording = match phone
        .wait_for(|e| matches!(e, AppEvent::RecordingCompleted { .. }))
        .await
    {
        AppEvent::RecordingCompleted { recording } => recording,
        _ => unreachable!(),
    };
    assert!(recording.name.starts_with("Call_Echo_"));
    assert!(recording.name.ends_with(".mp3"));
    assert!((1_000_000..6_000_000).contains(&recording.size_bytes));
    phone.notification("Recording saved").await;

    match phone.status().await {
        AppEvent::StatusReport { recordings, .. } => assert_eq!(recordings, 1),
        other => panic!("unexpected status: {:?}", other),
    }

    phone.send(Command::ToggleMute).await;
    phone
        .wait_for(|e| matches!(e, AppEvent::CallStateChanged { snapshot: Some(s) } if s.is_muted))
        .await;
    let track = phone.mic.last_track().unwrap();
    assert!(!peerline_core::AudioTrack::is_enabled(track.as_ref()));

    phone.send(Command::HangUp).await;
    phone.call_ended().await;
    phone.shutdown().await;
}
