//! Integration tests for registration and connection recovery

mod common;

use std::sync::Arc;
use tokio::time::{timeout, Duration};

use common::{addr, builder, TestPeer};
use peerline_core::{AppTag, CallSignal, Frame};
use peerline_harness::{EchoPeer, SimulatedMicrophone, SimulatedNetwork};
use peerline_runtime::{AppEvent, CallStatus, Command, ConnectionStatus, ADDRESS_RANGE};

#[tokio::test]
async fn test_collision_picks_new_address_silently() {
    let network = SimulatedNetwork::new();
    network.reserve(addr(111_111));
    let mic = Arc::new(SimulatedMicrophone::granting());
    let mut phone = TestPeer::start(builder(&network, 111_111, mic.clone()), mic).await;

    let identity = phone
        .wait_for(|e| {
            assert!(
                !matches!(
                    e,
                    AppEvent::ConnectionStatusChanged {
                        status: ConnectionStatus::Error,
                        ..
                    } | AppEvent::Failure { .. }
                ),
                "collision surfaced to the user: {:?}",
                e
            );
            matches!(e, AppEvent::IdentityConfirmed { .. })
        })
        .await;
    let AppEvent::IdentityConfirmed { address } = identity else {
        unreachable!()
    };
    assert_ne!(address, addr(111_111));
    let number: u32 = address.as_str().parse().unwrap();
    assert!(ADDRESS_RANGE.contains(&number));
    assert!(network.is_registered(&address));
    assert_eq!(network.registered_addresses().len(), 1);

    phone.shutdown().await;
}

#[tokio::test]
async fn test_dropped_registration_resumes_without_new_identity() {
    let network = SimulatedNetwork::new();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    assert!(network.drop_connection(&addr(111_111), "network changed"));
    phone.connection_status(ConnectionStatus::Disconnected).await;
    phone
        .wait_for(|e| {
            assert!(
                !matches!(e, AppEvent::IdentityConfirmed { .. }),
                "identity confirmed twice"
            );
            matches!(
                e,
                AppEvent::ConnectionStatusChanged {
                    status: ConnectionStatus::Connected,
                    ..
                }
            )
        })
        .await;

    assert!(network.is_registered(&addr(111_111)));
    assert!(network.stats().reconnects.load(std::sync::atomic::Ordering::SeqCst) >= 1);
    phone.shutdown().await;
}

#[tokio::test]
async fn test_exhausted_reconnects_escalate_then_manual_reconnect_recovers() {
    let network = SimulatedNetwork::new();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    network.fail_next_reconnects(100);
    network.drop_connection(&addr(111_111), "network changed");
    phone.connection_status(ConnectionStatus::Disconnected).await;
    phone.connection_status(ConnectionStatus::Error).await;
    let notification = phone.notification("Network error").await;
    assert_eq!(notification.app, AppTag::Settings);

    network.fail_next_reconnects(0);
    phone.send(Command::Reconnect).await;
    phone.connection_status(ConnectionStatus::Connecting).await;
    assert_eq!(phone.identity().await, addr(111_111));
    assert!(network.is_registered(&addr(111_111)));

    match phone.status().await {
        AppEvent::StatusReport {
            address, status, ..
        } => {
            assert_eq!(address, Some(addr(111_111)));
            assert_eq!(status, ConnectionStatus::Connected);
        }
        other => panic!("unexpected status: {:?}", other),
    }
    phone.shutdown().await;
}

#[tokio::test]
async fn test_lost_registration_ends_inbound_call_and_registers_again() {
    let network = SimulatedNetwork::new();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    let mut caller = network
        .ring(addr(333_333), &addr(111_111), "remote-1")
        .unwrap();
    phone.call_status(CallStatus::Incoming).await;
    phone.send(Command::AcceptIncoming).await;
    phone.call_status(CallStatus::Connected).await;

    assert!(network.sever_registration(&addr(111_111)));
    phone.call_ended().await;
    assert_eq!(phone.mic.live_tracks(), 0);
    assert!(phone.mic.all_released_once());

    phone
        .wait_for(|e| {
            assert!(
                !matches!(e, AppEvent::IdentityConfirmed { .. }),
                "identity confirmed twice"
            );
            matches!(
                e,
                AppEvent::ConnectionStatusChanged {
                    status: ConnectionStatus::Connected,
                    ..
                }
            )
        })
        .await;
    assert!(network.is_registered(&addr(111_111)));

    // The caller sees the call go away
    let ended = timeout(Duration::from_secs(2), async {
        loop {
            match caller.signals.recv().await {
                Some(CallSignal::RemoteStream(_)) => continue,
                other => return other,
            }
        }
    })
    .await
    .expect("caller never saw the call end");
    assert!(matches!(ended, Some(CallSignal::Closed) | None));

    // Chat reaches the new registration
    network
        .inject_data(addr(222_222), &addr(111_111), Frame::chat("still there?").encode().unwrap())
        .unwrap();
    phone
        .wait_for(|e| {
            matches!(e, AppEvent::ChatAppended { message, .. } if message.text == "still there?")
        })
        .await;
    phone.shutdown().await;
}

#[tokio::test]
async fn test_manual_reconnect_ends_active_call() {
    let network = SimulatedNetwork::new();
    let echo = EchoPeer::spawn(&network, addr(555_555)).await.unwrap();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    phone
        .send(Command::Dial {
            target: echo.address().clone(),
        })
        .await;
    phone.call_status(CallStatus::Connected).await;

    phone.send(Command::Reconnect).await;
    phone.call_ended().await;
    phone.identity().await;
    assert!(phone.mic.all_released_once());
    phone.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_unregisters_and_releases() {
    let network = SimulatedNetwork::new();
    let echo = EchoPeer::spawn(&network, addr(555_555)).await.unwrap();
    let mut phone = TestPeer::spawn(&network, 111_111).await;

    phone
        .send(Command::Dial {
            target: echo.address().clone(),
        })
        .await;
    phone.call_status(CallStatus::Connected).await;

    let mic = phone.mic.clone();
    phone.shutdown().await;
    assert!(mic.all_released_once());
    assert_eq!(network.registered_addresses(), vec![addr(555_555)]);
}
