//! Property-based tests for the address registry and call session manager
//!
//! These tests drive the managers with arbitrary operation sequences and check
//! the resource invariants: addresses are never reused, at most one call holds
//! the microphone, and every track and call handle is released exactly once.

use std::collections::{HashSet, VecDeque};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use peerline_core::{
    AudioTrack, CallControl, CallId, CallSignal, CallStatus, CaptureError, Effect, LocalAddress,
    LocalMedia, RemoteMedia, Timestamp, TransportError,
};
use peerline_runtime::{AddressRegistry, CallSessionManager, Outcome, ADDRESS_RANGE};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Default)]
struct Track {
    enabled: AtomicBool,
    stops: AtomicUsize,
}

impl AudioTrack for Track {
    fn id(&self) -> &str {
        "track"
    }
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct Control {
    closes: AtomicUsize,
}

impl CallControl for Control {
    fn answer(&self, _media: &LocalMedia) -> Result<(), TransportError> {
        Ok(())
    }
    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
enum Op {
    Dial,
    Incoming,
    Accept,
    HangUp,
    CaptureGranted,
    CaptureDenied,
    Placed,
    RemoteStream,
    Closed,
    Error,
    Mute,
    Record,
    Tick(u64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Dial),
        Just(Op::Incoming),
        Just(Op::Accept),
        Just(Op::HangUp),
        Just(Op::CaptureGranted),
        Just(Op::CaptureDenied),
        Just(Op::Placed),
        Just(Op::RemoteStream),
        Just(Op::Closed),
        Just(Op::Error),
        Just(Op::Mute),
        Just(Op::Record),
        (0u64..10_000).prop_map(Op::Tick),
    ]
}

/// Drives a manager the way the core task would, standing in for the transport
struct Driver {
    manager: CallSessionManager,
    captures: VecDeque<CallId>,
    tracks: Vec<Arc<Track>>,
    controls: Vec<Arc<Control>>,
    now: u64,
}

impl Driver {
    fn new(seed: u64) -> Self {
        Self {
            manager: CallSessionManager::with_rng(Box::new(ChaCha8Rng::seed_from_u64(seed))),
            captures: VecDeque::new(),
            tracks: Vec::new(),
            controls: Vec::new(),
            now: 1_000_000,
        }
    }

    fn absorb(&mut self, outcome: Outcome) {
        for effect in outcome.effects {
            if let Effect::CaptureAudio { call_id } = effect {
                self.captures.push_back(call_id);
            }
        }
    }

    fn control(&mut self) -> Arc<Control> {
        let control = Arc::new(Control::default());
        self.controls.push(control.clone());
        control
    }

    fn session_id(&self) -> CallId {
        self.manager
            .session()
            .map(|session| session.call_id())
            .unwrap_or_else(CallId::new)
    }

    fn apply(&mut self, op: Op) {
        let now = Timestamp::new(self.now);
        let outcome = match op {
            Op::Dial => self
                .manager
                .dial(LocalAddress::from_number(222_222), None, true),
            Op::Incoming => {
                let control = self.control();
                self.manager.on_incoming_call(
                    CallId::new(),
                    LocalAddress::from_number(333_333),
                    None,
                    control,
                )
            }
            Op::Accept => self.manager.accept_incoming(),
            Op::HangUp => self.manager.hang_up(),
            Op::CaptureGranted => {
                let call_id = self.captures.pop_front().unwrap_or_else(CallId::new);
                let track = Arc::new(Track::default());
                self.tracks.push(track.clone());
                let media = LocalMedia::new("local", vec![track as Arc<dyn AudioTrack>]);
                self.manager.on_media_captured(call_id, media)
            }
            Op::CaptureDenied => {
                let call_id = self.captures.pop_front().unwrap_or_else(CallId::new);
                self.manager.on_capture_failed(call_id, &CaptureError::Denied)
            }
            Op::Placed => {
                let call_id = self.session_id();
                let control = self.control();
                self.manager.on_call_placed(call_id, control)
            }
            Op::RemoteStream => {
                let call_id = self.session_id();
                self.manager.on_call_signal(
                    call_id,
                    CallSignal::RemoteStream(RemoteMedia {
                        id: "remote".to_string(),
                    }),
                    now,
                )
            }
            Op::Closed => {
                let call_id = self.session_id();
                self.manager.on_call_signal(call_id, CallSignal::Closed, now)
            }
            Op::Error => {
                let call_id = self.session_id();
                self.manager
                    .on_call_signal(call_id, CallSignal::Error("ice failed".to_string()), now)
            }
            Op::Mute => self.manager.toggle_mute(),
            Op::Record => self.manager.toggle_record(now),
            Op::Tick(ms) => {
                self.now += ms;
                self.manager.tick(Timestamp::new(self.now))
            }
        };
        self.absorb(outcome);
    }

    fn live_tracks(&self) -> usize {
        self.tracks
            .iter()
            .filter(|track| track.stops.load(Ordering::SeqCst) == 0)
            .count()
    }
}

proptest! {
    /// Property: the registry never hands out the same address twice
    #[test]
    fn registry_addresses_are_unique_and_in_range(seed in any::<u64>(), collisions in 0usize..200) {
        let mut registry = AddressRegistry::with_rng(Box::new(ChaCha8Rng::seed_from_u64(seed)));
        let mut seen = HashSet::new();

        let first = registry.acquire_address();
        seen.insert(first);
        for _ in 0..collisions {
            let address = registry.on_collision();
            let number: u32 = address.as_str().parse().unwrap();
            prop_assert!(ADDRESS_RANGE.contains(&number));
            prop_assert!(seen.insert(address), "address reused");
        }
    }

    /// Property: at most one call holds the microphone, and nothing leaks
    #[test]
    fn call_resources_released_exactly_once(
        seed in any::<u64>(),
        ops in prop::collection::vec(arb_op(), 0..80),
    ) {
        let mut driver = Driver::new(seed);
        for op in ops {
            driver.apply(op);
            prop_assert!(driver.live_tracks() <= 1);
            if driver.manager.session().is_none() {
                prop_assert_eq!(driver.live_tracks(), 0);
            }
        }

        driver.manager.shutdown();
        prop_assert!(driver.manager.session().is_none());
        prop_assert!(!driver.manager.is_busy());
        for track in &driver.tracks {
            prop_assert_eq!(track.stops.load(Ordering::SeqCst), 1);
        }
        for control in &driver.controls {
            prop_assert_eq!(control.closes.load(Ordering::SeqCst), 1);
        }
    }

    /// Property: every stop of a recording yields exactly one recording
    #[test]
    fn record_toggles_yield_one_recording_per_stop(seed in any::<u64>(), toggles in 0usize..20) {
        let mut driver = Driver::new(seed);
        driver.apply(Op::Dial);
        driver.apply(Op::CaptureGranted);
        driver.apply(Op::Placed);
        driver.apply(Op::RemoteStream);
        prop_assert_eq!(
            driver.manager.snapshot().map(|s| s.status),
            Some(CallStatus::Connected)
        );

        for _ in 0..toggles {
            driver.apply(Op::Record);
            driver.apply(Op::Tick(1_500));
        }

        let recordings = driver.manager.recordings();
        prop_assert_eq!(recordings.len(), toggles / 2);
        for recording in recordings {
            prop_assert!((1_000_000..6_000_000).contains(&recording.size_bytes));
            prop_assert!(recording.name.starts_with("Call_222222_"));
        }
        prop_assert!(recordings.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
    }
}
