//! Call Session Manager
//!
//! Owns the at-most-one active [`CallSession`] and drives it through
//!
//! ```text
//! none ──dial+capture──► dialing ──remote stream──► connected ──► none
//! none ──incoming call─► incoming ─accept+stream──► connected ──► none
//! dialing | incoming ──hang-up / close / error──► none
//! ```
//!
//! A dial waits for microphone capture before the session exists; while that
//! capture is pending the manager counts as busy. Dropping a session releases
//! its local media and closes its transport call, so every exit path frees the
//! microphone.

use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use peerline_core::{
    AppEvent, CallControl, CallId, CallSignal, CallSnapshot, CallStatus, CaptureError, Effect,
    Failure, LocalAddress, LocalMedia, Recording, RemoteMedia, Timestamp, TransportError,
};

use super::Outcome;

/// Simulated recording sizes, in bytes
const RECORDING_SIZE_BYTES: core::ops::Range<u64> = 1_000_000..6_000_000;

// ----------------------------------------------------------------------------
// Call Session
// ----------------------------------------------------------------------------

/// The single in-flight call and the resources it owns
#[derive(Debug)]
pub struct CallSession {
    call_id: CallId,
    remote: LocalAddress,
    display_name: Option<String>,
    status: CallStatus,
    started_at: Option<Timestamp>,
    duration_secs: u64,
    is_muted: bool,
    is_recording: bool,
    answering: bool,
    local_media: Option<LocalMedia>,
    remote_media: Option<RemoteMedia>,
    control: Option<Arc<dyn CallControl>>,
}

impl CallSession {
    fn new(
        call_id: CallId,
        remote: LocalAddress,
        display_name: Option<String>,
        status: CallStatus,
    ) -> Self {
        Self {
            call_id,
            remote,
            display_name,
            status,
            started_at: None,
            duration_secs: 0,
            is_muted: false,
            is_recording: false,
            answering: false,
            local_media: None,
            remote_media: None,
            control: None,
        }
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    pub fn remote_media(&self) -> Option<&RemoteMedia> {
        self.remote_media.as_ref()
    }

    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            call_id: self.call_id,
            remote: self.remote.clone(),
            display_name: self.display_name.clone(),
            status: self.status,
            started_at: self.started_at,
            duration_secs: self.duration_secs,
            is_muted: self.is_muted,
            is_recording: self.is_recording,
        }
    }

    fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.remote.as_str())
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        if let Some(media) = self.local_media.take() {
            media.release();
        }
        if let Some(control) = self.control.take() {
            control.close();
        }
        debug!(call_id = %self.call_id, "Call session torn down");
    }
}

/// Outbound dial waiting on microphone capture
#[derive(Debug, Clone)]
struct PendingDial {
    call_id: CallId,
    remote: LocalAddress,
    display_name: Option<String>,
}

// ----------------------------------------------------------------------------
// Call Session Manager
// ----------------------------------------------------------------------------

pub struct CallSessionManager {
    session: Option<CallSession>,
    pending: Option<PendingDial>,
    recordings: Vec<Recording>,
    rng: Box<dyn RngCore + Send>,
}

impl CallSessionManager {
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }

    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            session: None,
            pending: None,
            recordings: Vec::new(),
            rng,
        }
    }

    pub fn session(&self) -> Option<&CallSession> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<CallSnapshot> {
        self.session.as_ref().map(CallSession::snapshot)
    }

    /// A session exists or a dial is waiting on capture
    pub fn is_busy(&self) -> bool {
        self.session.is_some() || self.pending.is_some()
    }

    /// Completed recordings, newest first
    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    fn state_changed(&self) -> AppEvent {
        AppEvent::CallStateChanged {
            snapshot: self.snapshot(),
        }
    }

    fn matches(&self, call_id: CallId) -> bool {
        self.session
            .as_ref()
            .map(|session| session.call_id == call_id)
            .unwrap_or(false)
    }

    /// Drop the session, releasing media and closing the call
    fn teardown(&mut self) -> Outcome {
        match self.session.take() {
            Some(session) => {
                info!(call_id = %session.call_id, "Call ended");
                drop(session);
                Outcome::new().event(self.state_changed())
            }
            None => Outcome::new(),
        }
    }

    // ------------------------------------------------------------------------
    // User operations
    // ------------------------------------------------------------------------

    /// Start an outbound call; capture is requested first
    pub fn dial(
        &mut self,
        target: LocalAddress,
        display_name: Option<String>,
        network_connected: bool,
    ) -> Outcome {
        if !network_connected {
            debug!(target = %target, "Dial refused: not connected");
            return Outcome::new().event(AppEvent::Failure {
                failure: Failure::NoNetwork,
            });
        }
        if self.is_busy() {
            debug!(target = %target, "Dial refused: call in progress");
            return Outcome::new().event(AppEvent::Failure {
                failure: Failure::CallInProgress,
            });
        }

        let call_id = CallId::new();
        info!(call_id = %call_id, target = %target, "Dialing");
        self.pending = Some(PendingDial {
            call_id,
            remote: target,
            display_name,
        });
        Outcome::new().effect(Effect::CaptureAudio { call_id })
    }

    /// Answer the ringing call; capture is requested first
    pub fn accept_incoming(&mut self) -> Outcome {
        let Some(session) = self.session.as_mut() else {
            return Outcome::new();
        };
        if session.status != CallStatus::Incoming || session.answering {
            debug!(call_id = %session.call_id, status = %session.status, "Nothing to accept");
            return Outcome::new();
        }
        session.answering = true;
        Outcome::new().effect(Effect::CaptureAudio {
            call_id: session.call_id,
        })
    }

    /// End the current call; no-op without one
    pub fn hang_up(&mut self) -> Outcome {
        if let Some(pending) = self.pending.take() {
            info!(call_id = %pending.call_id, "Dial cancelled before capture completed");
        }
        self.teardown()
    }

    pub fn toggle_mute(&mut self) -> Outcome {
        let Some(session) = self.session.as_mut() else {
            return Outcome::new();
        };
        if session.status != CallStatus::Connected {
            return Outcome::new();
        }
        let Some(media) = &session.local_media else {
            return Outcome::new();
        };
        session.is_muted = !session.is_muted;
        media.set_enabled(!session.is_muted);
        Outcome::new().event(self.state_changed())
    }

    /// Flip recording on any active call; stopping yields one [`Recording`]
    pub fn toggle_record(&mut self, now: Timestamp) -> Outcome {
        let Some(session) = self.session.as_mut() else {
            return Outcome::new();
        };
        session.is_recording = !session.is_recording;
        if session.is_recording {
            return Outcome::new().event(self.state_changed());
        }

        let recording = Recording {
            id: Uuid::new_v4(),
            name: format!("Call_{}_{}.mp3", session.label(), now.file_stamp()),
            created_at: now,
            size_bytes: self.rng.gen_range(RECORDING_SIZE_BYTES),
        };
        info!(name = %recording.name, "Recording completed");
        self.recordings.insert(0, recording.clone());
        Outcome::new()
            .event(self.state_changed())
            .event(AppEvent::RecordingCompleted { recording })
    }

    /// Recompute the connected-call duration
    pub fn tick(&mut self, now: Timestamp) -> Outcome {
        let Some(session) = self.session.as_mut() else {
            return Outcome::new();
        };
        let seconds = match (session.status, session.started_at) {
            (CallStatus::Connected, Some(started_at)) => now.seconds_since(started_at),
            _ => 0,
        };
        if seconds == session.duration_secs {
            return Outcome::new();
        }
        session.duration_secs = seconds;
        Outcome::new().event(AppEvent::CallDurationChanged { seconds })
    }

    /// Tear down everything on engine shutdown
    pub fn shutdown(&mut self) -> Outcome {
        self.hang_up()
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    /// A peer is calling; callers reject it first when busy
    pub fn on_incoming_call(
        &mut self,
        call_id: CallId,
        from: LocalAddress,
        display_name: Option<String>,
        control: Arc<dyn CallControl>,
    ) -> Outcome {
        if self.is_busy() {
            warn!(call_id = %call_id, from = %from, "Rejecting call while busy");
            control.close();
            return Outcome::new();
        }
        info!(call_id = %call_id, from = %from, "Incoming call");
        let mut session = CallSession::new(call_id, from, display_name, CallStatus::Incoming);
        session.control = Some(control);
        self.session = Some(session);
        Outcome::new().event(self.state_changed())
    }

    pub fn on_media_captured(&mut self, call_id: CallId, media: LocalMedia) -> Outcome {
        if let Some(pending) = self.pending.take_if_matches(call_id) {
            let mut session = CallSession::new(
                pending.call_id,
                pending.remote.clone(),
                pending.display_name,
                CallStatus::Dialing,
            );
            session.local_media = Some(media.clone());
            self.session = Some(session);
            return Outcome::new()
                .effect(Effect::PlaceCall {
                    call_id,
                    target: pending.remote,
                    media,
                })
                .event(self.state_changed());
        }

        if let Some(session) = self.session.as_mut() {
            if session.call_id == call_id
                && session.status == CallStatus::Incoming
                && session.answering
                && session.local_media.is_none()
            {
                if let Some(control) = session.control.clone() {
                    session.local_media = Some(media.clone());
                    return Outcome::new().effect(Effect::AnswerCall {
                        call_id,
                        control,
                        media,
                    });
                }
            }
        }

        warn!(call_id = %call_id, "Releasing media captured for a stale call");
        media.release();
        Outcome::new()
    }

    pub fn on_capture_failed(&mut self, call_id: CallId, error: &CaptureError) -> Outcome {
        let failure = match error {
            CaptureError::Unsupported => Failure::CaptureUnsupported,
            CaptureError::Denied | CaptureError::DeviceBusy { .. } => Failure::CaptureDenied,
        };

        if self.pending.take_if_matches(call_id).is_some() {
            info!(call_id = %call_id, "Dial abandoned: {}", error);
            return Outcome::new().event(AppEvent::Failure { failure });
        }
        match self.session.as_mut() {
            Some(session) if session.call_id == call_id && session.answering => {
                // The call keeps ringing; the user may retry or hang up
                session.answering = false;
                info!(call_id = %call_id, "Answer abandoned: {}", error);
                Outcome::new().event(AppEvent::Failure { failure })
            }
            _ => Outcome::new(),
        }
    }

    pub fn on_call_placed(&mut self, call_id: CallId, control: Arc<dyn CallControl>) -> Outcome {
        match self.session.as_mut() {
            Some(session) if session.call_id == call_id && session.control.is_none() => {
                session.control = Some(control);
            }
            _ => {
                warn!(call_id = %call_id, "Closing call placed for a stale session");
                control.close();
            }
        }
        Outcome::new()
    }

    pub fn on_call_failed(&mut self, call_id: CallId, error: &TransportError) -> Outcome {
        if !self.matches(call_id) {
            return Outcome::new();
        }
        warn!(call_id = %call_id, "Call failed: {}", error);
        self.teardown().event(AppEvent::Failure {
            failure: Failure::CallTransport {
                reason: error.to_string(),
            },
        })
    }

    pub fn on_call_signal(&mut self, call_id: CallId, signal: CallSignal, now: Timestamp) -> Outcome {
        if !self.matches(call_id) {
            debug!(call_id = %call_id, "Ignoring signal for a stale call");
            return Outcome::new();
        }
        match signal {
            CallSignal::RemoteStream(remote) => {
                let Some(session) = self.session.as_mut() else {
                    return Outcome::new();
                };
                if !matches!(session.status, CallStatus::Dialing | CallStatus::Incoming) {
                    return Outcome::new();
                }
                info!(call_id = %call_id, "Call connected");
                session.status = CallStatus::Connected;
                session.started_at = Some(now);
                session.duration_secs = 0;
                session.answering = false;
                session.remote_media = Some(remote);
                Outcome::new().event(self.state_changed())
            }
            CallSignal::Closed => self.teardown(),
            CallSignal::Error(reason) => {
                warn!(call_id = %call_id, "Call transport error: {}", reason);
                self.teardown().event(AppEvent::Failure {
                    failure: Failure::CallTransport { reason },
                })
            }
        }
    }
}

impl Default for CallSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for CallSessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallSessionManager")
            .field("session", &self.session)
            .field("pending", &self.pending)
            .field("recordings", &self.recordings.len())
            .finish()
    }
}

trait TakeIfMatches {
    fn take_if_matches(&mut self, call_id: CallId) -> Option<PendingDial>;
}

impl TakeIfMatches for Option<PendingDial> {
    fn take_if_matches(&mut self, call_id: CallId) -> Option<PendingDial> {
        match self {
            Some(pending) if pending.call_id == call_id => self.take(),
            _ => None,
        }
    }
}
