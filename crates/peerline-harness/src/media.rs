//! Simulated microphone
//!
//! Hands out [`LocalMedia`] backed by [`SimulatedTrack`]s and remembers every
//! track it created so tests can assert that each one was stopped exactly once.

use core::time::Duration;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use peerline_core::{AudioTrack, CaptureError, LocalMedia, MediaDevices};

/// How the next capture request is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicMode {
    Grant,
    Deny,
    Unsupported,
}

/// Audio track that counts how often it was stopped
#[derive(Debug)]
pub struct SimulatedTrack {
    id: String,
    enabled: AtomicBool,
    stops: AtomicUsize,
}

impl SimulatedTrack {
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AudioTrack for SimulatedTrack {
    fn id(&self) -> &str {
        &self.id
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

#[derive(Debug)]
pub struct SimulatedMicrophone {
    mode: Mutex<MicMode>,
    delay: Option<Duration>,
    tracks: Mutex<Vec<Arc<SimulatedTrack>>>,
}

impl SimulatedMicrophone {
    pub fn new(mode: MicMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            delay: None,
            tracks: Mutex::new(Vec::new()),
        }
    }

    pub fn granting() -> Self {
        Self::new(MicMode::Grant)
    }

    /// Wait `delay` before answering, like a permission prompt would
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_mode(&self, mode: MicMode) {
        *self.mode.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = mode;
    }

    fn tracks(&self) -> Vec<Arc<SimulatedTrack>> {
        self.tracks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of successful captures
    pub fn captures(&self) -> usize {
        self.tracks().len()
    }

    /// Tracks that were captured and never stopped
    pub fn live_tracks(&self) -> usize {
        self.tracks()
            .iter()
            .filter(|track| track.stop_count() == 0)
            .count()
    }

    /// True if every captured track was stopped exactly once
    pub fn all_released_once(&self) -> bool {
        self.tracks().iter().all(|track| track.stop_count() == 1)
    }

    pub fn last_track(&self) -> Option<Arc<SimulatedTrack>> {
        self.tracks().last().cloned()
    }
}

#[async_trait::async_trait]
impl MediaDevices for SimulatedMicrophone {
    async fn capture_audio(&self) -> Result<LocalMedia, CaptureError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mode = *self.mode.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match mode {
            MicMode::Deny => Err(CaptureError::Denied),
            MicMode::Unsupported => Err(CaptureError::Unsupported),
            MicMode::Grant => {
                let mut tracks = self
                    .tracks
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let index = tracks.len();
                let track = Arc::new(SimulatedTrack {
                    id: format!("mic-{}", index),
                    enabled: AtomicBool::new(true),
                    stops: AtomicUsize::new(0),
                });
                tracks.push(track.clone());
                Ok(LocalMedia::new(
                    format!("stream-{}", index),
                    vec![track as Arc<dyn AudioTrack>],
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_modes() {
        let mic = SimulatedMicrophone::new(MicMode::Deny);
        assert_eq!(mic.capture_audio().await.unwrap_err(), CaptureError::Denied);
        mic.set_mode(MicMode::Unsupported);
        assert_eq!(
            mic.capture_audio().await.unwrap_err(),
            CaptureError::Unsupported
        );
        mic.set_mode(MicMode::Grant);
        let media = mic.capture_audio().await.unwrap();
        assert_eq!(mic.captures(), 1);
        assert_eq!(mic.live_tracks(), 1);

        media.release();
        media.release();
        assert_eq!(mic.live_tracks(), 0);
        assert!(mic.all_released_once());
    }
}
