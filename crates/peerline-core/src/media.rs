//! Local and remote media handles
//!
//! Captured microphone audio is represented by [`LocalMedia`], a cheap-to-clone
//! handle over a set of [`AudioTrack`]s. Clones share release state: stopping the
//! tracks through any clone stops them for all, and tracks are stopped at most once.

use core::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::errors::CaptureError;

/// A single captured audio track
pub trait AudioTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// Stop the track and release the underlying device
    fn stop(&self);
}

/// Captured local audio, exclusively owned by the active call session
#[derive(Debug, Clone)]
pub struct LocalMedia {
    id: String,
    tracks: Vec<Arc<dyn AudioTrack>>,
    released: Arc<AtomicBool>,
}

impl LocalMedia {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<dyn AudioTrack>>) -> Self {
        Self {
            id: id.into(),
            tracks,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn AudioTrack>] {
        &self.tracks
    }

    pub fn set_enabled(&self, enabled: bool) {
        for track in &self.tracks {
            track.set_enabled(enabled);
        }
    }

    /// Stop every track. Returns `false` if the media was already released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        for track in &self.tracks {
            track.stop();
        }
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

/// Opaque handle to the remote party's audio stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMedia {
    pub id: String,
}

/// Local audio capture device
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Request microphone capture; may wait on a user permission prompt
    async fn capture_audio(&self) -> Result<LocalMedia, CaptureError>;
}
