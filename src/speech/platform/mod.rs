//! Host capabilities the conversation relies on: microphone capture, audio
//! playback and text narration.

pub mod system;

use super::voice::VoiceInfo;
use async_trait::async_trait;
use thiserror::Error;

pub use system::{ SystemPlatform, SystemPlatformConfig };

/// Identifies one playback so that late events of a superseded stream can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Finished(PlaybackId),
    Failed(PlaybackId, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub lang_tag: String,
    pub voice: Option<VoiceInfo>,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Audio recording is not supported on this system: {0}")]
    Unsupported(String),
    #[error("Microphone permission denied. Please allow microphone access.")]
    PermissionDenied,
    #[error("A recording is already in progress.")]
    AlreadyRecording,
    #[error("Error during recording: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Playback is not available: {0}")]
    Unavailable(String),
    #[error("Could not play audio: {0}")]
    Failed(String),
}

/// Implementations must release the microphone when `stop_capture` returns,
/// whatever the outcome, and keep at most one playback alive.
#[async_trait]
pub trait SpeechPlatform: Send + Sync {
    async fn start_capture(&self) -> Result<(), CaptureError>;

    /// Returns the recording as a `data:audio/*` URI, or `None` when nothing was recording.
    async fn stop_capture(&self) -> Result<Option<String>, CaptureError>;

    async fn play_audio(&self, mime: &str, bytes: &[u8]) -> Result<PlaybackId, PlaybackError>;

    async fn speak(&self, utterance: &Utterance) -> Result<PlaybackId, PlaybackError>;

    async fn cancel_playback(&self);

    async fn voices(&self) -> Vec<VoiceInfo>;
}
