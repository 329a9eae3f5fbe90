pub mod data_uri;
pub mod platform;
pub mod synthesis;
pub mod transcription;
pub mod voice;

use thiserror::Error;

/// Failures of the transcription and synthesis collaborators. All of them
/// are recoverable from the conversation's point of view.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("{0} is not configured")]
    NotConfigured(String),
    #[error("speech service request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("speech service returned {status}: {body}")]
    Service {
        status: u16,
        body: String,
    },
    #[error("speech service returned no usable output")]
    EmptyOutput,
    #[error("invalid audio payload: {0}")]
    InvalidAudio(String),
}
