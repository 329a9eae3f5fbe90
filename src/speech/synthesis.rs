use super::data_uri::{ audio_data_uri, narration_data_uri };
use super::SpeechError;
use crate::language::LanguageCode;
use async_trait::async_trait;
use log::{ debug, info };
use reqwest::Client as HttpClient;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Returns a data URI: generated `audio/*` or `text/plain` for narration.
    async fn synthesize(&self, text: &str, lang: LanguageCode) -> Result<String, SpeechError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesizerType {
    Narration,
    OpenAI,
}

impl FromStr for SynthesizerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "narration" | "platform" | "none" => Ok(SynthesizerType::Narration),
            "openai" => Ok(SynthesizerType::OpenAI),
            _ => Err(format!("Unsupported synthesizer type: {}", s)),
        }
    }
}

impl fmt::Display for SynthesizerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesizerType::Narration => write!(f, "narration"),
            SynthesizerType::OpenAI => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    pub synthesizer_type: SynthesizerType,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub voice_en: Option<String>,
    pub voice_te: Option<String>,
}

pub fn new_synthesizer(
    config: &SynthesizerConfig
) -> Result<Arc<dyn Synthesizer>, Box<dyn StdError + Send + Sync>> {
    let synthesizer: Arc<dyn Synthesizer> = match config.synthesizer_type {
        SynthesizerType::Narration => Arc::new(NarrationSynthesizer),
        SynthesizerType::OpenAI => Arc::new(OpenAISynthesizer::from_config(config)?),
    };
    info!("Synthesizer configured: {}", synthesizer.name());
    Ok(synthesizer)
}

/// Hands the text back for the platform's own narration engine.
pub struct NarrationSynthesizer;

#[async_trait]
impl Synthesizer for NarrationSynthesizer {
    async fn synthesize(&self, text: &str, _lang: LanguageCode) -> Result<String, SpeechError> {
        Ok(narration_data_uri(text))
    }

    fn name(&self) -> &str {
        "narration"
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

pub struct OpenAISynthesizer {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    voice_en: String,
    voice_te: String,
    label: String,
}

impl OpenAISynthesizer {
    pub fn from_config(config: &SynthesizerConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| "OpenAI API key is required for OpenAISynthesizer".to_string())?;
        let model = config.model.clone().unwrap_or_else(|| "tts-1".to_string());
        let label = format!("openai:{}", model);

        Ok(Self {
            http: HttpClient::new(),
            api_key,
            model,
            base_url: config.base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1/audio/speech".to_string()),
            voice_en: config.voice_en.clone().unwrap_or_else(|| "nova".to_string()),
            voice_te: config.voice_te.clone().unwrap_or_else(|| "shimmer".to_string()),
            label,
        })
    }

    fn voice_for(&self, lang: LanguageCode) -> &str {
        match lang {
            LanguageCode::English => &self.voice_en,
            LanguageCode::Telugu => &self.voice_te,
        }
    }
}

#[async_trait]
impl Synthesizer for OpenAISynthesizer {
    async fn synthesize(&self, text: &str, lang: LanguageCode) -> Result<String, SpeechError> {
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: self.voice_for(lang),
            response_format: "mp3",
        };
        debug!("Synthesizing {} chars of {} speech with {}", text.len(), lang.name(), self.label);

        let resp = self.http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SpeechError::Service { status: status.as_u16(), body });
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeechError::EmptyOutput);
        }
        Ok(audio_data_uri("audio/mpeg", &bytes))
    }

    fn name(&self) -> &str {
        &self.label
    }
}
