use super::data_uri::AudioRef;
use super::SpeechError;
use crate::language::LanguageCode;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{ debug, info };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// `audio_data_uri` must be a `data:audio/*` URI.
    async fn transcribe(
        &self,
        audio_data_uri: &str,
        lang: LanguageCode
    ) -> Result<String, SpeechError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriberType {
    Gemini,
    Disabled,
}

impl FromStr for TranscriberType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(TranscriberType::Gemini),
            "none" | "disabled" | "" => Ok(TranscriberType::Disabled),
            _ => Err(format!("Unsupported transcriber type: {}", s)),
        }
    }
}

impl fmt::Display for TranscriberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriberType::Gemini => write!(f, "gemini"),
            TranscriberType::Disabled => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    pub transcriber_type: TranscriberType,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

pub fn new_transcriber(
    config: &TranscriberConfig
) -> Result<Arc<dyn Transcriber>, Box<dyn StdError + Send + Sync>> {
    let transcriber: Arc<dyn Transcriber> = match config.transcriber_type {
        TranscriberType::Gemini => Arc::new(GeminiTranscriber::from_config(config)?),
        TranscriberType::Disabled => Arc::new(DisabledTranscriber),
    };
    info!("Transcriber configured: {}", transcriber.name());
    Ok(transcriber)
}

pub struct DisabledTranscriber;

#[async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe(&self, _audio_data_uri: &str, _lang: LanguageCode) -> Result<String, SpeechError> {
        Err(SpeechError::NotConfigured("voice transcription".to_string()))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Multimodal transcription through Gemini `generateContent`.
pub struct GeminiTranscriber {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    label: String,
}

impl GeminiTranscriber {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "gemini-2.0-flash".to_string());
        let label = format!("gemini:{}", model);
        Self {
            http: HttpClient::new(),
            api_key,
            model,
            base_url: base_url.unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            label,
        }
    }

    pub fn from_config(config: &TranscriberConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| "Google API key is required for GeminiTranscriber".to_string())?;
        Ok(Self::new(api_key, config.model.clone(), config.base_url.clone()))
    }

    fn instruction(lang: LanguageCode) -> String {
        format!(
            "You are a multilingual transcription expert. Please transcribe the following audio data into text, using the specified language.\n\nLanguage: {}\nReturn only the transcription.",
            lang.name()
        )
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn transcribe(
        &self,
        audio_data_uri: &str,
        lang: LanguageCode
    ) -> Result<String, SpeechError> {
        let (mime, bytes) = match AudioRef::parse(audio_data_uri) {
            AudioRef::Audio { mime, bytes } => (mime, bytes),
            AudioRef::Narration { .. } => {
                return Err(SpeechError::InvalidAudio("expected audio, got narration text".to_string()));
            }
            AudioRef::Unsupported { reason } => {
                return Err(SpeechError::InvalidAudio(reason));
            }
        };

        let payload = GenerateContentRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text { text: Self::instruction(lang) },
                    GeminiPart::InlineData {
                        inline_data: InlineData { mime_type: mime, data: BASE64.encode(&bytes) },
                    }
                ],
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        debug!("Transcribing {} bytes of audio with {}", bytes.len(), self.label);

        let resp = self.http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SpeechError::Service { status: status.as_u16(), body });
        }

        let body: GenerateContentResponse = resp.json().await?;
        let transcription = body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(SpeechError::EmptyOutput)?;

        Ok(transcription)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transcriber_type() {
        assert_eq!("gemini".parse::<TranscriberType>().unwrap(), TranscriberType::Gemini);
        assert_eq!("none".parse::<TranscriberType>().unwrap(), TranscriberType::Disabled);
        assert!("whisper".parse::<TranscriberType>().is_err());
    }

    #[test]
    fn test_gemini_requires_key() {
        let config = TranscriberConfig {
            transcriber_type: TranscriberType::Gemini,
            api_key: Some(String::new()),
            model: None,
            base_url: None,
        };
        assert!(new_transcriber(&config).is_err());
    }

    #[tokio::test]
    async fn test_disabled_transcriber_errors() {
        let err = DisabledTranscriber
            .transcribe("data:audio/wav;base64,AAEC", LanguageCode::English).await
            .unwrap_err();
        assert!(matches!(err, SpeechError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_gemini_rejects_non_audio_before_calling_out() {
        let transcriber = GeminiTranscriber::new("key".to_string(), None, Some("http://127.0.0.1:9".to_string()));
        let err = transcriber
            .transcribe("data:text/plain;charset=utf-8,hello", LanguageCode::English).await
            .unwrap_err();
        assert!(matches!(err, SpeechError::InvalidAudio(_)));
    }

    #[test]
    fn test_inline_part_shape() {
        let part = GeminiPart::InlineData {
            inline_data: InlineData { mime_type: "audio/wav".to_string(), data: "AAEC".to_string() },
        };
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            serde_json::json!({ "inline_data": { "mime_type": "audio/wav", "data": "AAEC" } })
        );
    }
}
