use crate::language::LanguageCode;
use clap::Parser;
use std::str::FromStr;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for the generative fallback (ollama, openai, gemini)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "ollama")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (e.g., OpenAI, Gemini)
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4o-mini, llama3.2:3b, gemini-2.0-flash)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    // --- Speech Args ---
    /// Speech transcription provider (gemini, none)
    #[arg(long, env = "TRANSCRIBER_TYPE", default_value = "none")]
    pub transcriber_type: String,

    /// API Key for the transcription provider. Defaults to CHAT_API_KEY if not set.
    #[arg(long, env = "TRANSCRIBER_API_KEY")]
    pub transcriber_api_key: Option<String>,

    /// Model used for transcription (e.g., gemini-2.0-flash)
    #[arg(long, env = "TRANSCRIBER_MODEL")]
    pub transcriber_model: Option<String>,

    /// Base URL for the transcription provider API.
    #[arg(long, env = "TRANSCRIBER_BASE_URL")]
    pub transcriber_base_url: Option<String>,

    /// Speech synthesis provider (narration, openai). Narration leaves speaking to the platform.
    #[arg(long, env = "SYNTHESIZER_TYPE", default_value = "narration")]
    pub synthesizer_type: String,

    /// API Key for the synthesis provider. Defaults to CHAT_API_KEY if not set.
    #[arg(long, env = "SYNTHESIZER_API_KEY")]
    pub synthesizer_api_key: Option<String>,

    /// Model used for synthesis (e.g., tts-1)
    #[arg(long, env = "SYNTHESIZER_MODEL")]
    pub synthesizer_model: Option<String>,

    /// Endpoint for the synthesis provider.
    #[arg(long, env = "SYNTHESIZER_BASE_URL")]
    pub synthesizer_base_url: Option<String>,

    /// Synthesis voice for English replies.
    #[arg(long, env = "SYNTHESIZER_VOICE_EN")]
    pub synthesizer_voice_en: Option<String>,

    /// Synthesis voice for Telugu replies.
    #[arg(long, env = "SYNTHESIZER_VOICE_TE")]
    pub synthesizer_voice_te: Option<String>,

    // --- Knowledge Args ---
    /// Path to the prompt configuration file.
    #[arg(long, env = "PROMPTS_PATH", default_value = "json/prompts.json")]
    pub prompts_path: String,

    /// Optional JSON file replacing the built-in FAQ table and serviceable pin codes.
    #[arg(long, env = "KNOWLEDGE_PATH")]
    pub knowledge_path: Option<String>,

    /// Language selected for voice input when a conversation starts (en, te).
    #[arg(long, env = "DEFAULT_LANGUAGE", default_value = "en", value_parser = LanguageCode::from_str)]
    pub default_language: LanguageCode,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional host address and port for the HTTP JSON API.
    #[arg(long, env = "HTTP_ADDR")]
    pub http_addr: Option<String>,

    /// Optional API Key required for clients to connect. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS/HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS/HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    // --- Terminal Args ---
    /// Chat in the terminal with the local microphone and speakers instead of serving clients.
    #[arg(long, env = "INTERACTIVE", default_value = "false")]
    pub interactive: bool,

    /// Play each bot reply as soon as its audio is ready (terminal mode).
    #[arg(long, env = "AUTOPLAY", default_value = "false")]
    pub autoplay: bool,

    /// Recorder command; the output WAV path is appended.
    #[arg(long, env = "RECORDER_CMD", default_value = "arecord -q -f S16_LE -r 16000 -c 1 -t wav")]
    pub recorder_cmd: String,

    /// Audio player command; the file path is appended.
    #[arg(long, env = "PLAYER_CMD", default_value = "aplay -q")]
    pub player_cmd: String,

    /// espeak-compatible narrator used when no generated audio exists.
    #[arg(long, env = "NARRATOR_CMD", default_value = "espeak-ng")]
    pub narrator_cmd: String,
}

impl Args {
    pub fn tls_enabled(&self) -> bool {
        self.enable_tls && self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_language_is_parsed_at_startup() {
        let args = Args::try_parse_from(["tfiber-assistant", "--default-language", "te"]).unwrap();
        assert_eq!(args.default_language, LanguageCode::Telugu);

        let err = Args::try_parse_from(["tfiber-assistant", "--default-language", "fr"]).unwrap_err();
        assert!(err.to_string().contains("Unsupported language"));
    }
}
