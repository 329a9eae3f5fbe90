#![allow(dead_code)]

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::atomic::{ AtomicBool, AtomicU64, AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };

use tfiber_assistant::agent::SupportAgent;
use tfiber_assistant::config::prompt::PromptConfig;
use tfiber_assistant::conversation::SessionEvent;
use tfiber_assistant::knowledge::KnowledgeBase;
use tfiber_assistant::language::LanguageCode;
use tfiber_assistant::llm::chat::{ ChatClient, CompletionResponse };
use tfiber_assistant::llm::responder::GenerativeResponder;
use tfiber_assistant::speech::SpeechError;
use tfiber_assistant::speech::data_uri::{ audio_data_uri, narration_data_uri };
use tfiber_assistant::speech::platform::{
    CaptureError,
    PlaybackError,
    PlaybackId,
    SpeechPlatform,
    Utterance,
};
use tfiber_assistant::speech::synthesis::Synthesizer;
use tfiber_assistant::speech::transcription::Transcriber;
use tfiber_assistant::speech::voice::VoiceInfo;
use tokio::sync::mpsc::UnboundedReceiver;

pub struct FakeChat {
    pub reply: Result<String, String>,
    pub calls: AtomicUsize,
}

impl FakeChat {
    pub fn answering(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(reply.to_string()), calls: AtomicUsize::new(0) })
    }

    pub fn failing(error: &str) -> Arc<Self> {
        Arc::new(Self { reply: Err(error.to_string()), calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn complete(
        &self,
        _prompt: &str
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(CompletionResponse { response: text.clone() }),
            Err(e) => Err(e.clone().into()),
        }
    }

    fn get_model(&self) -> String {
        "fake-chat".to_string()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

pub struct FakeTranscriber {
    pub result: Option<String>,
    pub languages: Mutex<Vec<LanguageCode>>,
}

impl FakeTranscriber {
    pub fn hearing(text: &str) -> Arc<Self> {
        Arc::new(Self { result: Some(text.to_string()), languages: Mutex::new(Vec::new()) })
    }

    pub fn deaf() -> Arc<Self> {
        Arc::new(Self { result: None, languages: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio_data_uri: &str, lang: LanguageCode) -> Result<String, SpeechError> {
        self.languages.lock().unwrap().push(lang);
        self.result.clone().ok_or(SpeechError::EmptyOutput)
    }

    fn name(&self) -> &str {
        "fake-transcriber"
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SynthMode {
    Narration,
    Audio,
    Unsupported,
    Failing,
}

pub struct FakeSynthesizer {
    pub mode: SynthMode,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _lang: LanguageCode) -> Result<String, SpeechError> {
        match self.mode {
            SynthMode::Narration => Ok(narration_data_uri(text)),
            SynthMode::Audio => Ok(audio_data_uri("audio/mpeg", &[0xff, 0xfb, 0x90, 0x00])),
            SynthMode::Unsupported => Ok("https://example.invalid/reply.mp3".to_string()),
            SynthMode::Failing => Err(SpeechError::Service { status: 500, body: "boom".to_string() }),
        }
    }

    fn name(&self) -> &str {
        "fake-synthesizer"
    }
}

pub fn agent(
    chat: Arc<FakeChat>,
    transcriber: Arc<FakeTranscriber>,
    synth: SynthMode
) -> Arc<SupportAgent> {
    let responder = GenerativeResponder::new(chat, Arc::new(PromptConfig::default()));
    Arc::new(
        SupportAgent::from_parts(
            KnowledgeBase::default(),
            responder,
            transcriber,
            Arc::new(FakeSynthesizer { mode: synth })
        )
    )
}

#[derive(Default)]
pub struct FakePlatform {
    pub voices: Mutex<Vec<VoiceInfo>>,
    pub deny_microphone: AtomicBool,
    pub fail_capture: AtomicBool,
    pub capturing: AtomicBool,
    pub spoken: Mutex<Vec<Utterance>>,
    pub played: Mutex<Vec<(String, usize)>>,
    pub cancels: AtomicUsize,
    next_id: AtomicU64,
}

impl FakePlatform {
    pub fn with_voices(voices: Vec<VoiceInfo>) -> Self {
        let platform = Self::default();
        *platform.voices.lock().unwrap() = voices;
        platform
    }

    pub fn last_id(&self) -> PlaybackId {
        PlaybackId(self.next_id.load(Ordering::SeqCst))
    }

    fn next(&self) -> PlaybackId {
        PlaybackId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl SpeechPlatform for FakePlatform {
    async fn start_capture(&self) -> Result<(), CaptureError> {
        if self.deny_microphone.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied);
        }
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRecording);
        }
        Ok(())
    }

    async fn stop_capture(&self) -> Result<Option<String>, CaptureError> {
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(CaptureError::Failed("device unplugged".to_string()));
        }
        Ok(Some("data:audio/wav;base64,UklGRg==".to_string()))
    }

    async fn play_audio(&self, mime: &str, bytes: &[u8]) -> Result<PlaybackId, PlaybackError> {
        self.played.lock().unwrap().push((mime.to_string(), bytes.len()));
        Ok(self.next())
    }

    async fn speak(&self, utterance: &Utterance) -> Result<PlaybackId, PlaybackError> {
        self.spoken.lock().unwrap().push(utterance.clone());
        Ok(self.next())
    }

    async fn cancel_playback(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    async fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.lock().unwrap().clone()
    }
}

pub fn voice(name: &str, lang: &str) -> VoiceInfo {
    VoiceInfo { name: name.to_string(), lang: lang.to_string(), is_default: false, id: None }
}

pub fn drain(events: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

pub fn notice_titles(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Notice(n) => Some(n.title.clone()),
            _ => None,
        })
        .collect()
}
