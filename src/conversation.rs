//! Per-conversation orchestration.
//!
//! A [`ConversationSession`] owns the message log and the turn state of one
//! conversation. Every operation takes `&mut self`, so a conversation never
//! has more than one reply resolution in flight. Progress is reported as
//! [`SessionEvent`]s on the channel handed out by [`ConversationSession::new`].

use crate::agent::{ ReplySource, SupportAgent };
use crate::knowledge::replies;
use crate::language::{ detect_language, LanguageCode };
use crate::llm::responder::GenerationOutcome;
use crate::models::chat::{ Message, Sender };
use crate::models::notice::Notice;
use crate::speech::data_uri::AudioRef;
use crate::speech::platform::{ PlaybackEvent, PlaybackId, SpeechPlatform, Utterance };
use crate::speech::voice::{ select_voice, VoiceInfo, VoiceShortfall };

use log::{ debug, error, info, warn };
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    UserMessageRecorded,
    AwaitingReply,
    PinCodeReply,
    FaqReply,
    GeneratedReply,
    FallbackReply,
    ReplyRecorded,
    AwaitingAudio,
}

impl From<ReplySource> for TurnState {
    fn from(source: ReplySource) -> Self {
        match source {
            ReplySource::PinCode => TurnState::PinCodeReply,
            ReplySource::Faq => TurnState::FaqReply,
            ReplySource::Generated => TurnState::GeneratedReply,
            ReplySource::Fallback => TurnState::FallbackReply,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Welcome(Message),
    MessageAppended(Message),
    AudioAttached {
        id: String,
        audio_data_uri: String,
    },
    Typing(bool),
    Recording(bool),
    Transcribing(bool),
    Transcription(String),
    Playing {
        id: String,
        playing: bool,
    },
    State(TurnState),
    Notice(Notice),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No message with id '{0}' in this conversation")]
    UnknownMessage(String),
    #[error("Message '{0}' has no audio yet")]
    NoAudio(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaybackKind {
    Audio,
    Narration,
}

#[derive(Debug, Clone)]
struct ActivePlayback {
    id: PlaybackId,
    message_id: String,
    kind: PlaybackKind,
}

pub struct ConversationSession {
    agent: Arc<SupportAgent>,
    messages: Vec<Message>,
    state: TurnState,
    voice_language: LanguageCode,
    is_bot_typing: bool,
    is_recording: bool,
    is_transcribing: bool,
    active_playback: Option<ActivePlayback>,
    telugu_voice_warning_shown: bool,
    known_voices: Vec<VoiceInfo>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl ConversationSession {
    pub fn new(
        agent: Arc<SupportAgent>,
        voice_language: LanguageCode
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            agent,
            messages: Vec::new(),
            state: TurnState::Idle,
            voice_language,
            is_bot_typing: false,
            is_recording: false,
            is_transcribing: false,
            active_playback: None,
            telugu_voice_warning_shown: false,
            known_voices: Vec::new(),
            events,
        };
        (session, rx)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn voice_language(&self) -> LanguageCode {
        self.voice_language
    }

    pub fn is_bot_typing(&self) -> bool {
        self.is_bot_typing
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn is_transcribing(&self) -> bool {
        self.is_transcribing
    }

    pub fn playing_message_id(&self) -> Option<&str> {
        self.active_playback.as_ref().map(|p| p.message_id.as_str())
    }

    fn emit(&self, event: SessionEvent) {
        // A closed receiver only means nobody is listening any more.
        let _ = self.events.send(event);
    }

    fn notify(&self, notice: Notice) {
        self.emit(SessionEvent::Notice(notice));
    }

    fn transition(&mut self, state: TurnState) {
        debug!("Turn state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.emit(SessionEvent::State(state));
    }

    fn set_typing(&mut self, typing: bool) {
        self.is_bot_typing = typing;
        self.emit(SessionEvent::Typing(typing));
    }

    fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Appends the welcome message in the selected voice language.
    pub async fn start(&mut self) -> Message {
        let welcome = Message::bot(replies::welcome_message(self.voice_language), self.voice_language);
        let index = self.append(welcome.clone());
        self.emit(SessionEvent::Welcome(welcome));
        self.attach_audio(index).await;
        self.messages[index].clone()
    }

    /// Resolves one user message. Whitespace-only input is ignored and
    /// yields `None`; otherwise the bot's reply is returned once its audio
    /// has been attached (or has failed to be).
    pub async fn submit_message(&mut self, text: &str) -> Option<Message> {
        if text.trim().is_empty() {
            return None;
        }

        let user_language = detect_language(text);
        let user_message = Message::user(text, user_language);
        self.append(user_message.clone());
        self.transition(TurnState::UserMessageRecorded);
        self.emit(SessionEvent::MessageAppended(user_message));

        self.set_typing(true);
        self.transition(TurnState::AwaitingReply);
        let resolution = self.agent.resolve_reply(text).await;
        self.transition(resolution.source.into());
        info!("Reply resolved via {:?} in {}", resolution.source, resolution.language.name());

        if resolution.generation == Some(GenerationOutcome::Failed) {
            self.notify(
                Notice::destructive(
                    "AI Response Error",
                    "Failed to get a response from the AI. Using default response."
                )
            );
        }

        let bot_message = Message::bot(resolution.text, resolution.language);
        let index = self.append(bot_message.clone());
        self.transition(TurnState::ReplyRecorded);
        self.set_typing(false);
        self.emit(SessionEvent::MessageAppended(bot_message));

        self.transition(TurnState::AwaitingAudio);
        self.attach_audio(index).await;
        self.transition(TurnState::Idle);

        Some(self.messages[index].clone())
    }

    async fn attach_audio(&mut self, index: usize) {
        let (text, language) = {
            let message = &self.messages[index];
            (message.text.clone(), message.language)
        };

        match self.agent.synthesize(&text, language).await {
            Ok(audio_data_uri) => {
                let message = &mut self.messages[index];
                message.audio_data_uri = Some(audio_data_uri.clone());
                let id = message.id.clone();
                self.emit(SessionEvent::AudioAttached { id, audio_data_uri });
            }
            Err(e) => {
                error!("Error generating speech: {}", e);
                self.notify(
                    Notice::destructive(
                        "Speech Generation Error",
                        "Failed to generate audio for the bot's response."
                    )
                );
            }
        }
    }

    /// Selects the language used for voice input and re-arms the Telugu
    /// voice advisory.
    pub fn set_voice_language(&mut self, language: LanguageCode) {
        if self.voice_language != language {
            info!("Voice language set to {}", language.name());
        }
        self.voice_language = language;
        self.telugu_voice_warning_shown = false;
    }

    pub async fn start_recording(&mut self, platform: &dyn SpeechPlatform) -> bool {
        if self.is_recording {
            return true;
        }
        match platform.start_capture().await {
            Ok(()) => {
                self.is_recording = true;
                self.emit(SessionEvent::Recording(true));
                true
            }
            Err(e) => {
                warn!("Could not start recording: {}", e);
                self.notify(Notice::destructive("Voice Recording Error", e.to_string()));
                false
            }
        }
    }

    /// Ends the capture and transcribes it in the selected voice language.
    /// The transcription is reported, not submitted.
    pub async fn stop_recording(&mut self, platform: &dyn SpeechPlatform) -> Option<String> {
        self.is_transcribing = true;
        self.emit(SessionEvent::Transcribing(true));

        let captured = platform.stop_capture().await;
        if self.is_recording {
            self.is_recording = false;
            self.emit(SessionEvent::Recording(false));
        }

        let transcription = match captured {
            Ok(Some(audio_data_uri)) => {
                self.run_transcription(&audio_data_uri, self.voice_language).await
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Recording failed: {}", e);
                self.notify(Notice::destructive("Voice Recording Error", e.to_string()));
                None
            }
        };

        self.is_transcribing = false;
        self.emit(SessionEvent::Transcribing(false));
        transcription
    }

    /// Transcribes audio captured elsewhere (e.g. by a remote client).
    pub async fn transcribe_audio(
        &mut self,
        audio_data_uri: &str,
        language: Option<LanguageCode>
    ) -> Option<String> {
        self.is_transcribing = true;
        self.emit(SessionEvent::Transcribing(true));
        let language = language.unwrap_or(self.voice_language);
        let transcription = self.run_transcription(audio_data_uri, language).await;
        self.is_transcribing = false;
        self.emit(SessionEvent::Transcribing(false));
        transcription
    }

    async fn run_transcription(&mut self, audio_data_uri: &str, language: LanguageCode) -> Option<String> {
        match self.agent.transcribe(audio_data_uri, language).await {
            Ok(text) => {
                self.emit(SessionEvent::Transcription(text.clone()));
                Some(text)
            }
            Err(e) => {
                error!("Error transcribing audio: {}", e);
                self.notify(
                    Notice::destructive("Transcription Error", "Could not transcribe audio. Please try again.")
                );
                None
            }
        }
    }

    fn mark_playing(&mut self, message_id: Option<&str>) {
        for message in self.messages.iter_mut() {
            let playing = Some(message.id.as_str()) == message_id;
            if message.is_playing_audio != playing {
                message.is_playing_audio = playing;
                let _ = self.events.send(SessionEvent::Playing { id: message.id.clone(), playing });
            }
        }
    }

    fn clear_playback(&mut self) {
        self.active_playback = None;
        self.mark_playing(None);
    }

    /// Plays a message's audio reference, cancelling whatever is playing.
    pub async fn play_message(
        &mut self,
        message_id: &str,
        platform: &dyn SpeechPlatform
    ) -> Result<(), SessionError> {
        let message = self.message(message_id).ok_or_else(||
            SessionError::UnknownMessage(message_id.to_string())
        )?;
        let audio_data_uri = message.audio_data_uri
            .clone()
            .ok_or_else(|| SessionError::NoAudio(message_id.to_string()))?;
        let language = message.language;

        platform.cancel_playback().await;
        self.active_playback = None;
        self.mark_playing(Some(message_id));

        let started = match AudioRef::parse(&audio_data_uri) {
            AudioRef::Audio { mime, bytes } => {
                match platform.play_audio(&mime, &bytes).await {
                    Ok(id) => Some((id, PlaybackKind::Audio)),
                    Err(e) => {
                        error!("Error playing audio: {}", e);
                        self.notify(Notice::destructive("Playback Error", "Could not play audio."));
                        None
                    }
                }
            }
            AudioRef::Narration { text } => {
                let utterance = self.narration_for(text, language, platform).await;
                match platform.speak(&utterance).await {
                    Ok(id) => Some((id, PlaybackKind::Narration)),
                    Err(e) => {
                        error!("Speech synthesis error: {}", e);
                        self.notify(
                            Notice::destructive(
                                "Speech Error",
                                format!("Could not speak the response. Error: {}", e)
                            )
                        );
                        None
                    }
                }
            }
            AudioRef::Unsupported { reason } => {
                warn!("Unsupported audio reference for message {}: {}", message_id, reason);
                self.notify(Notice::warning("Playback Error", "Unsupported audio format."));
                None
            }
        };

        match started {
            Some((id, kind)) => {
                self.active_playback = Some(ActivePlayback {
                    id,
                    message_id: message_id.to_string(),
                    kind,
                });
            }
            None => self.clear_playback(),
        }
        Ok(())
    }

    async fn narration_for(
        &mut self,
        text: String,
        language: LanguageCode,
        platform: &dyn SpeechPlatform
    ) -> Utterance {
        let fresh = platform.voices().await;
        // An empty list right after a populated one usually means the engine is reloading.
        if !fresh.is_empty() {
            self.known_voices = fresh;
        }

        let selection = select_voice(language, &self.known_voices);
        match (&selection.voice, selection.shortfall) {
            (Some(voice), _) => debug!("Using {} voice: {} ({})", language.name(), voice.name, voice.lang),
            (None, Some(shortfall)) if language == LanguageCode::Telugu => {
                if !self.telugu_voice_warning_shown {
                    self.notify(match shortfall {
                        VoiceShortfall::NoLanguageVoice =>
                            Notice::info(
                                "Telugu Speech Note",
                                "Your system may not have a dedicated Telugu voice. Speech quality might be affected or a default voice used."
                            ),
                        VoiceShortfall::NoVoices =>
                            Notice::info(
                                "Speech Voice Loading",
                                "System voices might still be loading. If speech doesn't work, please try again shortly."
                            ),
                    });
                    self.telugu_voice_warning_shown = true;
                }
            }
            (None, _) => {
                debug!("No specific {} voice found; relying on the language tag", language.name())
            }
        }

        Utterance {
            text,
            lang_tag: selection.lang_tag.to_string(),
            voice: selection.voice,
        }
    }

    /// Applies a platform playback event. Events from superseded playbacks are ignored.
    pub fn on_playback_event(&mut self, event: PlaybackEvent) {
        let (id, failure) = match event {
            PlaybackEvent::Finished(id) => (id, None),
            PlaybackEvent::Failed(id, reason) => (id, Some(reason)),
        };
        let Some(active) = self.active_playback.clone() else {
            debug!("Playback event for {:?} with nothing playing", id);
            return;
        };
        if active.id != id {
            debug!("Ignoring event of superseded playback {:?}", id);
            return;
        }

        if let Some(reason) = failure {
            error!("Playback of message {} failed: {}", active.message_id, reason);
            self.notify(match active.kind {
                PlaybackKind::Audio => Notice::destructive("Playback Error", "Could not play audio."),
                PlaybackKind::Narration =>
                    Notice::destructive(
                        "Speech Error",
                        format!("Could not speak the response. Error: {}", reason)
                    ),
            });
        }
        self.clear_playback();
    }

    /// Stops any playback and leaves every message not playing.
    pub async fn stop_playback(&mut self, platform: &dyn SpeechPlatform) {
        platform.cancel_playback().await;
        self.clear_playback();
    }

    pub fn last_bot_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.sender == Sender::Bot)
    }
}
