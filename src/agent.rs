use crate::cli::Args;
use crate::config::prompt::{ self, PromptError };
use crate::knowledge::KnowledgeBase;
use crate::knowledge::pincode::extract_pin_code;
use crate::language::{ detect_language, LanguageCode };
use crate::llm::LlmConfig;
use crate::llm::chat::new_client as new_chat_client;
use crate::llm::responder::{ GeneratedReply, GenerationOutcome, GenerativeResponder };
use crate::speech::SpeechError;
use crate::speech::synthesis::{ new_synthesizer, Synthesizer, SynthesizerConfig };
use crate::speech::transcription::{ new_transcriber, Transcriber, TranscriberConfig };

use log::{ debug, info };
use serde::{ Deserialize, Serialize };
use std::error::Error;
use std::sync::Arc;

/// Which tier of the decision chain produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    PinCode,
    Faq,
    Generated,
    /// The generator failed or answered with nothing usable; the text is an apology.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    pub language: LanguageCode,
    pub source: ReplySource,
    /// Set only when the generator was consulted.
    pub generation: Option<GenerationOutcome>,
}

/// Stateless reply service shared by every conversation.
pub struct SupportAgent {
    knowledge: KnowledgeBase,
    responder: GenerativeResponder,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    prompts_path: String,
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value.to_string()) }
}

impl SupportAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_config = LlmConfig {
            llm_type: args.chat_llm_type.parse()?,
            base_url: args.chat_base_url.clone(),
            api_key: non_empty(&args.chat_api_key),
            completion_model: args.chat_model.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={:?}",
            args.chat_llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let transcriber = new_transcriber(
            &(TranscriberConfig {
                transcriber_type: args.transcriber_type.parse()?,
                api_key: args.transcriber_api_key
                    .clone()
                    .or_else(|| non_empty(&args.chat_api_key)),
                model: args.transcriber_model.clone(),
                base_url: args.transcriber_base_url.clone(),
            })
        )?;

        let synthesizer = new_synthesizer(
            &(SynthesizerConfig {
                synthesizer_type: args.synthesizer_type.parse()?,
                api_key: args.synthesizer_api_key
                    .clone()
                    .or_else(|| non_empty(&args.chat_api_key)),
                model: args.synthesizer_model.clone(),
                base_url: args.synthesizer_base_url.clone(),
                voice_en: args.synthesizer_voice_en.clone(),
                voice_te: args.synthesizer_voice_te.clone(),
            })
        )?;

        let knowledge = match &args.knowledge_path {
            Some(path) => KnowledgeBase::load(path)?,
            None => {
                info!("Using built-in FAQ table and serviceable pin codes");
                KnowledgeBase::default()
            }
        };

        let prompts = prompt::load_prompts_or_default(&args.prompts_path)?;
        let responder = GenerativeResponder::new(chat_client, prompts);

        let mut agent = Self::from_parts(knowledge, responder, transcriber, synthesizer);
        agent.prompts_path = args.prompts_path.clone();
        Ok(agent)
    }

    pub fn from_parts(
        knowledge: KnowledgeBase,
        responder: GenerativeResponder,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>
    ) -> Self {
        Self {
            knowledge,
            responder,
            transcriber,
            synthesizer,
            prompts_path: "json/prompts.json".to_string(),
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Pin code first, then the FAQ table, then the generator. Replies in the
    /// language detected from `text`.
    pub async fn resolve_reply(&self, text: &str) -> Resolution {
        let language = detect_language(text);

        if let Some(pin) = extract_pin_code(text) {
            debug!("Pin code {} found in user message", pin);
            return Resolution {
                text: self.knowledge.serviceability_message(&pin, language),
                language,
                source: ReplySource::PinCode,
                generation: None,
            };
        }

        if let Some(answer) = self.knowledge.faq_response(text, language) {
            return Resolution {
                text: answer.to_string(),
                language,
                source: ReplySource::Faq,
                generation: None,
            };
        }

        let GeneratedReply { text, outcome } = self.responder.respond(text, language).await;
        let source = match outcome {
            GenerationOutcome::Generated => ReplySource::Generated,
            GenerationOutcome::EmptyOutput | GenerationOutcome::Failed => ReplySource::Fallback,
        };
        Resolution { text, language, source, generation: Some(outcome) }
    }

    /// Generative tier alone, in the caller's language.
    pub async fn generate(&self, text: &str, language: LanguageCode) -> GeneratedReply {
        self.responder.respond(text, language).await
    }

    pub async fn transcribe(
        &self,
        audio_data_uri: &str,
        language: LanguageCode
    ) -> Result<String, SpeechError> {
        self.transcriber.transcribe(audio_data_uri, language).await
    }

    pub async fn synthesize(&self, text: &str, language: LanguageCode) -> Result<String, SpeechError> {
        self.synthesizer.synthesize(text, language).await
    }

    pub fn reload_prompts_if_changed(&self) -> Result<bool, PromptError> {
        self.responder.reload_prompts_if_changed(&self.prompts_path)
    }

    pub fn describe(&self) -> String {
        format!(
            "generator={}, transcriber={}, synthesizer={}, faqs={}",
            self.responder.model_name(),
            self.transcriber.name(),
            self.synthesizer.name(),
            self.knowledge.faqs().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompt::PromptConfig;
    use crate::llm::chat::{ ChatClient, CompletionResponse };
    use crate::speech::synthesis::NarrationSynthesizer;
    use crate::speech::transcription::DisabledTranscriber;
    use async_trait::async_trait;
    use std::error::Error as StdError;
    use std::sync::atomic::{ AtomicUsize, Ordering };

    struct CountingClient {
        reply: Result<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatClient for CountingClient {
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
            "counting".to_string()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    fn agent_with(reply: Result<&str, &str>) -> (SupportAgent, Arc<CountingClient>) {
        let client = Arc::new(CountingClient {
            reply: reply.map(str::to_string).map_err(str::to_string),
            calls: AtomicUsize::new(0),
        });
        let responder = GenerativeResponder::new(client.clone(), Arc::new(PromptConfig::default()));
        let agent = SupportAgent::from_parts(
            KnowledgeBase::default(),
            responder,
            Arc::new(DisabledTranscriber),
            Arc::new(NarrationSynthesizer)
        );
        (agent, client)
    }

    #[tokio::test]
    async fn test_pin_code_wins_over_faq_keywords() {
        let (agent, client) = agent_with(Ok("unused"));
        let resolution = agent.resolve_reply("hello, what plans are there for 500033?").await;
        assert_eq!(resolution.source, ReplySource::PinCode);
        assert!(resolution.text.contains("500033"));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_faq_answers_without_generator() {
        let (agent, client) = agent_with(Ok("unused"));
        let resolution = agent.resolve_reply("hello").await;
        assert_eq!(resolution.source, ReplySource::Faq);
        assert_eq!(resolution.language, LanguageCode::English);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generator_is_last_resort() {
        let (agent, client) = agent_with(Ok("Outages are posted on the website."));
        let resolution = agent.resolve_reply("is there an outage in Warangal").await;
        assert_eq!(resolution.source, ReplySource::Generated);
        assert_eq!(resolution.text, "Outages are posted on the website.");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generator_failure_becomes_fallback() {
        let (agent, _client) = agent_with(Err("connection refused"));
        let resolution = agent.resolve_reply("ఇంటర్నెట్ నెమ్మదిగా ఉంది").await;
        assert_eq!(resolution.source, ReplySource::Fallback);
        assert_eq!(resolution.language, LanguageCode::Telugu);
        assert_eq!(resolution.generation, Some(GenerationOutcome::Failed));
    }
}
