//! Generative fallback: the last tier of reply resolution.
//!
//! The chat client is asked to answer as the T-Fiber support persona. Any
//! failure is absorbed here and turned into a localized apology, so callers
//! always receive text to show.

use crate::config::prompt::{ self, PromptConfig, PromptError };
use crate::knowledge::replies;
use crate::language::LanguageCode;
use crate::llm::chat::ChatClient;
use log::{ error, info, warn };
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::{ Arc, RwLock };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated,
    EmptyOutput,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    pub outcome: GenerationOutcome,
}

impl GeneratedReply {
    fn apology(lang: LanguageCode, outcome: GenerationOutcome) -> Self {
        let text = match outcome {
            GenerationOutcome::Failed => replies::failure_apology(lang),
            _ => replies::empty_output_apology(lang),
        };
        Self { text: text.to_string(), outcome }
    }
}

pub struct GenerativeResponder {
    client: Arc<dyn ChatClient>,
    prompts: RwLock<Arc<PromptConfig>>,
}

impl GenerativeResponder {
    pub fn new(client: Arc<dyn ChatClient>, prompts: Arc<PromptConfig>) -> Self {
        Self { client, prompts: RwLock::new(prompts) }
    }

    fn current_prompts(&self) -> Arc<PromptConfig> {
        let guard = self.prompts.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn model_name(&self) -> String {
        self.client.get_model()
    }

    pub async fn respond(&self, text: &str, lang: LanguageCode) -> GeneratedReply {
        let prompts = self.current_prompts();
        let prompt = match prompt::get_persona_prompt(&prompts, text, lang) {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to render support persona prompt: {}", e);
                return GeneratedReply::apology(lang, GenerationOutcome::Failed);
            }
        };

        match self.client.complete(&prompt).await {
            Ok(completion) => match extract_response_text(&completion.response) {
                Some(reply) => GeneratedReply { text: reply, outcome: GenerationOutcome::Generated },
                None => {
                    warn!(
                        "Generator ({}) returned empty or malformed output for a {} question",
                        self.client.get_model(),
                        lang.name()
                    );
                    GeneratedReply::apology(lang, GenerationOutcome::EmptyOutput)
                }
            },
            Err(e) => {
                error!("Error generating chat response with {}: {}", self.client.get_model(), e);
                GeneratedReply::apology(lang, GenerationOutcome::Failed)
            }
        }
    }

    /// Swaps in the prompt file when it changed on disk. Returns whether it did.
    pub fn reload_prompts_if_changed<P: AsRef<Path>>(&self, path: P) -> Result<bool, PromptError> {
        let current = self.current_prompts();
        match prompt::reload_prompts_if_changed(path, &current)? {
            Some(new_config) => {
                let mut guard = self.prompts.write().unwrap_or_else(|poisoned| poisoned.into_inner());
                *guard = new_config;
                info!("Support persona prompts reloaded");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

/// Plain text is taken as is; a JSON object must carry a non-empty `responseText`.
fn extract_response_text(raw: &str) -> Option<String> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return None;
    }
    if body.starts_with('{') {
        if let Ok(JsonValue::Object(map)) = serde_json::from_str::<JsonValue>(body) {
            return map
                .get("responseText")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }
    }
    Some(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::CompletionResponse;
    use async_trait::async_trait;
    use std::error::Error as StdError;
    use std::sync::Mutex;

    struct ScriptedClient {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(reply: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn complete(
            &self,
            prompt: &str
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(CompletionResponse { response: text.clone() }),
                Err(e) => Err(e.clone().into()),
            }
        }

        fn get_model(&self) -> String {
            "scripted".to_string()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    fn responder(client: Arc<ScriptedClient>) -> GenerativeResponder {
        GenerativeResponder::new(client, Arc::new(PromptConfig::default()))
    }

    #[tokio::test]
    async fn test_generated_text_is_returned() {
        let client = ScriptedClient::new(Ok("  Our installation takes 3-5 days.  "));
        let reply = responder(client.clone()).respond("installation time?", LanguageCode::English).await;
        assert_eq!(reply.outcome, GenerationOutcome::Generated);
        assert_eq!(reply.text, "Our installation takes 3-5 days.");

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("User's question: installation time?"));
        assert!(prompts[0].contains("respond in English"));
    }

    #[tokio::test]
    async fn test_empty_output_gives_apology() {
        let reply = responder(ScriptedClient::new(Ok("   "))).respond("?", LanguageCode::Telugu).await;
        assert_eq!(reply.outcome, GenerationOutcome::EmptyOutput);
        assert_eq!(reply.text, replies::empty_output_apology(LanguageCode::Telugu));
    }

    #[tokio::test]
    async fn test_failure_gives_error_apology() {
        let reply = responder(ScriptedClient::new(Err("connection refused")))
            .respond("?", LanguageCode::English).await;
        assert_eq!(reply.outcome, GenerationOutcome::Failed);
        assert_eq!(reply.text, "Sorry, an error occurred. Please try again.");
    }

    #[test]
    fn test_structured_output_is_unwrapped() {
        assert_eq!(
            extract_response_text(r#"```json
{"responseText": "Visit the official website."}
```"#),
            Some("Visit the official website.".to_string())
        );
        assert_eq!(extract_response_text(r#"{"answer": "x"}"#), None);
        assert_eq!(extract_response_text(r#"{"responseText": ""}"#), None);
        assert_eq!(extract_response_text("{not json"), Some("{not json".to_string()));
    }
}
