use crate::language::LanguageCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::{ info, warn };

pub const SUPPORT_PERSONA: &str = "support_persona";

const DEFAULT_SUPPORT_PERSONA: &str =
    "You are TeRA, a friendly and helpful AI assistant for T-Fiber, a high-speed internet service provider in Telangana, India.
Your goal is to answer user questions about T-Fiber services, plans, coverage, troubleshooting, and general inquiries related to T-Fiber.
The user is asking in {language}. Please respond in {language}. If the question is in English, respond in English. If the question is in Telugu, respond in Telugu.

User's question: {text}

Provide a concise and helpful answer. If you don't know the answer or if the question is unrelated to T-Fiber, politely state that you cannot help with that specific query. Do not make up information.
If asked about specific current plans or pricing, state that the most up-to-date information can be found on the official T-Fiber website.
";

#[derive(Debug)]
pub enum PromptError {
    TemplateNotFound(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::TemplateNotFound(key) => write!(f, "Prompt template '{}' not found", key),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub response_templates: HashMap<String, String>,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        let mut response_templates = HashMap::new();
        response_templates.insert(SUPPORT_PERSONA.to_string(), DEFAULT_SUPPORT_PERSONA.to_string());
        Self { response_templates, last_loaded: None }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if !self.response_templates.contains_key(SUPPORT_PERSONA) {
            return Err(
                PromptError::TemplateNotFound(format!("response_templates:{}", SUPPORT_PERSONA))
            );
        }
        Ok(())
    }
}

pub fn load_prompts_from_str(json: &str) -> Result<PromptConfig, PromptError> {
    let mut config: PromptConfig = serde_json::from_str(json)?;
    config.validate()?;
    config.last_loaded = Some(SystemTime::now());
    Ok(config)
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let config = load_prompts_from_str(&file_content)?;
    Ok(Arc::new(config))
}

/// Loads the prompt file, or the built-in persona when the file does not exist.
pub fn load_prompts_or_default(path: &str) -> Result<Arc<PromptConfig>, Box<dyn Error + Send + Sync>> {
    if !Path::new(path).exists() {
        warn!("Prompts file '{}' not found, using the built-in support persona.", path);
        return Ok(Arc::new(PromptConfig::default()));
    }
    let config = load_prompts(path).map_err(|e|
        format!("Failed to load prompts file '{}': {}", path, e)
    )?;
    info!("Loaded prompts from: {}", path);
    Ok(config)
}

pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;

    if let Ok(modified) = metadata.modified() {
        if let Some(last_loaded) = current_config.last_loaded {
            if modified > last_loaded {
                info!("Prompts file changed, reloading...");
                return load_prompts(&path).map(Some);
            }
        } else {
            info!("No last_loaded timestamp, reloading prompts...");
            return load_prompts(&path).map(Some);
        }
    }
    Ok(None)
}

fn get_response_template<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.response_templates
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("response_templates:{}", key)))
}

pub fn get_persona_prompt(
    config: &PromptConfig,
    text: &str,
    lang: LanguageCode
) -> Result<String, PromptError> {
    let template = get_response_template(config, SUPPORT_PERSONA)?;
    Ok(template.replace("{language}", lang.name()).replace("{text}", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_persona_renders_language_and_question() {
        let config = PromptConfig::default();
        let prompt = get_persona_prompt(&config, "Is there an outage?", LanguageCode::Telugu).unwrap();
        assert!(prompt.contains("The user is asking in Telugu"));
        assert!(prompt.contains("User's question: Is there an outage?"));
        assert!(prompt.contains("official T-Fiber website"));
    }

    #[test]
    fn test_file_without_persona_is_rejected() {
        let err = load_prompts_from_str(r#"{ "response_templates": { "other": "x" } }"#).unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound(_)));
    }

    #[test]
    fn test_reload_only_when_file_is_newer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "response_templates": {{ "support_persona": "Answer in {{language}}: {{text}}" }} }}"#).unwrap();

        let loaded = load_prompts(file.path()).unwrap();
        assert_eq!(
            get_persona_prompt(&loaded, "hi", LanguageCode::English).unwrap(),
            "Answer in English: hi"
        );
        assert!(reload_prompts_if_changed(file.path(), &loaded).unwrap().is_none());

        let never_loaded = Arc::new(PromptConfig::default());
        assert!(reload_prompts_if_changed(file.path(), &never_loaded).unwrap().is_some());
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = load_prompts_or_default("/nonexistent/prompts.json").unwrap();
        assert!(config.response_templates.contains_key(SUPPORT_PERSONA));
    }
}
