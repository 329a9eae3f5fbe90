use crate::language::LanguageCode;
use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One entry of the conversation log. Only `audio_data_uri` and
/// `is_playing_audio` change after the message is appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub language: LanguageCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data_uri: Option<String>,
    #[serde(default)]
    pub is_playing_audio: bool,
}

impl Message {
    pub fn new(text: impl Into<String>, sender: Sender, language: LanguageCode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
            language,
            audio_data_uri: None,
            is_playing_audio: false,
        }
    }

    pub fn user(text: impl Into<String>, language: LanguageCode) -> Self {
        Self::new(text, Sender::User, language)
    }

    pub fn bot(text: impl Into<String>, language: LanguageCode) -> Self {
        Self::new(text, Sender::Bot, language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_is_camel_case() {
        let mut message = Message::bot("Hi", LanguageCode::Telugu);
        message.audio_data_uri = Some("data:text/plain;charset=utf-8,Hi".to_string());
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["sender"], "bot");
        assert_eq!(value["language"], "te");
        assert_eq!(value["audioDataUri"], "data:text/plain;charset=utf-8,Hi");
        assert_eq!(value["isPlayingAudio"], false);
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Message::user("a", LanguageCode::English);
        let b = Message::user("a", LanguageCode::English);
        assert_ne!(a.id, b.id);
    }
}
