use super::chat::Message;
use super::notice::{ Notice, Severity };
use crate::language::LanguageCode;
use serde::{ Serialize, Deserialize };

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "voice", rename_all = "camelCase")] Voice {
        audio_data_uri: String,
        #[serde(default)]
        language: Option<LanguageCode>,
    },
    #[serde(rename = "set_language")] SetLanguage {
        language: LanguageCode,
    },
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "welcome")] Welcome {
        message: Message,
    },
    #[serde(rename = "typing")]
    Typing,
    #[serde(rename = "message")] Message {
        message: Message,
    },
    #[serde(rename = "audio", rename_all = "camelCase")] Audio {
        id: String,
        audio_data_uri: String,
    },
    #[serde(rename = "transcription")] Transcription {
        text: String,
    },
    #[serde(rename = "notice")] Notice {
        title: String,
        description: String,
        variant: Severity,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

impl From<Notice> for ServerMessage {
    fn from(notice: Notice) -> Self {
        ServerMessage::Notice {
            title: notice.title,
            description: notice.description,
            variant: notice.severity,
        }
    }
}
