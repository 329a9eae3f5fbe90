//! Best-effort narration voice selection.
//!
//! Preference order: a voice of the language whose name mentions "female",
//! the language's default voice, any voice of the language, and finally no
//! explicit voice (the narrator falls back to the language tag alone).

use crate::language::LanguageCode;
use serde::{ Deserialize, Serialize };

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    /// BCP 47 style tag as reported by the platform, e.g. `te-IN` or `en-us`.
    pub lang: String,
    #[serde(default)]
    pub is_default: bool,
    /// Identifier the narrator selects the voice by (espeak's `File` column, e.g. `mb/mb-us1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl VoiceInfo {
    pub fn speaks(&self, lang: LanguageCode) -> bool {
        let tag = self.lang.to_lowercase();
        let code = lang.code();
        tag == code || tag.starts_with(&format!("{}-", code)) || tag.starts_with(&format!("{}_", code))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceShortfall {
    /// The platform reported no voices at all (possibly still loading).
    NoVoices,
    /// Voices exist, none for the requested language.
    NoLanguageVoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSelection {
    pub voice: Option<VoiceInfo>,
    pub lang_tag: &'static str,
    pub shortfall: Option<VoiceShortfall>,
}

pub fn select_voice(lang: LanguageCode, voices: &[VoiceInfo]) -> VoiceSelection {
    let in_language = || voices.iter().filter(move |v| v.speaks(lang));

    let voice = in_language()
        .find(|v| v.name.to_lowercase().contains("female"))
        .or_else(|| in_language().find(|v| v.is_default))
        .or_else(|| in_language().next())
        .cloned();

    let shortfall = match (&voice, voices.is_empty()) {
        (Some(_), _) => None,
        (None, true) => Some(VoiceShortfall::NoVoices),
        (None, false) => Some(VoiceShortfall::NoLanguageVoice),
    };

    VoiceSelection { voice, lang_tag: lang.speech_tag(), shortfall }
}
