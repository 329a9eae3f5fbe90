use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

/// Telugu Unicode block.
const TELUGU_BLOCK: std::ops::RangeInclusive<char> = '\u{0C00}'..='\u{0C7F}';

/// The two languages the assistant speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LanguageCode {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "te")]
    Telugu,
}

impl LanguageCode {
    pub fn code(&self) -> &'static str {
        match self {
            LanguageCode::English => "en",
            LanguageCode::Telugu => "te",
        }
    }

    /// BCP 47 tag handed to narration engines.
    pub fn speech_tag(&self) -> &'static str {
        match self {
            LanguageCode::English => "en-US",
            LanguageCode::Telugu => "te-IN",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LanguageCode::English => "English",
            LanguageCode::Telugu => "Telugu",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "eng" | "english" | "en-us" | "en-in" => Some(LanguageCode::English),
            "te" | "tel" | "telugu" | "te-in" => Some(LanguageCode::Telugu),
            _ => None,
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLanguageError {
    message: String,
}

impl fmt::Display for ParseLanguageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLanguageError {}

impl FromStr for LanguageCode {
    type Err = ParseLanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageCode::from_str_loose(s).ok_or_else(|| ParseLanguageError {
            message: format!("Unsupported language: '{}' (expected 'en' or 'te')", s),
        })
    }
}

/// Classifies text as Telugu when any character falls in the Telugu block.
pub fn detect_language(text: &str) -> LanguageCode {
    if text.chars().any(|c| TELUGU_BLOCK.contains(&c)) {
        LanguageCode::Telugu
    } else {
        LanguageCode::English
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_telugu_script() {
        assert_eq!(detect_language("నమస్కారం"), LanguageCode::Telugu);
        assert_eq!(detect_language("my pin is ౫౦౦౦౦౧"), LanguageCode::Telugu);
    }

    #[test]
    fn test_ascii_is_english() {
        assert_eq!(detect_language("What plans do you offer?"), LanguageCode::English);
        assert_eq!(detect_language(""), LanguageCode::English);
    }

    #[test]
    fn test_other_indic_scripts_are_not_telugu() {
        // Devanagari sits outside the Telugu block.
        assert_eq!(detect_language("नमस्ते"), LanguageCode::English);
    }

    #[test]
    fn test_parse_and_serde_codes() {
        assert_eq!("te".parse::<LanguageCode>().unwrap(), LanguageCode::Telugu);
        assert_eq!("English".parse::<LanguageCode>().unwrap(), LanguageCode::English);
        assert!("fr".parse::<LanguageCode>().is_err());

        let json = serde_json::to_string(&LanguageCode::Telugu).unwrap();
        assert_eq!(json, "\"te\"");
        let back: LanguageCode = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(back, LanguageCode::English);
    }
}
