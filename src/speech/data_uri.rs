//! Self-describing audio references carried as RFC 2397 data URIs.
//!
//! Two media families are understood: `audio/*` payloads holding generated or
//! recorded sound, and `text/plain` payloads asking the platform to narrate
//! the text itself.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use percent_encoding::{ percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC };

/// Same set of characters JavaScript's `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioRef {
    Audio {
        mime: String,
        bytes: Vec<u8>,
    },
    Narration {
        text: String,
    },
    Unsupported {
        reason: String,
    },
}

impl AudioRef {
    pub fn parse(uri: &str) -> AudioRef {
        let Some(rest) = uri.strip_prefix("data:") else {
            return AudioRef::Unsupported { reason: "not a data URI".to_string() };
        };
        let Some((header, payload)) = rest.split_once(',') else {
            return AudioRef::Unsupported { reason: "data URI has no payload".to_string() };
        };

        let mut params = header.split(';');
        let mime = params.next().unwrap_or_default().trim().to_lowercase();
        let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

        let bytes = if is_base64 {
            match BASE64.decode(payload.trim()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    return AudioRef::Unsupported { reason: format!("invalid base64 payload: {}", e) };
                }
            }
        } else {
            percent_decode_str(payload).collect::<Vec<u8>>()
        };

        if mime.starts_with("audio/") {
            AudioRef::Audio { mime, bytes }
        } else if mime == "text/plain" {
            match String::from_utf8(bytes) {
                Ok(text) => AudioRef::Narration { text },
                Err(_) => AudioRef::Unsupported { reason: "narration text is not UTF-8".to_string() },
            }
        } else {
            AudioRef::Unsupported { reason: format!("unsupported media type '{}'", mime) }
        }
    }
}

pub fn audio_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

pub fn narration_data_uri(text: &str) -> String {
    format!("data:text/plain;charset=utf-8,{}", utf8_percent_encode(text, URI_COMPONENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narration_uri_matches_uri_component_encoding() {
        assert_eq!(
            narration_data_uri("Hi there! (T-Fiber)"),
            "data:text/plain;charset=utf-8,Hi%20there!%20(T-Fiber)"
        );
    }

    #[test]
    fn test_parses_telugu_narration() {
        let text = "నమస్కారం! నేను TeRA";
        assert_eq!(
            AudioRef::parse(&narration_data_uri(text)),
            AudioRef::Narration { text: text.to_string() }
        );
    }

    #[test]
    fn test_parses_base64_audio() {
        let uri = "data:audio/webm;codecs=opus;base64,AAEC";
        assert_eq!(
            AudioRef::parse(uri),
            AudioRef::Audio { mime: "audio/webm".to_string(), bytes: vec![0, 1, 2] }
        );
        assert_eq!(audio_data_uri("audio/wav", &[0, 1, 2]), "data:audio/wav;base64,AAEC");
    }

    #[test]
    fn test_rejects_other_references() {
        assert!(matches!(AudioRef::parse("https://example.com/a.mp3"), AudioRef::Unsupported { .. }));
        assert!(matches!(AudioRef::parse("data:image/png;base64,AAEC"), AudioRef::Unsupported { .. }));
        assert!(matches!(AudioRef::parse("data:audio/wav;base64,@@@"), AudioRef::Unsupported { .. }));
    }
}
