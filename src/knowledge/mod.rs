pub mod faq;
pub mod pincode;
pub mod replies;

use crate::language::LanguageCode;
use faq::FaqEntry;
use log::info;
use serde::Deserialize;
use std::collections::{ BTreeSet, HashSet };
use std::fs;
use std::path::Path;
use thiserror::Error;

const BUILTIN_PIN_CODES: [&str; 5] = ["500001", "500033", "500081", "501510", "502319"];

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse knowledge file '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Duplicate FAQ id '{0}'")]
    DuplicateFaq(String),
    #[error("FAQ '{0}' has no English keywords")]
    MissingKeywords(String),
    #[error("Invalid serviceable pin code '{0}' (expected six Arabic digits)")]
    InvalidPinCode(String),
}

#[derive(Deserialize)]
struct KnowledgeFile {
    faqs: Vec<FaqEntry>,
    serviceable_pin_codes: Vec<String>,
}

/// Static FAQ list and serviceable pin codes. Immutable once built.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    faqs: Vec<FaqEntry>,
    serviceable_pin_codes: HashSet<String>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self {
            faqs: faq::builtin_faqs(),
            serviceable_pin_codes: BUILTIN_PIN_CODES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl KnowledgeBase {
    pub fn new(
        faqs: Vec<FaqEntry>,
        serviceable_pin_codes: Vec<String>
    ) -> Result<Self, KnowledgeError> {
        let mut seen = HashSet::new();
        for entry in &faqs {
            if !seen.insert(entry.id.as_str()) {
                return Err(KnowledgeError::DuplicateFaq(entry.id.clone()));
            }
            if entry.keywords.en.iter().all(|k| k.trim().is_empty()) {
                return Err(KnowledgeError::MissingKeywords(entry.id.clone()));
            }
        }
        if let Some(bad) = serviceable_pin_codes.iter().find(|p| !pincode::is_valid_pin_code(p)) {
            return Err(KnowledgeError::InvalidPinCode(bad.clone()));
        }

        Ok(Self {
            faqs,
            serviceable_pin_codes: serviceable_pin_codes.into_iter().collect(),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KnowledgeError> {
        let display = path.as_ref().display().to_string();
        let text = fs::read_to_string(&path).map_err(|source| KnowledgeError::Io {
            path: display.clone(),
            source,
        })?;
        let file: KnowledgeFile = serde_json::from_str(&text).map_err(|source| KnowledgeError::Json {
            path: display.clone(),
            source,
        })?;
        let kb = Self::new(file.faqs, file.serviceable_pin_codes)?;
        info!(
            "Loaded knowledge base from {}: {} FAQ entries, {} serviceable pin codes",
            display,
            kb.faqs.len(),
            kb.serviceable_pin_codes.len()
        );
        Ok(kb)
    }

    pub fn faqs(&self) -> &[FaqEntry] {
        &self.faqs
    }

    pub fn serviceable_pin_codes(&self) -> BTreeSet<&str> {
        self.serviceable_pin_codes.iter().map(|p| p.as_str()).collect()
    }

    pub fn faq_response(&self, text: &str, lang: LanguageCode) -> Option<&str> {
        faq::find_response(&self.faqs, text, lang)
    }

    /// Pin codes are compared after digit normalization.
    pub fn is_serviceable(&self, pin: &str) -> bool {
        self.serviceable_pin_codes.contains(&pincode::normalize_digits(pin))
    }

    pub fn serviceability_message(&self, pin: &str, lang: LanguageCode) -> String {
        let pin = pincode::normalize_digits(pin);
        pincode::serviceability_message(&pin, self.is_serviceable(&pin), lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_serviceability() {
        let kb = KnowledgeBase::default();
        assert!(kb.serviceability_message("500001", LanguageCode::English).contains("available"));
        assert!(
            kb
                .serviceability_message("999999", LanguageCode::English)
                .contains("not available")
        );
        assert!(kb.is_serviceable("౫౦౦౦౦౧"));
    }

    #[test]
    fn test_serviceability_is_idempotent() {
        let kb = KnowledgeBase::default();
        let a = kb.serviceability_message("500081", LanguageCode::Telugu);
        let b = kb.serviceability_message("500081", LanguageCode::Telugu);
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "faqs": [
                    {{
                        "id": "outage",
                        "keywords": {{ "en": ["outage", "down"] }},
                        "responses": {{ "en": "We are aware of an outage in some areas." }}
                    }}
                ],
                "serviceable_pin_codes": ["500072"]
            }}"#
        ).unwrap();

        let kb = KnowledgeBase::load(file.path()).unwrap();
        assert_eq!(kb.faqs().len(), 1);
        assert!(kb.is_serviceable("500072"));
        assert!(!kb.is_serviceable("500001"));
        assert_eq!(
            kb.faq_response("internet is DOWN", LanguageCode::Telugu),
            Some("We are aware of an outage in some areas.")
        );
    }

    #[test]
    fn test_rejects_invalid_tables() {
        let faqs = faq::builtin_faqs();
        let mut duplicated = faqs.clone();
        duplicated.push(faqs[0].clone());
        assert!(matches!(
            KnowledgeBase::new(duplicated, vec![]),
            Err(KnowledgeError::DuplicateFaq(id)) if id == "greeting"
        ));
        assert!(matches!(
            KnowledgeBase::new(faqs, vec!["12345".to_string()]),
            Err(KnowledgeError::InvalidPinCode(_))
        ));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = KnowledgeBase::load("/nonexistent/knowledge.json").unwrap_err();
        assert!(matches!(err, KnowledgeError::Io { .. }));
    }
}
