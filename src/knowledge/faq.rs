use crate::language::LanguageCode;
use serde::{ Deserialize, Serialize };

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqKeywords {
    pub en: Vec<String>,
    #[serde(default)]
    pub te: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqResponses {
    pub en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub te: Option<String>,
}

/// A static keyword-to-response record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: String,
    pub keywords: FaqKeywords,
    pub responses: FaqResponses,
}

impl FaqEntry {
    /// Keywords for `lang`, or the English list when the entry has none.
    pub fn keywords_for(&self, lang: LanguageCode) -> &[String] {
        match lang {
            LanguageCode::Telugu if !self.keywords.te.is_empty() => &self.keywords.te,
            _ => &self.keywords.en,
        }
    }

    pub fn response_for(&self, lang: LanguageCode) -> &str {
        match lang {
            LanguageCode::Telugu => self.responses.te.as_deref().unwrap_or(&self.responses.en),
            LanguageCode::English => &self.responses.en,
        }
    }

    /// `lowered_text` must already be lower-cased.
    fn matches(&self, lowered_text: &str, lang: LanguageCode) -> bool {
        self.keywords_for(lang)
            .iter()
            .any(|keyword| lowered_text.contains(&keyword.to_lowercase()))
    }
}

/// First entry (in declaration order) with a keyword contained in `text`.
pub fn find_response<'a>(faqs: &'a [FaqEntry], text: &str, lang: LanguageCode) -> Option<&'a str> {
    let lowered = text.to_lowercase();
    faqs.iter()
        .find(|faq| faq.matches(&lowered, lang))
        .map(|faq| faq.response_for(lang))
}

fn entry(id: &str, en_keywords: &[&str], te_keywords: &[&str], en: &str, te: &str) -> FaqEntry {
    FaqEntry {
        id: id.to_string(),
        keywords: FaqKeywords {
            en: en_keywords.iter().map(|k| k.to_string()).collect(),
            te: te_keywords.iter().map(|k| k.to_string()).collect(),
        },
        responses: FaqResponses {
            en: en.to_string(),
            te: Some(te.to_string()),
        },
    }
}

pub fn builtin_faqs() -> Vec<FaqEntry> {
    vec![
        entry(
            "greeting",
            &["hello", "hi", "hey", "greetings"],
            &["నమస్కారం", "హాయ్", "హలో"],
            "Hello! I am TeRA, your T-Fiber assistant. How can I help you today?",
            "నమస్కారం! నేను TeRA, మీ T-ఫైబర్ సహాయకుడిని. ఈ రోజు నేను మీకు ఎలా సహాయపడగలను?"
        ),
        entry(
            "plans",
            &["plans", "packages", "offers", "internet plans", "broadband plans"],
            &["ప్లాన్స్", "ప్యాకేజీలు", "ఆఫర్స్", "ఇంటర్నెట్ ప్లాన్స్", "బ్రాడ్‌బ్యాండ్ ప్లాన్స్"],
            "You can find our latest T-Fiber plans on our official website. We offer a variety of high-speed internet packages tailored to your needs.",
            "మీరు మా తాజా T-ఫైబర్ ప్లాన్‌లను మా అధికారిక వెబ్‌సైట్‌లో కనుగొనవచ్చు. మేము మీ అవసరాలకు అనుగుణంగా వివిధ రకాల హై-స్పీడ్ ఇంటర్నెట్ ప్యాకేజీలను అందిస్తాము."
        ),
        entry(
            "tfiber_info",
            &["what is tfiber", "about tfiber", "tfiber"],
            &["టి-ఫైబర్ అంటే ఏమిటి", "టి-ఫైబర్ గురించి", "టి-ఫైబర్"],
            "T-Fiber is a project by the Government of Telangana to provide high-speed internet connectivity across the state, including rural areas.",
            "టి-ఫైబర్ అనేది తెలంగాణ ప్రభుత్వం గ్రామీణ ప్రాంతాలతో సహా రాష్ట్రవ్యాప్తంగా హై-స్పీడ్ ఇంటర్నెట్ కనెక్టివిటీని అందించే ప్రాజెక్ట్."
        ),
        entry(
            "support",
            &["support", "customer care", "help", "issue", "problem"],
            &["సపోర్ట్", "కస్టమర్ కేర్", "సహాయం", "సమస్య"],
            "For support, please visit our contact page on the T-Fiber website or call our helpline.",
            "సహాయం కోసం, దయచేసి T-ఫైబర్ వెబ్‌సైట్‌లోని మా సంప్రదింపు పేజీని సందర్శించండి లేదా మా హెల్ప్‌లైన్‌కు కాల్ చేయండి."
        ),
        entry(
            "pincode_generic_question",
            &["service area", "availability", "check service", "my area"],
            &["సేవా ప్రాంతం", "లభ్యత", "సేవను తనిఖీ చేయండి", "నా ప్రాంతం"],
            "To check for service availability, please provide your 6-digit pin code.",
            "సేవా లభ్యతను తనిఖీ చేయడానికి, దయచేసి మీ 6-అంకెల పిన్ కోడ్‌ను అందించండి."
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_matches_case_insensitively() {
        let faqs = builtin_faqs();
        let reply = find_response(&faqs, "HELLO there", LanguageCode::English).unwrap();
        assert!(reply.starts_with("Hello! I am TeRA"));
    }

    #[test]
    fn test_unrelated_text_has_no_answer() {
        let faqs = builtin_faqs();
        assert_eq!(find_response(&faqs, "xyz unrelated", LanguageCode::English), None);
    }

    #[test]
    fn test_first_match_wins_in_declaration_order() {
        let faqs = builtin_faqs();
        // "hi" (greeting) is a substring of "this", and greeting precedes plans.
        let reply = find_response(&faqs, "this plans page", LanguageCode::English).unwrap();
        assert_eq!(reply, faqs[0].responses.en);
    }

    #[test]
    fn test_telugu_keywords_and_response() {
        let faqs = builtin_faqs();
        let reply = find_response(&faqs, "మీ ప్లాన్స్ ఏమిటి", LanguageCode::Telugu).unwrap();
        assert_eq!(reply, faqs[1].responses.te.as_deref().unwrap());
    }

    #[test]
    fn test_missing_telugu_falls_back_to_english() {
        let faqs = vec![FaqEntry {
            id: "router".to_string(),
            keywords: FaqKeywords { en: vec!["router".to_string()], te: Vec::new() },
            responses: FaqResponses { en: "Restart your router.".to_string(), te: None },
        }];
        assert_eq!(
            find_response(&faqs, "my ROUTER blinks", LanguageCode::Telugu),
            Some("Restart your router.")
        );
    }

    #[test]
    fn test_repeated_lookups_are_identical() {
        let faqs = builtin_faqs();
        let first = find_response(&faqs, "customer care number", LanguageCode::English);
        let second = find_response(&faqs, "customer care number", LanguageCode::English);
        assert_eq!(first, second);
    }
}
