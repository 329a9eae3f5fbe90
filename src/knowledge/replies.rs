//! Fixed bilingual texts used outside the FAQ table.

use crate::language::LanguageCode;

pub fn welcome_message(lang: LanguageCode) -> &'static str {
    match lang {
        LanguageCode::English =>
            "Hello! I'm TeRA, your T-Fiber assistant. How can I help you with our services, plans, or check serviceability in your area today?",
        LanguageCode::Telugu =>
            "నమస్కారం! నేను TeRA, మీ T-ఫైబర్ సహాయకుడిని. ఈ రోజు మా సేవలు, ప్లాన్‌లు లేదా మీ ప్రాంతంలో సేవా లభ్యతను తనిఖీ చేయడంలో నేను మీకు ఎలా సహాయపడగలను?",
    }
}

/// Returned when the generator answers with nothing usable.
pub fn empty_output_apology(lang: LanguageCode) -> &'static str {
    match lang {
        LanguageCode::English => "Sorry, I couldn't process your request at the moment. Please try again.",
        LanguageCode::Telugu =>
            "క్షమించండి, నేను మీ అభ్యర్థనను ప్రస్తుతం ప్రాసెస్ చేయలేకపోయాను. దయచేసి మళ్ళీ ప్రయత్నించండి.",
    }
}

/// Returned when the generator could not be invoked.
pub fn failure_apology(lang: LanguageCode) -> &'static str {
    match lang {
        LanguageCode::English => "Sorry, an error occurred. Please try again.",
        LanguageCode::Telugu => "క్షమించండి, ఒక లోపం సంభవించింది. దయచేసి మళ్ళీ ప్రయత్నించండి.",
    }
}
