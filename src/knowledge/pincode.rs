use crate::language::LanguageCode;
use once_cell::sync::Lazy;
use regex::Regex;

/// Six Arabic digits (group 1) or six Telugu digits (group 2), word bounded
/// so that runs inside longer numbers never match.
static PIN_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:([0-9]{6})|([౦-౯]{6}))\b").expect("pin code pattern is valid")
});

const TELUGU_DIGITS: [(char, char); 10] = [
    ('౦', '0'),
    ('౧', '1'),
    ('౨', '2'),
    ('౩', '3'),
    ('౪', '4'),
    ('౫', '5'),
    ('౬', '6'),
    ('౭', '7'),
    ('౮', '8'),
    ('౯', '9'),
];

fn telugu_digit_to_arabic(c: char) -> char {
    TELUGU_DIGITS.iter()
        .find(|(telugu, _)| *telugu == c)
        .map(|(_, arabic)| *arabic)
        .unwrap_or(c)
}

pub fn normalize_digits(text: &str) -> String {
    text.chars().map(telugu_digit_to_arabic).collect()
}

/// Returns the first pin code in `text`, normalized to Arabic digits.
pub fn extract_pin_code(text: &str) -> Option<String> {
    let captures = PIN_CODE_PATTERN.captures(text)?;
    if let Some(arabic) = captures.get(1) {
        return Some(arabic.as_str().to_string());
    }
    captures.get(2).map(|telugu| normalize_digits(telugu.as_str()))
}

pub fn is_valid_pin_code(pin: &str) -> bool {
    pin.len() == 6 && pin.bytes().all(|b| b.is_ascii_digit())
}

pub fn serviceability_message(pin: &str, serviceable: bool, lang: LanguageCode) -> String {
    match (serviceable, lang) {
        (true, LanguageCode::English) =>
            format!("Great news! T-Fiber service is available in your area (Pin Code: {}).", pin),
        (true, LanguageCode::Telugu) =>
            format!("శుభవార్త! మీ ప్రాంతంలో (పిన్ కోడ్: {}) T-ఫైబర్ సేవ అందుబాటులో ఉంది.", pin),
        (false, LanguageCode::English) =>
            format!(
                "We are expanding rapidly! Currently, T-Fiber service is not available for Pin Code: {}, but please check back soon.",
                pin
            ),
        (false, LanguageCode::Telugu) =>
            format!(
                "మేము వేగంగా విస్తరిస్తున్నాము! ప్రస్తుతం, పిన్ కోడ్: {} కోసం T-ఫైబర్ సేవ అందుబాటులో లేదు, దయచేసి త్వరలో మళ్ళీ తనిఖీ చేయండి.",
                pin
            ),
    }
}
