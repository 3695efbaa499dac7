//! Plate text validation.
//!
//! OCR output is normalized (uppercased, everything outside `[A-Z0-9]` dropped)
//! and accepted only when it matches the plate grammar: two digits, one to three
//! letters, two to five digits. Rejection is not an error; a frame whose OCR
//! output does not validate is simply another observation with no reading.

use std::sync::OnceLock;
use std::time::Instant;

/// Plate grammar over the normalized form (no separators).
pub const PLATE_PATTERN: &str = r"^[0-9]{2}[A-Z]{1,3}[0-9]{2,5}$";

/// A validated plate string and the frame it was read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlateReading {
    text: String,
    frame_index: u64,
    observed_at: Instant,
}

impl PlateReading {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }
}

/// Uppercase and strip every character outside `[A-Z0-9]`.
pub fn normalize_plate_text(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// True when an already-normalized string satisfies the plate grammar.
pub fn is_valid_plate(normalized: &str) -> bool {
    static PLATE_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = PLATE_RE.get_or_init(|| regex::Regex::new(PLATE_PATTERN).unwrap());
    re.is_match(normalized)
}

/// Normalize raw OCR text and return a reading if it is a plausible plate.
pub fn validate_plate(raw: &str, frame_index: u64, observed_at: Instant) -> Option<PlateReading> {
    let text = normalize_plate_text(raw);
    if !is_valid_plate(&text) {
        return None;
    }
    Some(PlateReading {
        text,
        frame_index,
        observed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(raw: &str) -> Option<String> {
        validate_plate(raw, 0, Instant::now()).map(|r| r.text().to_string())
    }

    #[test]
    fn accepts_spaced_plate_after_normalization() {
        assert_eq!(check("34 ABC 123").as_deref(), Some("34ABC123"));
    }

    #[test]
    fn normalizes_case_and_punctuation() {
        assert_eq!(check("06-xyz-999").as_deref(), Some("06XYZ999"));
        assert_eq!(check(" 35.a.12 ").as_deref(), Some("35A12"));
    }

    #[test]
    fn rejects_leading_letters() {
        assert_eq!(check("AB1234"), None);
    }

    #[test]
    fn rejects_empty_and_noise() {
        assert_eq!(check(""), None);
        assert_eq!(check("   "), None);
        assert_eq!(check("!!??"), None);
    }

    #[test]
    fn enforces_group_lengths() {
        // one leading digit
        assert_eq!(check("4ABC123"), None);
        // four letters
        assert_eq!(check("34ABCD123"), None);
        // one trailing digit
        assert_eq!(check("34ABC1"), None);
        // six trailing digits
        assert_eq!(check("34ABC123456"), None);
        assert_eq!(check("34A12345").as_deref(), Some("34A12345"));
    }

    #[test]
    fn reading_keeps_frame_metadata() {
        let at = Instant::now();
        let reading = validate_plate("34abc123", 42, at).unwrap();
        assert_eq!(reading.frame_index(), 42);
        assert_eq!(reading.observed_at(), at);
    }
}
