//! Canonical forms for stored strings.

/// Trimmed, lowercased email.
pub fn email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Trimmed name with internal whitespace runs collapsed to one space.
pub fn name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed, uppercased licence number.
pub fn license_number(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Trim optional free text; blank values become `None`.
pub fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
