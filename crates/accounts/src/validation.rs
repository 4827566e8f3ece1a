//! Input checks. Each check appends field messages to a [`Checks`]
//! collector so a request reports every problem at once.

use std::sync::LazyLock;

use common::{AppError, AppResult, FieldError};
use regex::Regex;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("static regex"));

pub const PHONE_MESSAGE: &str =
    "Phone number must be 9-15 digits. Can start with + or country code.";
pub const PASSWORD_MIN_LEN: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "passw0rd", "12345678", "123456789",
    "1234567890", "11111111", "qwerty123", "qwertyuiop", "iloveyou", "abc12345",
    "letmein1", "welcome1", "admin123", "sunshine", "princess", "football", "baseball",
    "trustno1", "dragon12", "monkey12", "superman", "changeme",
];

#[derive(Debug, Default)]
pub struct Checks(Vec<FieldError>);

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn finish(self) -> AppResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }

    /// `email` must already be normalized.
    pub fn email(&mut self, email: &str) {
        if email.is_empty() {
            self.push("email", "This field may not be blank.");
        } else if !EMAIL.is_match(email) {
            self.push("email", "Enter a valid email address.");
        }
    }

    /// `name` must already be normalized.
    pub fn name(&mut self, name: &str) {
        let chars = name.chars().count();
        if chars == 0 {
            self.push("name", "This field may not be blank.");
        } else if chars < 2 {
            self.push("name", "Ensure this field has at least 2 characters.");
        } else if chars > 255 {
            self.push("name", "Ensure this field has no more than 255 characters.");
        }
    }

    pub fn phone(&mut self, field: &str, phone: Option<&str>) {
        if let Some(phone) = phone {
            if !PHONE.is_match(phone) {
                self.push(field, PHONE_MESSAGE);
            }
        }
    }

    /// Non-empty password, used where no strength policy applies.
    pub fn password_present(&mut self, password: &str) {
        if password.is_empty() {
            self.push("password", "This field may not be blank.");
        }
    }

    /// Strength policy applied at self-registration.
    pub fn password_policy(&mut self, password: &str, email: &str) {
        for message in password_violations(password, email) {
            self.push("password", message);
        }
    }

    pub fn required_text(&mut self, field: &str, value: &str, max: usize) {
        let chars = value.chars().count();
        if chars == 0 {
            self.push(field, "This field may not be blank.");
        } else if chars > max {
            self.push(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
        }
    }

    pub fn experience_years(&mut self, years: i32) {
        if years < 0 {
            self.push(
                "experience_years",
                "Ensure this value is greater than or equal to 0.",
            );
        } else if years > 70 {
            self.push(
                "experience_years",
                "Ensure this value is less than or equal to 70.",
            );
        }
    }
}

/// Every policy violation for `password`; empty when it is acceptable.
pub fn password_violations(password: &str, email: &str) -> Vec<String> {
    let mut out = Vec::new();
    if password.chars().count() < PASSWORD_MIN_LEN {
        out.push(format!(
            "This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        out.push("This password is entirely numeric.".to_string());
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        out.push("This password is too common.".to_string());
    }
    let local = email.split('@').next().unwrap_or_default().to_lowercase();
    if local.len() >= 3 && lowered.contains(&local) {
        out.push("The password is too similar to the email address.".to_string());
    }
    out
}
