//! Password policy enforcement for account registration and resets.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::DomainError;

pub const MIN_PASSWORD_LEN: usize = 10;
pub const MAX_PASSWORD_LEN: usize = 128;

static UPPERCASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]").expect("valid regex"));
static LOWERCASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]").expect("valid regex"));
static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("valid regex"));
static SPECIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).expect("valid regex"));
static REPEATED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(.)\1{3,}").expect("valid regex"));

/// Prefixes of passwords rejected outright as too guessable.
const COMMON_PATTERNS: &[&str] = &[
    "password", "123456", "qwerty", "abc123", "letmein", "welcome", "admin", "login", "test",
];

/// Validate a candidate password against the platform strength policy.
///
/// `context_words` carries user-derived strings (email local part, username,
/// first/last name) that the password must not be based on.
pub fn validate_password(password: &str, context_words: &[&str]) -> Result<(), DomainError> {
    let mut problems = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push(format!(
            "password must contain at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if password.chars().count() > MAX_PASSWORD_LEN {
        problems.push(format!(
            "password must not exceed {MAX_PASSWORD_LEN} characters"
        ));
    }
    if !UPPERCASE.is_match(password) {
        problems.push("password must contain at least one uppercase letter".to_string());
    }
    if !LOWERCASE.is_match(password) {
        problems.push("password must contain at least one lowercase letter".to_string());
    }
    if !DIGIT.is_match(password) {
        problems.push("password must contain at least one digit".to_string());
    }
    if !SPECIAL.is_match(password) {
        problems.push("password must contain at least one special character".to_string());
    }
    if REPEATED.is_match(password) {
        problems
            .push("password must not contain more than 3 identical consecutive characters"
                .to_string());
    }

    let lowered = password.to_lowercase();
    if COMMON_PATTERNS
        .iter()
        .any(|pattern| lowered.starts_with(pattern))
    {
        problems.push("password is too common or predictable".to_string());
    }

    for word in context_words {
        let word = word.trim().to_lowercase();
        if word.len() >= 3 && lowered.contains(&word) {
            problems.push("password must not be based on personal information".to_string());
            break;
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(DomainError::validation(problems.join("; ")))
    }
}
