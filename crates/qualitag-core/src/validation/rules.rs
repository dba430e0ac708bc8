//! Pure field rules shared by every validator

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use validator::ValidateEmail;

use crate::error::{QualitagError, QualitagResult};

/// Usernames: letters, digits and underscore
static VALID_USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,20}$").unwrap());

/// `"1 user"`, `"2 users"`
pub fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// Trim a required field and reject it when nothing is left
pub fn required(label: &str, value: &str) -> QualitagResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(QualitagError::validation(format!("{} cannot be empty", label)));
    }
    Ok(trimmed.to_string())
}

/// Character-count bounds, inclusive
pub fn check_length(label: &str, value: &str, min: usize, max: usize) -> QualitagResult<()> {
    let length = value.chars().count();
    if length < min {
        return Err(QualitagError::validation(format!(
            "{} must be at least {} long",
            label,
            pluralize(min, "character")
        )));
    }
    if length > max {
        return Err(QualitagError::validation(format!(
            "{} cannot be longer than {}",
            label,
            pluralize(max, "character")
        )));
    }
    Ok(())
}

/// Optional free text: trimmed, templated when missing or blank, bounded above
pub fn description_or_default(
    label: &str,
    value: Option<&str>,
    default: impl FnOnce() -> String,
    max: usize,
) -> QualitagResult<String> {
    let description = match value.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => default(),
    };
    check_length(label, &description, 0, max)?;
    Ok(description)
}

/// Trim and lower-case a list of emails, rejecting blanks.
///
/// With `allow_duplicates` repeated entries collapse to one; otherwise the
/// first repeat fails naming the address.
pub fn normalize_emails(emails: &[String], allow_duplicates: bool) -> QualitagResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(emails.len());
    for raw in emails {
        let email = raw.trim().to_lowercase();
        if email.is_empty() {
            return Err(QualitagError::validation(
                "There is an empty email in the list. Please remove it.",
            ));
        }
        if !seen.insert(email.clone()) {
            if allow_duplicates {
                continue;
            }
            return Err(QualitagError::validation(format!(
                "User with email {} is mentioned more than once",
                email
            )));
        }
        normalized.push(email);
    }
    Ok(normalized)
}

/// Inclusive bounds on a list size
pub fn check_cardinality(
    label: &str,
    noun: &str,
    count: usize,
    min: usize,
    max: usize,
) -> QualitagResult<()> {
    if count < min {
        return Err(QualitagError::validation(format!(
            "Too few {noun}s: {} must have at least {}",
            label,
            pluralize(min, noun)
        )));
    }
    if count > max {
        return Err(QualitagError::validation(format!(
            "Too many {noun}s: {} cannot have more than {}",
            label,
            pluralize(max, noun)
        )));
    }
    Ok(())
}

/// A supplied creation timestamp must be positive and not in the future
pub fn check_created_at(
    label: &str,
    value: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> QualitagResult<DateTime<Utc>> {
    match value {
        None => Ok(now),
        Some(ts) if ts.timestamp_millis() <= 0 => Err(QualitagError::validation(format!(
            "{} creation date must be a positive timestamp",
            label
        ))),
        Some(ts) if ts > now => Err(QualitagError::validation(format!(
            "{} creation date cannot be in the future",
            label
        ))),
        Some(ts) => Ok(ts),
    }
}

pub fn check_email(email: &str) -> QualitagResult<()> {
    if !email.validate_email() {
        return Err(QualitagError::validation(format!("Invalid email address: {}", email)));
    }
    Ok(())
}

pub fn check_username(username: &str) -> QualitagResult<()> {
    if !VALID_USERNAME.is_match(username) {
        return Err(QualitagError::validation(format!(
            "Invalid username '{}': use 3 to 20 letters, digits or underscores",
            username
        )));
    }
    Ok(())
}
