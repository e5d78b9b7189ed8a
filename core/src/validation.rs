//! Field-level validation shared by every request DTO.
//!
//! Handlers call [`Validate::validate`] before touching the store. Failures
//! collect into a single [`Error::Validation`] so the client sees every
//! problem with the payload at once instead of one round-trip per field.

use chrono::{DateTime, Duration, Utc};

use crate::error::Error;

/// Implemented by request DTOs that need field-level checks beyond what
/// `serde` already enforces (required fields, types).
pub trait Validate {
    fn validate(&self) -> Result<(), Error>;
}

/// Joins multiple field errors into one [`Error::Validation`], or returns
/// `Ok(())` if `errors` is empty.
pub fn collect(errors: Vec<String>) -> Result<(), Error> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors.join("; ")))
    }
}

/// Rejects empty strings, strings over `max_len`, and any ASCII control
/// character (newlines and tabs included) that isn't plain whitespace.
pub fn non_empty_text(field: &str, value: &str, max_len: usize) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some(format!("{field} must not be empty"));
    }
    if value.chars().count() > max_len {
        return Some(format!("{field} must be at most {max_len} characters"));
    }
    if value.chars().any(|c| c.is_control() && c != ' ') {
        return Some(format!("{field} must not contain control characters"));
    }
    None
}

/// A `tags` array: at most `max_items`, each 1-`max_len` alphanumeric
/// (plus `-`/`_`) characters.
pub fn tag_list(field: &str, tags: &[String], max_items: usize, max_len: usize) -> Option<String> {
    if tags.len() > max_items {
        return Some(format!("{field} must have at most {max_items} tags"));
    }
    for tag in tags {
        if tag.is_empty() || tag.chars().count() > max_len {
            return Some(format!("{field} entries must be 1-{max_len} characters"));
        }
        if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Some(format!("{field} entries must be alphanumeric"));
        }
    }
    None
}

/// Checks `value` falls within `[min, max]` inclusive.
pub fn in_range_i32(field: &str, value: i32, min: i32, max: i32) -> Option<String> {
    if value < min || value > max {
        Some(format!("{field} must be between {min} and {max}"))
    } else {
        None
    }
}

/// Quest/task deadlines must land between one hour and one year from now,
/// per the platform's reward-abuse guardrails.
pub fn deadline_within_bounds(field: &str, deadline: DateTime<Utc>) -> Option<String> {
    let now = Utc::now();
    if deadline < now + Duration::hours(1) {
        return Some(format!("{field} must be at least 1 hour from now"));
    }
    if deadline > now + Duration::days(365) {
        return Some(format!("{field} must be at most 1 year from now"));
    }
    None
}

/// A minimal, RFC 5322-adjacent email shape check: one `@`, a non-empty
/// local part, and a domain part containing at least one `.`.
pub fn email(field: &str, value: &str) -> Option<String> {
    let mut parts = value.splitn(2, '@');
    match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => None,
        _ => Some(format!("{field} must be a valid email address")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_rejects_blank_and_oversized() {
        assert!(non_empty_text("title", "", 10).is_some());
        assert!(non_empty_text("title", "   ", 10).is_some());
        assert!(non_empty_text("title", &"x".repeat(11), 10).is_some());
        assert!(non_empty_text("title", "ok", 10).is_none());
    }

    #[test]
    fn non_empty_text_rejects_control_characters() {
        assert!(non_empty_text("title", "line1\nline2", 100).is_some());
    }

    #[test]
    fn tag_list_enforces_count_and_shape() {
        let too_many: Vec<String> = (0..11).map(|i| format!("tag{i}")).collect();
        assert!(tag_list("tags", &too_many, 10, 20).is_some());

        let bad_chars = vec!["has space".to_string()];
        assert!(tag_list("tags", &bad_chars, 10, 20).is_some());

        let ok = vec!["fitness".to_string(), "daily_habit".to_string()];
        assert!(tag_list("tags", &ok, 10, 20).is_none());
    }

    #[test]
    fn in_range_i32_enforces_bounds() {
        assert!(in_range_i32("rewardXp", -1, 0, 1000).is_some());
        assert!(in_range_i32("rewardXp", 1001, 0, 1000).is_some());
        assert!(in_range_i32("rewardXp", 500, 0, 1000).is_none());
    }

    #[test]
    fn deadline_must_be_between_one_hour_and_one_year_out() {
        assert!(deadline_within_bounds("deadline", Utc::now() + Duration::minutes(5)).is_some());
        assert!(deadline_within_bounds("deadline", Utc::now() + Duration::days(400)).is_some());
        assert!(deadline_within_bounds("deadline", Utc::now() + Duration::days(30)).is_none());
    }

    #[test]
    fn email_requires_at_sign_and_dotted_domain() {
        assert!(email("email", "not-an-email").is_some());
        assert!(email("email", "user@localhost").is_some());
        assert!(email("email", "user@example.com").is_none());
    }
}
