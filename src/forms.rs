//! Client-side input validation, applied before any network call.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern compiles"));

pub const TITLE_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 1_000;
pub const PASSWORD_MIN_CHARS: usize = 8;

fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title is required".to_string());
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(format!(
            "Title must be less than {} characters",
            TITLE_MAX_CHARS
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(format!(
            "Description must be less than {} characters",
            DESCRIPTION_MAX_CHARS
        ));
    }
    Ok(())
}

/// Title is required and bounded; the description only bounded.
pub fn validate_task_form(title: &str, description: Option<&str>) -> Result<(), String> {
    validate_title(title)?;
    if let Some(description) = description {
        validate_description(description)?;
    }
    Ok(())
}

/// For partial updates. Each supplied field is checked on its own, so a
/// description-only edit still gets the length bound applied.
pub fn validate_task_update(title: Option<&str>, description: Option<&str>) -> Result<(), String> {
    if let Some(title) = title {
        validate_title(title)?;
    }
    if let Some(description) = description {
        validate_description(description)?;
    }
    Ok(())
}

pub fn validate_login(email: &str, password: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }
    if !EMAIL_RE.is_match(email) {
        return Err("Email is invalid".to_string());
    }
    if password.is_empty() {
        return Err("Password is required".to_string());
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_CHARS
        ));
    }
    Ok(())
}

pub fn validate_signup(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }
    validate_login(email, password)?;
    if password != confirm_password {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}

/// Split a comma-separated tag string, trimming whitespace and
/// dropping empty entries.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
