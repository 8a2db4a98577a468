//! Field-level rules shared by accounts, tags and recipes.
//!
//! The same bounds are repeated as `CHECK`/`UNIQUE` constraints in the schema;
//! these functions reject bad input before a transaction is opened.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::RequestError;

pub const MIN_VALUE: i64 = 1;
pub const MAX_VALUE: i64 = 32000;

pub const LIMIT_USERNAME: usize = 150;
pub const LIMIT_NAME: usize = 150;
pub const LIMIT_EMAIL: usize = 254;
pub const LIMIT_RECIPE_NAME: usize = 200;
pub const LIMIT_TAG_NAME: usize = 200;
pub const LIMIT_TAG_SLUG: usize = 200;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+\z").expect("valid regex"));
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid regex"));
static COLOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

pub fn validate_range(field: &str, value: i64) -> Result<(), RequestError> {
    if !(MIN_VALUE..=MAX_VALUE).contains(&value) {
        return Err(RequestError::validation(format!(
            "{field} must be between {MIN_VALUE} and {MAX_VALUE}"
        )));
    }
    Ok(())
}

/// Free text with no length cap, such as a recipe description.
pub fn validate_required(field: &str, value: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        return Err(RequestError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub fn validate_text(field: &str, value: &str, limit: usize) -> Result<(), RequestError> {
    validate_required(field, value)?;
    if value.chars().count() > limit {
        return Err(RequestError::validation(format!(
            "{field} must be at most {limit} characters"
        )));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), RequestError> {
    validate_text("username", username, LIMIT_USERNAME)?;
    if !USERNAME_RE.is_match(username) {
        return Err(RequestError::validation(
            "username may contain only letters, digits and @/./+/-/_",
        ));
    }
    if username == "me" {
        return Err(RequestError::validation("username \"me\" is reserved"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), RequestError> {
    validate_text("email", email, LIMIT_EMAIL)?;
    if !EMAIL_RE.is_match(email) {
        return Err(RequestError::validation("email is not a valid address"));
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), RequestError> {
    validate_text("slug", slug, LIMIT_TAG_SLUG)?;
    if !SLUG_RE.is_match(slug) {
        return Err(RequestError::validation(
            "slug may contain only latin letters, digits, - and _",
        ));
    }
    Ok(())
}

pub fn validate_color(color: &str) -> Result<(), RequestError> {
    if !COLOR_RE.is_match(color) {
        return Err(RequestError::validation("color must be a hex value like #E26C2D"));
    }
    Ok(())
}

/// Fails with `duplicate {what}` on the first id seen twice.
pub fn ensure_unique_ids(what: &str, ids: impl IntoIterator<Item = i64>) -> Result<(), RequestError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(RequestError::validation(format!("duplicate {what}")));
        }
    }
    Ok(())
}
