//! Schema-level rules shared by every message write.

use crate::error::{DomainError, Result};

/// Upper bound on message content, counted in characters after trimming.
pub const MAX_CONTENT_CHARS: usize = 5000;

/// Upper bound on an author identifier.
pub const MAX_AUTHOR_ID_CHARS: usize = 128;

/// Trims `raw` and checks it is between 1 and [`MAX_CONTENT_CHARS`] characters.
pub fn validate_content(raw: &str) -> Result<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(DomainError::validation("content must not be empty"));
    }
    let len = content.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(DomainError::validation(format!(
            "content is {len} characters, maximum is {MAX_CONTENT_CHARS}"
        )));
    }
    Ok(content.to_string())
}

pub(crate) fn validate_author_id(raw: &str) -> Result<String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(DomainError::validation("author id is required"));
    }
    if id.chars().count() > MAX_AUTHOR_ID_CHARS {
        return Err(DomainError::validation(format!(
            "author id exceeds {MAX_AUTHOR_ID_CHARS} characters"
        )));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | ':')))
    {
        return Err(DomainError::validation(format!(
            "author id contains invalid character {bad:?}"
        )));
    }
    Ok(id.to_string())
}
