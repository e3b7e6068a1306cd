use regex::Regex;
use std::sync::LazyLock;

use super::ApiError;
use super::types::{PageParams, PageQuery};
use crate::config::ServerConfig;

const MAX_NAME_LENGTH: usize = 150;
const MAX_EMAIL_LENGTH: usize = 254;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug regex"));

pub fn validate_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_page(query: &PageQuery, server: &ServerConfig) -> Result<PageParams, ApiError> {
    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(ApiError::validation("Invalid page: pages start at 1"));
    }

    let limit = query.limit.unwrap_or(server.page_size);
    if !(1..=server.max_page_size).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {}. Limit must be between 1 and {}",
            limit, server.max_page_size
        )));
    }

    Ok(PageParams { page, limit })
}

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH || !EMAIL_RE.is_match(trimmed) {
        return Err(ApiError::validation("Enter a valid email address"));
    }
    Ok(trimmed)
}

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    if username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if username.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::validation(format!(
            "Username must be {} characters or less",
            MAX_NAME_LENGTH
        )));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ApiError::validation(
            "Username can only contain letters, digits and @/./+/-/_",
        ));
    }
    if username.eq_ignore_ascii_case("me") {
        return Err(ApiError::validation("Username 'me' is reserved"));
    }
    Ok(username)
}

pub fn validate_person_name<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::validation(format!(
            "{} must be {} characters or less",
            field, MAX_NAME_LENGTH
        )));
    }
    Ok(trimmed)
}

pub fn validate_slug(slug: &str) -> Result<&str, ApiError> {
    if slug.is_empty() || slug.len() > 32 || !SLUG_RE.is_match(slug) {
        return Err(ApiError::validation(
            "Slug must be 1-32 characters of letters, digits, hyphens and underscores",
        ));
    }
    Ok(slug)
}

/// Parses a `0`/`1` (or `true`/`false`) query flag.
pub fn parse_flag(name: &str, value: &str) -> Result<bool, ApiError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(ApiError::validation(format!(
            "Invalid value '{}' for {}: expected 0 or 1",
            other, name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id(1).is_ok());
        assert!(validate_id(0).is_err());
        assert!(validate_id(-7).is_err());
    }

    #[test]
    fn test_validate_page() {
        let server = ServerConfig::default();

        let params = validate_page(&PageQuery::default(), &server).unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, server.page_size);

        let query = PageQuery {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(validate_page(&query, &server).unwrap().offset(), 20);

        let zero_page = PageQuery {
            page: Some(0),
            limit: None,
        };
        assert!(validate_page(&zero_page, &server).is_err());

        let huge = PageQuery {
            page: None,
            limit: Some(server.max_page_size + 1),
        };
        assert!(validate_page(&huge, &server).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("chef.anna+1@home").is_ok());
        assert!(validate_username("vasya_pupkin").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("semi;colon").is_err());
        assert!(validate_username("me").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" cook@example.org ").unwrap(), "cook@example.org");
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@example.org").is_err());
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("breakfast").is_ok());
        assert!(validate_slug("late-night_snacks").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("with space").is_err());
        assert!(validate_slug(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("is_favorited", "1").unwrap());
        assert!(!parse_flag("is_favorited", "0").unwrap());
        assert!(parse_flag("is_favorited", "yes").is_err());
    }
}
