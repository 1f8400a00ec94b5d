//! Utility functions for callscope

use chrono::{DateTime, Utc};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use validator::ValidationError;

/// Longest slug accepted by the backend
pub const MAX_SLUG_LEN: usize = 63;

/// Calendar date (UTC) of a timestamp in `YYYY-MM-DD` form
#[must_use]
pub fn iso_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

/// Fold text for locale-insensitive comparison: accents stripped, lowercase
#[must_use]
pub fn fold_text(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Derive a URL-safe slug from a display name
///
/// Returns an empty string when the name has no usable characters.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in fold_text(name).chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Validate slug format: lowercase ASCII alphanumerics separated by single dashes
#[must_use]
pub fn validate_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// `validator` hook for slug fields
///
/// # Errors
///
/// Returns a validation error when the slug is not URL-safe.
pub fn check_slug(slug: &str) -> Result<(), ValidationError> {
    if validate_slug(slug) {
        Ok(())
    } else {
        let mut err = ValidationError::new("slug");
        err.message = Some("must be lowercase letters, digits and single dashes".into());
        Err(err)
    }
}

/// Validate that a required identifier is present
///
/// # Errors
///
/// Returns a validation error naming `field` when `value` is blank.
pub fn require_id<'a>(field: &str, value: &'a str) -> crate::Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::Error::validation(field, "Field is required"));
    }
    Ok(trimmed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Acme Support", "acme-support")]
    #[case("  Café  Crème ", "cafe-creme")]
    #[case("Team #42 -- North", "team-42-north")]
    #[case("___", "")]
    #[case("ÅNGSTRÖM", "angstrom")]
    fn test_slugify(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(slugify(name), expected);
    }

    #[test]
    fn test_slugify_truncates() {
        let long = "a".repeat(200);
        assert_eq!(slugify(&long).len(), MAX_SLUG_LEN);

        let with_dash = format!("{} b", "a".repeat(MAX_SLUG_LEN - 1));
        assert!(validate_slug(&slugify(&with_dash)));
    }

    #[rstest]
    #[case("acme", true)]
    #[case("acme-support-2", true)]
    #[case("", false)]
    #[case("-acme", false)]
    #[case("acme-", false)]
    #[case("ac--me", false)]
    #[case("Acme", false)]
    #[case("acme support", false)]
    fn test_validate_slug(#[case] slug: &str, #[case] valid: bool) {
        assert_eq!(validate_slug(slug), valid);
        assert_eq!(check_slug(slug).is_ok(), valid);
    }

    #[test]
    fn test_fold_text() {
        assert_eq!(fold_text("Émile"), "emile");
        assert_eq!(fold_text("ZOË"), "zoe");
    }

    #[test]
    fn test_iso_date_uses_date_portion() {
        let ts = DateTime::parse_from_rfc3339("2024-01-02T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(iso_date(ts), "2024-01-02");
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id("organization_id", " org-1 ").unwrap(), "org-1");
        assert!(require_id("organization_id", "  ").is_err());
    }
}
