//! Validation constants shared across the runtime.

use regex::Regex;
use std::sync::OnceLock;

/// Maximum images accepted on a single user suggestion.
pub const MAX_IMAGES_PER_MESSAGE: usize = 4;

/// Maximum accepted size of one attached image.
pub const MAX_IMAGE_SIZE_BYTES: usize = 2 * 1024 * 1024;

/// Maximum completed phase records per app session.
pub const MAX_PHASES: u32 = 12;

/// Maximum retained bootstrap commands after dedup.
pub const MAX_COMMANDS_HISTORY: usize = 10;

/// Maximum automatic review cycles before finalization.
pub const MAX_REVIEW_CYCLES: u32 = 3;

/// Bound on waiting for sandbox preview readiness.
pub const PREVIEW_WAIT_SECS: u64 = 30;

/// Poll interval while waiting for the preview.
pub const PREVIEW_POLL_MILLIS: u64 = 500;

/// Maximum length of the project-name prefix derived from the query.
pub const PROJECT_NAME_PREFIX_LEN: usize = 20;

fn project_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^[a-z0-9-_]{3,50}$").expect("static regex"))
}

/// Whether `name` is a valid project name.
pub fn is_valid_project_name(name: &str) -> bool {
    project_name_regex().is_match(name)
}

/// Lowercase and strip `raw` down to the project-name alphabet, bounded to
/// [`PROJECT_NAME_PREFIX_LEN`]. May return fewer than 3 characters; callers
/// pad with a suffix before validating.
pub fn sanitize_project_name(raw: &str) -> String {
    raw.chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .skip_while(|c| *c == '-')
        .take(PROJECT_NAME_PREFIX_LEN)
        .collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_pass() {
        assert!(is_valid_project_name("my-app_01"));
        assert!(is_valid_project_name("abc"));
    }

    #[test]
    fn invalid_names_fail() {
        assert!(!is_valid_project_name("ab"));
        assert!(!is_valid_project_name("Has-Upper"));
        assert!(!is_valid_project_name("spaces here"));
        assert!(!is_valid_project_name(&"x".repeat(51)));
    }

    #[test]
    fn sanitize_lowercases_and_bounds() {
        let name = sanitize_project_name("Make A Counter App With Extras!!");
        assert!(name.len() <= PROJECT_NAME_PREFIX_LEN);
        assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'));
    }

    #[test]
    fn sanitize_strips_leading_and_trailing_dashes() {
        assert_eq!(sanitize_project_name("  hello  "), "hello");
    }
}
