//! Identifier generation and the filename scheme.
//!
//! Files are named `{id}--{slug}.md` or `{id}.md`. Ids are
//! `{prefix}-{token}` where the token is random lowercase base36.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

/// Subdirectory holding archived beans.
pub const ARCHIVE_DIR: &str = "archive";
/// Bean file extension.
pub const EXTENSION: &str = "md";
/// Separator between id and slug in a filename.
pub const SLUG_SEPARATOR: &str = "--";

const MAX_SLUG_LEN: usize = 50;
const MAX_TOKEN_LEN: usize = 12;
const ATTEMPTS_PER_LENGTH: usize = 10;
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_]+(?:-[a-z0-9_]+)*$").expect("valid regex")
});

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9_]+(?:-[a-z0-9_]+)*)(?:--([a-z0-9]+(?:-[a-z0-9]+)*))?\.md$")
        .expect("valid regex")
});

// ============================================================================
// ID Generation
// ============================================================================

/// Generate a unique id with the given prefix.
///
/// Tries a handful of random tokens at `length`, then grows the token by one
/// character and tries again. The `exists` closure checks for collisions.
pub fn generate_id<F>(prefix: &str, length: usize, exists: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut rng = rand::rng();
    let mut length = length.clamp(1, MAX_TOKEN_LEN);

    loop {
        for _ in 0..ATTEMPTS_PER_LENGTH {
            let id = format_id(prefix, &random_token(&mut rng, length));
            if !exists(&id) {
                return id;
            }
        }
        if length < MAX_TOKEN_LEN {
            length += 1;
            tracing::debug!(length, "id collisions, growing token length");
        }
    }
}

fn random_token<R: Rng>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

/// Join prefix and token; an empty prefix yields the bare token.
#[must_use]
pub fn format_id(prefix: &str, token: &str) -> String {
    if prefix.is_empty() {
        token.to_string()
    } else {
        format!("{prefix}-{token}")
    }
}

/// True when `id` fits the filename grammar (lowercase, single dashes).
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    ID_RE.is_match(id)
}

/// True when `prefix` is usable in ids; empty is allowed.
#[must_use]
pub fn is_valid_prefix(prefix: &str) -> bool {
    prefix.is_empty() || ID_RE.is_match(prefix)
}

/// Strip `{prefix}-` from an id for compact display.
#[must_use]
pub fn short_id<'a>(id: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return id;
    }
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(id)
}

// ============================================================================
// Slugs & Filenames
// ============================================================================

/// Derive a slug: lowercase ASCII alphanumerics joined by single dashes,
/// cut at a word boundary to at most 50 characters.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for word in title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_ascii_lowercase();
        let extra = if slug.is_empty() { word.len() } else { word.len() + 1 };
        if slug.len() + extra > MAX_SLUG_LEN {
            if slug.is_empty() {
                slug.push_str(&word[..MAX_SLUG_LEN]);
            }
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word);
    }
    slug
}

/// Filename for a bean.
#[must_use]
pub fn filename(id: &str, slug: Option<&str>) -> String {
    match slug {
        Some(slug) if !slug.is_empty() => format!("{id}{SLUG_SEPARATOR}{slug}.{EXTENSION}"),
        _ => format!("{id}.{EXTENSION}"),
    }
}

/// Split a filename into `(id, slug)`; `None` when it is not a bean file.
#[must_use]
pub fn parse_filename(name: &str) -> Option<(String, Option<String>)> {
    let caps = FILENAME_RE.captures(name)?;
    let id = caps.get(1)?.as_str().to_string();
    let slug = caps.get(2).map(|m| m.as_str().to_string());
    Some((id, slug))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id("beans", 4, |_| false);
        assert!(id.starts_with("beans-"));
        assert_eq!(id.len(), "beans-".len() + 4);
        assert!(is_valid_id(&id));
    }

    #[test]
    fn test_generate_id_empty_prefix() {
        let id = generate_id("", 6, |_| false);
        assert_eq!(id.len(), 6);
        assert!(!id.contains('-'));
    }

    #[test]
    fn test_generate_id_collision_handling() {
        // Every 1-char token is taken, so generation must grow the length.
        let taken: HashSet<String> = ALPHABET
            .iter()
            .map(|b| format!("x-{}", char::from(*b)))
            .collect();
        let id = generate_id("x", 1, |candidate| taken.contains(candidate));
        assert!(!taken.contains(&id));
        assert_eq!(id.len(), "x-".len() + 2);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Fix the Login page!"), "fix-the-login-page");
        assert_eq!(slugify("  --über cool--  "), "ber-cool");
        assert_eq!(slugify("!!!"), "");
        let long = "word ".repeat(40);
        let slug = slugify(&long);
        assert!(slug.len() <= 50);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_filename_round_trip() {
        assert_eq!(filename("beans-ab12", Some("fix-login")), "beans-ab12--fix-login.md");
        assert_eq!(filename("beans-ab12", None), "beans-ab12.md");
        assert_eq!(
            parse_filename("beans-ab12--fix-login.md"),
            Some(("beans-ab12".to_string(), Some("fix-login".to_string())))
        );
        assert_eq!(
            parse_filename("beans-ab12.md"),
            Some(("beans-ab12".to_string(), None))
        );
    }

    #[test]
    fn test_parse_filename_rejects_foreign_files() {
        assert_eq!(parse_filename("README.txt"), None);
        assert_eq!(parse_filename("Notes.md"), None);
        assert_eq!(parse_filename(".beans-ab12.md.tmp"), None);
        assert_eq!(parse_filename("beans-ab12--.md"), None);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("beans-ab12", "beans"), "ab12");
        assert_eq!(short_id("other-ab12", "beans"), "other-ab12");
        assert_eq!(short_id("ab12", ""), "ab12");
    }
}
