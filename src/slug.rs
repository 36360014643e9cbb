// Slug derivation and validation for organizations and projects

use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::ForgeError;

pub const MIN_SLUG_LEN: usize = 3;
pub const MAX_SLUG_LEN: usize = 25;

const SUFFIX_LEN: usize = 8;

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]+(_[a-z0-9]+)*$").expect("valid slug regex"))
}

/// Slugify with the default length bounds
pub fn slugify(input: &str) -> String {
    slugify_with(input, MIN_SLUG_LEN, MAX_SLUG_LEN)
}

/// Derive a slug from free text.
///
/// Lower-cases, splits camelCase into snake_case and collapses every run of
/// non-alphanumeric characters into a single `_`. Results shorter than
/// `min_len` get a random hex suffix so degenerate names still yield
/// distinct slugs.
pub fn slugify_with(input: &str, min_len: usize, max_len: usize) -> String {
    let mut core = String::with_capacity(input.len());
    let mut prev: Option<char> = None;
    let mut pending_sep = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            let camel_boundary = c.is_ascii_uppercase()
                && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit());
            if (pending_sep || camel_boundary) && !core.is_empty() {
                core.push('_');
            }
            core.push(c.to_ascii_lowercase());
            pending_sep = false;
        } else {
            pending_sep = true;
        }
        prev = Some(c);
    }

    truncate_slug(&mut core, max_len);

    if core.is_empty() {
        let mut suffix = random_suffix();
        suffix.truncate(max_len);
        return suffix;
    }

    if core.len() < min_len {
        let room = max_len.saturating_sub(SUFFIX_LEN + 1);
        truncate_slug(&mut core, room);
        if core.is_empty() {
            return random_suffix();
        }
        return format!("{}_{}", core, random_suffix());
    }

    core
}

fn truncate_slug(slug: &mut String, max_len: usize) {
    // core is ASCII, byte truncation is safe
    slug.truncate(max_len);
    while slug.ends_with('_') {
        slug.pop();
    }
}

fn random_suffix() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

/// Check a user-supplied slug before sending it to the backend
pub fn validate_slug(slug: &str) -> Result<(), ForgeError> {
    if slug.len() < MIN_SLUG_LEN || slug.len() > MAX_SLUG_LEN {
        return Err(ForgeError::ValidationFailed(format!(
            "slug '{}' must be between {} and {} characters",
            slug, MIN_SLUG_LEN, MAX_SLUG_LEN
        )));
    }
    if !slug_pattern().is_match(slug) {
        return Err(ForgeError::ValidationFailed(format!(
            "slug '{}' may only contain lower-case letters, digits and single underscores",
            slug
        )));
    }
    Ok(())
}
