//! Package identity extraction from update-bot pull request titles.
//!
//! Titles are free text, so extraction is heuristic: an ordered list of
//! title styles is tried first, then a token scan. The organization is
//! derived from the package path afterwards.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::PackageIdentity;

/// Title conventions produced by the update bot, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleStyle {
    /// `⬆️ (deps): Bump <pkg> from <a> to <b>`
    PrefixedBump,
    /// `⬆️ (deps): Bump the <group> group with N updates`
    PrefixedGroup,
    /// `Bump <pkg> from <a> to <b>`
    Bump,
    /// `Update <pkg> from <a> to <b>`
    Update,
    /// `chore(deps): bump <pkg> from <a> to <b>`
    ConventionalCommit,
}

impl TitleStyle {
    fn pattern(&self) -> &'static str {
        match self {
            TitleStyle::PrefixedBump => {
                r"(?i)\x{2B06}\x{FE0F}?\s+\(deps\):\s+bump\s+(\S+)\s+(?:from|to)\b"
            }
            TitleStyle::PrefixedGroup => {
                r"(?i)\x{2B06}\x{FE0F}?\s+\(deps\):\s+bump\s+the\s+(\S+)\s+group\b"
            }
            TitleStyle::Bump => r"(?i)^bump\s+(\S+)\s+(?:from|to)\b",
            TitleStyle::Update => r"(?i)^update\s+(\S+)\s+(?:from|to)\b",
            TitleStyle::ConventionalCommit => r"(?i)^chore.*bump\s+(\S+)\s+(?:from|to)\b",
        }
    }

    pub fn all() -> [TitleStyle; 5] {
        [
            TitleStyle::PrefixedBump,
            TitleStyle::PrefixedGroup,
            TitleStyle::Bump,
            TitleStyle::Update,
            TitleStyle::ConventionalCommit,
        ]
    }
}

struct TitlePattern {
    style: TitleStyle,
    regex: Regex,
}

impl TitlePattern {
    fn extract<'t>(&self, title: &'t str) -> Option<&'t str> {
        self.regex
            .captures(title)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

static TITLE_PATTERNS: LazyLock<Vec<TitlePattern>> = LazyLock::new(|| {
    TitleStyle::all()
        .into_iter()
        .map(|style| TitlePattern {
            style,
            regex: Regex::new(style.pattern()).expect("Failed to compile title patterns"),
        })
        .collect()
});

/// Namespaces of the extended standard library, which have no owning
/// organization.
const UNOWNED_PREFIXES: &[&str] = &["golang.org/x/", "google.golang.org/"];

/// Mirror hosts where the real owner is the second path segment.
const MIRROR_PREFIXES: &[&str] = &["gopkg.in/"];

/// Code hosts laid out as `host/owner/repo[/...]`.
const HOSTING_PREFIXES: &[&str] = &["github.com/", "gitlab.com/", "bitbucket.org/"];

/// Returns which title style matched and the package token it named.
pub fn match_title(title: &str) -> Option<(TitleStyle, &str)> {
    TITLE_PATTERNS
        .iter()
        .find_map(|p| p.extract(title).map(|pkg| (p.style, pkg)))
}

/// Extracts the updated package and its owning organization from a PR
/// title. Never fails: unrecognised titles produce an empty identity.
pub fn parse_title(title: &str) -> PackageIdentity {
    let package_name = match_title(title)
        .map(|(_, pkg)| pkg)
        .or_else(|| fallback_package(title))
        .unwrap_or_default();

    if package_name.is_empty() {
        return PackageIdentity::default();
    }

    PackageIdentity::new(package_name, extract_organization(package_name))
}

/// Skips the leading verb and picks the first token that looks like a
/// namespaced package.
fn fallback_package(title: &str) -> Option<&str> {
    title
        .split_whitespace()
        .skip(1)
        .find(|token| token.contains('/') || token.contains('@'))
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix(['v', 'V'])
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}

/// Derives the owning organization from a package name.
pub fn extract_organization(package_name: &str) -> String {
    if let Some(scoped) = package_name.strip_prefix('@') {
        return scoped
            .split_once('/')
            .map(|(org, _)| org.to_string())
            .unwrap_or_default();
    }

    if !package_name.contains('/') {
        return String::new();
    }

    let segments: Vec<&str> = package_name.split('/').collect();

    if UNOWNED_PREFIXES
        .iter()
        .any(|prefix| starts_with_ignore_case(package_name, prefix))
    {
        return String::new();
    }

    if MIRROR_PREFIXES
        .iter()
        .any(|prefix| starts_with_ignore_case(package_name, prefix))
    {
        return match segments.as_slice() {
            [_, owner, _, ..] => owner.to_lowercase(),
            _ => String::new(),
        };
    }

    if segments.len() >= 3
        && HOSTING_PREFIXES
            .iter()
            .any(|prefix| starts_with_ignore_case(package_name, prefix))
    {
        return segments[1].to_string();
    }

    segments
        .iter()
        .skip(1)
        .find(|segment| {
            !segment.is_empty() && !segment.contains('.') && !is_version_segment(segment)
        })
        .map(|segment| segment.to_string())
        .unwrap_or_default()
}
