//! Deny-list evaluation for package identities.
//!
//! All comparisons are case-insensitive. Package rules come in three
//! shapes: wildcards (`*x*`, `*x`, `x*`), version-qualified names
//! (`pkg@v1`, matched as a substring) and plain names (matched exactly,
//! or against the package with its `@version` suffix removed).

use std::{collections::BTreeSet, fmt};

use crate::types::{PackageIdentity, eq_ignore_case};

/// A single parsed entry of `denied_packages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyRule {
    /// `*x*`
    Contains(String),
    /// `*x`
    Suffix(String),
    /// `x*`
    Prefix(String),
    /// A `*` that is neither leading nor trailing; never matches.
    Unsupported,
    /// `pkg@version`
    Versioned(String),
    /// `pkg`
    Exact(String),
}

impl DenyRule {
    pub fn parse(rule: &str) -> Self {
        let rule = rule.trim().to_lowercase();

        if rule.contains('*') {
            let core = rule.trim_matches('*').to_string();
            return match (rule.starts_with('*'), rule.ends_with('*')) {
                (true, true) => DenyRule::Contains(core),
                (true, false) => DenyRule::Suffix(core),
                (false, true) => DenyRule::Prefix(core),
                (false, false) => DenyRule::Unsupported,
            };
        }

        if rule.contains('@') {
            DenyRule::Versioned(rule)
        } else {
            DenyRule::Exact(rule)
        }
    }

    /// Tests a lower-cased package name against the rule.
    fn matches(&self, package: &str) -> bool {
        match self {
            DenyRule::Contains(core) => package.contains(core.as_str()),
            DenyRule::Suffix(core) => package.ends_with(core.as_str()),
            DenyRule::Prefix(core) => package.starts_with(core.as_str()),
            DenyRule::Unsupported => false,
            DenyRule::Versioned(rule) => package.contains(rule.as_str()),
            DenyRule::Exact(rule) => {
                package == rule || strip_version(package).is_some_and(|base| base == rule)
            }
        }
    }
}

/// Removes a trailing `@version`. A leading `@` is an npm scope marker,
/// not a version separator.
fn strip_version(package: &str) -> Option<&str> {
    package
        .rfind('@')
        .filter(|&idx| idx > 0)
        .map(|idx| &package[..idx])
}

/// Why a package was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// A `denied_packages` entry matched; holds the entry as configured.
    Package(String),
    /// A `denied_orgs` entry matched; holds the extracted organization.
    Organization(String),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Package(rule) => write!(f, "package '{rule}' is denied"),
            DenyReason::Organization(org) => write!(f, "org '{org}' is denied"),
        }
    }
}

/// Returns the first deny rule matching the package, or the denied
/// organization it belongs to.
pub fn deny_reason(
    package_name: &str,
    organization_name: &str,
    denied_packages: &[String],
    denied_orgs: &[String],
) -> Option<DenyReason> {
    if !package_name.is_empty() {
        let package = package_name.to_lowercase();
        let matched = denied_packages
            .iter()
            .filter(|rule| !rule.trim().is_empty())
            .find(|rule| DenyRule::parse(rule).matches(&package));

        if let Some(rule) = matched {
            return Some(DenyReason::Package(rule.trim().to_string()));
        }
    }

    if !organization_name.is_empty()
        && denied_orgs
            .iter()
            .any(|org| eq_ignore_case(org.trim(), organization_name))
    {
        return Some(DenyReason::Organization(organization_name.to_string()));
    }

    None
}

/// Reports whether a package or its organization is on a deny list.
pub fn is_denied(
    package_name: &str,
    organization_name: &str,
    denied_packages: &[String],
    denied_orgs: &[String],
) -> bool {
    deny_reason(package_name, organization_name, denied_packages, denied_orgs).is_some()
}

/// Removes blank entries and case-insensitive duplicates, keeping the first
/// spelling of each entry.
pub fn dedupe_rules<I, S>(rules: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    rules
        .into_iter()
        .filter_map(|rule| {
            let rule = rule.as_ref().trim();
            (!rule.is_empty() && seen.insert(rule.to_lowercase())).then(|| rule.to_string())
        })
        .collect()
}

/// Merged deny lists and ignore list for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenyListConfig {
    pub denied_packages: Vec<String>,
    pub denied_orgs: Vec<String>,
    pub ignored_prs: BTreeSet<u64>,
}

impl DenyListConfig {
    pub fn new<P, O, S, N>(denied_packages: P, denied_orgs: O, ignored_prs: N) -> Self
    where
        P: IntoIterator<Item = S>,
        O: IntoIterator<Item = S>,
        S: AsRef<str>,
        N: IntoIterator<Item = u64>,
    {
        Self {
            denied_packages: dedupe_rules(denied_packages),
            denied_orgs: dedupe_rules(denied_orgs),
            ignored_prs: ignored_prs.into_iter().collect(),
        }
    }

    pub fn is_ignored(&self, number: u64) -> bool {
        self.ignored_prs.contains(&number)
    }

    pub fn evaluate(&self, identity: &PackageIdentity) -> Option<DenyReason> {
        deny_reason(
            &identity.package_name,
            &identity.organization_name,
            &self.denied_packages,
            &self.denied_orgs,
        )
    }
}
