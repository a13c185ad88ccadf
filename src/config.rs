//! YAML configuration and its per-repository resolution.
//!
//! Lists are merged in the order global, repository, command line. Rules
//! are deduplicated case-insensitively, keeping the first spelling.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    classify::DEFAULT_BOT_LOGIN,
    policy::DenyListConfig,
    types::{Repo, RepoError, eq_ignore_case},
};

const CONFIG_DIR: &str = ".dependabot-bouncer";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("invalid repository key '{key}' in config: {source}")]
    InvalidRepository {
        key: String,
        #[source]
        source: RepoError,
    },
}

/// Deny lists and ignored PRs at one level of the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub denied_packages: Vec<String>,
    pub denied_orgs: Vec<String>,
    pub ignored_prs: Vec<u64>,
}

/// The configuration file as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub github_token: Option<String>,
    pub bot: Option<String>,
    pub global: PolicyConfig,
    pub repositories: BTreeMap<String, PolicyConfig>,
}

/// `~/.dependabot-bouncer/config.yaml`, when a home directory is known.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

impl FileConfig {
    pub fn from_yaml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        // An empty file deserializes to null rather than an empty mapping.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads an explicit config file, or the default one when `path` is
    /// `None`. Only the default file is allowed to be absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    return Err(ConfigError::MissingFile(path));
                }
                debug!("No config file at {}", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        debug!("Loaded config from {}", path.display());
        Self::from_yaml_str(&contents, &path)
    }

    /// Repositories named under `repositories`, in key order.
    pub fn configured_repositories(&self) -> Result<Vec<Repo>, ConfigError> {
        self.repositories
            .keys()
            .map(|key| {
                Repo::parse(key).map_err(|source| ConfigError::InvalidRepository {
                    key: key.clone(),
                    source,
                })
            })
            .collect()
    }

    fn repository(&self, repo: &Repo) -> Option<&PolicyConfig> {
        let wanted = repo.to_string();
        self.repositories
            .iter()
            .find(|(key, _)| eq_ignore_case(key.trim(), &wanted))
            .map(|(_, policy)| policy)
    }
}

/// Values supplied on the command line, applied after the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub deny_packages: Vec<String>,
    pub deny_orgs: Vec<String>,
    pub bot: Option<String>,
    /// PRs to ignore, each bound to the repository it belongs to.
    pub ignored: Vec<(Repo, u64)>,
}

/// The update bot's login: command line, then config file, then the
/// default.
pub fn bot_login(file: &FileConfig, overrides: &Overrides) -> String {
    overrides
        .bot
        .as_deref()
        .or(file.bot.as_deref())
        .map(str::trim)
        .filter(|bot| !bot.is_empty())
        .unwrap_or(DEFAULT_BOT_LOGIN)
        .to_string()
}

/// Everything needed to process one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub repo: Repo,
    pub policy: DenyListConfig,
    pub bot: String,
}

impl ResolvedConfig {
    pub fn resolve(file: &FileConfig, repo: &Repo, overrides: &Overrides) -> Self {
        let empty = PolicyConfig::default();
        let repo_policy = file.repository(repo).unwrap_or(&empty);

        let denied_packages = file
            .global
            .denied_packages
            .iter()
            .chain(&repo_policy.denied_packages)
            .chain(&overrides.deny_packages);
        let denied_orgs = file
            .global
            .denied_orgs
            .iter()
            .chain(&repo_policy.denied_orgs)
            .chain(&overrides.deny_orgs);
        let ignored = file
            .global
            .ignored_prs
            .iter()
            .chain(&repo_policy.ignored_prs)
            .copied()
            .chain(
                overrides
                    .ignored
                    .iter()
                    .filter(|(target, _)| target.same_as(repo))
                    .map(|(_, number)| *number),
            );

        Self {
            repo: repo.clone(),
            policy: DenyListConfig::new(denied_packages, denied_orgs, ignored),
            bot: bot_login(file, overrides),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const SAMPLE: &str = r#"
github_token: ghp_example
global:
  denied_packages:
    - github.com/aws/aws-sdk-go
    - "*datadog*"
  denied_orgs:
    - DataDog
repositories:
  Owner/Repo:
    denied_packages:
      - lodash
      - GITHUB.COM/AWS/AWS-SDK-GO
    denied_orgs:
      - hashicorp
    ignored_prs: [12, 34]
  owner/other:
    ignored_prs: [7]
"#;

    fn repo(s: &str) -> Repo {
        Repo::parse(s).unwrap()
    }

    fn sample() -> FileConfig {
        FileConfig::from_yaml_str(SAMPLE, Path::new("config.yaml")).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let config = sample();
        assert_eq!(config.github_token.as_deref(), Some("ghp_example"));
        assert_eq!(config.bot, None);
        assert_eq!(config.global.denied_orgs, vec!["DataDog"]);
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories["Owner/Repo"].ignored_prs, vec![12, 34]);
        assert!(config.repositories["owner/other"].denied_packages.is_empty());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = FileConfig::from_yaml_str("  \n", Path::new("config.yaml")).unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_malformed_yaml() {
        let err =
            FileConfig::from_yaml_str("global: [unclosed", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = FileConfig::load(Some(file.path())).unwrap();
        assert_eq!(config, sample());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let err = FileConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(p) if p == path));
    }

    #[test]
    fn test_configured_repositories() {
        let repos = sample().configured_repositories().unwrap();
        assert_eq!(repos, vec![repo("Owner/Repo"), repo("owner/other")]);

        let mut config = FileConfig::default();
        config
            .repositories
            .insert("not-a-repo".to_string(), PolicyConfig::default());
        let err = config.configured_repositories().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRepository { key, .. } if key == "not-a-repo"));
    }

    #[test]
    fn test_resolve_merges_levels_in_order() {
        let overrides = Overrides {
            deny_packages: vec!["LODASH".to_string(), "express".to_string()],
            deny_orgs: vec!["acme".to_string()],
            bot: None,
            ignored: vec![(repo("owner/repo"), 99), (repo("owner/other"), 100)],
        };

        let resolved = ResolvedConfig::resolve(&sample(), &repo("owner/repo"), &overrides);

        assert_eq!(
            resolved.policy.denied_packages,
            vec!["github.com/aws/aws-sdk-go", "*datadog*", "lodash", "express"]
        );
        assert_eq!(resolved.policy.denied_orgs, vec!["DataDog", "hashicorp", "acme"]);
        assert_eq!(
            resolved.policy.ignored_prs.iter().copied().collect::<Vec<_>>(),
            vec![12, 34, 99]
        );
        assert_eq!(resolved.bot, DEFAULT_BOT_LOGIN);
    }

    #[test]
    fn test_resolve_unknown_repository_uses_global() {
        let resolved =
            ResolvedConfig::resolve(&sample(), &repo("someone/else"), &Overrides::default());

        assert_eq!(
            resolved.policy.denied_packages,
            vec!["github.com/aws/aws-sdk-go", "*datadog*"]
        );
        assert!(resolved.policy.ignored_prs.is_empty());
    }

    #[test]
    fn test_resolve_matches_repository_keys_ignoring_unicode_case() {
        let mut file = FileConfig::default();
        file.repositories.insert(
            "Ärzte/Portal".to_string(),
            PolicyConfig {
                ignored_prs: vec![5],
                ..PolicyConfig::default()
            },
        );
        let overrides = Overrides {
            ignored: vec![(repo("ÄRZTE/portal"), 6)],
            ..Overrides::default()
        };

        let resolved = ResolvedConfig::resolve(&file, &repo("ärzte/PORTAL"), &overrides);
        assert_eq!(
            resolved.policy.ignored_prs.iter().copied().collect::<Vec<_>>(),
            vec![5, 6]
        );
    }

    #[test]
    fn test_resolve_bot_precedence() {
        let mut file = FileConfig {
            bot: Some("renovate".to_string()),
            ..FileConfig::default()
        };
        let target = repo("owner/repo");

        let resolved = ResolvedConfig::resolve(&file, &target, &Overrides::default());
        assert_eq!(resolved.bot, "renovate");

        let overrides = Overrides {
            bot: Some("my-bot".to_string()),
            ..Overrides::default()
        };
        assert_eq!(ResolvedConfig::resolve(&file, &target, &overrides).bot, "my-bot");

        file.bot = Some("  ".to_string());
        let resolved = ResolvedConfig::resolve(&file, &target, &Overrides::default());
        assert_eq!(resolved.bot, DEFAULT_BOT_LOGIN);
    }
}
