use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    config::{FileConfig, Overrides},
    stale::{DEFAULT_STALE_LABEL, parse_older_than},
    types::Repo,
};

const BUILD_VERSION: &str = env!("BUILD_VERSION");

#[derive(Args, Debug, Clone, Default)]
struct GlobalArgs {
    /// Config file (default: ~/.dependabot-bouncer/config.yaml)
    #[arg(long, global = true, env = "DEPENDABOT_BOUNCER_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Packages to deny, added to the configured list (comma-separated)
    #[arg(
        long = "deny-packages",
        global = true,
        env = "DEPENDABOT_BOUNCER_DENY_PACKAGES",
        value_delimiter = ',',
        value_name = "PACKAGES"
    )]
    pub deny_packages: Vec<String>,

    /// Organizations to deny, added to the configured list (comma-separated)
    #[arg(
        long = "deny-orgs",
        global = true,
        env = "DEPENDABOT_BOUNCER_DENY_ORGS",
        value_delimiter = ',',
        value_name = "ORGS"
    )]
    pub deny_orgs: Vec<String>,

    /// GitHub token (falls back to GITHUB_TOKEN, GH_TOKEN, then `gh auth token`)
    #[arg(
        long = "github-token",
        global = true,
        env = "DEPENDABOT_BOUNCER_GITHUB_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN"
    )]
    pub github_token: Option<String>,

    /// Login of the update bot (default: dependabot)
    #[arg(long, global = true, value_name = "LOGIN")]
    pub bot: Option<String>,

    /// Show what would be done without changing anything
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Args, Debug, Clone)]
struct BatchArgs {
    /// Repositories as owner/repo or GitHub URLs
    #[arg(required = true, value_name = "OWNER/REPO")]
    pub repos: Vec<String>,

    /// PRs to leave alone (numbers with a single repository, or PR URLs; comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "PR-NUMBER|PR-URL")]
    pub ignore: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct CheckArgs {
    /// Repositories as owner/repo or GitHub URLs (default: all configured)
    #[arg(value_name = "OWNER/REPO")]
    pub repos: Vec<String>,

    /// Print PR numbers only
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Do not truncate titles to the terminal width
    #[arg(long = "no-wrap")]
    pub no_wrap: bool,
}

#[derive(Args, Debug, Clone)]
struct CloseArgs {
    /// Repositories as owner/repo or GitHub URLs
    #[arg(required = true, value_name = "OWNER/REPO")]
    pub repos: Vec<String>,

    /// Close PRs older than this (e.g. 720h, 30d, 2w; unitless implies hours)
    #[arg(long = "older-than", value_name = "DURATION")]
    pub older_than: Option<String>,

    /// Only close PRs with this label
    #[arg(long, default_value = DEFAULT_STALE_LABEL, value_name = "NAME")]
    pub label: String,
}

#[derive(Subcommand, Debug, Clone)]
enum CommandArgs {
    /// Approve and enable auto-merge on passing update PRs, rebasing or recreating as needed
    Approve(BatchArgs),
    /// Ask the bot to recreate every allowed update PR
    Recreate(BatchArgs),
    /// Report update PRs with their CI state and policy verdict
    Check(CheckArgs),
    /// Close labelled PRs older than a given age
    Close(CloseArgs),
}

#[derive(Parser, Debug)]
#[command(name = "dependabot-bouncer")]
#[command(about = "Triage dependency update PRs in bulk")]
#[command(version = BUILD_VERSION)]
struct CliArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: CommandArgs,
}

/// How the check report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Normal,
    NoWrap,
    Quiet,
}

/// A validated subcommand.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Approve {
        repos: Vec<Repo>,
    },
    Recreate {
        repos: Vec<Repo>,
    },
    /// An empty `repos` means every repository in the config file.
    Check {
        repos: Vec<Repo>,
        display: DisplayMode,
    },
    Close {
        repos: Vec<Repo>,
        older_than: chrono::Duration,
        label: String,
    },
}

/// Everything the binary needs from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub command: Command,
    pub overrides: Overrides,
    pub config_path: Option<PathBuf>,
    pub github_token: Option<String>,
    pub dry_run: bool,
    pub debug: bool,
}

impl Invocation {
    /// Repositories to process. `check` without arguments falls back to
    /// the configured repositories.
    pub fn repositories(&self, file: &FileConfig) -> Result<Vec<Repo>> {
        match &self.command {
            Command::Approve { repos }
            | Command::Recreate { repos }
            | Command::Close { repos, .. } => Ok(repos.clone()),
            Command::Check { repos, .. } if !repos.is_empty() => Ok(repos.clone()),
            Command::Check { .. } => {
                let repos = file.configured_repositories()?;
                if repos.is_empty() {
                    anyhow::bail!("No repositories given and none configured in the config file");
                }
                Ok(repos)
            }
        }
    }
}

fn parse_repos(values: &[String]) -> Result<Vec<Repo>> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| {
            Repo::parse_any(value)
                .with_context(|| format!("Invalid repository format: '{}'", value))
        })
        .collect()
}

/// Binds each ignore value to a repository. Bare numbers are only
/// unambiguous when a single repository is given.
fn parse_ignore_args(repos: &[Repo], values: &[String]) -> Result<Vec<(Repo, u64)>> {
    let mut ignored = Vec::new();

    for value in values {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        if value.starts_with("https://") {
            let (repo, number) = Repo::parse_url(value)?;
            let number = number.ok_or_else(|| {
                anyhow::anyhow!("URL must contain '/pull/' in the path: '{}'", value)
            })?;
            if !repos.iter().any(|r| r.same_as(&repo)) {
                anyhow::bail!(
                    "PR URL {} is from {} which is not one of the repositories being processed",
                    value,
                    repo
                );
            }
            ignored.push((repo, number));
        } else {
            let number: u64 = value
                .parse()
                .with_context(|| format!("Invalid PR number: '{}'", value))?;
            match repos {
                [repo] => ignored.push((repo.clone(), number)),
                _ => anyhow::bail!(
                    "PR number '{}' in --ignore needs exactly one repository; use a PR URL",
                    value
                ),
            }
        }
    }

    Ok(ignored)
}

fn determine_display_mode(args: &CheckArgs) -> DisplayMode {
    match (args.quiet, args.no_wrap) {
        (true, _) => DisplayMode::Quiet,
        (_, true) => DisplayMode::NoWrap,
        _ => DisplayMode::Normal,
    }
}

fn build_invocation(cli: CliArgs) -> Result<Invocation> {
    let mut ignored = Vec::new();

    let command = match cli.command {
        CommandArgs::Approve(args) => {
            let repos = parse_repos(&args.repos)?;
            ignored = parse_ignore_args(&repos, &args.ignore)?;
            Command::Approve { repos }
        }
        CommandArgs::Recreate(args) => {
            let repos = parse_repos(&args.repos)?;
            ignored = parse_ignore_args(&repos, &args.ignore)?;
            Command::Recreate { repos }
        }
        CommandArgs::Check(args) => Command::Check {
            repos: parse_repos(&args.repos)?,
            display: determine_display_mode(&args),
        },
        CommandArgs::Close(args) => {
            let older_than = args
                .older_than
                .as_deref()
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "--older-than is required (e.g., 720h for 30 days, 4320h for 6 months)"
                    )
                })?;
            let label = args.label.trim();
            if label.is_empty() {
                anyhow::bail!("--label must not be empty");
            }

            Command::Close {
                repos: parse_repos(&args.repos)?,
                older_than: parse_older_than(older_than)?,
                label: label.to_string(),
            }
        }
    };

    let github_token = cli
        .global
        .github_token
        .filter(|token| !token.trim().is_empty());

    Ok(Invocation {
        command,
        overrides: Overrides {
            deny_packages: cli.global.deny_packages,
            deny_orgs: cli.global.deny_orgs,
            bot: cli.global.bot,
            ignored,
        },
        config_path: cli.global.config,
        github_token,
        dry_run: cli.global.dry_run,
        debug: cli.global.debug,
    })
}

/// Parses and validates command-line arguments.
///
/// Help and version requests come back as the underlying `clap::Error`
/// inside the `anyhow::Error` so the caller can print them and exit.
pub fn parse_args<I, T>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_invocation(cli)
}
