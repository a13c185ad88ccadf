mod display;

use std::io;

use anyhow::Result;
use chrono::Utc;
use dependabot_bouncer::{
    Command, DryRun, FileConfig, Forge, GitHub, Invocation, Mode, Repo, ResolvedConfig,
    bot_login, close_stale, parse_args, process_repository, resolve_token,
};
use display::{display_batch_summary, display_check_report, display_close_report};
use tracing::error;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_level = if debug { "debug" } else { "info" };
    let filter = if debug {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn batch_mode(command: &Command) -> Option<Mode> {
    match command {
        Command::Approve { .. } => Some(Mode::Approve),
        Command::Recreate { .. } => Some(Mode::Recreate),
        Command::Check { .. } => Some(Mode::Check),
        Command::Close { .. } => None,
    }
}

/// Processes every repository in turn. Returns whether everything
/// succeeded; a failing repository does not stop the others.
async fn run<F>(
    forge: &F,
    invocation: &Invocation,
    file: &FileConfig,
    repos: &[Repo],
) -> Result<bool>
where
    F: Forge + Sync,
{
    let mut stdout = io::stdout();
    let mut all_ok = true;

    if let Command::Close {
        older_than, label, ..
    } = &invocation.command
    {
        for repo in repos {
            let now = Utc::now();
            match close_stale(forge, repo, label, *older_than, now).await {
                Ok(report) => {
                    all_ok &= report.summary.failed() == 0;
                    display_close_report(&report, invocation.dry_run, now, &mut stdout)?;
                }
                Err(e) => {
                    error!("{:#}", e);
                    all_ok = false;
                }
            }
        }
        return Ok(all_ok);
    }

    let Some(mode) = batch_mode(&invocation.command) else {
        return Ok(all_ok);
    };

    let mut reports = Vec::new();
    for repo in repos {
        let config = ResolvedConfig::resolve(file, repo, &invocation.overrides);
        match process_repository(forge, &config, mode).await {
            Ok(report) => {
                all_ok &= report.summary.failed() == 0;
                if mode != Mode::Check {
                    display_batch_summary(&report, &mut stdout)?;
                }
                reports.push(report);
            }
            Err(e) => {
                error!("{:#}", e);
                all_ok = false;
            }
        }
    }

    if let Command::Check { display, .. } = &invocation.command {
        display_check_report(&reports, *display, &mut stdout)?;
    }

    Ok(all_ok)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let invocation = match parse_args(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    init_tracing(invocation.debug);

    let file = FileConfig::load(invocation.config_path.as_deref())?;
    let repos = invocation.repositories(&file)?;
    let token = resolve_token(
        invocation.github_token.as_deref(),
        file.github_token.as_deref(),
    )?;
    let github = GitHub::new(token, bot_login(&file, &invocation.overrides))?;

    let all_ok = if invocation.dry_run {
        run(&DryRun::new(github), &invocation, &file, &repos).await?
    } else {
        run(&github, &invocation, &file, &repos).await?
    };

    if !all_ok {
        std::process::exit(1);
    }

    Ok(())
}
