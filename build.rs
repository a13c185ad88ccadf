//! Build script for dependabot-bouncer: embeds a version string.
//!
//! `BUILD_VERSION` is `CARGO_PKG_VERSION` followed by the output of
//! `git describe --tags --always --dirty` in parentheses when git is
//! available. Outside a git checkout the build date is used instead so
//! that locally built binaries can still be told apart.

use std::{env, process::Command};

use chrono::Utc;

fn main() {
    ["src", "build.rs", "Cargo.toml"]
        .iter()
        .for_each(|path| println!("cargo:rerun-if-changed={path}"));

    println!("cargo:rustc-env=BUILD_VERSION={}", build_version());
}

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn build_version() -> String {
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    match git(&["describe", "--tags", "--always", "--dirty"]) {
        Some(describe) => format!("{version} ({describe})"),
        None => format!("{version} (built {})", Utc::now().format("%Y-%m-%d")),
    }
}
