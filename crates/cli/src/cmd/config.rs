//! Configuration inspection command
//!
//! The daemon never writes configuration; this command only prints it, or
//! seeds the user file with the defaults when asked.

use crate::util;
use ac_core::config::{user_config_path, REPO_CONFIG_FILE};
use ac_core::Config;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use std::process::ExitCode;

pub async fn run(path: bool, example: bool, create: bool) -> Result<ExitCode> {
    if example {
        print!("{}", Config::example()?);
        return Ok(ExitCode::SUCCESS);
    }

    if create {
        create_user_config()?;
    }

    // Paths work outside a repository too
    let repo_root = util::find_repo_root().await.ok();

    if path {
        print_sources(repo_root.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    let Some(repo_root) = repo_root else {
        anyhow::bail!("Not inside a git repository; use --path or --example");
    };

    let config = Config::load(&repo_root).context("Failed to load configuration")?;
    println!("{}", "Effective Configuration".bold());
    print_sources(Some(&repo_root));
    println!();
    print!("{}", render_redacted(&config)?);

    Ok(ExitCode::SUCCESS)
}

fn print_sources(repo_root: Option<&Path>) {
    let mut sources = Vec::new();
    if let Some(user) = user_config_path() {
        sources.push(("user", user));
    }
    if let Some(root) = repo_root {
        sources.push(("repo", root.join(REPO_CONFIG_FILE)));
    }

    for (layer, source) in sources {
        let state = if source.exists() {
            "".to_string()
        } else {
            " (missing)".dimmed().to_string()
        };
        println!("{}: {}{}", layer.dimmed(), source.display(), state);
    }
}

fn create_user_config() -> Result<()> {
    let path = user_config_path().context("Could not determine config directory")?;

    if path.exists() {
        println!("{}", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    std::fs::write(&path, Config::example()?).context("Failed to write config file")?;
    println!("{} Created config file at: {}", "✓".green(), path.display());
    Ok(())
}

/// TOML of `config` with API keys masked
fn render_redacted(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    for key in [&mut shown.ai.openai_api_key, &mut shown.ai.anthropic_api_key] {
        if !key.is_empty() {
            *key = "<redacted>".to_string();
        }
    }
    toml::to_string_pretty(&shown).context("Failed to render configuration")
}
