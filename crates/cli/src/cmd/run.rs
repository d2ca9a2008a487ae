//! Commit now
//!
//! With a daemon serving the repository the request is handed to it, so its
//! run token also covers manual runs. Otherwise the pipeline runs once in
//! this process with the manual trigger. The manual trigger bypasses the
//! trigger rules; an empty working tree is an error here rather than a
//! silent no-op.

use crate::daemon;
use crate::notify::TerminalNotifier;
use crate::util;
use ac_core::{Config, StageMode, TriggerKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use engine::{Orchestrator, StageSelector, StepOutcome};
use git::StatusEntry;
use message::MessageSource;
use nix::sys::signal::Signal;
use owo_colors::OwoColorize;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

pub async fn run() -> Result<ExitCode> {
    let repo_root = util::find_repo_root().await?;

    if let Some(running) = daemon::running(&repo_root) {
        daemon::send_signal(&running, Signal::SIGUSR2)?;
        println!(
            "{} Commit requested from daemon (pid {})",
            "✓".green(),
            running.pid
        );
        println!(
            "  {} {}",
            "logs:".dimmed(),
            util::log_dir(&repo_root).display().to_string().dimmed()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load(&repo_root).context("Failed to load configuration")?;
    let interactive = config.git.stage_mode == StageMode::Prompt;

    let mut builder = Orchestrator::builder(&repo_root, config)
        .notifier(Arc::new(TerminalNotifier))
        .enabled(true);
    if interactive {
        builder = builder.selector(Arc::new(StdinSelector));
    }
    let orchestrator = builder.build();

    // The notifier has already printed the summary or the error
    let attempt = orchestrator.execute(TriggerKind::Manual).await?;

    if let Some(message) = &attempt.message {
        let source = match &message.source {
            MessageSource::Ai { provider } => provider.to_string(),
            MessageSource::Fallback { .. } => "fallback".to_string(),
        };
        println!("  {} {}", "message:".dimmed(), source.dimmed());
    }
    if let Some(branch) = &attempt.branch {
        println!("  {} {}", "branch:".dimmed(), branch.dimmed());
    }
    for (step, outcome) in &attempt.steps {
        match outcome {
            StepOutcome::Success => {}
            StepOutcome::Degraded(reason) => {
                println!("  {} {}: {}", "~".yellow(), step, reason)
            }
            StepOutcome::Fatal(reason) => println!("  {} {}: {}", "✗".red(), step, reason),
        }
    }

    Ok(if attempt.error().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Asks on the terminal which changed files to stage
struct StdinSelector;

#[async_trait]
impl StageSelector for StdinSelector {
    async fn select(&self, candidates: &[StatusEntry]) -> Result<Vec<String>> {
        println!("{}", "Changed files:".bold());
        for (i, entry) in candidates.iter().enumerate() {
            println!("  {:>2}) {}", i + 1, entry);
        }
        print!("Stage which files? (numbers, 'a' for all, empty for none): ");
        std::io::stdout().flush()?;

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .context("Selection prompt was cancelled")??;

        parse_selection(&line, candidates)
    }
}

/// Parse "1 3,4" or "a" into the chosen paths, in input order
fn parse_selection(input: &str, candidates: &[StatusEntry]) -> Result<Vec<String>> {
    let mut chosen: Vec<String> = Vec::new();

    for token in input.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() {
            continue;
        }
        if matches!(token, "a" | "all" | "*") {
            return Ok(candidates.iter().map(|e| e.path.clone()).collect());
        }

        let index: usize = token
            .parse()
            .ok()
            .filter(|n| (1..=candidates.len()).contains(n))
            .with_context(|| format!("Invalid selection '{}'", token))?;

        let path = &candidates[index - 1].path;
        if !chosen.contains(path) {
            chosen.push(path.clone());
        }
    }

    Ok(chosen)
}
