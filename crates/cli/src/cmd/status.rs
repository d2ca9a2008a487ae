//! Show daemon state, trigger rules and pending changes

use crate::{daemon, util};
use ac_core::{Config, TriggerRules};
use anyhow::{Context, Result};
use git::Git;
use owo_colors::OwoColorize;
use std::process::ExitCode;

/// Pending changes listed before eliding the rest
const MAX_LISTED: usize = 10;

pub async fn run() -> Result<ExitCode> {
    let repo_root = util::find_repo_root().await?;
    let config = Config::load(&repo_root).context("Failed to load configuration")?;
    let git = Git::open(&repo_root);

    println!("{}", "Autocommit Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    println!("Repository:    {}", repo_root.display().to_string().cyan());
    if let Ok(branch) = git.current_branch().await {
        if !branch.is_empty() {
            println!("Branch:        {}", branch);
        }
    }
    println!();

    print!("Daemon:        ");
    match daemon::running(&repo_root) {
        Some(running) => {
            println!("{}", "Running ✓".green());
            println!("  PID:         {}", running.pid);
            println!("  Uptime:      {}", util::format_uptime(running.uptime_secs()));
        }
        None => {
            println!("{}", "Not running".yellow());
            println!("  {}", "Tip: Start with 'ac start'".dimmed());
        }
    }
    println!();

    println!("Triggers:");
    for line in describe_rules(&config.triggers) {
        println!("  {}", line);
    }
    println!(
        "  AI backend:  {}{}",
        config.ai.provider.as_str(),
        if config.git.auto_push { ", auto-push on" } else { "" }
    );
    println!();

    println!("Pending changes:");
    match git.status_entries().await {
        Ok(entries) if entries.is_empty() => {
            println!("  {}", "Working tree clean".dimmed());
        }
        Ok(entries) => {
            for entry in entries.iter().take(MAX_LISTED) {
                println!("  {}", entry);
            }
            if entries.len() > MAX_LISTED {
                println!("  ... and {} more", entries.len() - MAX_LISTED);
            }
        }
        Err(e) => println!("  {} {}", "unavailable:".yellow(), e),
    }

    Ok(ExitCode::SUCCESS)
}

fn describe_rules(rules: &TriggerRules) -> Vec<String> {
    let mut events = Vec::new();
    if rules.on_save {
        events.push("save".to_string());
    }
    if rules.on_interval {
        events.push(format!("every {} min", rules.interval_minutes));
    }
    if rules.on_branch_switch {
        events.push("branch switch".to_string());
    }

    let mut lines = vec![
        format!(
            "On:          {}",
            if events.is_empty() {
                "nothing (manual only)".to_string()
            } else {
                events.join(", ")
            }
        ),
        format!(
            "Fire when:   {} changes or {} files",
            rules.min_change_count, rules.file_count_threshold
        ),
    ];

    if rules.require_time_threshold {
        lines.push(format!(
            "Rate limit:  {} min between commits",
            rules.time_threshold_minutes
        ));
    }
    if !rules.specific_files.is_empty() || !rules.file_patterns.is_empty() {
        let watched: Vec<&str> = rules
            .specific_files
            .iter()
            .chain(&rules.file_patterns)
            .map(String::as_str)
            .collect();
        lines.push(format!("Always on:   {}", watched.join(", ")));
    }

    lines
}
