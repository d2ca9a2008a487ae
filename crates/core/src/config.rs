//! Layered configuration
//!
//! Configuration is read from, in increasing priority:
//! 1. Built-in defaults
//! 2. The user file (`$CONFIG_DIR/autocommit/config.toml`)
//! 3. The repository file (`<repo>/.autocommit.toml`)
//! 4. Environment credentials (`OLLAMA_HOST`, `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`)
//!
//! Parsing is lenient per field: a value of the wrong type is dropped with a
//! warning and the default is used instead of rejecting the whole file.

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::{debug, warn};

/// Repository-local configuration file name
pub const REPO_CONFIG_FILE: &str = ".autocommit.toml";

/// Default prompt template; `{changes}` is replaced by the status digest
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Write a single-line git commit message \
(at most 72 characters) that describes the following changes. \
Respond with the commit message only.\n\nChanges:\n{changes}";

/// Complete autocommit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Master switch for automatic commits
    pub enabled: bool,
    pub triggers: TriggerRules,
    pub git: GitSettings,
    pub message: MessageSettings,
    pub ai: AiSettings,
    pub watcher: WatcherSettings,
    pub notifications: NotificationSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            triggers: TriggerRules::default(),
            git: GitSettings::default(),
            message: MessageSettings::default(),
            ai: AiSettings::default(),
            watcher: WatcherSettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

/// When an automatic commit attempt may start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerRules {
    /// Evaluate the trigger on every recorded file change
    pub on_save: bool,
    /// Evaluate the trigger every `interval_minutes`
    pub on_interval: bool,
    /// Evaluate the trigger when the checked-out branch changes
    pub on_branch_switch: bool,
    /// Minimum number of change events (repeated saves count)
    pub min_change_count: u32,
    /// Minimum number of distinct changed files
    pub file_count_threshold: u32,
    /// Minimum minutes between automatic commits
    pub time_threshold_minutes: u32,
    /// Period of the interval trigger
    pub interval_minutes: u32,
    /// Glob patterns; a change matching one counts as significant
    pub file_patterns: Vec<String>,
    /// Paths; a change to one counts as significant
    pub specific_files: Vec<String>,
    /// Require the time threshold for every automatic firing
    pub require_time_threshold: bool,
}

impl Default for TriggerRules {
    fn default() -> Self {
        Self {
            on_save: true,
            on_interval: true,
            on_branch_switch: false,
            min_change_count: 5,
            file_count_threshold: 3,
            time_threshold_minutes: 5,
            interval_minutes: 10,
            file_patterns: Vec::new(),
            specific_files: Vec::new(),
            require_time_threshold: true,
        }
    }
}

/// How changes are staged before committing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageMode {
    /// `git add -A`
    #[default]
    All,
    /// `git add` per configured pattern
    Specific,
    /// Ask a selector which changed files to stage
    Prompt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    pub stage_mode: StageMode,
    /// Pathspecs staged in `specific` mode
    pub stage_patterns: Vec<String>,
    /// Branch to commit on (empty = current branch)
    pub target_branch: String,
    pub auto_push: bool,
    /// Retries for transient push failures
    pub push_retries: u32,
    pub pull_before_push: bool,
    pub remote: String,
    /// Extra arguments passed to `git push`
    pub push_options: Vec<String>,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            stage_mode: StageMode::All,
            stage_patterns: Vec::new(),
            target_branch: String::new(),
            auto_push: false,
            push_retries: 3,
            pull_before_push: false,
            remote: "origin".to_string(),
            push_options: Vec::new(),
        }
    }
}

/// Commit message style requested from the AI backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStyle {
    #[default]
    Conventional,
    Simple,
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSettings {
    pub style: CommitStyle,
    /// Language code (`en`, `zh`, `ja`, `ko`, `de`, `fr`, `es`)
    pub language: String,
    pub prompt_template: String,
    /// Diffs longer than this are left out of the prompt
    pub max_diff_chars: usize,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            style: CommitStyle::Conventional,
            language: "en".to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            max_diff_chars: 6000,
        }
    }
}

/// AI text-generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama endpoint
    #[default]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub provider: ProviderKind,
    /// Per-request timeout
    pub timeout_secs: u64,
    pub ollama_url: String,
    pub ollama_model: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            timeout_secs: 30,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
            anthropic_api_key: String::new(),
            anthropic_model: "claude-3-5-haiku-latest".to_string(),
        }
    }
}

// Keys never reach the logs.
impl fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiSettings")
            .field("provider", &self.provider)
            .field("timeout_secs", &self.timeout_secs)
            .field("ollama_url", &self.ollama_url)
            .field("ollama_model", &self.ollama_model)
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("anthropic_api_key", &mask(&self.anthropic_api_key))
            .field("anthropic_model", &self.anthropic_model)
            .finish()
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Honour `.gitignore` when filtering watcher events
    pub use_gitignore: bool,
    /// Extra ignore patterns
    pub additional_patterns: Vec<String>,
    pub reconcile_interval_secs: u64,
    pub health_check_interval_secs: u64,
    /// Warn when a commit attempt runs longer than this
    pub stall_warning_secs: u64,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            use_gitignore: true,
            additional_patterns: Vec::new(),
            reconcile_interval_secs: 300,
            health_check_interval_secs: 60,
            stall_warning_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Notify on successful automatic commits
    pub show_success: bool,
    /// Notify on degraded outcomes (fallback message, failed push)
    pub show_warnings: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            show_success: true,
            show_warnings: true,
        }
    }
}

impl Config {
    /// Load the effective configuration for a repository
    pub fn load(repo_root: &Path) -> Result<Self, ConfigError> {
        let sources = Self::sources(repo_root);
        let mut config = Self::load_from(&sources)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config.sanitized())
    }

    /// Candidate config files, lowest priority first
    pub fn sources(repo_root: &Path) -> Vec<PathBuf> {
        let mut sources = Vec::new();
        if let Some(user) = user_config_path() {
            sources.push(user);
        }
        sources.push(repo_root.join(REPO_CONFIG_FILE));
        sources
    }

    /// Merge the given files (missing files are skipped)
    pub fn load_from(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut merged = Table::new();

        for path in paths {
            if !path.exists() {
                continue;
            }

            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let table = content.parse::<Table>().map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

            debug!("Loaded config layer from {}", path.display());
            merge_tables(&mut merged, table);
        }

        Ok(Self::from_table(merged).sanitized())
    }

    /// Parse a single TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table = content.parse::<Table>().map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Ok(Self::from_table(table).sanitized())
    }

    /// Build a config from a parsed table, dropping invalid fields
    pub fn from_table(mut table: Table) -> Self {
        if let Some(enabled) = table.get("enabled") {
            if !enabled.is_bool() {
                warn!("Ignoring invalid config value for 'enabled'");
                table.remove("enabled");
            }
        }

        prune_section::<TriggerRules>(&mut table, "triggers");
        prune_section::<GitSettings>(&mut table, "git");
        prune_section::<MessageSettings>(&mut table, "message");
        prune_section::<AiSettings>(&mut table, "ai");
        prune_section::<WatcherSettings>(&mut table, "watcher");
        prune_section::<NotificationSettings>(&mut table, "notifications");

        match Value::Table(table).try_into::<Config>() {
            Ok(config) => config,
            Err(e) => {
                warn!("Falling back to default configuration: {}", e);
                Config::default()
            }
        }
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = non_empty("OLLAMA_HOST") {
            self.ai.ollama_url = host;
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.ai.openai_api_key = key;
        }
        if let Some(key) = non_empty("ANTHROPIC_API_KEY") {
            self.ai.anthropic_api_key = key;
        }
    }

    /// Replace zero thresholds and blank strings with defaults
    pub fn sanitized(mut self) -> Self {
        let rules = TriggerRules::default();
        let t = &mut self.triggers;
        t.min_change_count = positive_or(t.min_change_count, rules.min_change_count);
        t.file_count_threshold = positive_or(t.file_count_threshold, rules.file_count_threshold);
        t.time_threshold_minutes =
            positive_or(t.time_threshold_minutes, rules.time_threshold_minutes);
        t.interval_minutes = positive_or(t.interval_minutes, rules.interval_minutes);
        t.file_patterns.retain(|p| !p.trim().is_empty());
        t.specific_files.retain(|p| !p.trim().is_empty());

        let git = GitSettings::default();
        let g = &mut self.git;
        g.push_retries = positive_or(g.push_retries, git.push_retries);
        g.target_branch = g.target_branch.trim().to_string();
        if g.remote.trim().is_empty() {
            g.remote = git.remote;
        }
        g.stage_patterns.retain(|p| !p.trim().is_empty());

        let message = MessageSettings::default();
        let m = &mut self.message;
        m.max_diff_chars = positive_or(m.max_diff_chars, message.max_diff_chars);
        m.language = m.language.trim().to_lowercase();
        if m.language.is_empty() {
            m.language = message.language;
        }
        if m.prompt_template.trim().is_empty() {
            m.prompt_template = message.prompt_template;
        }

        let ai = AiSettings::default();
        self.ai.timeout_secs = positive_or(self.ai.timeout_secs, ai.timeout_secs);

        let watcher = WatcherSettings::default();
        let w = &mut self.watcher;
        w.reconcile_interval_secs =
            positive_or(w.reconcile_interval_secs, watcher.reconcile_interval_secs);
        w.health_check_interval_secs =
            positive_or(w.health_check_interval_secs, watcher.health_check_interval_secs);
        w.stall_warning_secs = positive_or(w.stall_warning_secs, watcher.stall_warning_secs);

        self
    }

    /// Render the default configuration as a TOML document
    pub fn example() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Config::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// User-level config file location
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("autocommit").join("config.toml"))
}

fn positive_or<T>(value: T, fallback: T) -> T
where
    T: Default + PartialEq,
{
    if value == T::default() {
        fallback
    } else {
        value
    }
}

/// Deep-merge `overlay` into `base`; overlay values win
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        if let Value::Table(incoming) = value {
            if let Some(Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Drop keys of `name` that do not deserialize into `T` on their own
fn prune_section<T: DeserializeOwned>(root: &mut Table, name: &str) {
    let is_table = matches!(root.get(name), Some(Value::Table(_)));
    if !is_table {
        if root.remove(name).is_some() {
            warn!("Ignoring config section '{}': expected a table", name);
        }
        return;
    }

    let Some(Value::Table(section)) = root.get_mut(name) else {
        return;
    };

    let keys: Vec<String> = section.keys().cloned().collect();
    for key in keys {
        let Some(value) = section.get(&key).cloned() else {
            continue;
        };

        let mut probe = Table::new();
        probe.insert(key.clone(), value);
        if Value::Table(probe).try_into::<T>().is_err() {
            warn!("Ignoring invalid config value for '{}.{}'", name, key);
            section.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_sane() {
        let config = Config::default();
        assert!(config.enabled);
        assert_eq!(config.git.stage_mode, StageMode::All);
        assert_eq!(config.ai.provider, ProviderKind::Ollama);
        assert!(config.triggers.require_time_threshold);
        assert_eq!(config, Config::default().sanitized());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [triggers]
            min_change_count = 10

            [git]
            stage_mode = "specific"
            stage_patterns = ["src/**"]
            "#,
        )
        .unwrap();

        assert_eq!(config.triggers.min_change_count, 10);
        assert_eq!(config.triggers.file_count_threshold, 3);
        assert_eq!(config.git.stage_mode, StageMode::Specific);
        assert_eq!(config.git.stage_patterns, vec!["src/**".to_string()]);
        assert_eq!(config.git.remote, "origin");
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = Config::from_toml_str(
            r#"
            enabled = "yes"

            [triggers]
            min_change_count = "lots"
            file_count_threshold = 0
            time_threshold_minutes = -4
            on_save = false

            [git]
            stage_mode = "sometimes"
            push_retries = 0
            "#,
        )
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.triggers.min_change_count, 5);
        assert_eq!(config.triggers.file_count_threshold, 3);
        assert_eq!(config.triggers.time_threshold_minutes, 5);
        assert!(!config.triggers.on_save);
        assert_eq!(config.git.stage_mode, StageMode::All);
        assert_eq!(config.git.push_retries, 3);
    }

    #[test]
    fn test_non_table_section_is_ignored() {
        let config = Config::from_toml_str("triggers = 3\n").unwrap();
        assert_eq!(config.triggers, TriggerRules::default());
    }

    #[test]
    fn test_layers_merge_with_later_files_winning() {
        let temp_dir = TempDir::new().unwrap();
        let user = temp_dir.path().join("user.toml");
        let repo = temp_dir.path().join(REPO_CONFIG_FILE);

        fs::write(
            &user,
            "[ai]\nprovider = \"openai\"\nopenai_model = \"gpt-x\"\n[git]\nauto_push = true\n",
        )
        .unwrap();
        fs::write(&repo, "[ai]\nopenai_model = \"gpt-y\"\n").unwrap();

        let config = Config::load_from(&[user, repo, temp_dir.path().join("missing.toml")])
            .unwrap();

        assert_eq!(config.ai.provider, ProviderKind::OpenAi);
        assert_eq!(config.ai.openai_model, "gpt-y");
        assert!(config.git.auto_push);
    }

    #[test]
    fn test_parse_error_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(REPO_CONFIG_FILE);
        fs::write(&path, "[triggers\n").unwrap();

        let err = Config::load_from(&[path.clone()]).unwrap_err();
        assert!(err.to_string().contains(REPO_CONFIG_FILE));
    }

    #[test]
    fn test_env_overrides_credentials() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "OLLAMA_HOST" => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.ai.openai_api_key, "sk-test");
        assert_eq!(config.ai.ollama_url, AiSettings::default().ollama_url);
    }

    #[test]
    fn test_debug_masks_api_keys() {
        let mut config = Config::default();
        config.ai.anthropic_api_key = "secret-value".to_string();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_sanitize_normalizes_strings() {
        let mut config = Config::default();
        config.message.language = " ZH ".to_string();
        config.message.prompt_template = "   ".to_string();
        config.git.target_branch = " main ".to_string();
        config.triggers.file_patterns = vec!["".to_string(), "*.rs".to_string()];

        let config = config.sanitized();
        assert_eq!(config.message.language, "zh");
        assert_eq!(config.message.prompt_template, DEFAULT_PROMPT_TEMPLATE);
        assert_eq!(config.git.target_branch, "main");
        assert_eq!(config.triggers.file_patterns, vec!["*.rs".to_string()]);
    }

    #[test]
    fn test_example_round_trips() {
        let example = Config::example().unwrap();
        let parsed = Config::from_toml_str(&example).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
