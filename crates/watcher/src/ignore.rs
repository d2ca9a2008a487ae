//! Ignore pattern management
//!
//! Supports multiple sources of ignore patterns:
//! 1. Built-in patterns (VCS metadata, dependency/build directories, editor
//!    temp files - always active)
//! 2. .gitignore patterns (optional, enabled by default)
//! 3. Config-based patterns (additional custom globs)

use ac_core::{PathFilter, WatcherSettings};
use anyhow::Result;
use glob::Pattern;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directories whose contents never count as user changes
const BUILTIN_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    ".idea",
    ".vscode",
];

/// Ignore configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreConfig {
    /// Use .gitignore patterns (default: true)
    pub use_gitignore: bool,

    /// Additional glob patterns from config
    pub additional_patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_gitignore: true,
            additional_patterns: vec![],
        }
    }
}

impl From<&WatcherSettings> for IgnoreConfig {
    fn from(settings: &WatcherSettings) -> Self {
        Self {
            use_gitignore: settings.use_gitignore,
            additional_patterns: settings.additional_patterns.clone(),
        }
    }
}

/// Ignore rule manager
///
/// Built-in patterns are checked first and always enforced; `.gitignore`
/// and configured patterns follow.
pub struct IgnoreRules {
    /// Repository root directory
    repo_root: PathBuf,

    /// Gitignore patterns (optional)
    gitignore: Option<Gitignore>,

    /// Compiled additional patterns
    patterns: Vec<Pattern>,

    /// Configuration
    config: IgnoreConfig,
}

impl IgnoreRules {
    /// Load ignore rules for repository
    pub fn load(repo_root: &Path, config: IgnoreConfig) -> Result<Self> {
        let mut rules = Self {
            repo_root: repo_root.to_path_buf(),
            gitignore: None,
            patterns: Vec::new(),
            config,
        };

        rules.reload_ignore_files()?;
        Ok(rules)
    }

    /// Reload ignore files from disk
    ///
    /// Called when `.gitignore` changes or the configuration is replaced.
    pub fn reload_ignore_files(&mut self) -> Result<()> {
        self.gitignore = None;
        if self.config.use_gitignore {
            let gitignore_path = self.repo_root.join(".gitignore");
            if gitignore_path.exists() {
                let mut builder = GitignoreBuilder::new(&self.repo_root);
                if let Some(err) = builder.add(&gitignore_path) {
                    warn!("Partially invalid .gitignore: {}", err);
                }
                self.gitignore = Some(builder.build()?);
            }
        }

        self.patterns = self
            .config
            .additional_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p.trim_end_matches('/')) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Skipping invalid ignore pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();

        debug!("Ignore rules loaded ({} sources)", self.active_sources());
        Ok(())
    }

    /// Check if path should be ignored
    ///
    /// Accepts paths relative to the repository root or absolute paths
    /// inside it. Absolute paths outside the root are only checked against
    /// the built-in patterns.
    pub fn should_ignore(&self, path: &Path) -> bool {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.repo_root).ok()
        } else {
            Some(path)
        };

        // 1. Built-in patterns (always enforced)
        if is_builtin_ignored(relative.unwrap_or(path)) {
            return true;
        }

        let Some(relative) = relative else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        // 2. .gitignore
        if let Some(ref gitignore) = self.gitignore {
            let is_dir = self.repo_root.join(relative).is_dir();
            if gitignore
                .matched_path_or_any_parents(relative, is_dir)
                .is_ignore()
            {
                return true;
            }
        }

        // 3. Additional config patterns, matched against the path and every parent
        relative
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| self.patterns.iter().any(|pattern| pattern.matches_path(p)))
    }

    /// Get number of active ignore sources
    pub fn active_sources(&self) -> usize {
        let mut count = 1; // Built-in always active
        if self.gitignore.is_some() {
            count += 1;
        }
        if !self.patterns.is_empty() {
            count += 1;
        }
        count
    }

    /// Get repository root
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Update configuration and reload
    pub fn update_config(&mut self, config: IgnoreConfig) -> Result<()> {
        self.config = config;
        self.reload_ignore_files()
    }
}

/// Check if path matches built-in ignore patterns
fn is_builtin_ignored(path: &Path) -> bool {
    let in_builtin_dir = path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| BUILTIN_DIRS.contains(&name))
    });

    in_builtin_dir || matches_editor_temp(path)
}

/// Check if path is an editor temporary or OS metadata file
///
/// Covers: Vim, Emacs, MacOS/Windows system files, Python bytecode
fn matches_editor_temp(path: &Path) -> bool {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    // Vim swap files
    if filename.ends_with(".swp")
        || filename.ends_with(".swo")
        || filename.ends_with(".swx") {
        return true;
    }

    // Vim/Emacs backup files
    if filename.ends_with('~') {
        return true;
    }

    // Emacs auto-save and lock files
    if (filename.starts_with('#') && filename.ends_with('#')) || filename.starts_with(".#") {
        return true;
    }

    // MacOS / Windows system files
    if filename == ".DS_Store" || filename.starts_with("._") || filename == "Thumbs.db" {
        return true;
    }

    filename.ends_with(".pyc")
}

/// Ignore rules shared between the watcher, the reconciler and the tracker
pub struct SharedIgnore {
    inner: RwLock<IgnoreRules>,
}

impl SharedIgnore {
    pub fn new(rules: IgnoreRules) -> Self {
        Self {
            inner: RwLock::new(rules),
        }
    }

    /// Re-read `.gitignore` from disk
    pub fn reload(&self) -> Result<()> {
        self.inner.write().reload_ignore_files()
    }

    /// Replace the configuration and re-parse
    pub fn update_config(&self, config: IgnoreConfig) -> Result<()> {
        self.inner.write().update_config(config)
    }

    pub fn repo_root(&self) -> PathBuf {
        self.inner.read().repo_root().to_path_buf()
    }
}

impl PathFilter for SharedIgnore {
    fn is_ignored(&self, path: &Path) -> bool {
        self.inner.read().should_ignore(path)
    }
}
