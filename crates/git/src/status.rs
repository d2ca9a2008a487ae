//! `git status --porcelain` parsing

use std::fmt;

/// Kind of change reported for one porcelain entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    Untracked,
}

impl ChangeKind {
    /// Token used in status digests
    pub fn token(&self) -> &'static str {
        match self {
            ChangeKind::Modified => "modified",
            ChangeKind::Added => "added",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
            ChangeKind::Copied => "copied",
            ChangeKind::Untracked => "untracked",
        }
    }

    fn from_code(code: char) -> Option<Self> {
        match code {
            'M' | 'T' | 'U' => Some(ChangeKind::Modified),
            'A' => Some(ChangeKind::Added),
            'D' => Some(ChangeKind::Deleted),
            'R' => Some(ChangeKind::Renamed),
            'C' => Some(ChangeKind::Copied),
            '?' => Some(ChangeKind::Untracked),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One line of porcelain status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub kind: ChangeKind,
    /// Path relative to the repository root (destination path for renames)
    pub path: String,
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.path)
    }
}

/// Parse porcelain v1 output into entries
///
/// The index column wins over the worktree column, so a file that is staged
/// as added and then edited reports as `added`. Ignored (`!!`) and
/// unrecognized lines are skipped.
pub fn parse_porcelain(output: &str) -> Vec<StatusEntry> {
    output.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<StatusEntry> {
    let mut chars = line.chars();
    let index = chars.next()?;
    let worktree = chars.next()?;
    let rest = line.get(3..)?;

    let kind = if index == '?' && worktree == '?' {
        ChangeKind::Untracked
    } else {
        [index, worktree]
            .into_iter()
            .filter(|c| *c != ' ' && *c != '?')
            .find_map(ChangeKind::from_code)?
    };

    let path = match kind {
        ChangeKind::Renamed | ChangeKind::Copied => rest.rsplit(" -> ").next().unwrap_or(rest),
        _ => rest,
    };

    Some(StatusEntry {
        kind,
        path: unquote(path.trim()),
    })
}

/// Strip the C-style quoting git applies to unusual paths
fn unquote(path: &str) -> String {
    match path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => path.to_string(),
    }
}
