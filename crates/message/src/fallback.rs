//! Deterministic commit messages
//!
//! Used whenever the AI backend fails. Built only from the status entries,
//! so it can't fail and never returns an empty string.

use crate::prompt::primary_subtag;
use ac_core::CommitStyle;
use git::{ChangeKind, StatusEntry};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counts {
    added: usize,
    deleted: usize,
    renamed: usize,
    modified: usize,
}

impl Counts {
    fn of(entries: &[StatusEntry]) -> Self {
        let mut counts = Counts::default();
        for entry in entries {
            match entry.kind {
                ChangeKind::Added | ChangeKind::Untracked => counts.added += 1,
                ChangeKind::Deleted => counts.deleted += 1,
                ChangeKind::Renamed | ChangeKind::Copied => counts.renamed += 1,
                ChangeKind::Modified => counts.modified += 1,
            }
        }
        counts
    }

    fn total(&self) -> usize {
        self.added + self.deleted + self.renamed + self.modified
    }
}

/// What the working tree change amounts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Summary {
    Unknown,
    Add(usize),
    Remove(usize),
    Rename(usize),
    Update(usize),
}

impl Summary {
    fn of(entries: &[StatusEntry]) -> Self {
        let counts = Counts::of(entries);
        let total = counts.total();

        if total == 0 {
            Summary::Unknown
        } else if counts.added == total {
            Summary::Add(total)
        } else if counts.deleted == total {
            Summary::Remove(total)
        } else if counts.renamed == total {
            Summary::Rename(total)
        } else {
            Summary::Update(total)
        }
    }

    fn commit_type(&self) -> &'static str {
        match self {
            Summary::Add(_) => "feat",
            Summary::Rename(_) => "refactor",
            Summary::Unknown | Summary::Remove(_) | Summary::Update(_) => "chore",
        }
    }
}

/// `one` for a single file, `many` otherwise; `{n}` is the count
fn count_aware(n: usize, one: &str, many: &str) -> String {
    let template = if n == 1 { one } else { many };
    template.replace("{n}", &n.to_string())
}

/// Description in `language`, or `None` when there is no template for it
fn describe(summary: Summary, language: &str) -> Option<String> {
    use Summary::*;

    let text = match (language, summary) {
        ("en", Unknown) => "update files".to_string(),
        ("en", Add(n)) => count_aware(n, "add 1 new file", "add {n} new files"),
        ("en", Remove(n)) => count_aware(n, "remove 1 file", "remove {n} files"),
        ("en", Rename(n)) => count_aware(n, "rename 1 file", "rename {n} files"),
        ("en", Update(n)) => count_aware(n, "update 1 file", "update {n} files"),

        ("zh", Unknown) => "更新文件".to_string(),
        ("zh", Add(n)) => format!("添加 {} 个新文件", n),
        ("zh", Remove(n)) => format!("删除 {} 个文件", n),
        ("zh", Rename(n)) => format!("重命名 {} 个文件", n),
        ("zh", Update(n)) => format!("更新 {} 个文件", n),

        ("ja", Unknown) => "ファイルを更新".to_string(),
        ("ja", Add(n)) => format!("新規ファイルを {} 件追加", n),
        ("ja", Remove(n)) => format!("{} 件のファイルを削除", n),
        ("ja", Rename(n)) => format!("{} 件のファイル名を変更", n),
        ("ja", Update(n)) => format!("{} 件のファイルを更新", n),

        ("ko", Unknown) => "파일 업데이트".to_string(),
        ("ko", Add(n)) => format!("새 파일 {}개 추가", n),
        ("ko", Remove(n)) => format!("파일 {}개 삭제", n),
        ("ko", Rename(n)) => format!("파일 {}개 이름 변경", n),
        ("ko", Update(n)) => format!("파일 {}개 업데이트", n),

        ("de", Unknown) => "Dateien aktualisieren".to_string(),
        ("de", Add(n)) => count_aware(n, "1 neue Datei hinzufügen", "{n} neue Dateien hinzufügen"),
        ("de", Remove(n)) => count_aware(n, "1 Datei entfernen", "{n} Dateien entfernen"),
        ("de", Rename(n)) => count_aware(n, "1 Datei umbenennen", "{n} Dateien umbenennen"),
        ("de", Update(n)) => count_aware(n, "1 Datei aktualisieren", "{n} Dateien aktualisieren"),

        ("fr", Unknown) => "mise à jour des fichiers".to_string(),
        ("fr", Add(n)) => count_aware(n, "ajout d'un nouveau fichier", "ajout de {n} nouveaux fichiers"),
        ("fr", Remove(n)) => count_aware(n, "suppression d'un fichier", "suppression de {n} fichiers"),
        ("fr", Rename(n)) => count_aware(n, "renommage d'un fichier", "renommage de {n} fichiers"),
        ("fr", Update(n)) => count_aware(n, "mise à jour d'un fichier", "mise à jour de {n} fichiers"),

        ("es", Unknown) => "actualizar archivos".to_string(),
        ("es", Add(n)) => count_aware(n, "agregar 1 archivo nuevo", "agregar {n} archivos nuevos"),
        ("es", Remove(n)) => count_aware(n, "eliminar 1 archivo", "eliminar {n} archivos"),
        ("es", Rename(n)) => count_aware(n, "renombrar 1 archivo", "renombrar {n} archivos"),
        ("es", Update(n)) => count_aware(n, "actualizar 1 archivo", "actualizar {n} archivos"),

        _ => return None,
    };
    Some(text)
}

/// Drop the `type:` prefix and capitalize, for the simple style
fn simplify(message: &str) -> String {
    let description = message
        .split_once(": ")
        .map_or(message, |(_, description)| description);
    let mut chars = description.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => message.to_string(),
    }
}

/// Fallback message for `entries` in `language`
pub fn fallback_message(entries: &[StatusEntry], language: &str, style: CommitStyle) -> String {
    let summary = Summary::of(entries);
    let description = describe(summary, &primary_subtag(language))
        .or_else(|| describe(summary, "en"))
        .unwrap_or_else(|| "update files".to_string());
    let message = format!("{}: {}", summary.commit_type(), description);
    match style {
        CommitStyle::Simple => simplify(&message),
        CommitStyle::Conventional | CommitStyle::Detailed => message,
    }
}
