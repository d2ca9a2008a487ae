//! Prompt construction

use ac_core::{CommitStyle, MessageSettings};
use git::StatusEntry;

const CHANGES_PLACEHOLDER: &str = "{changes}";

/// One `<token>: <path>` line per status entry
pub fn status_digest(entries: &[StatusEntry]) -> String {
    entries
        .iter()
        .map(|entry| entry.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full prompt sent to the backend
///
/// The diff is included only when it is non-empty and shorter than
/// `settings.max_diff_chars`.
pub fn build_prompt(settings: &MessageSettings, digest: &str, diff: &str) -> String {
    let digest = if digest.trim().is_empty() {
        "(no file list available)"
    } else {
        digest
    };

    let mut prompt = if settings.prompt_template.contains(CHANGES_PLACEHOLDER) {
        settings.prompt_template.replace(CHANGES_PLACEHOLDER, digest)
    } else {
        format!("{}\n\nChanges:\n{}", settings.prompt_template.trim_end(), digest)
    };

    prompt.push_str("\n\n");
    prompt.push_str(style_directive(settings.style));
    prompt.push('\n');
    prompt.push_str(&format!(
        "Write the message in {}.",
        language_name(&settings.language)
    ));

    let diff = diff.trim();
    if !diff.is_empty() && diff.chars().count() < settings.max_diff_chars {
        prompt.push_str("\n\nStaged diff:\n");
        prompt.push_str(diff);
    } else {
        prompt.push_str("\n\nNote: the diff was omitted; only the file list above was used.");
    }

    prompt
}

fn style_directive(style: CommitStyle) -> &'static str {
    match style {
        CommitStyle::Conventional => {
            "Use the Conventional Commits format `type: subject` \
             (types: feat, fix, docs, style, refactor, test, chore)."
        }
        CommitStyle::Simple => "Use a short imperative sentence without a type prefix.",
        CommitStyle::Detailed => {
            "Use a specific imperative subject that names what changed and where."
        }
    }
}

/// English name of a language code, defaulting to English
pub fn language_name(code: &str) -> &'static str {
    match primary_subtag(code).as_str() {
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        _ => "English",
    }
}

/// `zh-CN` -> `zh`
pub(crate) fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}
