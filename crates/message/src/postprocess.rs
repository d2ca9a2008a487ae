//! Cleanup of raw backend output

/// Longest subject line we commit
pub const MAX_MESSAGE_CHARS: usize = 72;

const ELLIPSIS: &str = "...";
const QUOTES: &[char] = &['"', '\'', '`'];

/// Reduce backend output to a single commit subject
///
/// Returns `None` when nothing usable remains.
pub fn clean(raw: &str) -> Option<String> {
    raw.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("```"))
        .map(strip_quotes)
        .find(|line| line.chars().any(char::is_alphanumeric))
        .map(cap)
}

fn strip_quotes(mut line: &str) -> &str {
    loop {
        let trimmed = line
            .strip_prefix(QUOTES)
            .and_then(|rest| rest.strip_suffix(QUOTES));
        match trimmed {
            Some(inner) => line = inner.trim(),
            None => return line,
        }
    }
}

/// Cap at `MAX_MESSAGE_CHARS` Unicode scalar values
pub fn cap(line: &str) -> String {
    if line.chars().count() <= MAX_MESSAGE_CHARS {
        return line.to_string();
    }
    let keep = MAX_MESSAGE_CHARS - ELLIPSIS.len();
    let mut capped: String = line.chars().take(keep).collect();
    capped.push_str(ELLIPSIS);
    capped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_fences_and_quotes_removed() {
        let raw = "```\n\"feat: add login form\"\n```";
        assert_eq!(clean(raw).unwrap(), "feat: add login form");

        assert_eq!(clean("`'fix: typo'`").unwrap(), "fix: typo");
    }

    #[test]
    fn test_first_meaningful_line() {
        let raw = "\n  ---\n\nrefactor: split module\n\nLonger body text";
        assert_eq!(clean(raw).unwrap(), "refactor: split module");
    }

    #[test]
    fn test_nothing_usable() {
        assert!(clean("").is_none());
        assert!(clean("   \n```\n```\n\"\"").is_none());
    }

    #[test]
    fn test_cap_counts_characters() {
        let long = "é".repeat(100);
        let capped = cap(&long);
        assert_eq!(capped.chars().count(), MAX_MESSAGE_CHARS);
        assert!(capped.ends_with("..."));

        let exact = "a".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(cap(&exact), exact);
    }
}
