//! Task-id validation.

use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{2,}-[A-Za-z0-9]{2,10}(\.[0-9]+)?$")
            .expect("task_id pattern is a valid static regex")
    })
}

/// Validate a task id against the grammar
/// `^[A-Za-z]{2,}-[A-Za-z0-9]{2,10}(\.[0-9]+)?$`. Rejects whitespace,
/// control characters, and shell metacharacters even where the character
/// class would otherwise be ambiguous, since the regex anchors the whole
/// string.
pub fn is_valid_task_id(task_id: &str) -> bool {
    pattern().is_match(task_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_ids() {
        assert!(is_valid_task_id("perles-abc"));
        assert!(is_valid_task_id("perles-abc.1"));
        assert!(is_valid_task_id("AB-1234567890"));
        assert!(is_valid_task_id("proj-x9y.42"));
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(!is_valid_task_id(""));
        assert!(!is_valid_task_id("perles"));
        assert!(!is_valid_task_id("perles-"));
        assert!(!is_valid_task_id("-abc"));
        assert!(!is_valid_task_id("perles--abc"));
        assert!(!is_valid_task_id("perles-ab c"));
        assert!(!is_valid_task_id("perles-ab;rm -rf"));
        assert!(!is_valid_task_id("perles-ab`whoami`"));
        assert!(!is_valid_task_id("perles-ab|cat"));
        assert!(!is_valid_task_id("perles-ab(x)"));
        assert!(!is_valid_task_id("perles-ab\ttab"));
        assert!(!is_valid_task_id("perles-ab\nnewline"));
    }
}
