//! Splitting command text into exec-units on `GO` separator lines

use regex::Regex;
use std::sync::OnceLock;

fn separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new("\r\nGO\r\n").expect("valid separator pattern"))
}

/// Split `sql` into the exec-units submitted one by one to a connection.
///
/// Units are separated by a `GO` line with Windows line endings on both
/// sides. The match is case-sensitive, and units made only of whitespace are
/// dropped. Units are returned verbatim, without trimming.
pub fn split_batches(sql: &str) -> Vec<&str> {
    separator()
        .split(sql)
        .filter(|batch| !batch.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_units() {
        assert_eq!(
            split_batches("SELECT 1\r\nGO\r\nSELECT 2"),
            vec!["SELECT 1", "SELECT 2"]
        );
    }

    #[test]
    fn test_trailing_separator_skips_empty_unit() {
        assert_eq!(split_batches("SELECT 1\r\nGO\r\n"), vec!["SELECT 1"]);
        assert_eq!(split_batches("SELECT 1\r\nGO\r\n  \r\n"), vec!["SELECT 1"]);
    }

    #[test]
    fn test_no_separator() {
        assert_eq!(
            split_batches("CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);"),
            vec!["CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);"]
        );
    }

    #[test]
    fn test_separator_is_case_sensitive_and_needs_crlf() {
        assert_eq!(split_batches("SELECT 1\r\ngo\r\nSELECT 2").len(), 1);
        assert_eq!(split_batches("SELECT 1\nGO\nSELECT 2").len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_batches("").is_empty());
        assert!(split_batches("\r\nGO\r\n").is_empty());
    }
}
