//! Removal of individual pins from generated lock files.
//!
//! A line is dropped when, after optional leading spaces or tabs, it starts
//! with `<name>==`, where the first letter of `<name>` matches in either case
//! and the rest matches exactly. For `django` this is `^[ \t]*[dD]jango==`.
//! Every other line is kept byte for byte, terminator included.

use crate::lock::{write_atomic, LockError};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinFilter {
    prefixes: Vec<String>,
}

/// Result of running a [`PinFilter`] over some text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filtered {
    pub text: String,
    /// Removed lines, without their terminators, in original order.
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StripOutcome {
    pub removed: Vec<String>,
    pub rewritten: bool,
}

impl PinFilter {
    pub fn new<S: AsRef<str>>(packages: &[S]) -> Self {
        let prefixes = packages
            .iter()
            .map(|p| format!("{}==", p.as_ref().trim()))
            .filter(|p| p.len() > 2)
            .collect();
        Self { prefixes }
    }

    pub fn matches(&self, line: &str) -> bool {
        self.matches_bytes(line.as_bytes())
    }

    /// Byte-level match; lock files are not required to be valid UTF-8.
    pub fn matches_bytes(&self, line: &[u8]) -> bool {
        let start = line
            .iter()
            .position(|b| *b != b' ' && *b != b'\t')
            .unwrap_or(line.len());
        let body = &line[start..];
        self.prefixes
            .iter()
            .any(|prefix| starts_with_pin(body, prefix.as_bytes()))
    }

    pub fn apply(&self, input: &str) -> Filtered {
        let mut text = String::with_capacity(input.len());
        let mut removed = Vec::new();
        for line in input.split_inclusive('\n') {
            if self.matches(line) {
                removed.push(line.trim_end_matches(['\n', '\r']).to_owned());
            } else {
                text.push_str(line);
            }
        }
        Filtered { text, removed }
    }
}

fn starts_with_pin(body: &[u8], prefix: &[u8]) -> bool {
    match (prefix.split_first(), body.split_first()) {
        (Some((w, want)), Some((h, have))) => w.eq_ignore_ascii_case(h) && have.starts_with(want),
        _ => false,
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| *b != b'\n' && *b != b'\r')
        .map_or(0, |i| i + 1);
    &line[..end]
}

/// The `sed` address equivalent to the filter for one package, e.g.
/// `^[ \t]*[dD]jango==` for `django`.
pub fn sed_pattern(package: &str) -> String {
    let mut out = String::from("^[ \\t]*");
    for (i, c) in package.trim().chars().enumerate() {
        match c {
            c if i == 0 && c.is_ascii_alphabetic() => {
                out.push('[');
                out.push(c.to_ascii_lowercase());
                out.push(c.to_ascii_uppercase());
                out.push(']');
            }
            '.' | '[' | ']' | '*' | '^' | '$' | '\\' | '/' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push_str("==");
    out
}

/// Filter `path` in place. The file is only rewritten when at least one
/// line was removed, and then atomically.
pub fn strip_pins_in_file(path: &Path, filter: &PinFilter) -> Result<StripOutcome, LockError> {
    let content = fs::read(path)?;
    let mut kept = Vec::with_capacity(content.len());
    let mut removed = Vec::new();
    for line in content.split_inclusive(|b| *b == b'\n') {
        if filter.matches_bytes(line) {
            removed.push(String::from_utf8_lossy(trim_line_end(line)).into_owned());
        } else {
            kept.extend_from_slice(line);
        }
    }

    if removed.is_empty() {
        debug!("no matching pins in {}", path.display());
        return Ok(StripOutcome {
            removed: Vec::new(),
            rewritten: false,
        });
    }

    write_atomic(path, &kept)?;
    debug!("removed {} line(s) from {}", removed.len(), path.display());
    Ok(StripOutcome {
        removed,
        rewritten: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn django() -> PinFilter {
        PinFilter::new(&["django"])
    }

    #[test]
    fn removes_capitalized_django_pin() {
        let out = django().apply("asgiref==3.7.2\nDjango==4.2.11\nsqlparse==0.4.4\n");
        assert_eq!(out.text, "asgiref==3.7.2\nsqlparse==0.4.4\n");
        assert_eq!(out.removed, vec!["Django==4.2.11".to_owned()]);
    }

    #[test]
    fn removes_lowercase_pin_and_keeps_lookalikes() {
        let out = django().apply("django==1.0\ndjango-extensions==1.0\n");
        assert_eq!(out.text, "django-extensions==1.0\n");
        assert_eq!(out.removed, vec!["django==1.0".to_owned()]);
    }

    #[test]
    fn only_first_letter_is_case_insensitive() {
        let f = django();
        assert!(f.matches("Django==4.2"));
        assert!(f.matches("django==4.2"));
        assert!(!f.matches("DJANGO==4.2"));
        assert!(!f.matches("dJango==4.2"));
    }

    #[test]
    fn leading_whitespace_is_allowed() {
        let f = django();
        assert!(f.matches("  Django==4.2"));
        assert!(f.matches("\tdjango==4.2"));
    }

    #[test]
    fn non_pin_mentions_are_kept() {
        let f = django();
        assert!(!f.matches("    # via django"));
        assert!(!f.matches("django>=4.2"));
        assert!(!f.matches("django"));
        assert!(!f.matches("django-nyt==1.4"));
        assert!(!f.matches("# django==4.2"));
    }

    #[test]
    fn input_without_matches_is_unchanged() {
        let input = "#\n# header\n#\nasgiref==3.7.2\n    # via django\r\nsqlparse==0.4.4";
        let out = django().apply(input);
        assert_eq!(out.text, input);
        assert!(out.removed.is_empty());
    }

    #[test]
    fn preserves_crlf_and_missing_final_newline() {
        let out = django().apply("a==1\r\nDjango==4.2\r\nb==2");
        assert_eq!(out.text, "a==1\r\nb==2");
        assert_eq!(out.removed, vec!["Django==4.2".to_owned()]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let input = "asgiref==3.7.2\nDjango==4.2.11\n    # via -r requirements/test.in\ndjango==1.0\nsqlparse==0.4.4\n";
        let once = django().apply(input).text;
        let twice = django().apply(&once).text;
        assert_eq!(once, twice);
    }

    #[test]
    fn multiple_packages() {
        let f = PinFilter::new(&["django", "celery"]);
        let out = f.apply("Celery==5.3\ndjango==4.2\nkombu==5.3\n");
        assert_eq!(out.text, "kombu==5.3\n");
    }

    #[test]
    fn empty_package_list_matches_nothing() {
        let f = PinFilter::new::<&str>(&[]);
        assert!(!f.matches("==1.0"));
        let g = PinFilter::new(&[""]);
        assert!(!g.matches("==1.0"));
    }

    #[test]
    fn sed_pattern_mirrors_filter() {
        assert_eq!(sed_pattern("django"), "^[ \\t]*[dD]jango==");
        assert_eq!(sed_pattern("Django"), "^[ \\t]*[dD]jango==");
        assert_eq!(sed_pattern("zope.interface"), "^[ \\t]*[zZ]ope\\.interface==");
        assert_eq!(sed_pattern("3to2"), "^[ \\t]*3to2==");
    }

    #[test]
    fn strip_file_removes_pin_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        fs::write(&path, "asgiref==3.7.2\nDjango==4.2.11\nsqlparse==0.4.4\n").unwrap();

        let outcome = strip_pins_in_file(&path, &django()).unwrap();
        assert!(outcome.rewritten);
        assert_eq!(outcome.removed, vec!["Django==4.2.11".to_owned()]);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "asgiref==3.7.2\nsqlparse==0.4.4\n"
        );
    }

    #[test]
    fn strip_file_without_match_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        let original = b"asgiref==3.7.2\r\n    # via django\nsqlparse==0.4.4";
        fs::write(&path, original).unwrap();

        let outcome = strip_pins_in_file(&path, &django()).unwrap();
        assert!(!outcome.rewritten);
        assert_eq!(fs::read(&path).unwrap(), original);
    }

    #[test]
    fn strip_file_keeps_non_utf8_lines_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        fs::write(&path, b"asgiref==3.7.2\n    # via caf\xe9\nDjango==4.2.11\n").unwrap();

        let outcome = strip_pins_in_file(&path, &django()).unwrap();
        assert!(outcome.rewritten);
        assert_eq!(outcome.removed, vec!["Django==4.2.11".to_owned()]);
        assert_eq!(
            fs::read(&path).unwrap(),
            b"asgiref==3.7.2\n    # via caf\xe9\n".to_vec()
        );
    }

    #[test]
    fn strip_file_preserves_crlf_terminators() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        fs::write(&path, "a==1\r\n\tdjango==4.2\r\nb==2").unwrap();

        let outcome = strip_pins_in_file(&path, &django()).unwrap();
        assert_eq!(outcome.removed, vec!["\tdjango==4.2".to_owned()]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a==1\r\nb==2");
    }

    #[test]
    fn strip_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = strip_pins_in_file(&dir.path().join("absent.txt"), &django());
        assert!(matches!(result, Err(LockError::Io(_))));
    }
}
