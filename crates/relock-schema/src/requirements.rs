//! Reading `*.in` manifests: one requirement per line, `#` comments,
//! `-r`/`-c` includes. Anything else starting with `-` is a resolver
//! option and is ignored here.

use crate::types::PackageName;
use std::fs;
use std::path::{Path, PathBuf};

/// A direct requirement as written in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: PackageName,
    pub extras: Vec<String>,
    /// Version specifier exactly as written, e.g. `>=4.2,<5.0`. May be empty.
    pub specifier: String,
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementsFile {
    pub requirements: Vec<Requirement>,
    /// `-r` targets, relative to the manifest's directory.
    pub includes: Vec<PathBuf>,
    /// `-c` targets, relative to the manifest's directory.
    pub constraints: Vec<PathBuf>,
}

pub fn parse_requirements_str(input: &str) -> RequirementsFile {
    let mut file = RequirementsFile::default();

    for raw in input.lines() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(option) = line.strip_prefix('-') {
            if let Some(target) = option_value(option, &["r", "-requirement"]) {
                file.includes.push(PathBuf::from(target));
            } else if let Some(target) = option_value(option, &["c", "-constraint"]) {
                file.constraints.push(PathBuf::from(target));
            }
            continue;
        }

        if let Some(req) = parse_requirement_line(line) {
            file.requirements.push(req);
        }
    }

    file
}

pub fn parse_requirements_file(path: impl AsRef<Path>) -> std::io::Result<RequirementsFile> {
    let content = fs::read_to_string(path)?;
    Ok(parse_requirements_str(&content))
}

/// Parse `name[extra1,extra2] <specifier> ; <marker>`. Returns `None` for
/// URLs and paths, which carry no plain name.
pub fn parse_requirement_line(line: &str) -> Option<Requirement> {
    let line = line.trim();
    let (body, marker) = match line.split_once(';') {
        Some((b, m)) => (b.trim(), Some(m.trim().to_owned()).filter(|m| !m.is_empty())),
        None => (line, None),
    };

    if !body.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return None;
    }
    let name_end = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(body.len());
    let (name, mut rest) = body.split_at(name_end);
    rest = rest.trim_start();

    if rest.starts_with('@') || rest.starts_with("://") || rest.starts_with('/') {
        return None;
    }

    let mut extras = Vec::new();
    if let Some(after) = rest.strip_prefix('[') {
        let (inside, tail) = after.split_once(']')?;
        extras = inside
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_owned)
            .collect();
        rest = tail.trim_start();
    }

    Some(Requirement {
        name: PackageName::normalized(name),
        extras,
        specifier: rest.trim().to_owned(),
        marker,
    })
}

fn strip_comment(line: &str) -> &str {
    // Only a `#` at line start or after whitespace starts a comment; URL
    // fragments such as `#egg=` stay intact.
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return &line[..i];
        }
    }
    line
}

fn option_value<'a>(option: &'a str, flags: &[&str]) -> Option<&'a str> {
    for flag in flags {
        if let Some(rest) = option.strip_prefix(flag) {
            let value = rest.strip_prefix('=').unwrap_or(rest).trim();
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}
