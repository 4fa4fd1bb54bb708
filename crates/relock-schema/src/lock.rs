use crate::requirements::RequirementsFile;
use crate::types::{PackageName, ShortDigest};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to replace {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// An exact `name==version` pin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Pin {
    pub name: PackageName,
    pub version: String,
}

/// A resolver-generated lock file: leading comment header plus pins.
///
/// Only the information `relock` reports on is kept; the file itself is
/// never re-serialized from this structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFile {
    pub header: Vec<String>,
    pub pins: Vec<Pin>,
}

impl LockFile {
    pub fn parse(input: &str) -> Self {
        let mut header = Vec::new();
        let mut pins = Vec::new();
        let mut in_header = true;

        for line in input.lines() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('#') {
                if in_header {
                    header.push(line.to_owned());
                }
                continue;
            }
            in_header = false;

            // Indented lines continue the previous pin (`--hash=...`), and
            // `-` lines are resolver options.
            if line.starts_with(char::is_whitespace) || trimmed.starts_with('-') {
                continue;
            }
            if let Some(pin) = parse_pin(trimmed) {
                pins.push(pin);
            }
        }

        Self { header, pins }
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn find(&self, name: &str) -> Option<&Pin> {
        let wanted = PackageName::normalized(name);
        self.pins.iter().find(|p| p.name == wanted)
    }

    /// Direct requirements of `manifest` that have no pin here. Marked
    /// requirements are skipped: the marker may exclude them legitimately.
    pub fn missing_direct(&self, manifest: &RequirementsFile) -> Vec<PackageName> {
        manifest
            .requirements
            .iter()
            .filter(|r| r.marker.is_none())
            .filter(|r| !self.pins.iter().any(|p| p.name == r.name))
            .map(|r| r.name.clone())
            .collect()
    }
}

fn parse_pin(line: &str) -> Option<Pin> {
    let token = line
        .split(|c: char| c.is_whitespace() || c == ';' || c == '\\')
        .next()?;
    let (name, version) = token.split_once("==")?;
    let name = name.split('[').next().unwrap_or(name);
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some(Pin {
        name: PackageName::normalized(name),
        version: version.to_owned(),
    })
}

/// Digest of a file's current content, or `None` if it does not exist yet.
pub fn digest_file(path: &Path) -> Result<Option<ShortDigest>, LockError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(ShortDigest::of(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LockError::Io(e)),
    }
}

/// Replace `path` with `content` so that readers only ever observe the old
/// or the new file: write a temp file in the same directory, fsync it,
/// then rename it over the destination.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), LockError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, content)?;
    tmp.as_file().sync_all()?;
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.persist(path).map_err(|e| LockError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    // Fsync parent directory to ensure rename durability on power loss.
    if let Ok(f) = fs::File::open(dir) {
        let _ = f.sync_all();
    }
    Ok(())
}
