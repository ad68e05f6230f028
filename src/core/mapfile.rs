//! Persisted map format.
//!
//! ```text
//! // obscura deobfuscation map
//! // tool: obscura 0.4.2
//! // mode: tag
//! // tag: __s
//! // character-count: 32
//! // version: 2.4.1 (117)
//! // generated-at: 2026-10-19T08:30:00Z
//! Data:
//! Foo__s ===> hQx...
//! ```
//!
//! Header lines start with `//`; entries follow `Data:` sorted by original name.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::map::ObfuscationMap;
use crate::utils::io;

pub const MAP_SEPARATOR: &str = " ===> ";
const DATA_MARKER: &str = "Data:";
const TITLE: &str = "obscura deobfuscation map";
const DEFAULT_FILE_NAME: &str = "obscura-map.txt";

/// Run details written above the entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub tool: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub character_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub generated_at: String,
}

impl RunMetadata {
    pub fn new(mode: impl Into<String>, tag: Option<String>, character_count: usize) -> Self {
        Self {
            tool: format!("obscura {}", env!("CARGO_PKG_VERSION")),
            mode: mode.into(),
            tag,
            character_count,
            version: None,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    pub fn with_version(mut self, version: Option<(String, String)>) -> Self {
        self.version = version.map(|(version, build)| format!("{} ({})", version, build));
        self
    }
}

/// A loaded map file.
#[derive(Debug, Clone)]
pub struct MapFile {
    pub metadata: RunMetadata,
    pub map: ObfuscationMap,
}

/// `obscura-map 2.4.1 117.txt` when the bundle version is known.
pub fn map_file_name(version: Option<&(String, String)>) -> String {
    match version {
        Some((version, build)) => format!("obscura-map {} {}.txt", version, build),
        None => DEFAULT_FILE_NAME.to_string(),
    }
}

pub fn render(map: &ObfuscationMap, metadata: &RunMetadata) -> String {
    let mut out = String::new();
    out.push_str(&format!("// {}\n", TITLE));
    out.push_str(&format!("// tool: {}\n", metadata.tool));
    out.push_str(&format!("// mode: {}\n", metadata.mode));
    if let Some(tag) = &metadata.tag {
        out.push_str(&format!("// tag: {}\n", tag));
    }
    out.push_str(&format!("// character-count: {}\n", metadata.character_count));
    if let Some(version) = &metadata.version {
        out.push_str(&format!("// version: {}\n", version));
    }
    out.push_str(&format!("// generated-at: {}\n", metadata.generated_at));
    out.push_str(DATA_MARKER);
    out.push('\n');
    for (original, obfuscated) in map.entries() {
        out.push_str(original);
        out.push_str(MAP_SEPARATOR);
        out.push_str(obfuscated);
        out.push('\n');
    }
    out
}

/// Parse map file text. `path` only labels errors.
pub fn parse(content: &str, path: Option<&Path>) -> Result<MapFile> {
    let label = || path.map(|p| p.display().to_string());
    let mut metadata = RunMetadata::default();
    let mut map = ObfuscationMap::new();
    let mut in_data = false;

    for (index, raw) in content.lines().enumerate() {
        let line_number = index + 1;
        let line = raw.trim_end();

        if !in_data {
            if line.trim() == DATA_MARKER {
                in_data = true;
            } else if let Some(comment) = line.strip_prefix("//") {
                read_header(comment.trim(), &mut metadata);
            } else if !line.trim().is_empty() {
                return Err(Error::map_invalid_format(line_number, raw, label()));
            }
            continue;
        }

        if line.trim().is_empty() {
            continue;
        }

        let (original, obfuscated) = split_entry(line)
            .ok_or_else(|| Error::map_invalid_format(line_number, raw, label()))?;
        map.insert_loaded(original, obfuscated)?;
    }

    if !in_data {
        return Err(Error::map_invalid_format(
            content.lines().count() + 1,
            format!("missing '{}' section", DATA_MARKER),
            label(),
        ));
    }

    Ok(MapFile { metadata, map })
}

fn read_header(comment: &str, metadata: &mut RunMetadata) {
    let Some((key, value)) = comment.split_once(": ") else {
        return;
    };
    let value = value.trim().to_string();
    match key.trim() {
        "tool" => metadata.tool = value,
        "mode" => metadata.mode = value,
        "tag" => metadata.tag = Some(value),
        "character-count" => metadata.character_count = value.parse().unwrap_or_default(),
        "version" => metadata.version = Some(value),
        "generated-at" => metadata.generated_at = value,
        _ => {}
    }
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (original, obfuscated) = line.split_once(MAP_SEPARATOR.trim())?;
    let original = original.trim();
    let obfuscated = obfuscated.trim();
    let well_formed = |s: &str| !s.is_empty() && !s.contains(char::is_whitespace);
    if well_formed(original) && well_formed(obfuscated) {
        Some((original, obfuscated))
    } else {
        None
    }
}

/// A rendered map sitting next to its destination until [`StagedMap::commit`].
#[derive(Debug)]
pub struct StagedMap {
    staging: PathBuf,
    target: PathBuf,
    entries: usize,
}

impl StagedMap {
    /// Drop the staged map; nothing was mutated.
    pub fn discard(self) {
        if let Err(e) = std::fs::remove_file(&self.staging) {
            log_status!("map", "Could not remove {}: {}", self.staging.display(), e);
        }
    }

    /// Move the staged map into place.
    pub fn commit(self) -> Result<PathBuf> {
        io::rename_file(&self.staging, &self.target, "commit map file")?;
        log_status!("map", "Wrote {} entries to {}", self.entries, self.target.display());
        Ok(self.target)
    }
}

/// Write the map beside `path` so an unwritable destination fails before any
/// project file changes.
pub fn stage_map_file(
    path: &Path,
    map: &ObfuscationMap,
    metadata: &RunMetadata,
) -> Result<StagedMap> {
    let staging = io::staging_path(path).ok_or_else(|| {
        Error::internal_io(
            format!("Invalid map path: {}", path.display()),
            Some("stage map file".to_string()),
        )
    })?;
    io::write_file(&staging, &render(map, metadata), "stage map file")?;
    Ok(StagedMap {
        staging,
        target: path.to_path_buf(),
        entries: map.len(),
    })
}

pub fn read_map_file(path: &Path) -> Result<MapFile> {
    let content = io::read_file(path, &format!("read map file {}", path.display()))?;
    parse(&content, Some(path))
}
