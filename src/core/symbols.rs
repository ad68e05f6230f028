//! Shared data model: files, modules, symbols and occurrences.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::path::{Component, Path, PathBuf};

/// A file's logical identity. Equality and hashing use the normalized path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PathBuf", into = "PathBuf")]
pub struct FileRef {
    path: PathBuf,
}

impl FileRef {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: normalize(path.as_ref()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without its extension (`Foo__s` for `Sources/Foo__s.swift`).
    pub fn stem(&self) -> Option<&str> {
        let name = self.path.file_name()?.to_str()?;
        Some(name.split('.').next().unwrap_or(name))
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    /// Coarse module filter: excluded when the path contains any ignored identifier.
    pub fn is_ignored(&self, ignored_modules: &[String]) -> bool {
        let display = self.path.to_string_lossy();
        ignored_modules
            .iter()
            .filter(|m| !m.is_empty())
            .any(|m| display.contains(m.as_str()))
    }

    pub fn display(&self) -> String {
        self.path.display().to_string()
    }
}

impl PartialEq for FileRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileRef {}

impl Hash for FileRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for FileRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.path.cmp(&other.path)
    }
}

impl From<PathBuf> for FileRef {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<FileRef> for PathBuf {
    fn from(file: FileRef) -> Self {
        file.path
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Append `incoming` files not already present, keeping first-seen order.
pub fn union_files(existing: &mut Vec<FileRef>, incoming: &[FileRef]) {
    for file in incoming {
        if !existing.contains(file) {
            existing.push(file.clone());
        }
    }
}

/// One compiled unit of the project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub source_files: Vec<FileRef>,
    #[serde(default)]
    pub markup_files: Vec<FileRef>,
    #[serde(default)]
    pub plists: Vec<FileRef>,
    #[serde(default)]
    pub compiler_arguments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Type,
    Member,
    File,
}

/// A renameable identifier. Symbols are keyed by name across the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Indexer-issued unique symbol reference, indexer path only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usr: Option<String>,
}

impl Symbol {
    pub fn tagged(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            usr: None,
        }
    }

    pub fn indexed(name: impl Into<String>, kind: SymbolKind, usr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            usr: Some(usr.into()),
        }
    }
}

/// One location where a symbol's text must be substituted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Occurrence {
    pub file: FileRef,
    pub range: Range<usize>,
    pub is_declaration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_refs_compare_normalized_paths() {
        assert_eq!(FileRef::new("a/./b/../c.swift"), FileRef::new("a/c.swift"));
        assert_ne!(FileRef::new("a/c.swift"), FileRef::new("b/c.swift"));
    }

    #[test]
    fn stem_drops_every_extension() {
        assert_eq!(FileRef::new("Sources/Foo__s.swift").stem(), Some("Foo__s"));
        assert_eq!(FileRef::new("UI/Main.storyboard").stem(), Some("Main"));
        assert_eq!(FileRef::new("Thing.generated.swift").stem(), Some("Thing"));
    }

    #[test]
    fn ignored_modules_match_by_substring() {
        let file = FileRef::new("Pods/Alamofire/Source/Request.swift");
        assert!(file.is_ignored(&["Alamofire".to_string()]));
        assert!(!file.is_ignored(&["Kingfisher".to_string()]));
        assert!(!file.is_ignored(&[String::new()]));
    }

    #[test]
    fn union_keeps_order_and_skips_duplicates() {
        let mut files = vec![FileRef::new("a.swift"), FileRef::new("b.swift")];
        union_files(
            &mut files,
            &[FileRef::new("./b.swift"), FileRef::new("c.swift")],
        );
        let names: Vec<String> = files.iter().map(|f| f.display()).collect();
        assert_eq!(names, vec!["a.swift", "b.swift", "c.swift"]);
    }
}
