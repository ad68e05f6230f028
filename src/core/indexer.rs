//! Boundary to the external symbol indexer.
//!
//! The rename engine only needs two queries: the declarations a module makes,
//! and every occurrence of one declaration. `IndexSnapshot` answers both from a
//! JSON dump written by the indexing step of the build pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use crate::error::{Error, Result};
use crate::symbols::{FileRef, Module, SymbolKind};
use crate::utils::io;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub name: String,
    pub usr: String,
    pub file: FileRef,
    pub offset: usize,
    #[serde(default = "default_kind")]
    pub kind: SymbolKind,
}

fn default_kind() -> SymbolKind {
    SymbolKind::Type
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedOccurrence {
    pub file: FileRef,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub is_declaration: bool,
}

impl IndexedOccurrence {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Queries the rename engine makes against a symbol index.
///
/// Implementations may be slow and may return results in any order or with
/// duplicates.
pub trait Indexer: Send + Sync {
    fn declarations(&self, module: &Module) -> Result<Vec<Declaration>>;
    fn occurrences(&self, usr: &str) -> Result<Vec<IndexedOccurrence>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    /// Declarations keyed by module name.
    #[serde(default)]
    pub declarations: HashMap<String, Vec<Declaration>>,
    /// Occurrences keyed by USR.
    #[serde(default)]
    pub occurrences: HashMap<String, Vec<IndexedOccurrence>>,
}

impl IndexSnapshot {
    pub fn load(path: &Path, root: &Path) -> Result<Self> {
        let content = io::read_file(path, &format!("read {}", path.display()))?;
        let snapshot: IndexSnapshot = serde_json::from_str(&content)
            .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;
        Ok(snapshot.rooted(root))
    }

    fn rooted(mut self, root: &Path) -> Self {
        let rebase = |file: &mut FileRef| {
            if !file.path().is_absolute() {
                *file = FileRef::new(root.join(file.path()));
            }
        };
        for declarations in self.declarations.values_mut() {
            for declaration in declarations {
                rebase(&mut declaration.file);
            }
        }
        for occurrences in self.occurrences.values_mut() {
            for occurrence in occurrences {
                rebase(&mut occurrence.file);
            }
        }
        self
    }
}

impl Indexer for IndexSnapshot {
    fn declarations(&self, module: &Module) -> Result<Vec<Declaration>> {
        self.declarations.get(&module.name).cloned().ok_or_else(|| {
            Error::indexer_failed("Module missing from index", Some(module.name.clone()), None)
        })
    }

    fn occurrences(&self, usr: &str) -> Result<Vec<IndexedOccurrence>> {
        Ok(self.occurrences.get(usr).cloned().unwrap_or_default())
    }
}
