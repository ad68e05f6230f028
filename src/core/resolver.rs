//! Expands indexed declarations into every occurrence that must be rewritten.

use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

use crate::collector::{CancelToken, ModuleScan};
use crate::error::{Error, Result};
use crate::indexer::{Declaration, Indexer};
use crate::symbols::{FileRef, Occurrence};

/// An occurrence tagged with the original name it spells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedOccurrence {
    pub name: String,
    pub occurrence: Occurrence,
}

/// Occurrences grouped per file, each file's list ordered by start offset.
#[derive(Debug, Clone, Default)]
pub struct ResolvedReferences {
    pub by_file: BTreeMap<FileRef, Vec<NamedOccurrence>>,
    pub symbols_queried: usize,
}

impl ResolvedReferences {
    pub fn is_empty(&self) -> bool {
        self.by_file.values().all(Vec::is_empty)
    }

    pub fn total(&self) -> usize {
        self.by_file.values().map(Vec::len).sum()
    }
}

/// Query every occurrence of every declaration found by `scans`.
///
/// Occurrences in ignored files and ranges that do not span exactly the
/// declared name are dropped; `(file, range)` duplicates keep the first report.
pub fn resolve(
    scans: &[ModuleScan],
    indexer: &dyn Indexer,
    ignore_modules: &[String],
    cancel: &CancelToken,
) -> Result<ResolvedReferences> {
    let mut seen_usrs = HashSet::new();
    let declarations: Vec<&Declaration> = scans
        .iter()
        .flat_map(|s| s.declarations.iter())
        .filter(|d| seen_usrs.insert(d.usr.clone()))
        .collect();

    let per_symbol: Vec<Vec<Occurrence>> = declarations
        .par_iter()
        .map(|declaration| {
            cancel.check("reference resolution")?;
            Ok(occurrences_for(declaration, indexer))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut resolved = ResolvedReferences {
        symbols_queried: declarations.len(),
        ..Default::default()
    };
    let mut claimed: HashSet<(FileRef, Range<usize>)> = HashSet::new();

    for (declaration, occurrences) in declarations.iter().zip(per_symbol) {
        for occurrence in occurrences {
            if occurrence.file.is_ignored(ignore_modules) {
                continue;
            }
            if occurrence.range.len() != declaration.name.len() {
                log_status!(
                    "resolve",
                    "Skipping {}:{:?} for {}: range does not span the name",
                    occurrence.file.display(),
                    occurrence.range,
                    declaration.name
                );
                continue;
            }
            if !claimed.insert((occurrence.file.clone(), occurrence.range.clone())) {
                continue;
            }
            resolved
                .by_file
                .entry(occurrence.file.clone())
                .or_default()
                .push(NamedOccurrence {
                    name: declaration.name.clone(),
                    occurrence,
                });
        }
    }

    for occurrences in resolved.by_file.values_mut() {
        occurrences.sort_by_key(|o| o.occurrence.range.start);
    }

    if resolved.is_empty() {
        return Err(Error::no_references_found(resolved.symbols_queried));
    }

    log_status!(
        "resolve",
        "{} occurrences of {} symbols across {} files",
        resolved.total(),
        resolved.symbols_queried,
        resolved.by_file.len()
    );

    Ok(resolved)
}

/// Declaration site plus every reported occurrence. Indexer failures for one
/// symbol leave only its declaration site.
fn occurrences_for(declaration: &Declaration, indexer: &dyn Indexer) -> Vec<Occurrence> {
    let mut occurrences = vec![Occurrence {
        file: declaration.file.clone(),
        range: declaration.offset..declaration.offset + declaration.name.len(),
        is_declaration: true,
    }];

    match indexer.occurrences(&declaration.usr) {
        Ok(reported) => {
            occurrences.extend(reported.into_iter().map(|o| Occurrence {
                range: o.range(),
                file: o.file,
                is_declaration: o.is_declaration,
            }));
        }
        Err(err) => {
            log_status!(
                "resolve",
                "Occurrence query failed for {} ({}): {}",
                declaration.name,
                declaration.usr,
                err.message
            );
        }
    }

    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{IndexSnapshot, IndexedOccurrence};
    use crate::symbols::SymbolKind;
    use std::collections::HashMap;

    /// Test-only view of the distinct original names in a resolution.
    trait Names {
        fn names(&self) -> HashSet<&str>;
    }

    impl Names for ResolvedReferences {
        fn names(&self) -> HashSet<&str> {
            self.by_file
                .values()
                .flatten()
                .map(|o| o.name.as_str())
                .collect()
        }
    }

    fn scan_with(declarations: Vec<Declaration>) -> ModuleScan {
        ModuleScan {
            module: "App".to_string(),
            declarations,
            ..Default::default()
        }
    }

    fn declaration(name: &str, usr: &str, file: &str, offset: usize) -> Declaration {
        Declaration {
            name: name.to_string(),
            usr: usr.to_string(),
            file: FileRef::new(file),
            offset,
            kind: SymbolKind::Type,
        }
    }

    fn occurrence(file: &str, start: usize, end: usize, is_declaration: bool) -> IndexedOccurrence {
        IndexedOccurrence {
            file: FileRef::new(file),
            start,
            end,
            is_declaration,
        }
    }

    #[test]
    fn merges_declaration_and_cross_file_usages() {
        let mut occurrences = HashMap::new();
        occurrences.insert(
            "u1".to_string(),
            vec![
                occurrence("A.swift", 10, 17, true),
                occurrence("B.swift", 5, 12, false),
                occurrence("B.swift", 5, 12, false),
            ],
        );
        let index = IndexSnapshot {
            declarations: HashMap::new(),
            occurrences,
        };
        let scans = vec![scan_with(vec![declaration("MyClass", "u1", "A.swift", 10)])];

        let resolved = resolve(&scans, &index, &[], &CancelToken::new()).unwrap();
        assert_eq!(resolved.total(), 2);
        assert_eq!(resolved.by_file[&FileRef::new("A.swift")][0].occurrence.range, 10..17);
        assert!(resolved.by_file[&FileRef::new("A.swift")][0].occurrence.is_declaration);
        assert_eq!(resolved.by_file[&FileRef::new("B.swift")][0].occurrence.range, 5..12);
    }

    #[test]
    fn declaration_only_symbols_are_kept() {
        let index = IndexSnapshot::default();
        let scans = vec![scan_with(vec![declaration("Unused", "u9", "C.swift", 0)])];
        let resolved = resolve(&scans, &index, &[], &CancelToken::new()).unwrap();
        assert_eq!(resolved.total(), 1);
        assert!(resolved.names().contains("Unused"));
    }

    #[test]
    fn empty_aggregate_is_no_references() {
        let err = resolve(&[scan_with(vec![])], &IndexSnapshot::default(), &[], &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.code.as_str(), "discovery.no_references");
    }

    #[test]
    fn drops_ignored_files_and_mismatched_ranges() {
        let mut occurrences = HashMap::new();
        occurrences.insert(
            "u1".to_string(),
            vec![
                occurrence("Pods/X.swift", 0, 7, false),
                occurrence("B.swift", 0, 3, false),
            ],
        );
        let index = IndexSnapshot {
            declarations: HashMap::new(),
            occurrences,
        };
        let scans = vec![scan_with(vec![declaration("MyClass", "u1", "A.swift", 0)])];
        let resolved = resolve(&scans, &index, &["Pods".to_string()], &CancelToken::new()).unwrap();
        assert_eq!(resolved.by_file.len(), 1);
        assert!(resolved.by_file.contains_key(&FileRef::new("A.swift")));
    }

    #[test]
    fn repeated_usr_across_modules_is_queried_once() {
        let index = IndexSnapshot::default();
        let scans = vec![
            scan_with(vec![declaration("Shared", "u1", "A.swift", 0)]),
            scan_with(vec![declaration("Shared", "u1", "A.swift", 0)]),
        ];
        let resolved = resolve(&scans, &index, &[], &CancelToken::new()).unwrap();
        assert_eq!(resolved.symbols_queried, 1);
        assert_eq!(resolved.total(), 1);
    }
}
