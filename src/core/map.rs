//! The run-wide rename ledger.
//!
//! `ObfuscationMap` owns the original → obfuscated mapping and the set of names
//! already issued. All writes go through `assign_or_reuse`, `merge` or
//! `insert_loaded`, which keep every obfuscated name unique.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::error::{Error, ErrorCode, Result};
use crate::names;
use crate::symbols::{union_files, FileRef};

#[derive(Debug, Clone, Default)]
pub struct ObfuscationMap {
    forward: HashMap<String, String>,
    issued: HashSet<String>,
    files: Vec<FileRef>,
    markup_files: Vec<FileRef>,
}

impl ObfuscationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(files: Vec<FileRef>, markup_files: Vec<FileRef>) -> Self {
        let mut map = Self::default();
        map.add_files(&files);
        map.add_markup_files(&markup_files);
        map
    }

    /// Return the existing name for `name`, or issue a fresh one.
    pub fn assign_or_reuse<R: Rng + ?Sized>(
        &mut self,
        name: &str,
        length: usize,
        rng: &mut R,
    ) -> Result<String> {
        if let Some(existing) = self.forward.get(name) {
            return Ok(existing.clone());
        }

        let obfuscated = names::generate(length, &self.issued, rng).map_err(|e| {
            if e.code == ErrorCode::NameGenerationExhausted {
                Error::generation_exhausted(length, self.issued.len(), Some(name.to_string()))
            } else {
                e
            }
        })?;

        self.issued.insert(obfuscated.clone());
        self.forward.insert(name.to_string(), obfuscated.clone());
        Ok(obfuscated)
    }

    /// Fold `other` into `self`. Entries from `other` win on shared keys.
    ///
    /// Rejected without changes when the result would give two originals the
    /// same obfuscated name.
    pub fn merge(&mut self, other: &ObfuscationMap) -> Result<()> {
        let mut merged = self.forward.clone();
        for (original, obfuscated) in &other.forward {
            merged.insert(original.clone(), obfuscated.clone());
        }
        let issued = unique_values(&merged)?;

        self.forward = merged;
        self.issued = issued;
        self.add_files(&other.files);
        self.add_markup_files(&other.markup_files);
        Ok(())
    }

    /// Record a pair read back from a persisted map.
    pub fn insert_loaded(&mut self, original: &str, obfuscated: &str) -> Result<()> {
        let owned_elsewhere = self.issued.contains(obfuscated)
            && self.forward.get(original).map(String::as_str) != Some(obfuscated);
        if owned_elsewhere {
            let owner = self
                .forward
                .iter()
                .find(|(_, v)| v.as_str() == obfuscated)
                .map(|(k, _)| k.clone())
                .unwrap_or_default();
            return Err(Error::map_conflict(obfuscated, vec![owner, original.to_string()]));
        }
        if let Some(previous) = self.forward.insert(original.to_string(), obfuscated.to_string()) {
            self.issued.remove(&previous);
        }
        self.issued.insert(obfuscated.to_string());
        Ok(())
    }

    pub fn add_files(&mut self, files: &[FileRef]) {
        union_files(&mut self.files, files);
    }

    pub fn add_markup_files(&mut self, files: &[FileRef]) {
        union_files(&mut self.markup_files, files);
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.forward.get(original).map(String::as_str)
    }

    pub fn contains(&self, original: &str) -> bool {
        self.forward.contains_key(original)
    }

    pub fn issued(&self) -> &HashSet<String> {
        &self.issued
    }

    pub fn files(&self) -> &[FileRef] {
        &self.files
    }

    pub fn markup_files(&self) -> &[FileRef] {
        &self.markup_files
    }

    /// Entries sorted by original name.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .forward
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort();
        entries
    }

    /// Iterate entries sorted by original name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries().into_iter()
    }

    /// obfuscated → original.
    pub fn reverse(&self) -> HashMap<String, String> {
        self.forward
            .iter()
            .map(|(k, v)| (v.clone(), k.clone()))
            .collect()
    }
}

fn unique_values(forward: &HashMap<String, String>) -> Result<HashSet<String>> {
    let mut owners: HashMap<&str, &str> = HashMap::with_capacity(forward.len());
    for (original, obfuscated) in forward {
        if let Some(other) = owners.insert(obfuscated.as_str(), original.as_str()) {
            return Err(Error::map_conflict(
                obfuscated.clone(),
                vec![other.to_string(), original.clone()],
            ));
        }
    }
    Ok(owners.keys().map(|v| v.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn map_of(pairs: &[(&str, &str)]) -> ObfuscationMap {
        let mut map = ObfuscationMap::new();
        for (k, v) in pairs {
            map.insert_loaded(k, v).unwrap();
        }
        map
    }

    #[test]
    fn assign_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut map = ObfuscationMap::new();
        let first = map.assign_or_reuse("Foo__s", 12, &mut rng).unwrap();
        let second = map.assign_or_reuse("Foo__s", 12, &mut rng).unwrap();
        assert_eq!(first, second);
        assert_eq!(map.len(), 1);
        assert_eq!(map.issued().len(), 1);
    }

    #[test]
    fn issued_tracks_forward_values() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut map = ObfuscationMap::new();
        for name in ["A", "B", "C", "D"] {
            map.assign_or_reuse(name, 4, &mut rng).unwrap();
        }
        let values: HashSet<String> = map.entries().iter().map(|(_, v)| v.to_string()).collect();
        assert_eq!(&values, map.issued());
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn merge_last_writer_wins() {
        let mut a = map_of(&[("X", "ab")]);
        let b = map_of(&[("X", "cd"), ("Y", "ef")]);
        a.merge(&b).unwrap();
        assert_eq!(a.entries(), vec![("X", "cd"), ("Y", "ef")]);
        assert!(!a.issued().contains("ab"));
        assert!(a.issued().contains("cd"));
    }

    #[test]
    fn merge_rejects_shared_obfuscated_name() {
        let mut a = map_of(&[("X", "ab")]);
        let b = map_of(&[("Y", "ab")]);
        let err = a.merge(&b).unwrap_err();
        assert_eq!(err.code, ErrorCode::MapConflict);
        assert_eq!(a.entries(), vec![("X", "ab")]);
    }

    #[test]
    fn merge_unions_files_by_path() {
        let mut a = ObfuscationMap::with_files(
            vec![FileRef::new("a.swift"), FileRef::new("b.swift")],
            vec![FileRef::new("Main.storyboard")],
        );
        let b = ObfuscationMap::with_files(
            vec![FileRef::new("b.swift"), FileRef::new("c.swift")],
            vec![FileRef::new("./Main.storyboard")],
        );
        a.merge(&b).unwrap();
        let files: Vec<String> = a.files().iter().map(|f| f.display()).collect();
        assert_eq!(files, vec!["a.swift", "b.swift", "c.swift"]);
        assert_eq!(a.markup_files().len(), 1);
    }

    #[test]
    fn assign_after_merge_avoids_merged_names() {
        let mut a = ObfuscationMap::new();
        let taken: Vec<(String, String)> = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXY"
            .chars()
            .map(|c| (format!("N{}", c), c.to_string()))
            .collect();
        let mut b = ObfuscationMap::new();
        for (k, v) in &taken {
            b.insert_loaded(k, v).unwrap();
        }
        a.merge(&b).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(a.assign_or_reuse("Fresh", 1, &mut rng).unwrap(), "Z");
        let err = a.assign_or_reuse("Another", 1, &mut rng).unwrap_err();
        assert_eq!(err.details["symbol"], "Another");
    }

    #[test]
    fn loaded_pairs_keep_obfuscated_names_unique() {
        let mut map = ObfuscationMap::new();
        map.insert_loaded("Foo__s", "qwe").unwrap();
        map.insert_loaded("Foo__s", "qwe").unwrap();

        let err = map.insert_loaded("Bar__s", "qwe").unwrap_err();
        assert_eq!(err.code, ErrorCode::MapConflict);
        assert_eq!(map.len(), 1);

        map.insert_loaded("Foo__s", "rty").unwrap();
        map.insert_loaded("Bar__s", "qwe").unwrap();
        assert_eq!(map.issued().len(), 2);
        assert_eq!(map.get("Bar__s"), Some("qwe"));
    }

    #[test]
    fn reverse_inverts_entries() {
        let map = map_of(&[("Foo__s", "qwe"), ("Bar__s", "rty")]);
        let reverse = map.reverse();
        assert_eq!(reverse.get("qwe").map(String::as_str), Some("Foo__s"));
        assert_eq!(reverse.get("rty").map(String::as_str), Some("Bar__s"));
    }

    #[test]
    fn empty_map_reports_empty() {
        assert!(ObfuscationMap::new().is_empty());
        assert!(!map_of(&[("A", "b")]).is_empty());
    }
}
