//! Rewrite engine: turns a finalized map into file edits, file renames and
//! manifest patches, then applies them.
//!
//! Planning reads every affected file and computes new content up front; nothing
//! is written until the whole plan exists. Applying then:
//! 1. Writes file contents in parallel (renamed files land at their new path and
//!    the old path is removed)
//! 2. Patches manifests one at a time

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::PathBuf;

use crate::collector::CancelToken;
use crate::error::{Error, Result};
use crate::map::ObfuscationMap;
use crate::plist;
use crate::resolver::ResolvedReferences;
use crate::symbols::FileRef;
use crate::utils::io;

// ============================================================================
// Types
// ============================================================================

/// A replacement at an explicit byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEdit {
    pub range: Range<usize>,
    pub original: String,
    pub replacement: String,
}

/// New content for one file, optionally written to a new path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEdit {
    pub file: FileRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<FileRef>,
    /// Number of replacements in this file.
    pub replacements: usize,
    #[serde(skip)]
    pub new_content: String,
}

/// A file moved because its base name was renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRename {
    pub from: FileRef,
    pub to: FileRef,
    pub symbol: String,
}

/// New content for one project manifest.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPatch {
    pub manifest: FileRef,
    pub replacements: usize,
    #[serde(skip)]
    pub new_content: String,
}

/// Everything a run will write, computed before the first write.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewritePlan {
    pub edits: Vec<FileEdit>,
    pub renames: Vec<FileRename>,
    pub manifests: Vec<ManifestPatch>,
    pub total_replacements: usize,
}

impl RewritePlan {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.manifests.is_empty()
    }
}

/// Inputs to planning.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    pub map: &'a ObfuscationMap,
    /// Indexer occurrences, applied by range.
    pub resolved: Option<&'a ResolvedReferences>,
    /// Names substituted wherever they appear as a whole identifier.
    pub tagged_names: &'a HashSet<String>,
    pub manifests: &'a [FileRef],
    pub plists: &'a [FileRef],
}

// ============================================================================
// Identifier matching
// ============================================================================

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte spans of every maximal identifier-character run in `text`.
fn identifier_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if is_identifier_char(c) {
            start.get_or_insert(i);
        } else if let Some(s) = start.take() {
            spans.push(s..i);
        }
    }
    if let Some(s) = start {
        spans.push(s..text.len());
    }

    spans
}

/// Offsets of `name` where it forms a whole identifier.
///
/// `Foo__s` matches in `Foo__s()` and `x: Foo__s` but not in `Foo__sBar` or
/// `MyFoo__s`.
pub fn find_identifier_matches(text: &str, name: &str) -> Vec<usize> {
    if name.is_empty() {
        return Vec::new();
    }
    identifier_spans(text)
        .into_iter()
        .filter(|span| &text[span.clone()] == name)
        .map(|span| span.start)
        .collect()
}

/// Replace every whole-identifier occurrence of a key of `names` with its value.
pub fn substitute_identifiers(content: &str, names: &HashMap<&str, &str>) -> (String, usize) {
    let mut matches: Vec<(Range<usize>, &str)> = identifier_spans(content)
        .into_iter()
        .filter_map(|span| names.get(&content[span.clone()]).map(|to| (span, *to)))
        .collect();

    if matches.is_empty() {
        return (content.to_string(), 0);
    }

    let count = matches.len();

    // Replace from end to start so earlier offsets stay valid
    matches.sort_by(|a, b| b.0.start.cmp(&a.0.start));

    let mut new_content = content.to_string();
    for (range, replacement) in matches {
        new_content.replace_range(range, replacement);
    }

    (new_content, count)
}

// ============================================================================
// Range edits
// ============================================================================

/// Apply range edits in one descending pass.
///
/// A file whose every range still holds its original is rewritten. A file
/// whose every replacement sits at its range, shifted by the length change of
/// the edits before it, is returned unchanged. Overlapping ranges and any
/// other state are `rewrite.io_failure`.
pub fn apply_ranges(
    file: &FileRef,
    content: &str,
    edits: &[RangeEdit],
) -> Result<(String, usize)> {
    let mut ordered: Vec<&RangeEdit> = edits.iter().collect();
    ordered.sort_by_key(|e| (e.range.start, e.range.end));

    for pair in ordered.windows(2) {
        if pair[1].range.start < pair[0].range.end {
            return Err(Error::rewrite_io(
                file.display(),
                format!(
                    "Overlapping edits at offsets {} and {}",
                    pair[0].range.start, pair[1].range.start
                ),
                Some(pair[1].original.clone()),
            ));
        }
    }

    let mismatch = ordered
        .iter()
        .find(|e| content.get(e.range.clone()) != Some(e.original.as_str()));

    let Some(mismatch) = mismatch else {
        let mut new_content = content.to_string();
        for edit in ordered.iter().rev() {
            new_content.replace_range(edit.range.clone(), &edit.replacement);
        }
        return Ok((new_content, ordered.len()));
    };

    if is_already_rewritten(content, &ordered) {
        return Ok((content.to_string(), 0));
    }

    Err(Error::rewrite_io(
        file.display(),
        format!(
            "Expected '{}' at offset {}, found '{}'",
            mismatch.original,
            mismatch.range.start,
            content.get(mismatch.range.clone()).unwrap_or("<out of bounds>")
        ),
        Some(mismatch.original.clone()),
    ))
}

/// Every replacement sits where a previous pass would have put it.
fn is_already_rewritten(content: &str, ordered: &[&RangeEdit]) -> bool {
    let mut shift: isize = 0;
    for edit in ordered {
        let Some(start) = edit.range.start.checked_add_signed(shift) else {
            return false;
        };
        let end = start + edit.replacement.len();
        if content.get(start..end) != Some(edit.replacement.as_str()) {
            return false;
        }
        shift += edit.replacement.len() as isize - edit.original.len() as isize;
    }
    !ordered.is_empty()
}

// ============================================================================
// Manifest patching
// ============================================================================

/// Replace manifest references to a renamed file's base name.
///
/// Matches `old` preceded by a space or path separator and not followed by an
/// identifier character, so ` Secret__s.swift` and `Sources/Secret__s.swift`
/// change while ` Secret__sHelper.swift` does not.
pub fn patch_manifest(text: &str, old: &str, new: &str) -> (String, usize) {
    if old.is_empty() {
        return (text.to_string(), 0);
    }

    let mut out = String::with_capacity(text.len());
    let mut count = 0;
    let mut last = 0;

    for (pos, _) in text.match_indices(old) {
        if pos < last {
            continue;
        }
        let end = pos + old.len();
        let left_ok = text[..pos].ends_with(|c| c == ' ' || c == '/');
        let right_ok = text[end..].chars().next().map_or(true, |c| !is_identifier_char(c));
        if left_ok && right_ok {
            out.push_str(&text[last..pos]);
            out.push_str(new);
            last = end;
            count += 1;
        }
    }
    out.push_str(&text[last..]);

    (out, count)
}

// ============================================================================
// Planning
// ============================================================================

/// Build the complete rewrite plan. Reads files; writes nothing.
pub fn plan(input: &PlanInput<'_>) -> Result<RewritePlan> {
    let map = input.map;
    let tagged: HashMap<&str, &str> = input
        .tagged_names
        .iter()
        .filter_map(|name| map.get(name).map(|to| (name.as_str(), to)))
        .collect();

    let mut sources: Vec<FileRef> = map.files().to_vec();
    if let Some(resolved) = input.resolved {
        for file in resolved.by_file.keys() {
            if !sources.contains(file) {
                sources.push(file.clone());
            }
        }
    }

    let source_edits: Vec<Option<FileEdit>> = sources
        .par_iter()
        .map(|file| plan_source(file, input.resolved, &tagged, map))
        .collect::<Result<Vec<_>>>()?;

    let markup_edits: Vec<Option<FileEdit>> = map
        .markup_files()
        .par_iter()
        .filter(|file| !sources.contains(file))
        .map(|file| plan_source(file, None, &tagged, map))
        .collect::<Result<Vec<_>>>()?;

    let mut edits: Vec<FileEdit> = source_edits.into_iter().chain(markup_edits).flatten().collect();

    for plist_file in input.plists {
        if edits.iter().any(|e| &e.file == plist_file) {
            continue;
        }
        let content = io::read_file(plist_file.path(), &format!("read {}", plist_file.display()))?;
        if let Some((new_content, replacements)) = plist::patch_principal_class(&content, map) {
            edits.push(FileEdit {
                file: plist_file.clone(),
                renamed_to: None,
                replacements,
                new_content,
            });
        }
    }

    let renames = collect_renames(&edits)?;

    let mut manifests = Vec::new();
    for manifest in input.manifests {
        if let Some(patch) = plan_manifest(manifest, &renames)? {
            manifests.push(patch);
        }
    }

    let total_replacements = edits.iter().map(|e| e.replacements).sum::<usize>()
        + manifests.iter().map(|m| m.replacements).sum::<usize>();

    log_status!(
        "rewrite",
        "Planned {} replacements in {} files, {} renames, {} manifests",
        total_replacements,
        edits.len(),
        renames.len(),
        manifests.len()
    );

    Ok(RewritePlan {
        edits,
        renames,
        manifests,
        total_replacements,
    })
}

fn plan_source(
    file: &FileRef,
    resolved: Option<&ResolvedReferences>,
    tagged: &HashMap<&str, &str>,
    map: &ObfuscationMap,
) -> Result<Option<FileEdit>> {
    let content = io::read_file(file.path(), &format!("read {}", file.display()))?;
    let mut new_content = content.clone();
    let mut replacements = 0;

    if let Some(occurrences) = resolved.and_then(|r| r.by_file.get(file)) {
        let range_edits: Vec<RangeEdit> = occurrences
            .iter()
            .filter_map(|o| {
                map.get(&o.name).map(|to| RangeEdit {
                    range: o.occurrence.range.clone(),
                    original: o.name.clone(),
                    replacement: to.to_string(),
                })
            })
            .collect();
        let (applied, count) = apply_ranges(file, &new_content, &range_edits)?;
        new_content = applied;
        replacements += count;
    }

    if !tagged.is_empty() {
        let (substituted, count) = substitute_identifiers(&new_content, tagged);
        new_content = substituted;
        replacements += count;
    }

    let renamed_to = renamed_path(file, map);

    if replacements == 0 && renamed_to.is_none() {
        return Ok(None);
    }

    Ok(Some(FileEdit {
        file: file.clone(),
        renamed_to,
        replacements,
        new_content,
    }))
}

/// `Dir/Foo__s.swift` becomes `Dir/<obfuscated>.swift` when `Foo__s` is renamed.
fn renamed_path(file: &FileRef, map: &ObfuscationMap) -> Option<FileRef> {
    let stem = file.stem()?;
    let obfuscated = map.get(stem)?;
    let name = file.path().file_name()?.to_str()?;
    let suffix = &name[stem.len()..];
    let parent = file.path().parent().map(PathBuf::from).unwrap_or_default();
    Some(FileRef::new(parent.join(format!("{}{}", obfuscated, suffix))))
}

fn collect_renames(edits: &[FileEdit]) -> Result<Vec<FileRename>> {
    let mut renames = Vec::new();
    let mut targets: HashSet<&FileRef> = HashSet::new();

    for edit in edits {
        let (Some(to), Some(stem)) = (&edit.renamed_to, edit.file.stem()) else {
            continue;
        };
        let symbol = stem.to_string();
        if !targets.insert(to) || (to.path().exists() && to != &edit.file) {
            return Err(Error::rewrite_io(
                to.display(),
                "Rename destination already exists",
                Some(symbol),
            ));
        }
        renames.push(FileRename {
            from: edit.file.clone(),
            to: to.clone(),
            symbol,
        });
    }

    Ok(renames)
}

fn plan_manifest(manifest: &FileRef, renames: &[FileRename]) -> Result<Option<ManifestPatch>> {
    if renames.is_empty() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(manifest.path())
        .map_err(|e| Error::manifest_patch(manifest.display(), e.to_string(), None))?;

    let mut new_content = content;
    let mut replacements = 0;
    let mut seen: HashSet<&str> = HashSet::new();

    for rename in renames {
        if !seen.insert(rename.symbol.as_str()) {
            continue;
        }
        let Some(new_stem) = rename.to.stem() else {
            continue;
        };
        let (patched, count) = patch_manifest(&new_content, &rename.symbol, new_stem);
        new_content = patched;
        replacements += count;
    }

    if replacements == 0 {
        return Ok(None);
    }

    Ok(Some(ManifestPatch {
        manifest: manifest.clone(),
        replacements,
        new_content,
    }))
}

// ============================================================================
// Apply
// ============================================================================

/// Write a plan to disk. Failures are fatal and earlier writes are not undone.
pub fn apply(plan: &RewritePlan, cancel: &CancelToken) -> Result<()> {
    cancel.check("rewrite")?;

    plan.edits.par_iter().map(write_edit).collect::<Result<Vec<()>>>()?;

    for patch in &plan.manifests {
        io::write_file_atomic(patch.manifest.path(), &patch.new_content, "patch manifest")
            .map_err(|e| {
                Error::manifest_patch(
                    patch.manifest.display(),
                    e.details["error"].as_str().unwrap_or(&e.message).to_string(),
                    None,
                )
            })?;
        log_status!(
            "rewrite",
            "Patched {} references in {}",
            patch.replacements,
            patch.manifest.display()
        );
    }

    Ok(())
}

fn write_edit(edit: &FileEdit) -> Result<()> {
    let symbol = || edit.file.stem().map(str::to_string);
    let target = edit.renamed_to.as_ref().unwrap_or(&edit.file);

    std::fs::write(target.path(), &edit.new_content)
        .map_err(|e| Error::rewrite_io(target.display(), e.to_string(), symbol()))?;

    if target != &edit.file {
        std::fs::remove_file(edit.file.path())
            .map_err(|e| Error::rewrite_io(edit.file.display(), e.to_string(), symbol()))?;
        log_status!("rewrite", "Renamed {} -> {}", edit.file.display(), target.display());
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
