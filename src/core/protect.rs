//! The protect pipeline: discover, resolve, name, plan, rewrite, persist.
//!
//! All discovery and naming finish before the first write. Modes:
//! - `Tag`: tag-convention scan of the host project, preceded by one scan per
//!   workspace subproject when a workspace is given.
//! - `Indexer`: indexer declarations expanded into precise occurrences.
//! - `Mixed`: an indexer pass, then a tag pass seeded with its names.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::collector::{scan_modules, CancelToken, DiscoveryStrategy, ScanSettings};
use crate::defaults::Defaults;
use crate::error::{Error, ErrorCode, Result};
use crate::indexer::{IndexSnapshot, Indexer};
use crate::map::ObfuscationMap;
use crate::mapfile::{self, RunMetadata};
use crate::plist;
use crate::resolver::{self, ResolvedReferences};
use crate::rewrite::{self, PlanInput, RewritePlan};
use crate::symbols::{union_files, FileRef, Module};
use crate::topology::{self, ProjectLayout};
use crate::workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectMode {
    Tag,
    Indexer,
    Mixed,
}

impl ProtectMode {
    pub fn select(has_indexer: bool, mixed: bool) -> Result<Self> {
        match (has_indexer, mixed) {
            (true, true) => Ok(ProtectMode::Mixed),
            (true, false) => Ok(ProtectMode::Indexer),
            (false, true) => Err(Error::validation_missing_argument(vec!["index".to_string()])
                .with_hint("Mixed mode needs an index snapshot: pass --index")),
            (false, false) => Ok(ProtectMode::Tag),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProtectMode::Tag => "tag",
            ProtectMode::Indexer => "indexer",
            ProtectMode::Mixed => "mixed",
        }
    }

    fn uses_tag(&self) -> bool {
        matches!(self, ProtectMode::Tag | ProtectMode::Mixed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProtectOptions {
    pub root: PathBuf,
    /// JSON layout description; inferred from `root` when absent.
    pub layout: Option<PathBuf>,
    /// Index snapshot; selects the indexer path.
    pub index: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    pub mixed: bool,
    /// Effective settings after config file and flag overrides.
    pub defaults: Defaults,
    pub map_output: Option<PathBuf>,
    pub dry_run: bool,
    /// Fixed seed for reproducible names.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    pub original: String,
    pub obfuscated: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectReport {
    pub mode: ProtectMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub character_count: usize,
    pub modules_scanned: usize,
    pub symbols: usize,
    pub entries: Vec<MapEntry>,
    pub plan: RewritePlan,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_path: Option<String>,
    #[serde(skip)]
    pub map: ObfuscationMap,
}

/// One tag-convention scan: a subproject or the host project.
struct TagPass {
    label: String,
    modules: Vec<Module>,
    manifests: Vec<FileRef>,
    plists: Vec<FileRef>,
}

/// Run the pipeline, loading the index snapshot named in `options`.
pub fn protect(options: &ProtectOptions, cancel: &CancelToken) -> Result<ProtectReport> {
    let snapshot = match &options.index {
        Some(path) => Some(IndexSnapshot::load(path, &options.root)?),
        None => None,
    };
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    protect_with(
        options,
        snapshot.as_ref().map(|s| s as &dyn Indexer),
        &mut rng,
        cancel,
    )
}

/// Run the pipeline against an explicit indexer and randomness source.
pub fn protect_with<R: Rng + ?Sized>(
    options: &ProtectOptions,
    indexer: Option<&dyn Indexer>,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<ProtectReport> {
    let mode = ProtectMode::select(indexer.is_some(), options.mixed)?;
    if options.workspace.is_some() && mode == ProtectMode::Indexer {
        return Err(Error::validation_invalid_argument(
            "workspace",
            "Workspace subprojects are scanned with the tag convention; add --mixed or drop --index",
            None,
        ));
    }

    let defaults = &options.defaults;
    defaults.validate()?;

    let layout = match &options.layout {
        Some(path) => topology::load_layout(path, &options.root)?,
        None => topology::infer_layout(&options.root, defaults)?,
    };

    let mut passes = Vec::new();
    if mode.uses_tag() {
        if let Some(workspace_path) = &options.workspace {
            passes.extend(subproject_passes(workspace_path, &options.root, &layout, defaults)?);
        }
        passes.push(TagPass {
            label: "host".to_string(),
            modules: layout.modules.clone(),
            manifests: layout.manifests.clone(),
            plists: layout.plists(),
        });
    }

    let settings = ScanSettings {
        ignore_modules: defaults.ignore_modules.clone(),
        denylist: defaults.denylist.clone(),
        module_names: layout
            .modules
            .iter()
            .chain(passes.iter().flat_map(|p| p.modules.iter()))
            .map(|m| m.name.clone())
            .collect(),
    };

    let mut map = ObfuscationMap::new();
    let mut tagged_names: HashSet<String> = HashSet::new();
    let mut resolved: Option<ResolvedReferences> = None;
    let mut manifests = layout.manifests.clone();
    let mut plists = layout.plists();
    let mut modules_scanned = 0;
    let mut symbols = 0;

    if let Some(indexer) = indexer {
        modules_scanned += layout.modules.len();
        let length = defaults.character_count;
        match indexed_pass(&layout.modules, indexer, &settings, length, rng, cancel) {
            Ok((pass_map, references, found)) => {
                map.merge(&pass_map)?;
                resolved = Some(references);
                symbols += found;
            }
            Err(err)
                if mode == ProtectMode::Mixed
                    && matches!(
                        err.code,
                        ErrorCode::DiscoveryNoDeclarations | ErrorCode::DiscoveryNoReferences
                    ) =>
            {
                log_status!(
                    "scan",
                    "Indexer pass found nothing ({}); continuing with tags",
                    err.message
                );
            }
            Err(err) => return Err(err),
        }
    }

    if mode.uses_tag() {
        let length = if mode == ProtectMode::Mixed {
            defaults.manual_character_count
        } else {
            defaults.character_count
        };
        let strategy = DiscoveryStrategy::TagBased {
            tag: defaults.tag.clone(),
        };

        for pass in &passes {
            cancel.check("discovery")?;
            modules_scanned += pass.modules.len();
            let scans = scan_modules(&pass.modules, &strategy, None, &settings, cancel)?;

            // Seeded with every name issued so far so the pass never reissues one.
            let mut pass_map = ObfuscationMap::new();
            pass_map.merge(&map)?;
            for scan in &scans {
                pass_map.add_files(&scan.files);
                pass_map.add_markup_files(&scan.markup_files);
                for symbol in &scan.symbols {
                    pass_map.assign_or_reuse(&symbol.name, length, rng)?;
                    if tagged_names.insert(symbol.name.clone()) {
                        symbols += 1;
                    }
                }
            }
            map.merge(&pass_map)?;
            union_files(&mut manifests, &pass.manifests);
            union_files(&mut plists, &pass.plists);

            log_status!("map", "{}: {} names after merge", pass.label, map.len());
        }
    }

    if map.is_empty() {
        let tag = mode.uses_tag().then(|| defaults.tag.clone());
        return Err(Error::no_declarations_found(mode.label(), modules_scanned, tag));
    }

    cancel.check("planning")?;

    let plan = rewrite::plan(&PlanInput {
        map: &map,
        resolved: resolved.as_ref(),
        tagged_names: &tagged_names,
        manifests: &manifests,
        plists: &plists,
    })?;

    let version = main_bundle_version(&layout);
    let tag = mode.uses_tag().then(|| defaults.tag.clone());
    let metadata = RunMetadata::new(mode.label(), tag.clone(), defaults.character_count)
        .with_version(version.clone());

    let map_path = match &options.map_output {
        Some(path) => path.clone(),
        None => options
            .root
            .join(&defaults.map_directory)
            .join(mapfile::map_file_name(version.as_ref())),
    };

    let written = if options.dry_run {
        log_status!("rewrite", "Dry run: {} files would change", plan.edits.len());
        None
    } else {
        let staged = mapfile::stage_map_file(&map_path, &map, &metadata)?;
        match rewrite::apply(&plan, cancel) {
            Ok(()) => Some(staged.commit()?.display().to_string()),
            Err(err) if err.code == ErrorCode::RunCancelled => {
                staged.discard();
                return Err(err);
            }
            Err(err) => {
                // Files may already be renamed; keep the map so they can be traced back.
                staged.commit()?;
                return Err(err);
            }
        }
    };

    Ok(ProtectReport {
        mode,
        tag,
        character_count: defaults.character_count,
        modules_scanned,
        symbols,
        entries: map
            .iter()
            .map(|(original, obfuscated)| MapEntry {
                original: original.to_string(),
                obfuscated: obfuscated.to_string(),
            })
            .collect(),
        plan,
        dry_run: options.dry_run,
        map_path: written,
        map,
    })
}

fn indexed_pass<R: Rng + ?Sized>(
    modules: &[Module],
    indexer: &dyn Indexer,
    settings: &ScanSettings,
    length: usize,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<(ObfuscationMap, ResolvedReferences, usize)> {
    let scans = scan_modules(
        modules,
        &DiscoveryStrategy::IndexerBased,
        Some(indexer),
        settings,
        cancel,
    )?;

    let found: usize = scans.iter().map(|s| s.symbols.len()).sum();
    if found == 0 {
        return Err(Error::no_declarations_found("indexer", modules.len(), None));
    }

    let references = resolver::resolve(&scans, indexer, &settings.ignore_modules, cancel)?;

    let mut map = ObfuscationMap::new();
    for scan in &scans {
        map.add_files(&scan.files);
        map.add_markup_files(&scan.markup_files);
        for symbol in &scan.symbols {
            map.assign_or_reuse(&symbol.name, length, rng)?;
        }
    }

    Ok((map, references, found))
}

fn subproject_passes(
    workspace_path: &Path,
    root: &Path,
    layout: &ProjectLayout,
    defaults: &Defaults,
) -> Result<Vec<TagPass>> {
    // Projects sitting directly in the root belong to the host pass.
    let host_projects: Vec<String> = layout
        .manifests
        .iter()
        .filter_map(|m| m.path().parent())
        .filter(|project| project.parent() == Some(root))
        .filter_map(|project| project.file_name()?.to_str().map(String::from))
        .collect();

    let mut passes = Vec::new();
    for subproject in workspace::subprojects(workspace_path, root, &host_projects)? {
        if !subproject.has_swift_sources {
            log_status!("scan", "Skipping {}: no Swift sources", subproject.project_path.display());
            continue;
        }
        let sub_layout = topology::infer_layout(&subproject.base_path, defaults)?;
        passes.push(TagPass {
            label: subproject.project_path.display().to_string(),
            plists: sub_layout.plists(),
            modules: sub_layout.modules,
            manifests: vec![FileRef::new(&subproject.manifest)],
        });
    }

    Ok(passes)
}

fn main_bundle_version(layout: &ProjectLayout) -> Option<(String, String)> {
    layout.main_module()?.plists.iter().find_map(|file| {
        std::fs::read_to_string(file.path())
            .ok()
            .and_then(|content| plist::bundle_version(&content))
    })
}
