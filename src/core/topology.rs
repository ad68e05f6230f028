//! Project topology: which modules exist, which files they own, and which
//! manifest files carry literal file references.
//!
//! The layout either comes from a JSON description produced by the build
//! pipeline or is inferred by walking the project root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::defaults::Defaults;
use crate::error::{Error, Result};
use crate::symbols::{FileRef, Module};

/// Directories never descended into when inferring a layout.
const ALWAYS_SKIP_DIRS: &[&str] = &[".git", ".svn", ".hg", "DerivedData", "node_modules"];

/// Directories skipped only at the project root (build output).
const ROOT_ONLY_SKIP_DIRS: &[&str] = &["build", ".build"];

const MANIFEST_FILE_NAME: &str = "project.pbxproj";
const PLIST_FILE_NAME: &str = "Info.plist";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLayout {
    pub modules: Vec<Module>,
    #[serde(default)]
    pub manifests: Vec<FileRef>,
}

impl ProjectLayout {
    /// The module built last, whose plist versions name the map file.
    pub fn main_module(&self) -> Option<&Module> {
        self.modules.last()
    }

    pub fn plists(&self) -> Vec<FileRef> {
        self.modules.iter().flat_map(|m| m.plists.clone()).collect()
    }

    /// Rebase every relative path onto `root`.
    fn rooted(mut self, root: &Path) -> Self {
        let rebase = |file: &FileRef| {
            if file.path().is_absolute() {
                file.clone()
            } else {
                FileRef::new(root.join(file.path()))
            }
        };
        for module in &mut self.modules {
            module.source_files = module.source_files.iter().map(rebase).collect();
            module.markup_files = module.markup_files.iter().map(rebase).collect();
            module.plists = module.plists.iter().map(rebase).collect();
        }
        self.manifests = self.manifests.iter().map(rebase).collect();
        self
    }
}

/// Load a layout description. Relative paths are resolved against `root`.
pub fn load_layout(path: &Path, root: &Path) -> Result<ProjectLayout> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;
    let layout: ProjectLayout = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;
    Ok(layout.rooted(root))
}

/// Infer a single-module layout by walking `root`.
pub fn infer_layout(root: &Path, defaults: &Defaults) -> Result<ProjectLayout> {
    if !root.is_dir() {
        return Err(Error::project_not_found(root.display().to_string()));
    }

    let mut files = Vec::new();
    let mut manifests = Vec::new();
    walk_recursive(root, root, &mut files, &mut manifests);
    files.sort();
    manifests.sort();

    let has_extension = |path: &PathBuf, wanted: &[String]| {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| wanted.iter().any(|w| w == ext))
            .unwrap_or(false)
    };

    let module = Module {
        name: module_name(root, &manifests),
        source_files: files
            .iter()
            .filter(|p| has_extension(*p, &defaults.source_extensions))
            .map(FileRef::new)
            .collect(),
        markup_files: files
            .iter()
            .filter(|p| has_extension(*p, &defaults.markup_extensions))
            .map(FileRef::new)
            .collect(),
        plists: files
            .iter()
            .filter(|p| p.file_name().and_then(|n| n.to_str()) == Some(PLIST_FILE_NAME))
            .map(FileRef::new)
            .collect(),
        compiler_arguments: Vec::new(),
    };

    Ok(ProjectLayout {
        modules: vec![module],
        manifests: manifests.into_iter().map(FileRef::new).collect(),
    })
}

fn module_name(root: &Path, manifests: &[PathBuf]) -> String {
    manifests
        .first()
        .and_then(|m| m.parent())
        .and_then(|p| p.file_stem())
        .or_else(|| root.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn walk_recursive(dir: &Path, root: &Path, files: &mut Vec<PathBuf>, manifests: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    let is_root = dir == root;

    for entry in entries.flatten() {
        let path = entry.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if path.is_dir() {
            if ALWAYS_SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            if is_root && ROOT_ONLY_SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            if name.ends_with(".xcodeproj") {
                let manifest = path.join(MANIFEST_FILE_NAME);
                if manifest.is_file() {
                    manifests.push(manifest);
                }
                continue;
            }
            walk_recursive(&path, root, files, manifests);
        } else {
            files.push(path);
        }
    }
}
