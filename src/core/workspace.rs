//! Workspace subproject discovery.
//!
//! A workspace's `contents.xcworkspacedata` is a small XML tree of `Group` and
//! `FileRef` elements. The tree is parsed into `WorkspaceNode`s and flattened
//! with an explicit worklist into the ordered list of referenced locations.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::io;

const WORKSPACE_DATA_FILE: &str = "contents.xcworkspacedata";
const EXCLUDED_PROJECTS: &[&str] = &["Pods.xcodeproj"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceNode {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<WorkspaceNode>,
}

/// A project referenced from a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subproject {
    /// Path of the `.xcodeproj` bundle.
    pub project_path: PathBuf,
    /// Directory containing the bundle; the root of the subproject's sources.
    pub base_path: PathBuf,
    /// The `project.pbxproj` manifest inside the bundle.
    pub manifest: PathBuf,
    pub has_swift_sources: bool,
}

impl Subproject {
    fn new(project_path: PathBuf) -> Self {
        let manifest = project_path.join("project.pbxproj");
        let base_path = project_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let has_swift_sources = std::fs::read_to_string(&manifest)
            .map(|content| content.contains("sourcecode.swift"))
            .unwrap_or(false);

        Self {
            project_path,
            base_path,
            manifest,
            has_swift_sources,
        }
    }
}

/// Parse workspace XML into a tree rooted at a synthetic document node.
pub fn parse_workspace(xml: &str) -> Result<WorkspaceNode> {
    let tag_re = Regex::new(r"<(/?)([A-Za-z_][\w.\-]*)([^>]*?)(/?)>")
        .map_err(|e| Error::internal_unexpected(e.to_string()))?;
    let attr_re = Regex::new(r#"([\w:.\-]+)\s*=\s*"([^"]*)""#)
        .map_err(|e| Error::internal_unexpected(e.to_string()))?;

    let mut stack = vec![WorkspaceNode {
        name: "#document".to_string(),
        ..Default::default()
    }];

    for caps in tag_re.captures_iter(xml) {
        let closing = !caps[1].is_empty();
        let name = caps[2].to_string();
        let self_closing = !caps[4].is_empty();

        if closing {
            if stack.len() < 2 || stack.last().map(|n| n.name.as_str()) != Some(name.as_str()) {
                return Err(Error::validation_invalid_argument(
                    "workspace",
                    format!("Unbalanced closing tag </{}>", name),
                    None,
                ));
            }
            if let Some(node) = stack.pop() {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            continue;
        }

        let attributes = attr_re
            .captures_iter(&caps[3])
            .map(|a| (a[1].to_string(), a[2].to_string()))
            .collect();
        let node = WorkspaceNode {
            name,
            attributes,
            children: Vec::new(),
        };

        if self_closing {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
            }
        } else {
            stack.push(node);
        }
    }

    if stack.len() != 1 {
        let open = stack.last().map(|n| n.name.clone()).unwrap_or_default();
        return Err(Error::validation_invalid_argument(
            "workspace",
            format!("Unclosed tag <{}>", open),
            None,
        ));
    }

    stack
        .pop()
        .ok_or_else(|| Error::internal_unexpected("workspace parser lost its root"))
}

/// Every `FileRef` location in document order, `group:` prefix removed.
pub fn file_ref_locations(root: &WorkspaceNode) -> Vec<String> {
    let mut locations = Vec::new();
    let mut worklist: Vec<&WorkspaceNode> = vec![root];

    while let Some(node) = worklist.pop() {
        if node.name == "FileRef" {
            if let Some(location) = node.attributes.get("location") {
                locations.push(location.replacen("group:", "", 1));
            }
            continue;
        }
        // Reversed so the first child is popped first.
        worklist.extend(node.children.iter().rev());
    }

    locations
}

/// Projects referenced by the workspace at `workspace_path`, resolved against
/// `base_path`. `Pods.xcodeproj`, names in `exclude` and missing projects are skipped.
pub fn subprojects(
    workspace_path: &Path,
    base_path: &Path,
    exclude: &[String],
) -> Result<Vec<Subproject>> {
    let data_path = workspace_path.join(WORKSPACE_DATA_FILE);
    let xml = io::read_file(&data_path, &format!("read {}", data_path.display()))?;
    let tree = parse_workspace(&xml)?;

    let mut projects = Vec::new();
    for location in file_ref_locations(&tree) {
        if !location.ends_with(".xcodeproj") {
            continue;
        }
        if EXCLUDED_PROJECTS.iter().any(|p| location.ends_with(p))
            || exclude.iter().any(|p| location.ends_with(p.as_str()))
        {
            continue;
        }
        let path = base_path.join(&location);
        if !path.exists() {
            log_status!("workspace", "Skipping missing project {}", path.display());
            continue;
        }
        projects.push(Subproject::new(path));
    }

    Ok(projects)
}
