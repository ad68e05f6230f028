use clap::Args;
use serde::Serialize;

use obscura::defaults::{self, Defaults};
use obscura::protect::{self, ProtectOptions, ProtectReport};
use obscura::CancelToken;

use crate::commands::{expand_path, CmdResult};

#[derive(Args, Debug, Default)]
pub struct ProtectArgs {
    /// Project root directory
    #[arg(long, default_value = ".")]
    pub root: String,

    /// JSON layout describing modules and manifests (inferred from the root when omitted)
    #[arg(long)]
    pub layout: Option<String>,

    /// Index snapshot JSON; switches discovery to indexed declarations
    #[arg(long)]
    pub index: Option<String>,

    /// After the indexed pass, also rename tagged identifiers
    #[arg(long, requires = "index")]
    pub mixed: bool,

    /// Workspace whose subprojects are scanned before the host project
    #[arg(long)]
    pub workspace: Option<String>,

    /// Suffix marking identifiers for renaming
    #[arg(long)]
    pub tag: Option<String>,

    /// Length of generated names
    #[arg(long)]
    pub character_count: Option<usize>,

    /// Length of names generated by the tag pass in mixed mode
    #[arg(long)]
    pub manual_character_count: Option<usize>,

    /// Comma-separated module names whose files are never touched
    #[arg(long, value_delimiter = ',')]
    pub ignore_modules: Vec<String>,

    /// Config file (defaults to obscura.json in the root)
    #[arg(long)]
    pub config: Option<String>,

    /// Where to write the map file
    #[arg(long)]
    pub map_output: Option<String>,

    /// Plan every change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Seed for reproducible names
    #[arg(long, hide = true)]
    pub seed: Option<u64>,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum ProtectOutput {
    #[serde(rename = "protect")]
    Protect(ProtectReport),
}

pub fn run(args: ProtectArgs) -> CmdResult<ProtectOutput> {
    let root = expand_path(&args.root);
    let config_path = args.config.as_deref().map(expand_path);
    let config = defaults::load_config(&root, config_path.as_deref())?;

    let options = ProtectOptions {
        layout: args.layout.as_deref().map(expand_path),
        index: args.index.as_deref().map(expand_path),
        workspace: args.workspace.as_deref().map(expand_path),
        mixed: args.mixed,
        defaults: apply_overrides(config.defaults, &args),
        map_output: args.map_output.as_deref().map(expand_path),
        dry_run: args.dry_run,
        seed: args.seed,
        root,
    };

    let report = protect::protect(&options, &CancelToken::new())?;
    Ok((ProtectOutput::Protect(report), 0))
}

/// Flags win over the config file.
fn apply_overrides(mut defaults: Defaults, args: &ProtectArgs) -> Defaults {
    if let Some(tag) = &args.tag {
        defaults.tag = tag.clone();
    }
    if let Some(count) = args.character_count {
        defaults.character_count = count;
    }
    if let Some(count) = args.manual_character_count {
        defaults.manual_character_count = count;
    }
    if !args.ignore_modules.is_empty() {
        defaults.ignore_modules = args
            .ignore_modules
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
    }
    defaults
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let args = ProtectArgs {
            tag: Some("__x".to_string()),
            character_count: Some(12),
            ignore_modules: vec!["Pods".to_string(), " ".to_string(), "Vendor ".to_string()],
            ..Default::default()
        };
        let merged = apply_overrides(Defaults::default(), &args);
        assert_eq!(merged.tag, "__x");
        assert_eq!(merged.character_count, 12);
        assert_eq!(merged.manual_character_count, 30);
        assert_eq!(merged.ignore_modules, vec!["Pods", "Vendor"]);
    }

    #[test]
    fn missing_flags_keep_config_values() {
        let config = Defaults {
            tag: "__obf".to_string(),
            ignore_modules: vec!["Pods".to_string()],
            ..Defaults::default()
        };
        let merged = apply_overrides(config, &ProtectArgs::default());
        assert_eq!(merged.tag, "__obf");
        assert_eq!(merged.ignore_modules, vec!["Pods"]);
    }
}
