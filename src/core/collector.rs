//! Declaration discovery.
//!
//! Two strategies turn a module into renameable symbols:
//! - `TagBased` scans declaration syntax for identifiers ending in a literal tag.
//! - `IndexerBased` asks the symbol indexer for the module's declarations.
//!
//! Modules are scanned in parallel; every scan is independent and results come
//! back in module order so callers can merge them deterministically.

use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::indexer::{Declaration, Indexer};
use crate::symbols::{FileRef, Module, Symbol, SymbolKind};
use crate::utils::io;

/// Names the indexer path never renames: compiler-synthesized or framework-bound.
const DEFAULT_DENYLIST: &[&str] = &[
    "init",
    "deinit",
    "subscript",
    "main",
    "body",
    "description",
    "debugDescription",
    "hash",
    "hashValue",
    "rawValue",
    "allCases",
    "CodingKeys",
    "encode",
    "decode",
    "AppDelegate",
    "SceneDelegate",
];

const TYPE_KEYWORDS: &[&str] = &[
    "class",
    "struct",
    "enum",
    "protocol",
    "extension",
    "typealias",
    "actor",
];
const MEMBER_KEYWORDS: &[&str] = &["func", "var", "let", "case"];

/// Which discovery strategy a run uses. Chosen once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryStrategy {
    TagBased { tag: String },
    IndexerBased,
}

impl DiscoveryStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            DiscoveryStrategy::TagBased { .. } => "tag",
            DiscoveryStrategy::IndexerBased => "indexer",
        }
    }
}

/// Shared abort flag for a run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::run_cancelled(stage))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanSettings {
    pub ignore_modules: Vec<String>,
    /// Extra names never renamed on the indexer path.
    pub denylist: Vec<String>,
    /// Names of every module in the run; module names are never renamed.
    pub module_names: HashSet<String>,
}

impl ScanSettings {
    fn is_denied(&self, name: &str) -> bool {
        DEFAULT_DENYLIST.contains(&name)
            || self.denylist.iter().any(|d| d == name)
            || self.module_names.contains(name)
    }
}

/// Everything one module contributed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleScan {
    pub module: String,
    pub symbols: Vec<Symbol>,
    #[serde(skip)]
    pub files: Vec<FileRef>,
    #[serde(skip)]
    pub markup_files: Vec<FileRef>,
    #[serde(skip)]
    pub declarations: Vec<Declaration>,
}

impl ModuleScan {
    fn push_symbol(&mut self, symbol: Symbol) {
        if !self.symbols.contains(&symbol) {
            self.symbols.push(symbol);
        }
    }

    fn has_name(&self, name: &str) -> bool {
        self.symbols.iter().any(|s| s.name == name)
    }
}

/// Regex matching tagged declarations: group 1 is the keyword, group 2 the name.
pub fn tagged_declaration_regex(tag: &str) -> Result<Regex> {
    let keywords = [TYPE_KEYWORDS, MEMBER_KEYWORDS].concat().join("|");
    let pattern = format!(
        r"\b({})\s+([A-Za-z_][A-Za-z0-9_]*{})\b",
        keywords,
        regex::escape(tag)
    );
    Regex::new(&pattern).map_err(|e| {
        Error::config_invalid_value("tag", Some(tag.to_string()), e.to_string())
    })
}

/// Tagged declarations in one source text, in order of appearance.
pub fn find_tagged_declarations(content: &str, declaration_re: &Regex) -> Vec<Symbol> {
    let mut found: Vec<Symbol> = Vec::new();
    for caps in declaration_re.captures_iter(content) {
        let kind = if TYPE_KEYWORDS.contains(&&caps[1]) {
            SymbolKind::Type
        } else {
            SymbolKind::Member
        };
        let name = &caps[2];
        // Same name, same decision: the first kind seen is kept.
        if !found.iter().any(|s| s.name == name) {
            found.push(Symbol::tagged(name, kind));
        }
    }
    found
}

/// Scan one module using the tag convention.
pub fn scan_tagged(module: &Module, tag: &str, settings: &ScanSettings) -> Result<ModuleScan> {
    let declaration_re = tagged_declaration_regex(tag)?;
    let mut scan = ModuleScan {
        module: module.name.clone(),
        ..Default::default()
    };

    for file in &module.source_files {
        if file.is_ignored(&settings.ignore_modules) {
            continue;
        }
        let content = io::read_file(file.path(), &format!("scan {}", file.display()))?;
        for symbol in find_tagged_declarations(&content, &declaration_re) {
            scan.push_symbol(symbol);
        }
        if let Some(stem) = file.stem().filter(|s| s.ends_with(tag) && s.len() > tag.len()) {
            if !scan.has_name(stem) {
                scan.push_symbol(Symbol::tagged(stem, SymbolKind::File));
            }
        }
        scan.files.push(file.clone());
    }

    collect_markup(module, settings, &mut scan, |stem| {
        stem.ends_with(tag) && stem.len() > tag.len()
    });
    Ok(scan)
}

/// Scan one module through the indexer.
pub fn scan_indexed(
    module: &Module,
    indexer: &dyn Indexer,
    settings: &ScanSettings,
) -> Result<ModuleScan> {
    let mut scan = ModuleScan {
        module: module.name.clone(),
        ..Default::default()
    };

    for declaration in indexer.declarations(module)? {
        if declaration.file.is_ignored(&settings.ignore_modules)
            || settings.is_denied(&declaration.name)
            || !is_identifier(&declaration.name)
        {
            continue;
        }
        scan.push_symbol(Symbol::indexed(
            declaration.name.clone(),
            declaration.kind,
            declaration.usr.clone(),
        ));
        scan.declarations.push(declaration);
    }

    scan.files = module
        .source_files
        .iter()
        .filter(|f| !f.is_ignored(&settings.ignore_modules))
        .cloned()
        .collect();

    collect_markup(module, settings, &mut scan, |_| false);
    Ok(scan)
}

/// Every markup file outside ignored modules is a rewrite candidate; its content
/// may reference symbols declared anywhere in the run. A stem satisfying `extra`
/// also becomes a `File` symbol.
fn collect_markup(
    module: &Module,
    settings: &ScanSettings,
    scan: &mut ModuleScan,
    extra: impl Fn(&str) -> bool,
) {
    for file in &module.markup_files {
        if file.is_ignored(&settings.ignore_modules) {
            continue;
        }
        if let Some(stem) = file.stem().filter(|s| extra(s) && !scan.has_name(s)) {
            scan.push_symbol(Symbol::tagged(stem, SymbolKind::File));
        }
        scan.markup_files.push(file.clone());
    }
}

/// Scan every module in parallel. Modules whose scan fails are logged and
/// skipped; results keep module order.
pub fn scan_modules(
    modules: &[Module],
    strategy: &DiscoveryStrategy,
    indexer: Option<&dyn Indexer>,
    settings: &ScanSettings,
    cancel: &CancelToken,
) -> Result<Vec<ModuleScan>> {
    if *strategy == DiscoveryStrategy::IndexerBased && indexer.is_none() {
        return Err(Error::validation_missing_argument(vec!["index".to_string()]));
    }

    let results: Vec<Result<ModuleScan>> = modules
        .par_iter()
        .map(|module| {
            cancel.check("discovery")?;
            match strategy {
                DiscoveryStrategy::TagBased { tag } => scan_tagged(module, tag, settings),
                DiscoveryStrategy::IndexerBased => match indexer {
                    Some(indexer) => scan_indexed(module, indexer, settings),
                    None => Err(Error::validation_missing_argument(vec!["index".to_string()])),
                },
            }
        })
        .collect();

    cancel.check("discovery")?;

    let mut scans = Vec::with_capacity(results.len());
    for (module, result) in modules.iter().zip(results) {
        match result {
            Ok(scan) => {
                log_status!(
                    "scan",
                    "{}: {} symbols in {} files",
                    module.name,
                    scan.symbols.len(),
                    scan.files.len()
                );
                scans.push(scan);
            }
            Err(err) => {
                log_status!(
                    "scan",
                    "Skipping module {}: {} ({})",
                    module.name,
                    err.message,
                    err.details
                );
            }
        }
    }

    Ok(scans)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::IndexSnapshot;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> FileRef {
        let path = dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        FileRef::new(path)
    }

    #[test]
    fn finds_tagged_types_and_members() {
        let re = tagged_declaration_regex("__s").unwrap();
        let found = find_tagged_declarations(
            "class Foo__s {\n  var count__s = 0\n  func load__s() {}\n  let plain = 1\n}\nstruct Bar {}\n",
            &re,
        );
        let names: Vec<(&str, SymbolKind)> =
            found.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("Foo__s", SymbolKind::Type),
                ("count__s", SymbolKind::Member),
                ("load__s", SymbolKind::Member),
            ]
        );
    }

    #[test]
    fn tag_must_end_the_identifier() {
        let re = tagged_declaration_regex("__s").unwrap();
        assert!(find_tagged_declarations("class Foo__sX {}", &re).is_empty());
        assert!(find_tagged_declarations("let x = Foo__s()", &re).is_empty());
    }

    #[test]
    fn duplicate_names_collapse_into_one_symbol() {
        let re = tagged_declaration_regex("__s").unwrap();
        let found = find_tagged_declarations(
            "class Dup__s {}\nextension Dup__s {}\nfunc Dup__s() {}",
            &re,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, SymbolKind::Type);
    }

    #[test]
    fn tagged_scan_adds_files_markup_and_skips_ignored_modules() {
        let dir = TempDir::new().unwrap();
        let module = Module {
            name: "App".to_string(),
            source_files: vec![
                write(&dir, "App/Foo__s.swift", "class Foo__s {}\n"),
                write(&dir, "Vendor/Lib.swift", "class Hidden__s {}\n"),
            ],
            markup_files: vec![
                write(&dir, "App/Foo__s.xib", "<xml/>"),
                write(&dir, "App/Main.storyboard", "<xml/>"),
                write(&dir, "App/Login__s.storyboard", "<xml/>"),
                write(&dir, "Vendor/Skin.xib", "<xml/>"),
            ],
            ..Default::default()
        };
        let settings = ScanSettings {
            ignore_modules: vec!["Vendor".to_string()],
            ..Default::default()
        };

        let scan = scan_tagged(&module, "__s", &settings).unwrap();
        let names: Vec<&str> = scan.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Foo__s", "Login__s"]);
        assert_eq!(scan.files.len(), 1);
        assert_eq!(scan.markup_files.len(), 3);
        assert!(scan.markup_files.iter().all(|f| !f.display().contains("Vendor")));
        assert_eq!(scan.symbols[1].kind, SymbolKind::File);
    }

    #[test]
    fn file_only_symbol_when_no_declaration_matches() {
        let dir = TempDir::new().unwrap();
        let module = Module {
            name: "App".to_string(),
            source_files: vec![write(&dir, "Helpers__s.swift", "func helper() {}\n")],
            ..Default::default()
        };
        let scan = scan_tagged(&module, "__s", &ScanSettings::default()).unwrap();
        assert_eq!(scan.symbols, vec![Symbol::tagged("Helpers__s", SymbolKind::File)]);
    }

    fn snapshot(declarations: Vec<Declaration>) -> IndexSnapshot {
        let mut by_module = HashMap::new();
        by_module.insert("App".to_string(), declarations);
        IndexSnapshot {
            declarations: by_module,
            occurrences: HashMap::new(),
        }
    }

    fn declaration(name: &str, usr: &str, file: &str) -> Declaration {
        Declaration {
            name: name.to_string(),
            usr: usr.to_string(),
            file: FileRef::new(file),
            offset: 0,
            kind: SymbolKind::Type,
        }
    }

    #[test]
    fn indexed_scan_filters_denylist_modules_and_operators() {
        let index = snapshot(vec![
            declaration("MyClass", "u1", "App/A.swift"),
            declaration("init", "u2", "App/A.swift"),
            declaration("App", "u3", "App/A.swift"),
            declaration("==", "u4", "App/A.swift"),
            declaration("Secret", "u5", "App/A.swift"),
            declaration("Vendored", "u6", "Pods/V.swift"),
        ]);
        let module = Module {
            name: "App".to_string(),
            ..Default::default()
        };
        let settings = ScanSettings {
            ignore_modules: vec!["Pods".to_string()],
            denylist: vec!["Secret".to_string()],
            module_names: ["App".to_string()].into_iter().collect(),
        };

        let scan = scan_indexed(&module, &index, &settings).unwrap();
        assert_eq!(scan.symbols, vec![Symbol::indexed("MyClass", SymbolKind::Type, "u1")]);
        assert_eq!(scan.declarations.len(), 1);
    }

    #[test]
    fn parallel_scan_keeps_module_order_and_skips_failures() {
        let index = snapshot(vec![declaration("MyClass", "u1", "App/A.swift")]);
        let modules = vec![
            Module {
                name: "Missing".to_string(),
                ..Default::default()
            },
            Module {
                name: "App".to_string(),
                ..Default::default()
            },
        ];
        let scans = scan_modules(
            &modules,
            &DiscoveryStrategy::IndexerBased,
            Some(&index),
            &ScanSettings::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].module, "App");
    }

    #[test]
    fn cancelled_scan_aborts() {
        let token = CancelToken::new();
        token.cancel();
        let err = scan_modules(
            &[Module::default()],
            &DiscoveryStrategy::TagBased { tag: "__s".to_string() },
            None,
            &ScanSettings::default(),
            &token,
        )
        .unwrap_err();
        assert_eq!(err.code.as_str(), "run.cancelled");
    }

    #[test]
    fn indexer_strategy_requires_an_indexer() {
        let err = scan_modules(
            &[],
            &DiscoveryStrategy::IndexerBased,
            None,
            &ScanSettings::default(),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.code.as_str(), "validation.missing_argument");
    }
}
