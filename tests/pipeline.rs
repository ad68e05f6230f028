use std::fs;
use std::path::{Path, PathBuf};

use obscura::defaults::Defaults;
use obscura::deobfuscate;
use obscura::mapfile;
use obscura::{protect, CancelToken, ErrorCode, ProtectOptions};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn options(root: &Path) -> ProtectOptions {
    ProtectOptions {
        root: root.to_path_buf(),
        defaults: Defaults {
            character_count: 16,
            ..Defaults::default()
        },
        seed: Some(42),
        ..Default::default()
    }
}

fn project(root: &Path) {
    write(
        root,
        "Shop.xcodeproj/project.pbxproj",
        "B1 /* Cart__s.swift */ = {isa = PBXFileReference; path = Cart__s.swift; };\n",
    );
    write(
        root,
        "Shop/Cart__s.swift",
        "final class Cart__s {\n    func checkout__s() -> Bool { true }\n}\n",
    );
    write(
        root,
        "Shop/Store.swift",
        "let cart = Cart__s()\nlet ok = cart.checkout__s()\nlet label = \"Cart__s\"\n",
    );
    write(
        root,
        "Shop/Main.storyboard",
        "<viewController customClass=\"Cart__s\" customModule=\"Shop\"/>\n",
    );
}

#[test]
fn protect_then_deobfuscate_restores_names() {
    let dir = TempDir::new().unwrap();
    project(dir.path());

    let report = protect(&options(dir.path()), &CancelToken::new()).unwrap();
    let cart = report.map.get("Cart__s").unwrap().to_string();
    let checkout = report.map.get("checkout__s").unwrap().to_string();
    assert_ne!(cart, checkout);

    let store = fs::read_to_string(dir.path().join("Shop/Store.swift")).unwrap();
    assert!(!store.contains("__s"));
    assert!(store.contains(&format!("let cart = {}()", cart)));

    let storyboard = fs::read_to_string(dir.path().join("Shop/Main.storyboard")).unwrap();
    assert!(storyboard.contains(&format!("customClass=\"{}\"", cart)));

    assert!(dir.path().join(format!("Shop/{}.swift", cart)).exists());
    assert!(!dir.path().join("Shop/Cart__s.swift").exists());

    let crash = write(
        dir.path(),
        "crash.log",
        &format!("Fatal error in {}.{}() at line 2\n", cart, checkout),
    );
    let map_path = PathBuf::from(report.map_path.unwrap());
    let restored = deobfuscate::deobfuscate_file(&crash, &map_path).unwrap();
    assert_eq!(restored, "Fatal error in Cart__s.checkout__s() at line 2\n");
}

#[test]
fn second_run_with_nothing_tagged_is_a_precondition_failure() {
    let dir = TempDir::new().unwrap();
    project(dir.path());

    protect(&options(dir.path()), &CancelToken::new()).unwrap();
    let err = protect(&options(dir.path()), &CancelToken::new()).unwrap_err();
    assert_eq!(err.code, ErrorCode::DiscoveryNoDeclarations);
}

#[test]
fn written_map_lists_every_renamed_identifier() {
    let dir = TempDir::new().unwrap();
    project(dir.path());
    let map_output = dir.path().join("out/run.txt");

    let mut opts = options(dir.path());
    opts.map_output = Some(map_output.clone());
    let report = protect(&opts, &CancelToken::new()).unwrap();

    let loaded = mapfile::read_map_file(&map_output).unwrap();
    assert_eq!(loaded.map.len(), report.entries.len());
    assert_eq!(loaded.metadata.mode, "tag");
    assert_eq!(loaded.metadata.tag.as_deref(), Some("__s"));
    assert_eq!(loaded.metadata.character_count, 16);
    for entry in &report.entries {
        assert_eq!(loaded.map.get(&entry.original), Some(entry.obfuscated.as_str()));
    }
}
