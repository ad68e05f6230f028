//! Info.plist lookups: bundle version for map naming, principal class rewriting.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::map::ObfuscationMap;

static PRINCIPAL_CLASS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // <key>NSPrincipalClass</key> <string>$(PRODUCT_MODULE_NAME).Name</string>
    Regex::new(r"(<key>NSPrincipalClass</key>\s*<string>)((?:\$\(PRODUCT_MODULE_NAME\)\.)?)([^<]*)(</string>)")
        .unwrap()
});

/// The `<string>` value following `<key>{key}</key>`.
pub fn string_value(content: &str, key: &str) -> Option<String> {
    let pattern = format!(r"<key>{}</key>\s*<string>([^<]*)</string>", regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    let value = re.captures(content)?.get(1)?.as_str().trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// `(CFBundleShortVersionString, CFBundleVersion)` when both are present.
pub fn bundle_version(content: &str) -> Option<(String, String)> {
    let version = string_value(content, "CFBundleShortVersionString")?;
    let build = string_value(content, "CFBundleVersion")?;
    Some((version, build))
}

/// Rewrite `NSPrincipalClass` values naming a renamed type.
///
/// Returns the new content and the number of values changed, or `None` when
/// nothing in the plist refers to a renamed type.
pub fn patch_principal_class(content: &str, map: &ObfuscationMap) -> Option<(String, usize)> {
    let mut changed = 0;
    let patched = PRINCIPAL_CLASS_PATTERN.replace_all(content, |caps: &Captures| {
        let name = caps[3].trim();
        match map.get(name) {
            Some(obfuscated) => {
                changed += 1;
                format!("{}{}{}{}", &caps[1], &caps[2], obfuscated, &caps[4])
            }
            None => caps[0].to_string(),
        }
    });

    if changed == 0 {
        None
    } else {
        Some((patched.into_owned(), changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>CFBundleShortVersionString</key>
	<string>2.4.1</string>
	<key>CFBundleVersion</key>
	<string>117</string>
	<key>NSPrincipalClass</key>
	<string>$(PRODUCT_MODULE_NAME).Extension__s</string>
</dict>
</plist>
"#;

    fn map_of(pairs: &[(&str, &str)]) -> ObfuscationMap {
        let mut map = ObfuscationMap::new();
        for (k, v) in pairs {
            map.insert_loaded(k, v).unwrap();
        }
        map
    }

    #[test]
    fn reads_bundle_version() {
        assert_eq!(
            bundle_version(PLIST),
            Some(("2.4.1".to_string(), "117".to_string()))
        );
    }

    #[test]
    fn missing_build_number_means_no_version() {
        let plist = "<key>CFBundleShortVersionString</key><string>1.0</string>";
        assert_eq!(bundle_version(plist), None);
    }

    #[test]
    fn rewrites_module_qualified_principal_class() {
        let map = map_of(&[("Extension__s", "QwErTy")]);
        let (patched, changed) = patch_principal_class(PLIST, &map).unwrap();
        assert_eq!(changed, 1);
        assert!(patched.contains("<string>$(PRODUCT_MODULE_NAME).QwErTy</string>"));
        assert!(patched.contains("<string>2.4.1</string>"));
    }

    #[test]
    fn rewrites_bare_principal_class() {
        let plist = "<key>NSPrincipalClass</key>\n<string>Main__s</string>";
        let map = map_of(&[("Main__s", "abc")]);
        let (patched, _) = patch_principal_class(plist, &map).unwrap();
        assert_eq!(patched, "<key>NSPrincipalClass</key>\n<string>abc</string>");
    }

    #[test]
    fn unrelated_principal_class_is_left_alone() {
        let plist = "<key>NSPrincipalClass</key><string>NSApplication</string>";
        let map = map_of(&[("Main__s", "abc")]);
        assert!(patch_principal_class(plist, &map).is_none());
    }
}
