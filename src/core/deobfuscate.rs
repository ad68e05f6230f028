//! Translate obfuscated names in text (crash logs, symbolicated traces) back to
//! their originals.

use aho_corasick::{AhoCorasick, MatchKind};
use std::path::Path;

use crate::error::{Error, Result};
use crate::map::ObfuscationMap;
use crate::mapfile;
use crate::utils::io;

/// Replace every obfuscated token in `text` with its original name.
///
/// Single left-to-right pass, longest token first at each position, so a
/// token that is a prefix of another never splits it. Tokens are matched as
/// substrings, which also covers names embedded in mangled symbols.
pub fn translate(text: &str, map: &ObfuscationMap) -> Result<String> {
    if map.is_empty() {
        return Ok(text.to_string());
    }

    let (tokens, originals): (Vec<String>, Vec<String>) = map.reverse().into_iter().unzip();

    let matcher = AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(&tokens)
        .map_err(|e| Error::internal_unexpected(format!("Failed to build token matcher: {}", e)))?;

    Ok(matcher.replace_all(text, &originals))
}

/// Read `input` and `map_file`, returning the translated text.
pub fn deobfuscate_file(input: &Path, map_file: &Path) -> Result<String> {
    let loaded = mapfile::read_map_file(map_file)?;
    let text = io::read_file(input, &format!("read {}", input.display()))?;
    let translated = translate(&text, &loaded.map)?;
    log_status!(
        "deobfuscate",
        "Translated {} with {} map entries",
        input.display(),
        loaded.map.len()
    );
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn map_of(pairs: &[(&str, &str)]) -> ObfuscationMap {
        let mut map = ObfuscationMap::new();
        for (k, v) in pairs {
            map.insert_loaded(k, v).unwrap();
        }
        map
    }

    #[test]
    fn restores_names_in_a_trace() {
        let map = map_of(&[("LoginViewController__s", "aBcDeF"), ("validate__s", "gHiJkL")]);
        let trace = "Fatal error in aBcDeF.gHiJkL() at line 42\n0 MyApp $s5MyApp6aBcDeFC";
        assert_eq!(
            translate(trace, &map).unwrap(),
            "Fatal error in LoginViewController__s.validate__s() at line 42\n0 MyApp $s5MyApp6LoginViewController__sC"
        );
    }

    #[test]
    fn longest_token_wins_at_each_position() {
        let map = map_of(&[("Short", "ab"), ("Long", "abcd")]);
        assert_eq!(translate("abcd ab", &map).unwrap(), "Long Short");
    }

    #[test]
    fn replacements_are_not_rescanned() {
        let map = map_of(&[("xy", "ab"), ("Other", "xy")]);
        assert_eq!(translate("ab", &map).unwrap(), "xy");
    }

    #[test]
    fn empty_map_leaves_text_alone() {
        assert_eq!(translate("nothing here", &ObfuscationMap::new()).unwrap(), "nothing here");
    }

    #[test]
    fn deobfuscates_file_with_persisted_map() {
        let dir = TempDir::new().unwrap();
        let map_path = dir.path().join("obscura-map.txt");
        std::fs::write(
            &map_path,
            "// obscura deobfuscation map\nData:\nFoo__s ===> Qw3\n",
        )
        .unwrap();
        let log = dir.path().join("crash.log");
        std::fs::write(&log, "crash in Qw3.run()").unwrap();

        assert_eq!(deobfuscate_file(&log, &map_path).unwrap(), "crash in Foo__s.run()");
    }
}
