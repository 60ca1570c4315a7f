//! Discovery key derivation.
//!
//! Every client and server must agree on this bit for bit, whatever language
//! it is written in: SHA-256 over the UTF-8 bytes of the normalized path,
//! lowercase hex, first [`KEY_LEN`] characters.

use sha2::{Digest, Sha256};

/// Length of a discovery key in hex characters.
pub const KEY_LEN: usize = 16;

/// Canonical form of a project path used for hashing.
///
/// Backslashes become forward slashes, every character is lower-cased on its
/// own, and exactly one trailing `/` is stripped. Repeated trailing separators
/// are left as they are past the first.
///
/// Lower-casing is Unicode's per-character mapping with no context rules, so
/// `Σ` is always `σ`, even at the end of a word. Clients in other languages
/// must map code points one at a time rather than call a locale- or
/// context-aware string lower-caser.
pub fn normalize_project_path(path: &str) -> String {
    let mut normalized: String = path
        .chars()
        .map(|c| if c == '\\' { '/' } else { c })
        .flat_map(char::to_lowercase)
        .collect();
    if normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Derive the 16-character lowercase hex discovery key for a project path.
/// Total: any input, including the empty string, yields a key.
pub fn derive_key(path: &str) -> String {
    let normalized = normalize_project_path(path);
    let digest = Sha256::digest(normalized.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(KEY_LEN);
    key
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    fn is_key_shaped(key: &str) -> bool {
        key.len() == KEY_LEN && key.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
    }

    #[test]
    fn windows_and_unix_spellings_share_a_key() {
        assert_eq!(derive_key("D:\\Projects\\X"), derive_key("d:/projects/x/"));
        assert_eq!(derive_key("/Users/Dev/Game"), derive_key("/users/dev/game/"));
    }

    #[test]
    fn matches_reference_digest() {
        // sha256("") = e3b0c44298fc1c149afbf4c8996fb924...
        assert_eq!(derive_key(""), "e3b0c44298fc1c14");
        // sha256("abc") = ba7816bf8f01cfea414140de5dae2223...
        assert_eq!(derive_key("ABC"), "ba7816bf8f01cfea");
        assert_eq!(derive_key("abc/"), "ba7816bf8f01cfea");
    }

    #[test]
    fn case_folding_is_per_character() {
        // A context-aware lower-caser would turn the final sigma into ς
        assert_eq!(normalize_project_path("/Work/ΣΑΣ"), "/work/σασ");
        // sha256("/work/σασ") = ca425b94beda1620...
        assert_eq!(derive_key("/Work/ΣΑΣ"), "ca425b94beda1620");
        assert_eq!(derive_key("/work/σασ/"), "ca425b94beda1620");
    }

    #[test]
    fn strips_only_one_trailing_separator() {
        assert_eq!(normalize_project_path("C:\\Game\\\\"), "c:/game/");
        assert_eq!(normalize_project_path("/a/b/"), "/a/b");
        assert_eq!(normalize_project_path("/"), "");
        assert_ne!(derive_key("/a/b//"), derive_key("/a/b"));
    }

    #[test]
    fn empty_input_still_yields_a_key() {
        assert!(is_key_shaped(&derive_key("")));
    }

    #[test]
    fn distinct_paths_do_not_collide() {
        let keys: HashSet<String> = (0..2000)
            .map(|i| derive_key(&format!("/home/dev/projects/game-{i}")))
            .collect();
        assert_eq!(keys.len(), 2000);
    }

    proptest! {
        #[test]
        fn key_is_always_sixteen_lowercase_hex(path in ".*") {
            prop_assert!(is_key_shaped(&derive_key(&path)));
        }

        #[test]
        fn key_ignores_separator_style_and_case(path in "[A-Za-z0-9_/\\\\ .-]{0,40}") {
            let canonical = path.replace('\\', "/").to_lowercase();
            prop_assert_eq!(derive_key(&path), derive_key(&canonical));
        }

        #[test]
        fn key_ignores_one_trailing_separator(path in "[a-z0-9_.-]{1,20}(/[a-z0-9_.-]{1,20}){0,4}") {
            prop_assert_eq!(derive_key(&path), derive_key(&format!("{path}/")));
            prop_assert_eq!(derive_key(&path), derive_key(&format!("{path}\\")));
        }
    }
}
