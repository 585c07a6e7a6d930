//! Slot key derivation
//!
//! Yield points and blocks are joined through string keys that end up both as
//! map keys and, for yields, literally inside rewritten template text. Keys
//! only ever contain `[a-z0-9_]` so they are valid evaluator identifiers.

use sha2::{Digest, Sha256};

/// Key shared by the default yield and the default (whole file) block
pub const DEFAULT_SLOT: &str = "composer_default_slot";

/// Prefix for every hashed block key
const BLOCK_PREFIX: &str = "composer_";

/// Prefix for named yield keys
const YIELD_PREFIX: &str = "composer_slot_";

/// Domain separator mixed into every block hash
const HASH_DOMAIN: &[u8] = b"composer:";

/// Derive the key of the block `name` defined in `file`.
///
/// The empty name maps to [`DEFAULT_SLOT`] so the default block is
/// recognizable without knowing which file owns it.
pub fn block_key(file: &str, name: &str) -> String {
    let name = normalize_name(name);
    if name.is_empty() {
        return DEFAULT_SLOT.to_string();
    }

    let identity = format!("{}#{}", file, name).replace(['/', '\\'], "_");

    let mut hasher = Sha256::new();
    hasher.update(HASH_DOMAIN);
    hasher.update(identity.as_bytes());

    format!("{}{}", BLOCK_PREFIX, hex::encode(hasher.finalize()))
}

/// Derive the key of a yield point named `name`.
///
/// Yield keys do not depend on the file: a layout's `= yield "title"` must
/// meet the `title` block of whichever content file is being rendered.
pub fn yield_key(name: &str) -> String {
    let name = normalize_name(name);
    if name.is_empty() {
        DEFAULT_SLOT.to_string()
    } else {
        format!("{}{}", YIELD_PREFIX, name)
    }
}

/// Recover the human readable slot name from a yield key.
///
/// Returns an empty string for the default slot.
pub fn slot_name(yield_key: &str) -> &str {
    if yield_key == DEFAULT_SLOT {
        return "";
    }
    yield_key.strip_prefix(YIELD_PREFIX).unwrap_or(yield_key)
}

/// Wrap a yield key in the evaluator's raw (non-escaping) interpolation syntax.
///
/// The key is looked up from the root context so yields inside `each` or
/// `with` blocks still find their captured slot.
pub fn placeholder(yield_key: &str) -> String {
    format!("{{{{{{@root.{}}}}}}}", yield_key)
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_is_sentinel() {
        assert_eq!(block_key("views/a.html", ""), DEFAULT_SLOT);
        assert_eq!(block_key("views/b.html", ""), DEFAULT_SLOT);
        assert_eq!(yield_key(""), DEFAULT_SLOT);
    }

    #[test]
    fn test_block_key_is_stable() {
        // sha256("composer:views_content.html#title")
        assert_eq!(
            block_key("views/content.html", "title"),
            "composer_c7267adb47221d54518517d14b93b3dc65bec4f9197c7b32bab504d1efcf4891"
        );
    }

    #[test]
    fn test_block_key_lowercases_name() {
        assert_eq!(
            block_key("views/content.html", "Title"),
            block_key("views/content.html", "title")
        );
    }

    #[test]
    fn test_block_key_separators_normalized() {
        assert_eq!(
            block_key("views\\content.html", "title"),
            block_key("views/content.html", "title")
        );
    }

    #[test]
    fn test_same_name_different_files_do_not_collide() {
        let files = [
            "layout.html",
            "content.html",
            "hotels/show.html",
            "hotels/index.html",
            "users/show.html",
            "a",
            "b",
        ];
        let keys: std::collections::HashSet<String> =
            files.iter().map(|f| block_key(f, "x")).collect();
        assert_eq!(keys.len(), files.len());
    }

    #[test]
    fn test_keys_are_identifier_safe() {
        let key = block_key("some dir/with spaces/file.html", "sidebar");
        assert!(key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        assert_eq!(key.len(), BLOCK_PREFIX.len() + 64);
    }

    #[test]
    fn test_yield_key_is_file_independent() {
        assert_eq!(yield_key("Title"), "composer_slot_title");
        assert_eq!(slot_name("composer_slot_title"), "title");
        assert_eq!(slot_name(DEFAULT_SLOT), "");
    }

    #[test]
    fn test_placeholder_uses_triple_braces() {
        insta::assert_snapshot!(placeholder("composer_slot_title"), @"{{{@root.composer_slot_title}}}");
    }
}
