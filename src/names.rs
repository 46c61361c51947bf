//! Naming conventions shared by storage and rendering
//!
//! Type names are snake_case singulars (`device_family`). Collections, entity
//! tables and child keys use the plural; ref keys append `_refs` / `_back_refs`.

use uuid::Uuid;

/// English plural of a snake_case type name. Only the last word is inflected.
///
/// Suffix rules only: consonant + `y` becomes `ies`; `s`, `x`, `z`, `ch`, `sh`
/// take `es`; everything else takes `s`. Irregular nouns are not special-cased.
pub fn pluralize(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let last_word = name.rsplit('_').next().unwrap_or(name);

    if let Some(stem) = name.strip_suffix('y') {
        let before_y = stem.chars().last();
        if before_y.map(|c| !is_vowel(c)).unwrap_or(false) {
            return format!("{}ies", stem);
        }
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|s| last_word.ends_with(s)) {
        return format!("{}es", name);
    }

    format!("{}s", name)
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Resource uri, e.g. `/device/<uuid>`
pub fn uri(type_name: &str, id: &Uuid) -> String {
    format!("/{}/{}", type_name, id)
}

/// Payload key carrying refs to `to_type`
pub fn ref_field(to_type: &str) -> String {
    format!("{}_refs", to_type)
}

/// Payload key carrying back-refs from `from_type`
pub fn back_ref_field(from_type: &str) -> String {
    format!("{}_back_refs", from_type)
}

/// Storage table holding entities of `type_name`
pub fn entity_table(type_name: &str) -> String {
    pluralize(type_name)
}

/// Storage table holding refs typed by (`from_type`, `to_type`)
pub fn ref_table(from_type: &str, to_type: &str) -> String {
    format!("{}_{}_refs", from_type, to_type)
}
