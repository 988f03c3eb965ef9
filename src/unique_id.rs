/// Unique Identifier Module
///
/// Unique identifiers for callers minting primary-key values.
///
/// Nothing inside the crate calls these; they exist so applications can
/// generate keys without pulling in their own UUID dependency.

use uuid::Uuid;

/// A random UUID in hyphenated form, e.g. `67e55044-10b1-426f-9247-bb680e5fe0c8`
pub fn unique_string() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// The first group of a random UUID (8 hex characters)
pub fn unique_short_string() -> String {
    let uuid = unique_string();
    match uuid.split_once('-') {
        Some((head, _)) => head.to_string(),
        None => uuid,
    }
}

/// `prefix` followed by a short unique string
pub fn custom_uid(prefix: &str) -> String {
    format!("{}{}", prefix, unique_short_string())
}
