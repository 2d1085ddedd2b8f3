//! Cache key construction.
//!
//! Keys are namespaced by resource class so that, for example, component
//! metadata and rendered output never collide even when they share a natural
//! key (the alias). When the natural key would push the full key past the
//! backend's length limit, the variable portion is condensed to a short
//! xxh64 digest. The digest is not cryptographic; it only needs a low
//! collision probability, and a given context typically serializes the same
//! way twice.

use xxhash_rust::xxh64::xxh64;

/// Maximum length of a backend key, in bytes.
///
/// 250 is the common memcached limit; staying under it keeps the service
/// portable across backends.
pub const MAX_KEY_LEN: usize = 250;

/// Resource class a cache key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePrefix {
    /// Per-alias component metadata produced by discovery.
    ComponentMetadata,
    /// Full rendered output keyed by alias plus serialized context.
    RenderedOutput,
}

impl CachePrefix {
    /// The literal prefix written into backend keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePrefix::ComponentMetadata => "fr_meta",
            CachePrefix::RenderedOutput => "fr_out",
        }
    }
}

/// Builds the full backend key for a natural key under a prefix.
///
/// The result is `{prefix}:{key}`, unless that would exceed [`MAX_KEY_LEN`],
/// in which case the variable portion is replaced by `x` plus a 16-hex-digit
/// xxh64 digest of the natural key.
pub fn build_key(prefix: CachePrefix, key: &str) -> String {
    let full = format!("{}:{}", prefix.as_str(), key);
    if full.len() <= MAX_KEY_LEN {
        return full;
    }
    format!("{}:x{:016x}", prefix.as_str(), xxh64(key.as_bytes(), 0))
}

/// The reserved backend key holding the key index for a prefix.
pub fn index_key(prefix: CachePrefix) -> String {
    format!("{}:__index", prefix.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_key_passes_through() {
        let key = build_key(CachePrefix::ComponentMetadata, "fields.text");
        assert_eq!(key, "fr_meta:fields.text");
    }

    #[test]
    fn test_long_key_is_condensed() {
        let natural = "a".repeat(400);
        let key = build_key(CachePrefix::RenderedOutput, &natural);

        assert!(key.len() <= MAX_KEY_LEN);
        assert!(key.starts_with("fr_out:x"));
        // 7 for "fr_out:", 1 for "x", 16 hex digits
        assert_eq!(key.len(), 7 + 1 + 16);
    }

    #[test]
    fn test_condensed_key_is_stable() {
        let natural = "b".repeat(300);
        let a = build_key(CachePrefix::RenderedOutput, &natural);
        let b = build_key(CachePrefix::RenderedOutput, &natural);
        assert_eq!(a, b);
    }

    #[test]
    fn test_prefixes_do_not_collide() {
        let a = build_key(CachePrefix::ComponentMetadata, "fields.text");
        let b = build_key(CachePrefix::RenderedOutput, "fields.text");
        assert_ne!(a, b);
    }

    #[test]
    fn test_index_key_is_reserved() {
        assert_eq!(index_key(CachePrefix::ComponentMetadata), "fr_meta:__index");
        assert_eq!(index_key(CachePrefix::RenderedOutput), "fr_out:__index");
    }
}
