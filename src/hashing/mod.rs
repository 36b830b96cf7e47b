use blake3::Hasher;

/// Computes the full 32-byte BLAKE3 hash of a query text.
#[inline]
pub fn hash_query(text: &str) -> [u8; 32] {
    *blake3::hash(text.as_bytes()).as_bytes()
}

/// Computes a 64-bit BLAKE3 hash, truncated from 256 bits.
///
/// The truncation is acceptable here: these hashes key cache entries and
/// scope filters, where a collision degrades to a cache miss or an extra
/// candidate, never to data corruption. With 64 bits the birthday bound sits
/// around 4.3 billion items; practical cache sizes are millions of entries.
/// Nothing cryptographic depends on this value.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    u64::from_le_bytes(bytes)
}

/// Hashes a cache scope label (project or session) to its 64-bit filter key.
#[inline]
pub fn hash_scope(scope: &str) -> u64 {
    hash_to_u64(scope.as_bytes())
}

/// Derives a stable entry id from a scope and the query text.
///
/// Scope participates in the id so the same query text cached under two
/// scopes produces two distinct entries.
#[inline]
pub fn derive_entry_id(scope: &str, text: &str) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(scope.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());

    let hash = hasher.finalize();
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    u64::from_le_bytes(bytes)
}
