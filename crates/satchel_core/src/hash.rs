use std::hash::Hasher;

/// Hasher used for all identifier hashes in the bundler.
///
/// Ids must stay consistent for the entire build and between builds, so this
/// must never be seeded randomly.
pub type IdentifierHasher = xxhash_rust::xxh3::Xxh3;

/// Digest of raw bytes, used for cache keys and output filenames.
///
/// Ids are 16 hex characters so they can double as module ids inside
/// packaged output.
pub fn content_hash(bytes: &[u8]) -> String {
  format!("{:016x}", xxhash_rust::xxh3::xxh3_64(bytes))
}

pub fn finish_identifier(hasher: IdentifierHasher) -> String {
  let mut hasher = hasher;
  format!("{:016x}", Hasher::finish(&mut hasher))
}
