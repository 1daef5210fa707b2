//! Content-derived digests for checkpoints and revisions.
//!
//! Fingerprints identify checkpoints; they are not a security property.

use crate::types::FileRecord;
use sha2::{Digest, Sha256};

/// How much of each secondary-side document participates in the
/// checkpoint fingerprint.
const CONTENT_PREFIX_LEN: usize = 256;

/// Computes a stable digest over the two snapshot collections.
///
/// The digest covers logical names and revision tokens on both sides plus a
/// bounded content prefix for secondary records, and is independent of the
/// order the records are supplied in.
#[must_use]
pub fn checkpoint_fingerprint(primary: &[FileRecord], secondary: &[FileRecord]) -> String {
    let mut hasher = Sha256::new();

    let mut keys: Vec<String> = primary
        .iter()
        .map(|r| format!("p\x1f{}\x1f{}", r.name, r.revision.as_deref().unwrap_or("")))
        .chain(secondary.iter().map(|r| {
            let prefix: String = r.content.chars().take(CONTENT_PREFIX_LEN).collect();
            format!(
                "s\x1f{}\x1f{}\x1f{}",
                r.name,
                r.revision.as_deref().unwrap_or(""),
                prefix
            )
        }))
        .collect();
    keys.sort_unstable();

    for key in &keys {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
    }

    hex_encode(&hasher.finalize())
}

/// Computes the content-hash revision token used by store implementations.
#[must_use]
pub fn content_revision(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
