//! SHA-256 hashing for workflow integrity ids.
//!
//! Implements the `IntegrityHasher` port from `flowgate-core` with the
//! `sha2` crate (RustCrypto ecosystem).

use sha2::{Digest, Sha256};

use flowgate_core::integrity::IntegrityHasher;

/// Lowercase hex SHA-256 digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256IntegrityHasher;

impl Sha256IntegrityHasher {
    pub fn new() -> Self {
        Self
    }
}

impl IntegrityHasher for Sha256IntegrityHasher {
    fn compute_hash(&self, content: &str) -> String {
        let digest = Sha256::digest(content.as_bytes());
        format!("{:x}", digest)
    }
}
