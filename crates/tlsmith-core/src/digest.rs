//! Running transcript digest.
//!
//! Appended bytes are buffered in processing order and replayed into a fresh
//! hasher on every [`TranscriptDigest::current_hash`] call. The buffer is
//! what tests compare against, and the algorithm can change after bytes were
//! appended: ServerHello adjustment switches it to the negotiated suite's hash.

use sha2::{Digest, Sha256, Sha384};

use crate::config::DigestAlgorithm;

/// Cumulative digest over selected handshake message bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptDigest {
    algorithm: DigestAlgorithm,
    buffer: Vec<u8>,
}

impl TranscriptDigest {
    /// Empty digest.
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm, buffer: Vec::new() }
    }

    /// Append message bytes.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Return to the initial empty state.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// True if nothing was appended since creation or the last reset.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// All appended bytes, in order.
    pub fn raw(&self) -> &[u8] {
        &self.buffer
    }

    /// Hash used by [`Self::current_hash`].
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Switch the hash. Appended bytes are kept.
    pub fn set_algorithm(&mut self, algorithm: DigestAlgorithm) {
        self.algorithm = algorithm;
    }

    /// Hash of everything appended so far.
    pub fn current_hash(&self) -> Vec<u8> {
        hash(self.algorithm, &self.buffer)
    }
}

/// One-shot hash of `data`.
pub fn hash(algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_digest_is_hash_of_nothing() {
        let digest = TranscriptDigest::new(DigestAlgorithm::Sha256);
        assert_eq!(
            hex::encode(digest.current_hash()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn appends_are_order_sensitive() {
        let mut digest = TranscriptDigest::new(DigestAlgorithm::Sha256);
        digest.append(b"hello");
        let partial = digest.current_hash();
        assert_eq!(digest.current_hash(), partial);

        digest.append(b" world");
        assert_eq!(digest.current_hash(), hash(DigestAlgorithm::Sha256, b"hello world"));
        assert_ne!(digest.current_hash(), hash(DigestAlgorithm::Sha256, b" worldhello"));
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut digest = TranscriptDigest::new(DigestAlgorithm::Sha384);
        digest.append(&[1, 2, 3]);
        digest.reset();

        assert!(digest.is_empty());
        assert_eq!(digest, TranscriptDigest::new(DigestAlgorithm::Sha384));
        assert_eq!(digest.current_hash().len(), 48);
    }
}
