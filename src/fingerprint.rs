use crate::error::CompareError;
use bincode::{Decode, Encode};

/// Similarity threshold used by the upstream pair generator.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// MinHash signature of one document, produced by the upstream
/// fingerprinting stage and only read here.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Fingerprint {
    seed: u64,
    hashvalues: Vec<u64>,
}

impl Fingerprint {
    pub fn new(seed: u64, hashvalues: Vec<u64>) -> Self {
        Self { seed, hashvalues }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn len(&self) -> usize {
        self.hashvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashvalues.is_empty()
    }

    /// Estimated Jaccard similarity: the fraction of permutations on which
    /// both signatures agree.
    pub fn estimated_similarity(&self, other: &Fingerprint) -> Result<f64, CompareError> {
        if self.seed != other.seed {
            return Err(CompareError::SeedMismatch {
                left: self.seed,
                right: other.seed,
            });
        }
        if self.hashvalues.len() != other.hashvalues.len() {
            return Err(CompareError::LengthMismatch {
                left: self.hashvalues.len(),
                right: other.hashvalues.len(),
            });
        }
        if self.hashvalues.is_empty() {
            return Err(CompareError::EmptySignature);
        }

        let equal = self
            .hashvalues
            .iter()
            .zip(&other.hashvalues)
            .filter(|(a, b)| a == b)
            .count();
        Ok(equal as f64 / self.hashvalues.len() as f64)
    }
}

/// The comparison predicate evaluated by the worker pool.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityPredicate {
    threshold: f64,
}

impl SimilarityPredicate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Strictly greater than the threshold counts as a duplicate.
    pub fn is_duplicate(&self, a: &Fingerprint, b: &Fingerprint) -> Result<bool, CompareError> {
        Ok(a.estimated_similarity(b)? > self.threshold)
    }
}

impl Default for SimilarityPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
