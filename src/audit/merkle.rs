//! Merkle tree over routing decisions for batch commitment.
//! Odd levels duplicate their last node. An empty tree's root is the
//! SHA-256 of empty input.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

pub fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

/// Inclusion proof for one leaf. Hashes are hex encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub target_hash: String,
    pub proof_hashes: Vec<String>,
    pub proof_positions: Vec<bool>, // true = sibling on the right
}

impl MerkleProof {
    /// Fold the proof back up and compare against `root_hash` (hex)
    pub fn verify(&self, root_hash: &str) -> bool {
        if self.proof_hashes.len() != self.proof_positions.len() {
            return false;
        }
        let Ok(mut current) = hex::decode(&self.target_hash) else {
            return false;
        };

        for (sibling, sibling_on_right) in self.proof_hashes.iter().zip(&self.proof_positions) {
            let Ok(sibling) = hex::decode(sibling) else {
                return false;
            };
            let combined = if *sibling_on_right {
                [current, sibling].concat()
            } else {
                [sibling, current].concat()
            };
            current = sha256(&combined);
        }

        hex::encode(current) == root_hash
    }
}

#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    /// levels[0] holds the leaves, the last level holds the root
    levels: Vec<Vec<Vec<u8>>>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from items, hashing each item's JSON encoding as a leaf
    pub fn from_items<T: Serialize>(items: &[T]) -> Result<Self> {
        let leaves = items
            .iter()
            .map(|item| Ok(sha256(&serde_json::to_vec(item)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_leaves(leaves))
    }

    pub fn from_leaves(leaves: Vec<Vec<u8>>) -> Self {
        if leaves.is_empty() {
            return Self::default();
        }

        let mut levels = vec![leaves];
        while let Some(nodes) = levels.last().filter(|nodes| nodes.len() > 1) {
            let next_level: Vec<Vec<u8>> = nodes
                .chunks(2)
                .map(|chunk| {
                    let left = &chunk[0];
                    let right = chunk.get(1).unwrap_or(left);
                    sha256(&[left.as_slice(), right.as_slice()].concat())
                })
                .collect();
            levels.push(next_level);
        }

        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root_hash(&self) -> Vec<u8> {
        self.levels
            .last()
            .and_then(|level| level.first())
            .cloned()
            .unwrap_or_else(|| sha256(b""))
    }

    pub fn root_hex(&self) -> String {
        hex::encode(self.root_hash())
    }

    /// Generate proof for the leaf at `index`
    pub fn generate_proof(&self, index: usize) -> Result<MerkleProof> {
        if index >= self.len() {
            return Err(EngineError::validation(format!(
                "leaf index {} out of bounds for {} leaves",
                index,
                self.len()
            )));
        }

        let mut proof_hashes = Vec::new();
        let mut proof_positions = Vec::new();
        let mut current_index = index;

        // Every level except the root contributes one sibling
        for level in &self.levels[..self.levels.len() - 1] {
            let is_left = current_index % 2 == 0;
            let sibling_index = if is_left {
                current_index + 1
            } else {
                current_index - 1
            };
            let sibling = level.get(sibling_index).unwrap_or(&level[current_index]);
            proof_hashes.push(hex::encode(sibling));
            proof_positions.push(is_left);
            current_index /= 2;
        }

        Ok(MerkleProof {
            leaf_index: index,
            target_hash: hex::encode(&self.levels[0][index]),
            proof_hashes,
            proof_positions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| sha256(format!("leaf-{}", i).as_bytes())).collect()
    }

    #[test]
    fn test_empty_root_is_hash_of_nothing() {
        let tree = MerkleTree::from_leaves(Vec::new());
        assert!(tree.is_empty());
        assert_eq!(
            tree.root_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(tree.generate_proof(0).is_err());
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let leaf = sha256(b"only");
        let tree = MerkleTree::from_leaves(vec![leaf.clone()]);
        assert_eq!(tree.root_hash(), leaf);

        let proof = tree.generate_proof(0).unwrap();
        assert!(proof.proof_hashes.is_empty());
        assert!(proof.verify(&tree.root_hex()));
    }

    #[test]
    fn test_proofs_verify_for_every_leaf() {
        for n in [2, 3, 5, 8] {
            let tree = MerkleTree::from_leaves(leaves(n));
            let root = tree.root_hex();
            for i in 0..n {
                let proof = tree.generate_proof(i).unwrap();
                assert!(proof.verify(&root), "leaf {} of {}", i, n);
            }
        }
    }

    #[test]
    fn test_tampered_proof_fails() {
        let tree = MerkleTree::from_leaves(leaves(4));
        let mut proof = tree.generate_proof(2).unwrap();
        proof.target_hash = hex::encode(sha256(b"forged"));
        assert!(!proof.verify(&tree.root_hex()));
    }

    #[test]
    fn test_order_changes_root() {
        let mut forward = leaves(3);
        let a = MerkleTree::from_leaves(forward.clone()).root_hex();
        forward.reverse();
        let b = MerkleTree::from_leaves(forward).root_hex();
        assert_ne!(a, b);
    }
}
