use crate::core::Transaction;
use crate::error::{LedgerError, Result};
use crate::utils::sha256_digest;

/// Merkle tree over transaction digests, stored as an arena of levels.
///
/// `levels[0]` holds the leaves and the last level holds the root. A level with
/// an odd number of nodes is paired as if its last node were duplicated, which
/// keeps roots compatible with the usual Bitcoin-style construction. A single
/// leaf is its own root.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Vec<u8>>>,
}

impl MerkleTree {
    /// Builds the tree over the leaf digest of every transaction.
    pub fn new(transactions: &[Transaction]) -> Result<Self> {
        let leaves = transactions
            .iter()
            .map(Transaction::leaf_hash)
            .collect::<Result<Vec<_>>>()?;
        Self::from_hashes(&leaves)
    }

    pub fn from_hashes(hashes: &[Vec<u8>]) -> Result<Self> {
        if hashes.is_empty() {
            return Err(LedgerError::Validation(
                "Cannot create Merkle tree from empty hash list".to_string(),
            ));
        }

        let mut levels = vec![hashes.to_vec()];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next_level = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => Self::hash_pair(left, right),
                    [single] => Self::hash_pair(single, single),
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            levels.push(next_level);
        }

        Ok(MerkleTree { levels })
    }

    pub fn get_root_hash(&self) -> &[u8] {
        // from_hashes guarantees a non-empty top level
        self.levels
            .last()
            .and_then(|level| level.first())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Root digest for a list of leaf digests.
    pub fn calculate_merkle_root(hashes: &[Vec<u8>]) -> Result<Vec<u8>> {
        Ok(Self::from_hashes(hashes)?.get_root_hash().to_vec())
    }

    fn hash_pair(left: &[u8], right: &[u8]) -> Vec<u8> {
        let mut combined = Vec::with_capacity(left.len() + right.len());
        combined.extend_from_slice(left);
        combined.extend_from_slice(right);
        sha256_digest(&combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> Vec<u8> {
        sha256_digest(&[n])
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            MerkleTree::calculate_merkle_root(&[]),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_single_leaf_is_root() {
        let root = MerkleTree::calculate_merkle_root(&[leaf(1)]).unwrap();
        assert_eq!(root, leaf(1));
    }

    #[test]
    fn test_two_leaves() {
        let root = MerkleTree::calculate_merkle_root(&[leaf(1), leaf(2)]).unwrap();
        assert_eq!(root, MerkleTree::hash_pair(&leaf(1), &leaf(2)));
    }

    #[test]
    fn test_odd_level_duplicates_last() {
        let three = MerkleTree::calculate_merkle_root(&[leaf(1), leaf(2), leaf(3)]).unwrap();
        let four =
            MerkleTree::calculate_merkle_root(&[leaf(1), leaf(2), leaf(3), leaf(3)]).unwrap();
        assert_eq!(three, four);

        let left = MerkleTree::hash_pair(&leaf(1), &leaf(2));
        let right = MerkleTree::hash_pair(&leaf(3), &leaf(3));
        assert_eq!(three, MerkleTree::hash_pair(&left, &right));
    }

    #[test]
    fn test_five_leaves_shape() {
        let hashes: Vec<Vec<u8>> = (1..=5).map(leaf).collect();
        let tree = MerkleTree::from_hashes(&hashes).unwrap();
        assert_eq!(tree.leaf_count(), 5);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.get_root_hash().len(), 32);
    }

    #[test]
    fn test_order_matters() {
        let a = MerkleTree::calculate_merkle_root(&[leaf(1), leaf(2)]).unwrap();
        let b = MerkleTree::calculate_merkle_root(&[leaf(2), leaf(1)]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_deterministic() {
        let hashes: Vec<Vec<u8>> = (0..7).map(leaf).collect();
        assert_eq!(
            MerkleTree::calculate_merkle_root(&hashes).unwrap(),
            MerkleTree::calculate_merkle_root(&hashes).unwrap()
        );
    }
}
