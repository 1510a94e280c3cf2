use crate::core::{MerkleTree, ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp, deserialize, serialize};
use data_encoding::HEXLOWER;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    timestamp: i64,
    pre_block_hash: Vec<u8>,
    transactions: Vec<Transaction>,
    hash: Vec<u8>,
    nonce: u64,
}

impl Block {
    /// Builds and mines a block on top of `pre_block_hash`.
    pub fn new_block(pre_block_hash: Vec<u8>, transactions: &[Transaction]) -> Result<Block> {
        Self::new_block_with_timestamp(current_timestamp()?, pre_block_hash, transactions)
    }

    pub fn new_block_with_timestamp(
        timestamp: i64,
        pre_block_hash: Vec<u8>,
        transactions: &[Transaction],
    ) -> Result<Block> {
        if transactions.is_empty() {
            return Err(LedgerError::Validation(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        let mut block = Block {
            timestamp,
            pre_block_hash,
            transactions: transactions.to_vec(),
            hash: vec![],
            nonce: 0,
        };

        info!(
            "Starting proof-of-work for block with {} transactions",
            block.transactions.len()
        );
        let (nonce, hash) = ProofOfWork::new_proof_of_work(&block)?.run()?;
        block.nonce = nonce;
        block.hash = hash;
        info!(
            "Proof-of-work completed for block: {} (nonce {nonce})",
            HEXLOWER.encode(&block.hash)
        );

        Ok(block)
    }

    pub fn generate_genesis_block(transaction: &Transaction) -> Result<Block> {
        Block::new_block(vec![], std::slice::from_ref(transaction))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    /// Empty only for the genesis block.
    pub fn get_pre_block_hash(&self) -> &[u8] {
        self.pre_block_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.pre_block_hash.is_empty()
    }

    /// Merkle root over the block's transactions.
    pub fn hash_transactions(&self) -> Result<Vec<u8>> {
        let tree = MerkleTree::new(&self.transactions)?;
        Ok(tree.get_root_hash().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    fn coinbase(memo: &str) -> Transaction {
        Transaction::new_coinbase_tx(TEST_ADDRESS, memo).unwrap()
    }

    #[test]
    fn test_empty_block_is_rejected() {
        assert!(matches!(
            Block::new_block(vec![1; 32], &[]),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_genesis_block() {
        let tx = coinbase("genesis");
        let block = Block::generate_genesis_block(&tx).unwrap();
        assert!(block.is_genesis());
        assert_eq!(block.get_transactions().len(), 1);
        // a lone transaction's leaf digest is the root
        assert_eq!(block.hash_transactions().unwrap(), tx.leaf_hash().unwrap());
        assert!(ProofOfWork::validate(&block));
    }

    #[test]
    fn test_serialize_round_trip() {
        let genesis = Block::generate_genesis_block(&coinbase("a")).unwrap();
        assert_eq!(
            Block::deserialize(&genesis.serialize().unwrap()).unwrap(),
            genesis
        );

        let block = Block::new_block(
            genesis.get_hash().to_vec(),
            &[coinbase("b"), coinbase("c"), coinbase("d")],
        )
        .unwrap();
        let decoded = Block::deserialize(&block.serialize().unwrap()).unwrap();
        assert_eq!(decoded, block);
        assert!(ProofOfWork::validate(&decoded));
    }

    #[test]
    fn test_merkle_root_is_deterministic() {
        let block = Block::new_block(vec![7; 32], &[coinbase("x"), coinbase("y")]).unwrap();
        assert_eq!(
            block.hash_transactions().unwrap(),
            block.hash_transactions().unwrap()
        );
    }

    #[test]
    fn test_tampered_digest_fails_validation() {
        let block = Block::new_block(vec![], &[coinbase("tamper")]).unwrap();
        for bit in [0usize, 7, 100, 255] {
            let mut tampered = block.clone();
            tampered.hash[bit / 8] ^= 1 << (bit % 8);
            assert!(!ProofOfWork::validate(&tampered));
        }
    }

    #[test]
    fn test_tampered_nonce_fails_validation() {
        let block = Block::new_block(vec![], &[coinbase("nonce")]).unwrap();
        let mut tampered = block.clone();
        tampered.nonce ^= 1;
        assert!(!ProofOfWork::validate(&tampered));
    }

    #[test]
    fn test_tampered_transactions_fail_validation() {
        let block = Block::new_block(vec![], &[coinbase("one")]).unwrap();
        let mut tampered = block.clone();
        tampered.transactions = vec![coinbase("two")];
        assert!(!ProofOfWork::validate(&tampered));
    }
}
