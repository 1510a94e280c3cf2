use crate::core::{Block, TARGET_BITS};
use crate::error::{LedgerError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use log::debug;
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

const MAX_NONCE: u64 = u64::MAX;

/// Nonce search and check for one block against the fixed target.
pub struct ProofOfWork<'a> {
    block: &'a Block,
    merkle_root: Vec<u8>,
    target: BigInt,
}

impl<'a> ProofOfWork<'a> {
    pub fn new_proof_of_work(block: &'a Block) -> Result<ProofOfWork<'a>> {
        let merkle_root = block.hash_transactions()?;
        Ok(ProofOfWork {
            block,
            merkle_root,
            target: Self::target(),
        })
    }

    /// `1 << (256 - TARGET_BITS)`; a digest must be strictly below it.
    pub fn target() -> BigInt {
        let mut target = BigInt::from(1);
        target.shl_assign(256 - TARGET_BITS);
        target
    }

    /// Recomputes the digest from the block's stored nonce. The block is valid
    /// when that digest matches the stored one and is below the target.
    pub fn validate(block: &Block) -> bool {
        let pow = match ProofOfWork::new_proof_of_work(block) {
            Ok(pow) => pow,
            Err(e) => {
                debug!("Cannot validate block: {e}");
                return false;
            }
        };
        let hash = sha256_digest(pow.prepare_data(block.get_nonce()).as_slice());
        hash.as_slice() == block.get_hash() && pow.meets_target(&hash)
    }

    fn prepare_data(&self, nonce: u64) -> Vec<u8> {
        let pre_block_hash = self.block.get_pre_block_hash();
        let timestamp = self.block.get_timestamp();
        let mut data_bytes = Vec::with_capacity(pre_block_hash.len() + self.merkle_root.len() + 24);
        data_bytes.extend(pre_block_hash);
        data_bytes.extend(&self.merkle_root);
        data_bytes.extend(timestamp.to_le_bytes());
        data_bytes.extend(u64::from(TARGET_BITS).to_le_bytes());
        data_bytes.extend(nonce.to_le_bytes());
        data_bytes
    }

    fn meets_target(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash) < self.target
    }

    /// Searches nonces upward from zero for the first digest below the target.
    pub fn run(&self) -> Result<(u64, Vec<u8>)> {
        for nonce in 0..=MAX_NONCE {
            let hash = sha256_digest(self.prepare_data(nonce).as_slice());
            if self.meets_target(&hash) {
                debug!("Found nonce {nonce}: {}", HEXLOWER.encode(&hash));
                return Ok((nonce, hash));
            }
        }
        Err(LedgerError::ProofOfWorkExhausted)
    }
}
