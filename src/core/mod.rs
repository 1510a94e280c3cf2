//! Core ledger functionality
//!
//! Blocks, transactions, the Merkle root, proof-of-work, and the ledger engine
//! that appends mined blocks and answers UTXO queries.

pub mod block;
pub mod ledger;
pub mod merkle;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use ledger::{BlockSummary, Ledger, LedgerIterator, UnspentOutput};
pub use merkle::MerkleTree;
pub use monetary::{GENESIS_MEMO, MINING_REWARD_MEMO, REWARD_MEMO_RANDOM_LEN, SUBSIDY, TARGET_BITS};
pub use proof_of_work::ProofOfWork;
pub use transaction::{PriorTransactions, TXInput, TXOutput, Transaction, COINBASE_OUTPUT_INDEX};
