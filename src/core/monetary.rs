//! Ledger-wide constants
//!
//! Value is counted in whole coins. There is no fee market, so every coin in
//! circulation was minted by a coinbase transaction.

/// Value minted by every coinbase transaction, the genesis one included.
pub const SUBSIDY: u64 = 10;

/// Coinbase memo that is replaced by random bytes so repeated rewards to the
/// same address still get distinct transaction ids.
pub const MINING_REWARD_MEMO: &str = "Mining reward";

/// Memo carried by the genesis coinbase.
pub const GENESIS_MEMO: &str = "init base";

/// Number of random bytes that replace [`MINING_REWARD_MEMO`].
pub const REWARD_MEMO_RANDOM_LEN: usize = 10;

/// Leading zero bits a block digest needs. Fixed for the whole process.
pub const TARGET_BITS: u32 = 16;
