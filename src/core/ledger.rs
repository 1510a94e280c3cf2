// The ledger: an append-only chain of mined blocks held in a key-value store.
// Blocks are keyed by their digest and a reserved key names the tip. Appending a
// block writes the block and moves the tip in one write scope.

use crate::core::{
    Block, PriorTransactions, ProofOfWork, TXOutput, Transaction, GENESIS_MEMO, MINING_REWARD_MEMO,
    SUBSIDY,
};
use crate::error::{LedgerError, Result};
use crate::storage::{Bucket, Storage};
use crate::wallet::{validate_address, KeyStore};
use data_encoding::HEXLOWER;
use log::{info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

const TIP_BLOCK_HASH_KEY: &[u8] = b"tip_block_hash";

/// An unspent output together with where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub txid: Vec<u8>,
    pub index: usize,
    pub output: TXOutput,
}

/// A block as listed for display, with its proof-of-work checked.
#[derive(Debug, Clone)]
pub struct BlockSummary {
    pub block: Block,
    pub pow_valid: bool,
}

pub struct Ledger<S: Storage> {
    storage: S,
    tip_hash: Vec<u8>,
}

impl<S: Storage> Ledger<S> {
    /// Opens the ledger held in `storage`. Never creates one.
    pub fn open(storage: S) -> Result<Ledger<S>> {
        let tip_hash = storage
            .read_scope(|bucket| bucket.get(TIP_BLOCK_HASH_KEY))?
            .ok_or_else(|| {
                LedgerError::DoesNotExist(
                    "No existing blockchain found. Create one first.".to_string(),
                )
            })?;

        Ok(Ledger { storage, tip_hash })
    }

    /// Creates a ledger whose genesis block pays the subsidy to `genesis_address`.
    pub fn create(storage: S, genesis_address: &str) -> Result<Ledger<S>> {
        if storage
            .read_scope(|bucket| bucket.get(TIP_BLOCK_HASH_KEY))?
            .is_some()
        {
            return Err(LedgerError::AlreadyExists(
                "Blockchain already exists.".to_string(),
            ));
        }
        if !validate_address(genesis_address) {
            return Err(LedgerError::InvalidAddress(genesis_address.to_string()));
        }

        info!("Creating genesis block for address: {genesis_address}");
        let coinbase_tx = Transaction::new_coinbase_tx(genesis_address, GENESIS_MEMO)?;
        let genesis = Block::generate_genesis_block(&coinbase_tx)?;
        let block_data = genesis.serialize()?;

        storage.write_scope(|bucket| {
            if bucket.get(TIP_BLOCK_HASH_KEY)?.is_some() {
                return Err(LedgerError::AlreadyExists(
                    "Blockchain already exists.".to_string(),
                ));
            }
            Self::put_block(bucket, genesis.get_hash(), &block_data)
        })?;

        Ok(Ledger {
            storage,
            tip_hash: genesis.get_hash().to_vec(),
        })
    }

    fn put_block(bucket: &dyn Bucket, block_hash: &[u8], block_data: &[u8]) -> Result<()> {
        bucket.put(block_hash, block_data)?;
        bucket.put(TIP_BLOCK_HASH_KEY, block_hash)
    }

    /// Digest of the most recently appended block.
    pub fn get_tip_hash(&self) -> &[u8] {
        self.tip_hash.as_slice()
    }

    /// Mines `transactions` into a new block on top of the tip and appends it.
    ///
    /// Every transaction is checked first: signatures must verify, and no output
    /// may be spent twice, neither within the block nor against the chain.
    pub fn append_block(&mut self, transactions: &[Transaction]) -> Result<Block> {
        if transactions.is_empty() {
            return Err(LedgerError::Validation(
                "Block must contain at least one transaction".to_string(),
            ));
        }
        self.validate_transactions(transactions)?;

        let tip_hash = self
            .storage
            .read_scope(|bucket| bucket.get(TIP_BLOCK_HASH_KEY))?
            .ok_or_else(|| LedgerError::Storage("Tip hash not found".to_string()))?;

        info!(
            "Mining block with {} transactions on top of {}",
            transactions.len(),
            HEXLOWER.encode(&tip_hash)
        );
        let block = Block::new_block(tip_hash.clone(), transactions)?;
        if !ProofOfWork::validate(&block) {
            return Err(LedgerError::Validation(
                "Mined block failed proof-of-work validation".to_string(),
            ));
        }
        let block_data = block.serialize()?;

        self.storage.write_scope(|bucket| {
            if bucket.get(TIP_BLOCK_HASH_KEY)?.as_deref() != Some(tip_hash.as_slice()) {
                return Err(LedgerError::Validation(
                    "Chain tip moved while the block was being mined".to_string(),
                ));
            }
            Self::put_block(bucket, block.get_hash(), &block_data)
        })?;
        self.tip_hash = block.get_hash().to_vec();

        info!(
            "Successfully mined block: {}",
            HEXLOWER.encode(block.get_hash())
        );
        Ok(block)
    }

    fn validate_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        let spent_on_chain = self.find_spent_outputs()?;
        let mut spent_in_block: HashSet<(Vec<u8>, i64)> = HashSet::new();
        let mut coinbase_count = 0usize;

        for (tx_index, transaction) in transactions.iter().enumerate() {
            if transaction.is_coinbase() {
                coinbase_count += 1;
                if coinbase_count > 1 {
                    return Err(LedgerError::Validation(
                        "Block may contain at most one coinbase transaction".to_string(),
                    ));
                }
                if !Self::is_valid_coinbase(transaction) {
                    return Err(LedgerError::Validation(format!(
                        "Coinbase at index {tx_index} must pay exactly {SUBSIDY}"
                    )));
                }
                continue;
            }

            let prev_txs = self.find_prior_transactions(transaction)?;
            if !transaction.verify(&prev_txs)? {
                let txid = HEXLOWER.encode(transaction.get_id());
                warn!("Rejecting transaction {txid}");
                return Err(LedgerError::Validation(format!(
                    "Invalid transaction at index {tx_index}"
                )));
            }

            let input_value = transaction.get_input_value(&prev_txs)?;
            let output_value = transaction.get_output_value()?;
            if output_value > input_value {
                return Err(LedgerError::Validation(format!(
                    "Transaction {tx_index} outputs {output_value} from inputs of {input_value}"
                )));
            }

            for input in transaction.get_vin() {
                let output_reference = (input.get_txid().to_vec(), input.get_vout());
                if spent_on_chain.contains(&output_reference) {
                    return Err(LedgerError::Validation(format!(
                        "Input already spent: {}:{}",
                        HEXLOWER.encode(input.get_txid()),
                        input.get_vout()
                    )));
                }
                if !spent_in_block.insert(output_reference) {
                    return Err(LedgerError::Validation(format!(
                        "Output {}:{} spent twice in one block",
                        HEXLOWER.encode(input.get_txid()),
                        input.get_vout()
                    )));
                }
            }
        }
        Ok(())
    }

    // A coinbase mints exactly one output of the fixed subsidy
    fn is_valid_coinbase(transaction: &Transaction) -> bool {
        match transaction.get_vout() {
            [output] => output.get_value() == SUBSIDY,
            _ => false,
        }
    }

    /// Walks the chain from the tip back to genesis.
    pub fn iterator(&self) -> LedgerIterator<'_, S> {
        LedgerIterator::new(self.tip_hash.clone(), &self.storage)
    }

    pub fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        read_block(&self.storage, block_hash)
    }

    // Each transaction holding outputs locked to `pub_key_hash` that no
    // later input consumes, with the indices of those outputs. Blocks are
    // visited tip first, so spends are recorded before the outputs they consume.
    fn scan_unspent(&self, pub_key_hash: &[u8]) -> Result<Vec<(Transaction, Vec<usize>)>> {
        let mut unspent = vec![];
        let mut spent_txos: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();

        for block in self.iterator() {
            let block = block?;
            for tx in block.get_transactions() {
                let spent = spent_txos.get(tx.get_id());
                let indices: Vec<usize> = tx
                    .get_vout()
                    .iter()
                    .enumerate()
                    .filter(|(idx, out)| {
                        let consumed = spent.is_some_and(|outs| outs.contains(idx));
                        !consumed && out.is_locked_with_key(pub_key_hash)
                    })
                    .map(|(idx, _)| idx)
                    .collect();
                if !indices.is_empty() {
                    unspent.push((tx.clone(), indices));
                }

                if tx.is_coinbase() {
                    continue;
                }
                for txin in tx.get_vin() {
                    if let Ok(vout) = usize::try_from(txin.get_vout()) {
                        spent_txos
                            .entry(txin.get_txid().to_vec())
                            .or_default()
                            .push(vout);
                    }
                }
            }
        }
        Ok(unspent)
    }

    /// Transactions with at least one unspent output locked to `pub_key_hash`.
    pub fn find_unspent_transactions(&self, pub_key_hash: &[u8]) -> Result<Vec<Transaction>> {
        Ok(self
            .scan_unspent(pub_key_hash)?
            .into_iter()
            .map(|(tx, _)| tx)
            .collect())
    }

    pub fn find_utxo(&self, pub_key_hash: &[u8]) -> Result<Vec<UnspentOutput>> {
        let mut utxos = vec![];
        for (tx, indices) in self.scan_unspent(pub_key_hash)? {
            for index in indices {
                utxos.push(UnspentOutput {
                    txid: tx.get_id().to_vec(),
                    index,
                    output: tx.get_vout()[index].clone(),
                });
            }
        }
        Ok(utxos)
    }

    /// Accumulates unspent outputs locked to `pub_key_hash` until `amount` is
    /// covered or none are left. The caller checks whether the total suffices.
    pub fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> Result<(u64, BTreeMap<Vec<u8>, Vec<usize>>)> {
        let mut unspent_outputs: BTreeMap<Vec<u8>, Vec<usize>> = BTreeMap::new();
        let mut accumulated = 0u64;

        for utxo in self.find_utxo(pub_key_hash)? {
            if accumulated >= amount {
                break;
            }
            accumulated = accumulated
                .checked_add(utxo.output.get_value())
                .ok_or_else(|| LedgerError::Validation("Balance overflow".to_string()))?;
            unspent_outputs
                .entry(utxo.txid)
                .or_default()
                .push(utxo.index);
        }
        Ok((accumulated, unspent_outputs))
    }

    pub fn get_balance(&self, pub_key_hash: &[u8]) -> Result<u64> {
        self.find_utxo(pub_key_hash)?
            .iter()
            .try_fold(0u64, |balance, utxo| {
                balance
                    .checked_add(utxo.output.get_value())
                    .ok_or_else(|| LedgerError::Validation("Balance overflow".to_string()))
            })
    }

    // Every (txid, vout) pair consumed by some input on the chain
    fn find_spent_outputs(&self) -> Result<HashSet<(Vec<u8>, i64)>> {
        let mut spent = HashSet::new();
        for block in self.iterator() {
            for tx in block?.get_transactions() {
                if tx.is_coinbase() {
                    continue;
                }
                for txin in tx.get_vin() {
                    spent.insert((txin.get_txid().to_vec(), txin.get_vout()));
                }
            }
        }
        Ok(spent)
    }

    pub fn find_transaction(&self, txid: &[u8]) -> Result<Transaction> {
        for block in self.iterator() {
            if let Some(transaction) = block?
                .get_transactions()
                .iter()
                .find(|transaction| transaction.get_id() == txid)
            {
                return Ok(transaction.clone());
            }
        }
        Err(LedgerError::NotFound(format!(
            "Transaction {} not found",
            HEXLOWER.encode(txid)
        )))
    }

    fn find_prior_transactions(&self, tx: &Transaction) -> Result<PriorTransactions> {
        let mut prev_txs = PriorTransactions::new();
        if tx.is_coinbase() {
            return Ok(prev_txs);
        }
        for vin in tx.get_vin() {
            if !prev_txs.contains_key(vin.get_txid()) {
                let prev_tx = self.find_transaction(vin.get_txid())?;
                prev_txs.insert(prev_tx.get_id().to_vec(), prev_tx);
            }
        }
        Ok(prev_txs)
    }

    pub fn sign_transaction(&self, tx: &mut Transaction, pkcs8: &[u8]) -> Result<()> {
        let prev_txs = self.find_prior_transactions(tx)?;
        tx.sign(pkcs8, &prev_txs)
    }

    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        let prev_txs = self.find_prior_transactions(tx)?;
        tx.verify(&prev_txs)
    }

    /// Pays `amount` from `from` to `to` and mines it into a block together with
    /// a mining reward for `from`.
    pub fn send<K: KeyStore>(
        &mut self,
        from: &str,
        to: &str,
        amount: u64,
        keys: &K,
    ) -> Result<Block> {
        let tx = Transaction::new_utxo_transaction(from, to, amount, keys, self)?;
        let reward_tx = Transaction::new_coinbase_tx(from, MINING_REWARD_MEMO)?;
        self.append_block(&[reward_tx, tx])
    }

    /// All blocks, tip first, each with its proof-of-work checked.
    pub fn list_blocks(&self) -> Result<Vec<BlockSummary>> {
        self.iterator()
            .map(|block| {
                block.map(|block| BlockSummary {
                    pow_valid: ProofOfWork::validate(&block),
                    block,
                })
            })
            .collect()
    }

    /// Checks linkage, proof-of-work and transaction signatures of every block.
    pub fn verify_chain(&self) -> Result<bool> {
        let mut expected_hash = self.tip_hash.clone();
        let mut saw_genesis = false;

        for block in self.iterator() {
            let block = block?;
            if block.get_hash() != expected_hash.as_slice() {
                warn!("Block {} is not linked", HEXLOWER.encode(block.get_hash()));
                return Ok(false);
            }
            if !ProofOfWork::validate(&block) {
                warn!(
                    "Block {} fails proof-of-work",
                    HEXLOWER.encode(block.get_hash())
                );
                return Ok(false);
            }
            for tx in block.get_transactions() {
                if !self.verify_transaction(tx)? {
                    return Ok(false);
                }
            }
            saw_genesis = block.is_genesis();
            expected_hash = block.get_pre_block_hash().to_vec();
        }
        Ok(saw_genesis)
    }
}

fn read_block<S: Storage>(storage: &S, block_hash: &[u8]) -> Result<Option<Block>> {
    storage
        .read_scope(|bucket| bucket.get(block_hash))?
        .map(|bytes| Block::deserialize(&bytes))
        .transpose()
}

/// Tip-to-genesis walk. Each step reads the block at the cursor and moves the
/// cursor to its previous digest; the walk ends after the genesis block.
pub struct LedgerIterator<'a, S: Storage> {
    storage: &'a S,
    current_hash: Vec<u8>,
}

impl<'a, S: Storage> LedgerIterator<'a, S> {
    fn new(tip_hash: Vec<u8>, storage: &'a S) -> LedgerIterator<'a, S> {
        LedgerIterator {
            storage,
            current_hash: tip_hash,
        }
    }
}

impl<S: Storage> Iterator for LedgerIterator<'_, S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_hash.is_empty() {
            return None;
        }
        let current_hash = std::mem::take(&mut self.current_hash);
        match read_block(self.storage, &current_hash) {
            Ok(Some(block)) => {
                self.current_hash = block.get_pre_block_hash().to_vec();
                Some(Ok(block))
            }
            Ok(None) => Some(Err(LedgerError::Storage(format!(
                "Block {} is missing from storage",
                HEXLOWER.encode(&current_hash)
            )))),
            Err(e) => Some(Err(e)),
        }
    }
}
