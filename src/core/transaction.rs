// Value transfer under the UTXO model: every transaction consumes earlier
// outputs through its inputs and creates new outputs locked to address hashes.

use crate::core::{Ledger, MINING_REWARD_MEMO, REWARD_MEMO_RANDOM_LEN, SUBSIDY};
use crate::error::{LedgerError, Result};
use crate::storage::Storage;
use crate::utils::{
    deserialize, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, serialize,
    sha256_digest,
};
use crate::wallet::{address_to_pub_key_hash, hash_pub_key, validate_address, KeyStore};
use data_encoding::HEXLOWER;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transactions referenced by inputs, keyed by transaction id.
pub type PriorTransactions = HashMap<Vec<u8>, Transaction>;

/// Output index carried by the single input of a coinbase transaction.
pub const COINBASE_OUTPUT_INDEX: i64 = -1;

// A reference to output `vout` of transaction `txid`, plus the proof that unlocks it
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TXInput {
    txid: Vec<u8>,
    vout: i64,
    signature: Vec<u8>, // r || s, empty until signed
    pub_key: Vec<u8>,   // x || y of the spender; arbitrary memo bytes in a coinbase
}

impl TXInput {
    /// An unsigned input spending output `vout` of `txid`.
    pub fn new(txid: &[u8], vout: i64, pub_key: &[u8]) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            signature: vec![],
            pub_key: pub_key.to_vec(),
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> i64 {
        self.vout
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn get_pub_key(&self) -> &[u8] {
        self.pub_key.as_slice()
    }

    /// Whether this input's public key hashes to `pub_key_hash`.
    pub fn unlocks(&self, pub_key_hash: &[u8]) -> bool {
        hash_pub_key(self.pub_key.as_slice()) == pub_key_hash
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    value: u64,
    pub_key_hash: Vec<u8>, // RIPEMD-160(SHA-256(recipient public key))
}

impl TXOutput {
    pub fn new(value: u64, address: &str) -> Result<TXOutput> {
        if value == 0 {
            return Err(LedgerError::Validation(
                "Transaction value must be positive".to_string(),
            ));
        }

        Ok(TXOutput {
            value,
            pub_key_hash: address_to_pub_key_hash(address)?,
        })
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_pub_key_hash(&self) -> &[u8] {
        self.pub_key_hash.as_slice()
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash.as_slice() == pub_key_hash
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Mints [`SUBSIDY`] to `to`.
    ///
    /// The input's public key field carries `memo`. The mining reward memo is
    /// swapped for random bytes so two rewards to one address never share an id.
    pub fn new_coinbase_tx(to: &str, memo: &str) -> Result<Transaction> {
        let memo = if memo == MINING_REWARD_MEMO {
            let random: [u8; REWARD_MEMO_RANDOM_LEN] = rand::random();
            HEXLOWER.encode(&random)
        } else {
            memo.to_string()
        };

        let txin = TXInput::new(&[], COINBASE_OUTPUT_INDEX, memo.as_bytes());
        let txout = TXOutput::new(SUBSIDY, to)?;
        Transaction::new_unsigned(vec![txin], vec![txout])
    }

    /// Assembles a transaction and fixes its id. Inputs are left unsigned.
    pub fn new_unsigned(vin: Vec<TXInput>, vout: Vec<TXOutput>) -> Result<Transaction> {
        let mut tx = Transaction {
            id: vec![],
            vin,
            vout,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Builds and signs a payment of `amount` from `from` to `to`, returning any
    /// surplus of the selected outputs to `from` as change.
    pub fn new_utxo_transaction<S: Storage, K: KeyStore>(
        from: &str,
        to: &str,
        amount: u64,
        keys: &K,
        ledger: &Ledger<S>,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::Validation(
                "Amount must be positive".to_string(),
            ));
        }
        if !validate_address(to) {
            return Err(LedgerError::InvalidAddress(format!(
                "Invalid to address: {to}"
            )));
        }
        let from_hash = address_to_pub_key_hash(from)?;

        let wallet = keys.resolve(from)?;
        if hash_pub_key(wallet.get_public_key()) != from_hash {
            return Err(LedgerError::Validation(format!(
                "Key resolved for {from} does not control that address"
            )));
        }

        let (accumulated, valid_outputs) = ledger.find_spendable_outputs(&from_hash, amount)?;
        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let mut inputs = vec![];
        for (txid, outs) in valid_outputs {
            for out in outs {
                let vout = i64::try_from(out).map_err(|_| {
                    LedgerError::Validation(format!("Output index {out} out of range"))
                })?;
                inputs.push(TXInput::new(&txid, vout, wallet.get_public_key()));
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to)?];
        if accumulated > amount {
            outputs.push(TXOutput::new(accumulated - amount, from)?);
        }

        let mut tx = Transaction::new_unsigned(inputs, outputs)?;
        ledger.sign_transaction(&mut tx, wallet.get_pkcs8())?;
        Ok(tx)
    }

    // Inputs reduced to their (txid, vout) reference; id and outputs kept
    fn abbreviated_copy(&self) -> Transaction {
        let inputs = self
            .vin
            .iter()
            .map(|input| TXInput::new(input.get_txid(), input.get_vout(), &[]))
            .collect();
        Transaction {
            id: self.id.clone(),
            vin: inputs,
            vout: self.vout.clone(),
        }
    }

    fn ensure_prior_transactions(&self, prev_txs: &PriorTransactions) -> Result<()> {
        for vin in &self.vin {
            if !prev_txs.contains_key(vin.get_txid()) {
                return Err(LedgerError::NotFound(format!(
                    "Previous transaction {} not supplied",
                    HEXLOWER.encode(vin.get_txid())
                )));
            }
        }
        Ok(())
    }

    /// Signs every input with `pkcs8`.
    ///
    /// Each input is signed in turn on the abbreviated copy, with the lock of the
    /// output it spends placed in that input's key field for the duration. The
    /// signed message is the abbreviated copy's id, which is this transaction's id.
    pub fn sign(&mut self, pkcs8: &[u8], prev_txs: &PriorTransactions) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }
        self.ensure_prior_transactions(prev_txs)?;

        let mut tx_copy = self.abbreviated_copy();
        for (idx, vin) in self.vin.iter_mut().enumerate() {
            let prev_out = referenced_output(prev_txs, vin)?;

            tx_copy.vin[idx].signature = vec![];
            tx_copy.vin[idx].pub_key = prev_out.pub_key_hash.clone();
            vin.signature = ecdsa_p256_sha256_sign_digest(pkcs8, tx_copy.get_id())?;
            tx_copy.vin[idx].pub_key = vec![];
        }
        Ok(())
    }

    /// Checks every input signature. Missing prior transactions are an error;
    /// anything else that does not check out yields `Ok(false)`.
    pub fn verify(&self, prev_txs: &PriorTransactions) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }
        self.ensure_prior_transactions(prev_txs)?;

        if self.hash()? != self.id {
            warn!(
                "Transaction {} does not match its contents",
                HEXLOWER.encode(&self.id)
            );
            return Ok(false);
        }

        let mut tx_copy = self.abbreviated_copy();
        for (idx, vin) in self.vin.iter().enumerate() {
            let prev_out = match referenced_output(prev_txs, vin) {
                Ok(out) => out,
                Err(e) => {
                    warn!("{e}");
                    return Ok(false);
                }
            };
            if !vin.unlocks(prev_out.get_pub_key_hash()) {
                debug!("Input {idx} is not owned by its public key");
                return Ok(false);
            }

            tx_copy.vin[idx].signature = vec![];
            tx_copy.vin[idx].pub_key = prev_out.pub_key_hash.clone();
            let valid = ecdsa_p256_sha256_sign_verify(
                vin.get_pub_key(),
                vin.get_signature(),
                tx_copy.get_id(),
            );
            tx_copy.vin[idx].pub_key = vec![];

            if !valid {
                debug!("Signature check failed for input {idx}");
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1
            && self.vin[0].txid.is_empty()
            && self.vin[0].vout == COINBASE_OUTPUT_INDEX
    }

    /// The id: SHA-256 of the encoding with the id and all signatures emptied.
    pub fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self
                .vin
                .iter()
                .map(|input| TXInput {
                    signature: vec![],
                    ..input.clone()
                })
                .collect(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(&tx_copy.serialize()?))
    }

    /// Merkle leaf digest: SHA-256 of the full encoding, signatures included.
    pub fn leaf_hash(&self) -> Result<Vec<u8>> {
        Ok(sha256_digest(&self.serialize()?))
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn get_output_value(&self) -> Result<u64> {
        self.vout.iter().try_fold(0u64, |total, vout| {
            total
                .checked_add(vout.get_value())
                .ok_or_else(|| LedgerError::Validation("Output value overflow".to_string()))
        })
    }

    /// Total value of the outputs this transaction's inputs consume.
    pub fn get_input_value(&self, prev_txs: &PriorTransactions) -> Result<u64> {
        if self.is_coinbase() {
            return Ok(0);
        }
        self.vin.iter().try_fold(0u64, |total, vin| {
            total
                .checked_add(referenced_output(prev_txs, vin)?.get_value())
                .ok_or_else(|| LedgerError::Validation("Input value overflow".to_string()))
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }
}

fn referenced_output<'a>(prev_txs: &'a PriorTransactions, vin: &TXInput) -> Result<&'a TXOutput> {
    let prev_tx = prev_txs.get(vin.get_txid()).ok_or_else(|| {
        LedgerError::NotFound(format!(
            "Previous transaction {} not supplied",
            HEXLOWER.encode(vin.get_txid())
        ))
    })?;
    usize::try_from(vin.get_vout())
        .ok()
        .and_then(|idx| prev_tx.vout.get(idx))
        .ok_or_else(|| {
            LedgerError::Validation(format!(
                "Output {} does not exist in transaction {}",
                vin.get_vout(),
                HEXLOWER.encode(vin.get_txid())
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    struct Spend {
        owner: Wallet,
        funding: Transaction,
        tx: Transaction,
        prev_txs: PriorTransactions,
    }

    // A coinbase paying `owner` and a signed transaction moving 4 of it to `to`
    fn signed_spend() -> Spend {
        let owner = Wallet::new().unwrap();
        let to = Wallet::new().unwrap().get_address();
        let funding = Transaction::new_coinbase_tx(&owner.get_address(), "funding").unwrap();

        let input = TXInput::new(funding.get_id(), 0, owner.get_public_key());
        let outputs = vec![
            TXOutput::new(4, &to).unwrap(),
            TXOutput::new(SUBSIDY - 4, &owner.get_address()).unwrap(),
        ];
        let mut tx = Transaction::new_unsigned(vec![input], outputs).unwrap();

        let mut prev_txs = PriorTransactions::new();
        prev_txs.insert(funding.get_id().to_vec(), funding.clone());
        tx.sign(owner.get_pkcs8(), &prev_txs).unwrap();

        Spend {
            owner,
            funding,
            tx,
            prev_txs,
        }
    }

    #[test]
    fn test_coinbase_shape() {
        let address = Wallet::new().unwrap().get_address();
        let tx = Transaction::new_coinbase_tx(&address, "hello").unwrap();
        assert!(tx.is_coinbase());
        assert_eq!(tx.get_vin()[0].get_pub_key(), b"hello");
        assert_eq!(tx.get_vin()[0].get_vout(), COINBASE_OUTPUT_INDEX);
        assert_eq!(tx.get_vout().len(), 1);
        assert_eq!(tx.get_vout()[0].get_value(), SUBSIDY);
        assert_eq!(tx.get_id(), tx.hash().unwrap().as_slice());
        assert!(tx.verify(&PriorTransactions::new()).unwrap());
    }

    #[test]
    fn test_mining_reward_memo_is_randomised() {
        let address = Wallet::new().unwrap().get_address();
        let a = Transaction::new_coinbase_tx(&address, MINING_REWARD_MEMO).unwrap();
        let b = Transaction::new_coinbase_tx(&address, MINING_REWARD_MEMO).unwrap();
        assert_ne!(a.get_id(), b.get_id());
        assert_eq!(
            a.get_vin()[0].get_pub_key().len(),
            2 * REWARD_MEMO_RANDOM_LEN
        );
    }

    #[test]
    fn test_coinbase_rejects_invalid_address() {
        assert!(matches!(
            Transaction::new_coinbase_tx("not-an-address", "memo"),
            Err(LedgerError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_sign_keeps_id_and_verifies() {
        let spend = signed_spend();
        assert!(!spend.tx.is_coinbase());
        assert_eq!(spend.tx.get_id(), spend.tx.hash().unwrap().as_slice());
        assert_eq!(spend.tx.get_vin()[0].get_signature().len(), 64);
        assert_eq!(
            spend.tx.get_vin()[0].get_pub_key(),
            spend.owner.get_public_key()
        );
        assert!(spend.tx.verify(&spend.prev_txs).unwrap());
    }

    #[test]
    fn test_tampered_output_value_fails_verification() {
        let spend = signed_spend();
        let mut tampered = spend.tx.clone();
        tampered.vout[0].value += 1;
        assert!(!tampered.verify(&spend.prev_txs).unwrap());
    }

    #[test]
    fn test_tampered_signature_fails_verification() {
        let spend = signed_spend();
        let mut tampered = spend.tx.clone();
        tampered.vin[0].signature[10] ^= 0x01;
        assert!(!tampered.verify(&spend.prev_txs).unwrap());
    }

    #[test]
    fn test_foreign_key_cannot_spend() {
        let spend = signed_spend();
        let thief = Wallet::new().unwrap();
        let input = TXInput::new(spend.funding.get_id(), 0, thief.get_public_key());
        let outputs = vec![TXOutput::new(SUBSIDY, &thief.get_address()).unwrap()];
        let mut stolen = Transaction::new_unsigned(vec![input], outputs).unwrap();
        stolen.sign(thief.get_pkcs8(), &spend.prev_txs).unwrap();
        assert!(!stolen.verify(&spend.prev_txs).unwrap());
    }

    #[test]
    fn test_missing_prior_transaction_is_an_error() {
        let spend = signed_spend();
        let empty = PriorTransactions::new();
        let result = spend.tx.verify(&empty);
        assert!(matches!(result, Err(LedgerError::NotFound(_))));

        let mut unsigned = spend.tx.clone();
        assert!(matches!(
            unsigned.sign(spend.owner.get_pkcs8(), &empty),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_sign_rejects_missing_output_index() {
        let spend = signed_spend();
        let input = TXInput::new(spend.funding.get_id(), 5, spend.owner.get_public_key());
        let outputs = vec![TXOutput::new(1, &spend.owner.get_address()).unwrap()];
        let mut tx = Transaction::new_unsigned(vec![input], outputs).unwrap();
        assert!(matches!(
            tx.sign(spend.owner.get_pkcs8(), &spend.prev_txs),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_locks_and_unlocks() {
        let spend = signed_spend();
        let owner_hash = hash_pub_key(spend.owner.get_public_key());
        assert!(spend.tx.get_vin()[0].unlocks(&owner_hash));
        assert!(spend.tx.get_vout()[1].is_locked_with_key(&owner_hash));
        assert!(!spend.tx.get_vout()[0].is_locked_with_key(&owner_hash));
        assert_eq!(spend.tx.get_output_value().unwrap(), SUBSIDY);
    }

    #[test]
    fn test_input_value() {
        let spend = signed_spend();
        assert_eq!(spend.tx.get_input_value(&spend.prev_txs).unwrap(), SUBSIDY);
        let no_priors = PriorTransactions::new();
        assert_eq!(spend.funding.get_input_value(&no_priors).unwrap(), 0);
        assert!(matches!(
            spend.tx.get_input_value(&no_priors),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_serialize_round_trip() {
        let spend = signed_spend();
        let decoded = Transaction::deserialize(&spend.tx.serialize().unwrap()).unwrap();
        assert_eq!(decoded, spend.tx);
        assert!(decoded.verify(&spend.prev_txs).unwrap());
    }
}
