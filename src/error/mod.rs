//! Error handling for the ledger
//!
//! One error type covers every ledger operation. Validation and funds errors
//! leave persisted state untouched; storage and mining errors abort the
//! current operation.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed block or transaction shape
    Validation(String),
    /// Address failed Base58Check decoding
    InvalidAddress(String),
    /// Spend amount exceeds what the sender can resolve
    InsufficientFunds { required: u64, available: u64 },
    /// Unknown address, transaction id or prior transaction
    NotFound(String),
    /// Underlying read/write scope failure
    Storage(String),
    /// Encoding/decoding errors
    Serialization(String),
    /// Key handling and signing errors
    Crypto(String),
    /// Every nonce was tried without meeting the target
    ProofOfWorkExhausted,
    /// A ledger already exists at the configured location
    AlreadyExists(String),
    /// No ledger exists at the configured location
    DoesNotExist(String),
    /// File I/O errors
    Io(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Validation(msg) => write!(f, "Validation error: {msg}"),
            LedgerError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            LedgerError::NotFound(msg) => write!(f, "Not found: {msg}"),
            LedgerError::Storage(msg) => write!(f, "Storage error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            LedgerError::ProofOfWorkExhausted => {
                write!(f, "Proof-of-work exhausted the nonce space")
            }
            LedgerError::AlreadyExists(msg) => write!(f, "Ledger already exists: {msg}"),
            LedgerError::DoesNotExist(msg) => write!(f, "Ledger does not exist: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}
