//! Utility functions and helpers
//!
//! Digests, Base58, ECDSA P-256 signing and the canonical bincode encoding.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, new_key_pair, public_key_from_pkcs8, ripemd160_digest,
    sha256_digest, P256_SCALAR_LEN,
};

pub use serialization::{deserialize, serialize};
