use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, UnparsedPublicKey, ECDSA_P256_SHA256_FIXED,
    ECDSA_P256_SHA256_FIXED_SIGNING,
};
use ripemd::{Digest as RipemdDigest, Ripemd160};

use crate::error::{LedgerError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Byte width of one P-256 field element (a curve coordinate or a signature scalar).
pub const P256_SCALAR_LEN: usize = 32;

// SEC1 tag for an uncompressed curve point
const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// Seconds since the Unix epoch.
pub fn current_timestamp() -> Result<i64> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LedgerError::Crypto(format!("System time error: {e}")))?
        .as_secs();

    i64::try_from(secs).map_err(|_| LedgerError::Crypto("Timestamp overflow".to_string()))
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn ripemd160_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn base58_decode(data: &str) -> Result<Vec<u8>> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| LedgerError::InvalidAddress(format!("Invalid base58 encoding: {e}")))
}

/// Generates a fresh P-256 private key in PKCS#8 form.
pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| LedgerError::Crypto(format!("Failed to generate ECDSA key pair: {e}")))?
        .as_ref()
        .to_vec();
    Ok(pkcs8)
}

/// Returns the public key of a PKCS#8 private key as raw `x || y` coordinates.
pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let key_pair = load_key_pair(pkcs8)?;
    let point = key_pair.public_key().as_ref();
    match point.split_first() {
        Some((&UNCOMPRESSED_POINT_TAG, coordinates))
            if coordinates.len() == 2 * P256_SCALAR_LEN =>
        {
            Ok(coordinates.to_vec())
        }
        _ => Err(LedgerError::Crypto(
            "Unexpected public key encoding".to_string(),
        )),
    }
}

/// Signs `message` and returns the fixed-width `r || s` pair.
pub fn ecdsa_p256_sha256_sign_digest(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = load_key_pair(pkcs8)?;
    let signature = key_pair
        .sign(&rng, message)
        .map_err(|e| LedgerError::Crypto(format!("Failed to sign message: {e}")))?
        .as_ref()
        .to_vec();
    Ok(signature)
}

/// Verifies an `r || s` signature against an `x || y` public key.
///
/// Both byte strings are split exactly in half; each half is left-padded to the
/// curve's scalar width so that minimal big-endian encodings are accepted too.
pub fn ecdsa_p256_sha256_sign_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    if public_key.len() % 2 != 0 || signature.len() % 2 != 0 {
        return false;
    }
    let (x, y) = public_key.split_at(public_key.len() / 2);
    let (r, s) = signature.split_at(signature.len() / 2);

    let (Some(x), Some(y), Some(r), Some(s)) = (
        pad_scalar(x),
        pad_scalar(y),
        pad_scalar(r),
        pad_scalar(s),
    ) else {
        return false;
    };

    let mut point = Vec::with_capacity(1 + 2 * P256_SCALAR_LEN);
    point.push(UNCOMPRESSED_POINT_TAG);
    point.extend_from_slice(&x);
    point.extend_from_slice(&y);

    let mut fixed_signature = Vec::with_capacity(2 * P256_SCALAR_LEN);
    fixed_signature.extend_from_slice(&r);
    fixed_signature.extend_from_slice(&s);

    UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, point)
        .verify(message, &fixed_signature)
        .is_ok()
}

fn load_key_pair(pkcs8: &[u8]) -> Result<EcdsaKeyPair> {
    let rng = SystemRandom::new();
    EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| LedgerError::Crypto(format!("Failed to create key pair from PKCS8: {e}")))
}

fn pad_scalar(bytes: &[u8]) -> Option<[u8; P256_SCALAR_LEN]> {
    if bytes.is_empty() || bytes.len() > P256_SCALAR_LEN {
        return None;
    }
    let mut padded = [0u8; P256_SCALAR_LEN];
    padded[P256_SCALAR_LEN - bytes.len()..].copy_from_slice(bytes);
    Some(padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let digest = sha256_digest(b"abc");
        assert_eq!(
            data_encoding::HEXLOWER.encode(&digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_ripemd160_length() {
        assert_eq!(ripemd160_digest(b"anything").len(), 20);
    }

    #[test]
    fn test_sign_and_verify() {
        let pkcs8 = new_key_pair().unwrap();
        let public_key = public_key_from_pkcs8(&pkcs8).unwrap();
        assert_eq!(public_key.len(), 64);

        let message = sha256_digest(b"payload");
        let signature = ecdsa_p256_sha256_sign_digest(&pkcs8, &message).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(ecdsa_p256_sha256_sign_verify(
            &public_key,
            &signature,
            &message
        ));
    }

    #[test]
    fn test_verify_rejects_other_message_and_key() {
        let pkcs8 = new_key_pair().unwrap();
        let other = public_key_from_pkcs8(&new_key_pair().unwrap()).unwrap();
        let public_key = public_key_from_pkcs8(&pkcs8).unwrap();
        let signature = ecdsa_p256_sha256_sign_digest(&pkcs8, b"one").unwrap();

        let wrong_message = ecdsa_p256_sha256_sign_verify(&public_key, &signature, b"two");
        let wrong_key = ecdsa_p256_sha256_sign_verify(&other, &signature, b"one");
        assert!(!wrong_message);
        assert!(!wrong_key);
    }

    #[test]
    fn test_verify_rejects_malformed_inputs() {
        assert!(!ecdsa_p256_sha256_sign_verify(&[1, 2, 3], &[0; 64], b"m"));
        assert!(!ecdsa_p256_sha256_sign_verify(&[0; 64], &[], b"m"));
        assert!(!ecdsa_p256_sha256_sign_verify(&[0; 66], &[0; 64], b"m"));
    }

    #[test]
    fn test_base58_round_trip() {
        let encoded = base58_encode(&[0, 1, 2, 3]);
        assert_eq!(base58_decode(&encoded).unwrap(), vec![0, 1, 2, 3]);
        assert!(base58_decode("0OIl").is_err());
    }
}
