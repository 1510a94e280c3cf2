// Canonical encoding shared by blocks, transactions and the wallet file.
//
// Values are written with bincode's standard configuration: struct fields in
// declaration order, integers as little-endian varints, and every byte string or
// list preceded by its varint length. Transaction ids, Merkle leaves and the
// proof-of-work preimage's Merkle root are digests of these bytes, so a field
// reorder or a configuration change alters every stored digest.
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Serialize data using bincode 2.0 with standard configuration.
///
/// Equal values always encode to identical bytes.
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| LedgerError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}
