//! Transaction identifiers

use std::fmt;

use crate::{PrimitiveError, H256};

/// Transaction identifier.
///
/// Rendered as 64 lowercase hex characters without prefix, which is the form
/// peers and the ordering service report back in commit notifications.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TxId(H256);

impl TxId {
    /// Wrap a digest as a transaction id
    pub const fn new(digest: H256) -> Self {
        TxId(digest)
    }

    /// Parse from hex (prefix optional)
    pub fn parse(s: &str) -> Result<Self, PrimitiveError> {
        H256::from_hex(s)
            .map(TxId)
            .map_err(|e| PrimitiveError::TxId(e.to_string()))
    }

    /// Underlying digest
    pub fn digest(&self) -> &H256 {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.as_bytes()))
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for TxId {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.to_string())
        }
    }

    impl<'de> Deserialize<'de> for TxId {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            TxId::parse(&s).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_id_display_has_no_prefix() {
        let id = TxId::new(H256::from_bytes([0xaa; 32]));
        let s = id.to_string();
        assert_eq!(s.len(), 64);
        assert!(!s.starts_with("0x"));
    }

    #[test]
    fn test_tx_id_parse_both_forms() {
        let id = TxId::new(H256::from_bytes([0x0f; 32]));
        assert_eq!(TxId::parse(&id.to_string()).unwrap(), id);
        assert_eq!(TxId::parse(&id.digest().to_hex()).unwrap(), id);
    }

    #[test]
    fn test_tx_id_parse_invalid() {
        assert!(matches!(TxId::parse("xyz"), Err(PrimitiveError::TxId(_))));
    }
}
