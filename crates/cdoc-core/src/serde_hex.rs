//! Serde helpers for variable-length byte fields rendered as `0x` hex.
//!
//! Use with `#[serde(with = "cdoc_core::serde_hex")]` on `Vec<u8>` fields.

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize bytes as a `0x`-prefixed lowercase hex string.
pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

/// Deserialize bytes from hex, with or without the `0x` prefix.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    decode(&s).map_err(serde::de::Error::custom)
}

/// Decode hex text, with or without the `0x` prefix.
pub fn decode(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = s.trim();
    hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Field {
        #[serde(with = "super")]
        compact: Vec<u8>,
    }

    #[test]
    fn test_hex_field_roundtrip() {
        let field = Field { compact: vec![0, 3, 0, 0, 0xff] };
        let json = serde_json::to_string(&field).unwrap();
        assert_eq!(json, r#"{"compact":"0x00030000ff"}"#);
        let back: Field = serde_json::from_str(&json).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn test_empty_bytes() {
        let field = Field { compact: vec![] };
        let json = serde_json::to_string(&field).unwrap();
        assert_eq!(json, r#"{"compact":"0x"}"#);
        let back: Field = serde_json::from_str(&json).unwrap();
        assert!(back.compact.is_empty());
    }
}
