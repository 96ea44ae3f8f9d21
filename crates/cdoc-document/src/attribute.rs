//! # Attributes
//!
//! Typed key/value metadata carried by the core document. The key is the
//! SHA-256 of the label; the value is a tagged union whose declared type
//! travels alongside it so that a stored or received attribute can be
//! checked for agreement.
//!
//! ## Signed attributes
//!
//! A `signed` attribute carries a value signed by an identity over
//! `identity || document_id || version || value`. Binding the document and
//! version stops the signature from being replayed into another document.

use std::str::FromStr;

use cdoc_core::{AccountId, AttrKey, DocumentId, Timestamp, VersionId};
use cdoc_crypto::{verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::int256::Int256;

/// Declared type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// Signed 256-bit integer.
    Int256,
    /// UTF-8 text.
    String,
    /// Opaque bytes.
    Bytes,
    /// UTC timestamp.
    Timestamp,
    /// A value signed by an identity.
    Signed,
}

impl AttributeType {
    /// Readable name, also the leaf value of the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int256 => "int256",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Timestamp => "timestamp",
            Self::Signed => "signed",
        }
    }

    /// Parse a plain (non-signed) value from its text form.
    pub fn parse_value(&self, text: &str) -> Result<AttributeValue, DocumentError> {
        let invalid = |reason: String| DocumentError::InvalidAttribute {
            label: String::new(),
            reason,
        };
        match self {
            Self::Int256 => Int256::from_str(text)
                .map(AttributeValue::Int256)
                .map_err(|e| invalid(e.to_string())),
            Self::String => Ok(AttributeValue::String(text.to_string())),
            Self::Bytes => cdoc_core::serde_hex::decode(text)
                .map(AttributeValue::Bytes)
                .map_err(|e| invalid(format!("bytes must be hex: {e}"))),
            Self::Timestamp => Timestamp::parse(text)
                .map(AttributeValue::Timestamp)
                .map_err(|e| invalid(e.to_string())),
            Self::Signed => Err(invalid(
                "signed values are created with Attribute::new_signed".into(),
            )),
        }
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed attribute payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedValue {
    /// Identity that signed.
    pub identity: AccountId,
    /// Version the value was signed for.
    pub document_version: VersionId,
    /// Declared type of the inner value.
    pub value_type: AttributeType,
    /// Inner value bytes.
    #[serde(with = "cdoc_core::serde_hex")]
    pub value: Vec<u8>,
    /// Signing key.
    pub public_key: Ed25519PublicKey,
    /// Signature over the signing payload.
    pub signature: Ed25519Signature,
}

impl SignedValue {
    /// `identity || document_id || version || value`.
    pub fn signing_payload(
        identity: &AccountId,
        document_id: &DocumentId,
        version: &VersionId,
        value: &[u8],
    ) -> Vec<u8> {
        let mut payload = Vec::with_capacity(96 + value.len());
        payload.extend_from_slice(identity.as_bytes());
        payload.extend_from_slice(document_id.as_bytes());
        payload.extend_from_slice(version.as_bytes());
        payload.extend_from_slice(value);
        payload
    }

    /// Check the signature against the document it is embedded in.
    pub fn verify(&self, document_id: &DocumentId) -> Result<(), DocumentError> {
        let payload =
            Self::signing_payload(&self.identity, document_id, &self.document_version, &self.value);
        verify_with_public_key(&payload, &self.signature, &self.public_key)
            .map_err(|e| DocumentError::SignatureInvalid(e.to_string()))
    }

    fn leaf_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + 32 + 64 + self.value.len());
        out.extend_from_slice(self.identity.as_bytes());
        out.extend_from_slice(self.document_version.as_bytes());
        out.extend_from_slice(self.public_key.as_bytes());
        out.extend_from_slice(self.signature.as_bytes());
        out.extend_from_slice(&self.value);
        out
    }
}

/// An attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Signed 256-bit integer.
    Int256(Int256),
    /// UTF-8 text.
    String(String),
    /// Opaque bytes.
    Bytes(#[serde(with = "cdoc_core::serde_hex")] Vec<u8>),
    /// UTC timestamp.
    Timestamp(Timestamp),
    /// Signed value.
    Signed(SignedValue),
}

impl AttributeValue {
    /// The type this payload actually has.
    pub fn value_type(&self) -> AttributeType {
        match self {
            Self::Int256(_) => AttributeType::Int256,
            Self::String(_) => AttributeType::String,
            Self::Bytes(_) => AttributeType::Bytes,
            Self::Timestamp(_) => AttributeType::Timestamp,
            Self::Signed(_) => AttributeType::Signed,
        }
    }

    /// Leaf encoding of the value.
    pub fn leaf_bytes(&self) -> Vec<u8> {
        match self {
            Self::Int256(v) => v.to_be_bytes().to_vec(),
            Self::String(s) => s.as_bytes().to_vec(),
            Self::Bytes(b) => b.clone(),
            Self::Timestamp(t) => t.to_canonical_string().into_bytes(),
            Self::Signed(s) => s.leaf_bytes(),
        }
    }
}

/// A labelled, typed attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// SHA-256 of the label.
    pub key: AttrKey,
    /// Human readable label.
    pub key_label: String,
    /// Declared type.
    pub value_type: AttributeType,
    /// Payload.
    pub value: AttributeValue,
}

impl Attribute {
    /// A plain attribute; the declared type is taken from the value.
    pub fn new(label: &str, value: AttributeValue) -> Result<Self, DocumentError> {
        let key = AttrKey::from_label(label)?;
        Ok(Self {
            key,
            key_label: label.to_string(),
            value_type: value.value_type(),
            value,
        })
    }

    /// Parse a plain attribute from text.
    pub fn parse(label: &str, value_type: AttributeType, text: &str) -> Result<Self, DocumentError> {
        let value = value_type.parse_value(text).map_err(|e| match e {
            DocumentError::InvalidAttribute { reason, .. } => DocumentError::InvalidAttribute {
                label: label.to_string(),
                reason,
            },
            other => other,
        })?;
        Self::new(label, value)
    }

    /// A signed attribute over `value` for `document_id` at `version`.
    pub fn new_signed(
        label: &str,
        identity: AccountId,
        keys: &Ed25519KeyPair,
        document_id: &DocumentId,
        version: VersionId,
        value: &AttributeValue,
    ) -> Result<Self, DocumentError> {
        if value.value_type() == AttributeType::Signed {
            return Err(DocumentError::InvalidAttribute {
                label: label.to_string(),
                reason: "signed values cannot be nested".into(),
            });
        }
        let inner = value.leaf_bytes();
        let payload = SignedValue::signing_payload(&identity, document_id, &version, &inner);
        let signed = SignedValue {
            identity,
            document_version: version,
            value_type: value.value_type(),
            value: inner,
            public_key: keys.public_key(),
            signature: keys.sign(&payload),
        };
        Self::new(label, AttributeValue::Signed(signed))
    }

    /// Check key, declared type and, for signed values, the signature.
    pub fn validate(&self, document_id: &DocumentId) -> Result<(), DocumentError> {
        let invalid = |reason: String| DocumentError::InvalidAttribute {
            label: self.key_label.clone(),
            reason,
        };
        let expected_key = AttrKey::from_label(&self.key_label)?;
        if expected_key != self.key {
            return Err(invalid(format!("key {} does not match label", self.key)));
        }
        if self.value.value_type() != self.value_type {
            return Err(invalid(format!(
                "declared type {} but payload is {}",
                self.value_type,
                self.value.value_type()
            )));
        }
        if let AttributeValue::Signed(signed) = &self.value {
            if signed.value_type == AttributeType::Signed {
                return Err(invalid("signed values cannot be nested".into()));
            }
            signed.verify(document_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        let a = Attribute::parse("amount", AttributeType::Int256, "-1500").unwrap();
        assert_eq!(a.value, AttributeValue::Int256(Int256::from_i128(-1500)));
        let b = Attribute::parse("blob", AttributeType::Bytes, "0xdead").unwrap();
        assert_eq!(b.value, AttributeValue::Bytes(vec![0xde, 0xad]));
        let t = Attribute::parse("due", AttributeType::Timestamp, "2026-05-01T00:00:00Z").unwrap();
        assert_eq!(t.value_type, AttributeType::Timestamp);
    }

    #[test]
    fn test_parse_error_names_label() {
        let err = Attribute::parse("amount", AttributeType::Int256, "12.5").unwrap_err();
        match err {
            DocumentError::InvalidAttribute { label, .. } => assert_eq!(label, "amount"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_declared_type_mismatch() {
        let doc = DocumentId::random();
        let mut attr = Attribute::new("name", AttributeValue::String("Acme".into())).unwrap();
        attr.validate(&doc).unwrap();
        attr.value_type = AttributeType::Int256;
        assert!(matches!(
            attr.validate(&doc),
            Err(DocumentError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_key_label_mismatch() {
        let mut attr = Attribute::new("name", AttributeValue::String("Acme".into())).unwrap();
        attr.key_label = "other".into();
        assert!(attr.validate(&DocumentId::random()).is_err());
    }

    #[test]
    fn test_signed_attribute_binds_document() {
        let keys = Ed25519KeyPair::generate();
        let identity = AccountId::random();
        let doc = DocumentId::random();
        let attr = Attribute::new_signed(
            "approved_amount",
            identity,
            &keys,
            &doc,
            VersionId::random(),
            &AttributeValue::Int256(Int256::from_i128(100)),
        )
        .unwrap();
        attr.validate(&doc).unwrap();
        assert!(matches!(
            attr.validate(&DocumentId::random()),
            Err(DocumentError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_serde_shape() {
        let attr = Attribute::new("name", AttributeValue::String("Acme".into())).unwrap();
        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(json["value"]["type"], "string");
        assert_eq!(json["value"]["value"], "Acme");
        let back: Attribute = serde_json::from_value(json).unwrap();
        assert_eq!(back, attr);
    }
}
