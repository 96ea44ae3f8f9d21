//! # Ed25519 Signing and Verification
//!
//! Collaborators sign the 32-byte signing root of a document version;
//! granters sign the fixed-layout access-token message; identities sign
//! attribute payloads. All three inputs are already canonical byte strings,
//! so signing takes `&[u8]`.
//!
//! Key material stays in memory: the pair has no serde form and a redacted
//! `Debug`. Public keys and signatures travel as `0x` hex.

use cdoc_core::CryptoError;
use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Raw-bytes wrapper with `0x` hex text and serde forms. `$err` is the
/// `CryptoError` variant reported for malformed hex.
macro_rules! hex_wrapper {
    ($(#[$meta:meta])* $name:ident, $len:literal, $err:ident) => {
        $(#[$meta])*
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Wrap raw bytes.
            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Borrow the raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// `0x`-prefixed lowercase hex.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// Parse hex, with or without `0x`.
            pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
                let bytes = decode_hex(s, $len).map_err(CryptoError::$err)?;
                let mut out = [0u8; $len];
                out.copy_from_slice(&bytes);
                Ok(Self(out))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                Self::from_hex(&text).map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({}..)"), hex::encode(&self.0[..4]))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }
    };
}

hex_wrapper!(
    /// An Ed25519 public key (32 bytes).
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    Ed25519PublicKey,
    32,
    KeyError
);

hex_wrapper!(
    /// An Ed25519 signature (64 bytes).
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    Ed25519Signature,
    64,
    VerificationFailed
);

impl Ed25519PublicKey {
    /// The dalek verifying key; fails for points not on the curve.
    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::KeyError(format!("invalid public key: {e}")))
    }
}

/// Signing key of one account. Not serializable; `Debug` is redacted.
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Ed25519KeyPair {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Create a key pair from a 32-byte private seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// The private seed, for writing a key file. Never log this.
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// The public key of this pair.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair(<private>)")
    }
}

/// Verify `signature` over `message` under `public_key`.
pub fn verify_with_public_key(
    message: &[u8],
    signature: &Ed25519Signature,
    public_key: &Ed25519PublicKey,
) -> Result<(), CryptoError> {
    public_key
        .to_verifying_key()?
        .verify(message, &ed25519_dalek::Signature::from_bytes(&signature.0))
        .map_err(|e| CryptoError::VerificationFailed(format!("bad signature: {e}")))
}

fn decode_hex(s: &str, len: usize) -> Result<Vec<u8>, String> {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|e| format!("invalid hex: {e}"))?;
    if bytes.len() != len {
        return Err(format!("expected {len} bytes, got {}", bytes.len()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = Ed25519KeyPair::generate();
        let root = [7u8; 32];
        let sig = kp.sign(&root);
        verify_with_public_key(&root, &sig, &kp.public_key()).expect("valid signature");
    }

    #[test]
    fn test_verify_wrong_key_fails() {
        let kp1 = Ed25519KeyPair::generate();
        let kp2 = Ed25519KeyPair::generate();
        let sig = kp1.sign(b"signing root");
        assert!(verify_with_public_key(b"signing root", &sig, &kp2.public_key()).is_err());
    }

    #[test]
    fn test_verify_flipped_byte_fails() {
        let kp = Ed25519KeyPair::generate();
        let mut sig = kp.sign(b"message");
        sig.0[10] ^= 0x01;
        assert!(verify_with_public_key(b"message", &sig, &kp.public_key()).is_err());
    }

    #[test]
    fn test_deterministic_from_seed() {
        let kp1 = Ed25519KeyPair::from_seed(&[42u8; 32]);
        let kp2 = Ed25519KeyPair::from_seed(&kp1.seed());
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.sign(b"x"), kp2.sign(b"x"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let kp = Ed25519KeyPair::generate();
        let pk = kp.public_key();
        assert_eq!(Ed25519PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
        let sig = kp.sign(b"y");
        assert_eq!(Ed25519Signature::from_hex(&sig.to_hex()).unwrap(), sig);
    }

    #[test]
    fn test_serde_json_is_hex_string() {
        let pk = Ed25519KeyPair::generate().public_key();
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json.len(), 2 + 2 + 64);
        let back: Ed25519PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(Ed25519PublicKey::from_hex("not-hex").is_err());
        assert!(Ed25519PublicKey::from_hex("aabb").is_err());
        assert!(Ed25519Signature::from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let kp = Ed25519KeyPair::generate();
        assert_eq!(format!("{kp:?}"), "Ed25519KeyPair(<private>)");
    }
}
