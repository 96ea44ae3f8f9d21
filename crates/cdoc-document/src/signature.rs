//! Collaborator signatures over a signing root.

use cdoc_core::{AccountId, Hash32};
use cdoc_crypto::{verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// A signature by one collaborator over the signing root of one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSignature {
    /// Signing account.
    pub signer: AccountId,
    /// Key the signature verifies under.
    pub public_key: Ed25519PublicKey,
    /// Signature over the raw signing root bytes.
    pub signature: Ed25519Signature,
}

impl DocumentSignature {
    /// Sign `signing_root` as `signer`.
    pub fn create(signer: AccountId, keys: &Ed25519KeyPair, signing_root: &Hash32) -> Self {
        Self {
            signer,
            public_key: keys.public_key(),
            signature: keys.sign(signing_root.as_bytes()),
        }
    }

    /// Check the signature against `signing_root`.
    ///
    /// Key attribution is a separate check against the key registry.
    pub fn verify(&self, signing_root: &Hash32) -> Result<(), DocumentError> {
        verify_with_public_key(signing_root.as_bytes(), &self.signature, &self.public_key).map_err(
            |e| DocumentError::SignatureInvalid(format!("signature by {}: {e}", self.signer)),
        )
    }
}
