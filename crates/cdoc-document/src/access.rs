//! # Access Token Delegation
//!
//! A granter authorises a grantee to fetch one specific version of one
//! document without making the grantee a collaborator. Entity relationships
//! use this to expose the entity they reference to the counterparty.
//!
//! ## Token message
//!
//! The granter signs
//! `identifier || grantee || role_identifier || document_identifier || document_version`.
//! The identifier is fresh randomness per issuance, so a signature for one
//! grant never validates another.
//!
//! ## Security Invariant
//!
//! A token is valid only if the signature verifies under `key` **and** `key`
//! is registered to `granter`. A correct signature by an unregistered key is
//! a forgery.

use cdoc_core::{AccessTokenId, AccountId, DocumentId, RoleKey, VersionId};
use cdoc_crypto::{verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::keys::{KeyPurpose, KeyRegistry};

/// A signed, document-scoped delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Random per issuance.
    pub identifier: AccessTokenId,
    /// Account that granted access.
    pub granter: AccountId,
    /// Account allowed to fetch.
    pub grantee: AccountId,
    /// Role the grant is recorded under.
    pub role_identifier: RoleKey,
    /// Document the grant is for.
    pub document_identifier: DocumentId,
    /// Version the grant is for.
    pub document_version: VersionId,
    /// Granter's signing key.
    pub key: Ed25519PublicKey,
    /// Granter's signature over the token message.
    pub signature: Ed25519Signature,
}

/// Request to issue a token.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// Account that grants access.
    pub granter: AccountId,
    /// Account allowed to fetch.
    pub grantee: AccountId,
    /// Role the grant is recorded under.
    pub role_identifier: RoleKey,
    /// Document shared.
    pub document_identifier: DocumentId,
    /// Version shared.
    pub document_version: VersionId,
}

/// The byte string a granter signs.
pub fn token_message(
    identifier: &AccessTokenId,
    grantee: &AccountId,
    role_identifier: &RoleKey,
    document_identifier: &DocumentId,
    document_version: &VersionId,
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(32 * 5);
    msg.extend_from_slice(identifier.as_bytes());
    msg.extend_from_slice(grantee.as_bytes());
    msg.extend_from_slice(role_identifier.as_bytes());
    msg.extend_from_slice(document_identifier.as_bytes());
    msg.extend_from_slice(document_version.as_bytes());
    msg
}

/// Issue and sign a token with `signer`.
pub fn issue_token(grant: TokenGrant, signer: &Ed25519KeyPair) -> AccessToken {
    let identifier = AccessTokenId::random();
    let message = token_message(
        &identifier,
        &grant.grantee,
        &grant.role_identifier,
        &grant.document_identifier,
        &grant.document_version,
    );
    AccessToken {
        identifier,
        granter: grant.granter,
        grantee: grant.grantee,
        role_identifier: grant.role_identifier,
        document_identifier: grant.document_identifier,
        document_version: grant.document_version,
        key: signer.public_key(),
        signature: signer.sign(&message),
    }
}

impl AccessToken {
    /// The message this token's signature must cover.
    pub fn message(&self) -> Vec<u8> {
        token_message(
            &self.identifier,
            &self.grantee,
            &self.role_identifier,
            &self.document_identifier,
            &self.document_version,
        )
    }
}

/// Check that `token` is bound to `expected_document`, its signature
/// verifies, and its key belongs to its granter.
///
/// # Errors
///
/// - `InvalidIdentifier` if the token targets another document.
/// - `SignatureInvalid` if the signature or key attribution fails.
pub fn validate_token(
    token: &AccessToken,
    expected_document: &DocumentId,
    keys: &dyn KeyRegistry,
) -> Result<(), DocumentError> {
    if token.document_identifier != *expected_document {
        return Err(DocumentError::InvalidIdentifier {
            expected: expected_document.to_string(),
            actual: token.document_identifier.to_string(),
        });
    }
    verify_with_public_key(&token.message(), &token.signature, &token.key)
        .map_err(|e| DocumentError::SignatureInvalid(e.to_string()))?;
    keys.validate_key(&token.granter, &token.key, KeyPurpose::Signing)
}
