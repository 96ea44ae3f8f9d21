//! # Core Document Engine
//!
//! The scheme-independent envelope every document type holds: identifiers
//! and the version chain, collaborators, roles, transition rules,
//! attributes, NFT links, access tokens and signatures, plus the three roots
//! computed over them.
//!
//! ## Roots
//!
//! ```text
//! dr_tree ─┬─ signing_root ─┬─ data_root   (scheme data tree)
//!          │                └─ cd_root     (this envelope)
//!          └─ signatures_root              (collaborator signatures)
//! ```
//!
//! Roots are computed bottom-up and cached. Every mutation of envelope state
//! drops the whole cache; appending a signature drops only the document
//! root, since signatures are not part of the signing root they sign.
//!
//! ## Security Invariant
//!
//! A `Committed` version is immutable. Every mutating operation checks the
//! status first and validates its full input before touching state, so an
//! error leaves the document exactly as it was.
//!
//! ## Concurrency
//!
//! Not internally synchronised. Callers serialise writers per
//! `(account, document)`.

use std::collections::BTreeMap;

use cdoc_core::{
    sha256_concat, sha256_digest, AccessTokenId, AccountId, AttrKey, CanonicalBytes, DocumentId,
    Hash32, NftTokenId, Preimage, RegistryId, RoleKey, RuleKey, SaltSeed, Timestamp, VersionId,
};
use cdoc_crypto::Ed25519KeyPair;
use serde::{Deserialize, Serialize};

use crate::access::{validate_token, AccessToken};
use crate::attribute::{Attribute, AttributeType};
use crate::collaborators::{Collaborators, CollaboratorsAccess};
use crate::error::DocumentError;
use crate::keys::{KeyPurpose, KeyRegistry};
use crate::nft::Nft;
use crate::paths::{self, cd, roots};
use crate::rules::{MatchType, Role, TransitionAction, TransitionRule};
use crate::scheme::Scheme;
use crate::signature::DocumentSignature;
use crate::tree::{DocumentTree, FieldPath, TreeBuilder};

const DEFAULT_RULE_DOMAIN: &[u8] = b"cdoc.default-transition-rule";

/// Lifecycle of one version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Being edited and signed.
    Pending,
    /// Anchored; terminal for this version.
    Committed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Committed => f.write_str("committed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RootCache {
    data: Option<Hash32>,
    signing: Option<Hash32>,
    document: Option<Hash32>,
}

/// Per-version document state shared by every scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreDocument {
    scheme: Scheme,
    document_id: DocumentId,
    previous_version: Option<VersionId>,
    current_version: VersionId,
    next_version: VersionId,
    current_preimage: Preimage,
    next_preimage: Preimage,
    status: Status,
    author: AccountId,
    timestamp: Timestamp,
    collaborators: Collaborators,
    roles: BTreeMap<RoleKey, Vec<AccountId>>,
    transition_rules: BTreeMap<RuleKey, TransitionRule>,
    attributes: BTreeMap<AttrKey, Attribute>,
    nfts: BTreeMap<RegistryId, Nft>,
    access_tokens: Vec<AccessToken>,
    signatures: Vec<DocumentSignature>,
    salt_seed: SaltSeed,
    #[serde(skip)]
    roots: RootCache,
}

impl CoreDocument {
    /// Create version 1 of a document.
    ///
    /// The author becomes a read-write collaborator. If `document_id` is
    /// `None` the document is identified by its first version.
    ///
    /// # Errors
    ///
    /// `InvalidAttribute` if any attribute fails validation.
    pub fn new(
        scheme: Scheme,
        document_id: Option<DocumentId>,
        author: AccountId,
        access: &CollaboratorsAccess,
        attributes: Vec<Attribute>,
    ) -> Result<Self, DocumentError> {
        let current_preimage = Preimage::random();
        let current_version = current_preimage.version_id();
        let document_id = document_id.unwrap_or_else(|| DocumentId::from_version(current_version));
        validate_attributes(&document_id, &attributes)?;

        let next_preimage = Preimage::random();
        let mut collaborators = Collaborators::from_access(access);
        collaborators.merge(&CollaboratorsAccess::read_write([author]));

        Ok(Self {
            scheme,
            document_id,
            previous_version: None,
            current_version,
            next_version: next_preimage.version_id(),
            current_preimage,
            next_preimage,
            status: Status::Pending,
            author,
            timestamp: Timestamp::now(),
            collaborators,
            roles: BTreeMap::new(),
            transition_rules: BTreeMap::new(),
            attributes: attributes.into_iter().map(|a| (a.key, a)).collect(),
            nfts: BTreeMap::new(),
            access_tokens: Vec::new(),
            signatures: Vec::new(),
            salt_seed: SaltSeed::random(),
            roots: RootCache::default(),
        })
    }

    /// A fresh document that starts with the roles, transition rules and
    /// attributes of `template`. Signed attributes are bound to the template
    /// document and are not carried over.
    pub fn from_template(
        scheme: Scheme,
        author: AccountId,
        template: &CoreDocument,
    ) -> Result<Self, DocumentError> {
        let mut core = Self::new(scheme, None, author, &CollaboratorsAccess::default(), vec![])?;
        core.roles = template.roles.clone();
        core.transition_rules = template.transition_rules.clone();
        core.attributes = template
            .attributes
            .iter()
            .filter(|(_, a)| a.value_type != AttributeType::Signed)
            .map(|(k, a)| (*k, a.clone()))
            .collect();
        Ok(core)
    }

    /// Derive the successor of a committed version.
    ///
    /// The successor's current version is this version's pre-committed next
    /// version. Collaborators are merged additively; attributes are upserted.
    /// Signatures and roots start empty.
    ///
    /// # Errors
    ///
    /// `InvalidStatus` unless this version is `Committed`.
    pub fn prepare_new_version(
        &self,
        author: AccountId,
        access: &CollaboratorsAccess,
        attributes: Vec<Attribute>,
    ) -> Result<Self, DocumentError> {
        if self.status != Status::Committed {
            return Err(DocumentError::InvalidStatus {
                status: self.status.to_string(),
                operation: "prepare_new_version",
            });
        }
        validate_attributes(&self.document_id, &attributes)?;

        let next_preimage = Preimage::random();
        let mut next = self.clone();
        next.previous_version = Some(self.current_version);
        next.current_version = self.next_version;
        next.current_preimage = self.next_preimage;
        next.next_version = next_preimage.version_id();
        next.next_preimage = next_preimage;
        next.status = Status::Pending;
        next.author = author;
        next.timestamp = Timestamp::now();
        next.collaborators.merge(access);
        next.attributes.extend(attributes.into_iter().map(|a| (a.key, a)));
        next.signatures.clear();
        next.salt_seed = SaltSeed::random();
        next.roots = RootCache::default();
        Ok(next)
    }

    /// Merge collaborators and upsert attributes on a pending version.
    pub fn patch(
        &mut self,
        access: &CollaboratorsAccess,
        attributes: Vec<Attribute>,
    ) -> Result<(), DocumentError> {
        self.ensure_pending("patch")?;
        validate_attributes(&self.document_id, &attributes)?;
        self.collaborators.merge(access);
        self.attributes.extend(attributes.into_iter().map(|a| (a.key, a)));
        self.touch();
        Ok(())
    }

    /// Move the status forward.
    ///
    /// # Errors
    ///
    /// `StatusRegression` when moving from `Committed` back to `Pending`.
    pub fn set_status(&mut self, status: Status) -> Result<(), DocumentError> {
        if status < self.status {
            return Err(DocumentError::StatusRegression {
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        self.status = status;
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Scheme of the holding document.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Stable document identifier.
    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Identifier of this version.
    pub fn current_version(&self) -> VersionId {
        self.current_version
    }

    /// Identifier of the version this one superseded.
    pub fn previous_version(&self) -> Option<VersionId> {
        self.previous_version
    }

    /// Pre-committed identifier of the successor.
    pub fn next_version(&self) -> VersionId {
        self.next_version
    }

    /// Preimage of the current version identifier; revealed when anchoring.
    pub fn current_preimage(&self) -> Preimage {
        self.current_preimage
    }

    /// Lifecycle status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Author of this version.
    pub fn author(&self) -> AccountId {
        self.author
    }

    /// Creation time of this version.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Collaborator sets.
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Every attribute, ordered by key.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// Attribute by key.
    pub fn attribute(&self, key: &AttrKey) -> Result<&Attribute, DocumentError> {
        self.attributes
            .get(key)
            .ok_or_else(|| DocumentError::AttributeNotFound(key.to_string()))
    }

    /// Every transition rule, ordered by key.
    pub fn transition_rules(&self) -> impl Iterator<Item = &TransitionRule> {
        self.transition_rules.values()
    }

    /// Attached NFTs, ordered by registry.
    pub fn nfts(&self) -> impl Iterator<Item = &Nft> {
        self.nfts.values()
    }

    /// Embedded access tokens.
    pub fn access_tokens(&self) -> &[AccessToken] {
        &self.access_tokens
    }

    /// Collected signatures.
    pub fn signatures(&self) -> &[DocumentSignature] {
        &self.signatures
    }

    /// Salt seed of this version's trees.
    pub fn salt_seed(&self) -> SaltSeed {
        self.salt_seed
    }

    /// A builder for the scheme data tree of this version.
    pub fn data_tree_builder(&self) -> TreeBuilder {
        TreeBuilder::new(
            FieldPath::root(self.scheme.as_str(), self.scheme.compact_prefix()),
            self.salt_seed,
        )
    }

    // ── Collaborators and attributes ────────────────────────────────────

    /// Remove collaborators explicitly; returns how many were removed.
    pub fn remove_collaborators(&mut self, accounts: &[AccountId]) -> Result<usize, DocumentError> {
        self.ensure_pending("remove_collaborators")?;
        let removed = self.collaborators.remove(accounts);
        if removed > 0 {
            self.touch();
        }
        Ok(removed)
    }

    /// Upsert attributes; all are validated before any is stored.
    pub fn add_attributes(&mut self, attributes: Vec<Attribute>) -> Result<(), DocumentError> {
        self.ensure_pending("add_attributes")?;
        validate_attributes(&self.document_id, &attributes)?;
        self.attributes.extend(attributes.into_iter().map(|a| (a.key, a)));
        self.touch();
        Ok(())
    }

    /// Delete an attribute.
    pub fn delete_attribute(&mut self, key: &AttrKey) -> Result<Attribute, DocumentError> {
        self.ensure_pending("delete_attribute")?;
        let removed = self
            .attributes
            .remove(key)
            .ok_or_else(|| DocumentError::AttributeNotFound(key.to_string()))?;
        self.touch();
        Ok(removed)
    }

    // ── Roles ───────────────────────────────────────────────────────────

    /// Create a role.
    ///
    /// # Errors
    ///
    /// `RoleExists` if the key is taken, `EmptyCollaborators` if no members
    /// are given.
    pub fn add_role(&mut self, key: RoleKey, members: Vec<AccountId>) -> Result<Role, DocumentError> {
        self.ensure_pending("add_role")?;
        if self.roles.contains_key(&key) {
            return Err(DocumentError::RoleExists(key.to_string()));
        }
        let members = dedup_members(members)?;
        self.roles.insert(key, members.clone());
        self.touch();
        Ok(Role {
            key,
            collaborators: members,
        })
    }

    /// Role by key.
    pub fn get_role(&self, key: &RoleKey) -> Result<Role, DocumentError> {
        self.roles
            .get(key)
            .map(|members| Role {
                key: *key,
                collaborators: members.clone(),
            })
            .ok_or_else(|| DocumentError::RoleNotFound(key.to_string()))
    }

    /// Replace the members of a role.
    pub fn update_role(&mut self, key: &RoleKey, members: Vec<AccountId>) -> Result<Role, DocumentError> {
        self.ensure_pending("update_role")?;
        if !self.roles.contains_key(key) {
            return Err(DocumentError::RoleNotFound(key.to_string()));
        }
        let members = dedup_members(members)?;
        self.roles.insert(*key, members.clone());
        self.touch();
        Ok(Role {
            key: *key,
            collaborators: members,
        })
    }

    // ── Transition rules ────────────────────────────────────────────────

    /// Let members of `role` edit fields matching `field`.
    ///
    /// The role also receives the default rules over the version
    /// bookkeeping fields.
    pub fn add_transition_rule(
        &mut self,
        role: RoleKey,
        field: Vec<u8>,
        match_type: MatchType,
    ) -> Result<TransitionRule, DocumentError> {
        self.ensure_pending("add_transition_rule")?;
        if !self.roles.contains_key(&role) {
            return Err(DocumentError::RoleNotFound(role.to_string()));
        }
        if field.is_empty() {
            return Err(DocumentError::InvalidPayload(
                "transition rule field selector is empty".into(),
            ));
        }
        let rule = TransitionRule::new(vec![role], field, match_type);
        self.transition_rules.insert(rule.rule_key, rule.clone());
        self.install_default_rules(role);
        self.touch();
        Ok(rule)
    }

    /// Let members of `role` edit one attribute.
    pub fn add_transition_rule_for_attribute(
        &mut self,
        role: RoleKey,
        key: &AttrKey,
    ) -> Result<TransitionRule, DocumentError> {
        self.attribute(key)?;
        let prefix = paths::attribute_prefix(key.as_bytes());
        self.add_transition_rule(role, prefix.compact().to_vec(), MatchType::Prefix)
    }

    /// Rule by key.
    pub fn get_transition_rule(&self, key: &RuleKey) -> Result<&TransitionRule, DocumentError> {
        self.transition_rules
            .get(key)
            .ok_or_else(|| DocumentError::TransitionRuleNotFound(key.to_string()))
    }

    /// Delete a rule. Roles no other rule references lose their default
    /// rules too.
    pub fn delete_transition_rule(&mut self, key: &RuleKey) -> Result<TransitionRule, DocumentError> {
        self.ensure_pending("delete_transition_rule")?;
        let removed = self
            .transition_rules
            .remove(key)
            .ok_or_else(|| DocumentError::TransitionRuleNotFound(key.to_string()))?;
        for role in &removed.roles {
            let still_used = self
                .transition_rules
                .values()
                .any(|r| !is_default_rule(r) && r.roles.contains(role));
            if !still_used {
                self.uninstall_default_rules(role);
            }
        }
        self.touch();
        Ok(removed)
    }

    /// Rules that apply to `account` through any of its roles.
    pub fn transition_rules_for(&self, account: &AccountId) -> Vec<&TransitionRule> {
        let roles: Vec<&RoleKey> = self
            .roles
            .iter()
            .filter(|(_, members)| members.contains(account))
            .map(|(key, _)| key)
            .collect();
        self.transition_rules
            .values()
            .filter(|rule| rule.roles.iter().any(|r| roles.contains(&r)))
            .collect()
    }

    /// SHA-256 over the canonical form of every rule and the roles they
    /// reference.
    pub fn transition_rules_fingerprint(&self) -> Result<Hash32, DocumentError> {
        #[derive(Serialize)]
        struct Fingerprint<'a> {
            roles: Vec<Role>,
            rules: Vec<&'a TransitionRule>,
        }
        let rules: Vec<&TransitionRule> = self.transition_rules.values().collect();
        let mut referenced: Vec<RoleKey> = rules.iter().flat_map(|r| r.roles.iter().copied()).collect();
        referenced.sort();
        referenced.dedup();
        let roles = referenced
            .iter()
            .filter_map(|key| self.get_role(key).ok())
            .collect();
        let canonical = CanonicalBytes::new(&Fingerprint { roles, rules })?;
        Ok(sha256_digest(&canonical))
    }

    fn install_default_rules(&mut self, role: RoleKey) {
        for field in paths::version_fields() {
            let key = default_rule_key(&field);
            let rule = self.transition_rules.entry(key).or_insert_with(|| TransitionRule {
                rule_key: key,
                roles: Vec::new(),
                field,
                match_type: MatchType::Exact,
                action: TransitionAction::Edit,
            });
            if !rule.roles.contains(&role) {
                rule.roles.push(role);
            }
        }
    }

    fn uninstall_default_rules(&mut self, role: &RoleKey) {
        for field in paths::version_fields() {
            let key = default_rule_key(&field);
            if let Some(rule) = self.transition_rules.get_mut(&key) {
                rule.roles.retain(|r| r != role);
                if rule.roles.is_empty() {
                    self.transition_rules.remove(&key);
                }
            }
        }
    }

    // ── NFTs ────────────────────────────────────────────────────────────

    /// Attach an NFT. A registry backs at most one token; a different token
    /// under the same registry replaces the previous link.
    ///
    /// # Errors
    ///
    /// `NftAlreadyAttached` if exactly this pair is already attached.
    pub fn add_nft(
        &mut self,
        grant_read: bool,
        registry: RegistryId,
        token_id: NftTokenId,
    ) -> Result<(), DocumentError> {
        self.ensure_pending("add_nft")?;
        if self.is_nft_minted(&registry, &token_id) {
            return Err(DocumentError::NftAlreadyAttached {
                registry: registry.to_string(),
                token_id: token_id.to_string(),
            });
        }
        self.nfts.insert(
            registry,
            Nft {
                registry,
                token_id,
                grants_read: grant_read,
            },
        );
        self.touch();
        Ok(())
    }

    /// True if this exact token is attached.
    pub fn is_nft_minted(&self, registry: &RegistryId, token_id: &NftTokenId) -> bool {
        self.nfts
            .get(registry)
            .is_some_and(|nft| nft.token_id == *token_id)
    }

    /// `Ok(())` if `requester` is the ledger-reported `owner` of an attached
    /// token that grants read access.
    pub fn nft_owner_can_read(
        &self,
        registry: &RegistryId,
        token_id: &NftTokenId,
        owner: &AccountId,
        requester: &AccountId,
    ) -> Result<(), DocumentError> {
        let nft = self
            .nfts
            .get(registry)
            .filter(|nft| nft.token_id == *token_id)
            .ok_or_else(|| DocumentError::NftNotFound(format!("{registry}/{token_id}")))?;
        if !nft.grants_read || owner != requester {
            return Err(DocumentError::AccessDenied(requester.to_string()));
        }
        Ok(())
    }

    // ── Access tokens ───────────────────────────────────────────────────

    /// Embed an access token. The granter must be a collaborator of this
    /// document and the token must validate against the document it targets.
    pub fn add_access_token(
        &mut self,
        token: AccessToken,
        keys: &dyn KeyRegistry,
    ) -> Result<(), DocumentError> {
        self.ensure_pending("add_access_token")?;
        if !self.collaborators.can_read(&token.granter) {
            return Err(DocumentError::AccessDenied(token.granter.to_string()));
        }
        validate_token(&token, &token.document_identifier, keys)?;
        self.access_tokens.retain(|t| t.identifier != token.identifier);
        self.access_tokens.push(token);
        self.touch();
        Ok(())
    }

    /// Token by identifier.
    pub fn access_token(&self, identifier: &AccessTokenId) -> Result<&AccessToken, DocumentError> {
        self.access_tokens
            .iter()
            .find(|t| t.identifier == *identifier)
            .ok_or_else(|| DocumentError::AccessTokenNotFound(identifier.to_string()))
    }

    /// Remove every token issued to `grantee`.
    pub fn delete_access_token(&mut self, grantee: &AccountId) -> Result<(), DocumentError> {
        self.ensure_pending("delete_access_token")?;
        let before = self.access_tokens.len();
        self.access_tokens.retain(|t| t.grantee != *grantee);
        if self.access_tokens.len() == before {
            return Err(DocumentError::AccessTokenNotFound(grantee.to_string()));
        }
        self.touch();
        Ok(())
    }

    /// Check that `requester` may fetch `document_id` with the token
    /// `token_id` embedded in this document.
    pub fn grantee_can_read(
        &self,
        token_id: &AccessTokenId,
        document_id: &DocumentId,
        requester: &AccountId,
        keys: &dyn KeyRegistry,
    ) -> Result<&AccessToken, DocumentError> {
        let token = self.access_token(token_id)?;
        if token.grantee != *requester {
            return Err(DocumentError::AccessDenied(requester.to_string()));
        }
        if !self.collaborators.can_read(&token.granter) {
            return Err(DocumentError::AccessDenied(token.granter.to_string()));
        }
        validate_token(token, document_id, keys)?;
        Ok(token)
    }

    // ── Trees and roots ─────────────────────────────────────────────────

    /// The tree over this envelope.
    pub fn core_tree(&self) -> Result<DocumentTree, DocumentError> {
        let root = paths::cd_root();
        let mut b = TreeBuilder::new(root.clone(), self.salt_seed);

        b.add(root.field(cd::DOCUMENT_IDENTIFIER, "document_identifier"), &self.document_id);
        b.add(root.field(cd::CURRENT_VERSION, "current_version"), &self.current_version);
        b.add(root.field(cd::NEXT_VERSION, "next_version"), &self.next_version);
        b.add(root.field(cd::PREVIOUS_VERSION, "previous_version"), &self.previous_version);
        b.add(root.field(cd::AUTHOR, "author"), &self.author);
        b.add(root.field(cd::TIMESTAMP, "timestamp"), &self.timestamp);
        b.add(root.field(cd::DOCUMENT_TYPE, "document_type"), self.scheme.as_str());

        let readers: Vec<AccountId> = self.collaborators.read_only().copied().collect();
        b.add_list(
            &root.field(cd::READ_COLLABORATORS, "read_collaborators"),
            &readers,
            |b, p, a| b.add(p, a),
        );
        let writers: Vec<AccountId> = self.collaborators.read_write().copied().collect();
        b.add_list(
            &root.field(cd::READ_WRITE_COLLABORATORS, "read_write_collaborators"),
            &writers,
            |b, p, a| b.add(p, a),
        );

        let roles = root.field(cd::ROLES, "roles");
        for (key, members) in &self.roles {
            let role = roles.key(key.as_bytes());
            b.add_list(
                &role.field(paths::role::COLLABORATORS, "collaborators"),
                members,
                |b, p, a| b.add(p, a),
            );
        }

        let rules = root.field(cd::TRANSITION_RULES, "transition_rules");
        for rule in self.transition_rules.values() {
            let r = rules.key(rule.rule_key.as_bytes());
            b.add_list(&r.field(paths::rule::ROLES, "roles"), &rule.roles, |b, p, k| {
                b.add(p, k)
            });
            b.add(r.field(paths::rule::MATCH_TYPE, "match_type"), rule.match_type.as_str());
            b.add(r.field(paths::rule::FIELD, "field"), &rule.field);
            b.add(r.field(paths::rule::ACTION, "action"), rule.action.as_str());
        }

        for nft in self.nfts.values() {
            let n = paths::nft_prefix(nft.registry.as_bytes());
            b.add(n.field(paths::nft::TOKEN_ID, "token_id"), &nft.token_id);
            b.add(n.field(paths::nft::GRANTS_READ, "grants_read"), &nft.grants_read);
        }

        let tokens = root.field(cd::ACCESS_TOKENS, "access_tokens");
        for token in &self.access_tokens {
            use paths::token as f;
            let t = tokens.key(token.identifier.as_bytes());
            b.add(t.field(f::GRANTER, "granter"), &token.granter);
            b.add(t.field(f::GRANTEE, "grantee"), &token.grantee);
            b.add(t.field(f::ROLE_IDENTIFIER, "role_identifier"), &token.role_identifier);
            b.add(
                t.field(f::DOCUMENT_IDENTIFIER, "document_identifier"),
                &token.document_identifier,
            );
            b.add(t.field(f::DOCUMENT_VERSION, "document_version"), &token.document_version);
            b.add(t.field(f::KEY, "key"), &token.key);
            b.add(t.field(f::SIGNATURE, "signature"), &token.signature);
        }

        for attr in self.attributes.values() {
            let a = paths::attribute_prefix(attr.key.as_bytes());
            b.add(a.field(paths::attribute::KEY_LABEL, "key_label"), &attr.key_label);
            b.add(a.field(paths::attribute::TYPE, "type"), attr.value_type.as_str());
            b.add(a.field(paths::attribute::VALUE, "value"), &attr.value.leaf_bytes());
        }

        b.build()
    }

    /// The tree over collected signatures.
    pub fn signatures_tree(&self) -> Result<DocumentTree, DocumentError> {
        use paths::signature as f;
        let root = paths::signatures_root();
        let mut b = TreeBuilder::new(root.clone(), self.salt_seed);
        b.add_list(
            &root.field(f::SIGNATURES, "signatures"),
            &self.signatures,
            |b, p, sig| {
                b.add(p.field(f::SIGNER_ID, "signer_id"), &sig.signer);
                b.add(p.field(f::PUBLIC_KEY, "public_key"), &sig.public_key);
                b.add(p.field(f::SIGNATURE, "signature"), &sig.signature);
            },
        );
        b.build()
    }

    pub(crate) fn signing_tree(&self, data_root: Hash32, cd_root: Hash32) -> Result<DocumentTree, DocumentError> {
        let root = paths::signing_root();
        let mut b = TreeBuilder::new(root.clone(), self.salt_seed);
        b.add_hashed(root.field(roots::DATA_ROOT, "data_root"), data_root);
        b.add_hashed(root.field(roots::CD_ROOT, "cd_root"), cd_root);
        b.build()
    }

    pub(crate) fn dr_tree(
        &self,
        signing_root: Hash32,
        signatures_root: Hash32,
    ) -> Result<DocumentTree, DocumentError> {
        let root = paths::dr_root();
        let mut b = TreeBuilder::new(root.clone(), self.salt_seed);
        b.add_hashed(root.field(roots::SIGNATURES_ROOT, "signatures_root"), signatures_root);
        b.add_hashed(root.field(roots::SIGNING_ROOT, "signing_root"), signing_root);
        b.build()
    }

    /// Compute the data root from the scheme's data tree.
    pub fn calculate_data_root(&mut self, data_tree: &DocumentTree) -> Result<Hash32, DocumentError> {
        if data_tree.name() != self.scheme.as_str() {
            return Err(DocumentError::DataTree(format!(
                "tree {} is not a {} data tree",
                data_tree.name(),
                self.scheme
            )));
        }
        let root = data_tree.root_hash();
        if self.roots.data != Some(root) {
            self.roots = RootCache {
                data: Some(root),
                ..RootCache::default()
            };
        }
        Ok(root)
    }

    /// Compute the signing root over the data root and this envelope.
    pub fn calculate_signing_root(&mut self) -> Result<Hash32, DocumentError> {
        let data_root = self.roots.data.ok_or(DocumentError::RootNotCalculated("data root"))?;
        let cd_root = self.core_tree()?.root_hash();
        let root = self.signing_tree(data_root, cd_root)?.root_hash();
        if self.roots.signing != Some(root) {
            self.roots.signing = Some(root);
            self.roots.document = None;
        }
        Ok(root)
    }

    /// Compute the document root over the signing root and signatures.
    ///
    /// # Errors
    ///
    /// `RootNotCalculated` without a signing root, `MissingSignature` unless
    /// the author has signed, `SignatureInvalid` if any signature is not
    /// over the current signing root.
    pub fn calculate_document_root(&mut self) -> Result<Hash32, DocumentError> {
        let signing_root = self
            .roots
            .signing
            .ok_or(DocumentError::RootNotCalculated("signing root"))?;
        if !self.signatures.iter().any(|s| s.signer == self.author) {
            return Err(DocumentError::MissingSignature(format!(
                "author {} has not signed",
                self.author
            )));
        }
        self.signatures
            .iter()
            .try_for_each(|s| s.verify(&signing_root))?;
        let signatures_root = self.signatures_tree()?.root_hash();
        let root = self.dr_tree(signing_root, signatures_root)?.root_hash();
        self.roots.document = Some(root);
        Ok(root)
    }

    /// Cached data root.
    pub fn data_root(&self) -> Result<Hash32, DocumentError> {
        self.roots.data.ok_or(DocumentError::RootNotCalculated("data root"))
    }

    /// Cached signing root.
    pub fn signing_root(&self) -> Result<Hash32, DocumentError> {
        self.roots.signing.ok_or(DocumentError::RootNotCalculated("signing root"))
    }

    /// Cached document root.
    pub fn document_root(&self) -> Result<Hash32, DocumentError> {
        self.roots
            .document
            .ok_or(DocumentError::RootNotCalculated("document root"))
    }

    /// Drop every cached root. Scheme adapters call this after changing
    /// their payload.
    pub fn invalidate_roots(&mut self) {
        self.roots = RootCache::default();
    }

    // ── Signatures ──────────────────────────────────────────────────────

    /// A signature over the current signing root, without storing it.
    pub fn create_signature(
        &self,
        account: AccountId,
        keys: &Ed25519KeyPair,
    ) -> Result<DocumentSignature, DocumentError> {
        self.ensure_pending("sign")?;
        let signing_root = self.signing_root()?;
        Ok(DocumentSignature::create(account, keys, &signing_root))
    }

    /// Sign the signing root and store the signature.
    pub fn sign(
        &mut self,
        account: AccountId,
        keys: &Ed25519KeyPair,
    ) -> Result<DocumentSignature, DocumentError> {
        let signature = self.create_signature(account, keys)?;
        self.append_signatures(vec![signature.clone()])?;
        Ok(signature)
    }

    /// Store signatures collected from other collaborators. A second
    /// signature by the same signer and key replaces the first.
    pub fn append_signatures(&mut self, signatures: Vec<DocumentSignature>) -> Result<(), DocumentError> {
        self.ensure_pending("append_signatures")?;
        for sig in signatures {
            self.signatures
                .retain(|s| !(s.signer == sig.signer && s.public_key == sig.public_key));
            self.signatures.push(sig);
        }
        self.signatures
            .sort_by(|a, b| (a.signer, a.public_key).cmp(&(b.signer, b.public_key)));
        self.roots.document = None;
        Ok(())
    }

    /// Verify every signature over the signing root, its key attribution
    /// and that its signer is a collaborator.
    pub fn verify_signatures(&self, keys: &dyn KeyRegistry) -> Result<(), DocumentError> {
        let signing_root = self.signing_root()?;
        for sig in &self.signatures {
            if !self.collaborators.can_read(&sig.signer) {
                return Err(DocumentError::SignatureInvalid(format!(
                    "signer {} is not a collaborator",
                    sig.signer
                )));
            }
            sig.verify(&signing_root)?;
            keys.validate_key(&sig.signer, &sig.public_key, KeyPurpose::Signing)?;
        }
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// `InvalidStatus` unless this version is still `Pending`.
    pub fn ensure_pending(&self, operation: &'static str) -> Result<(), DocumentError> {
        if self.status == Status::Pending {
            Ok(())
        } else {
            Err(DocumentError::InvalidStatus {
                status: self.status.to_string(),
                operation,
            })
        }
    }

    /// Every mutation makes the collected signatures stale.
    fn touch(&mut self) {
        self.invalidate_roots();
        self.signatures.clear();
    }
}

fn validate_attributes(document_id: &DocumentId, attributes: &[Attribute]) -> Result<(), DocumentError> {
    attributes.iter().try_for_each(|a| a.validate(document_id))
}

fn dedup_members(members: Vec<AccountId>) -> Result<Vec<AccountId>, DocumentError> {
    let mut out: Vec<AccountId> = Vec::with_capacity(members.len());
    for m in members {
        if !out.contains(&m) {
            out.push(m);
        }
    }
    if out.is_empty() {
        return Err(DocumentError::EmptyCollaborators);
    }
    Ok(out)
}

fn default_rule_key(field: &[u8]) -> RuleKey {
    RuleKey::from_bytes(*sha256_concat(&[DEFAULT_RULE_DOMAIN, field]).as_bytes())
}

fn is_default_rule(rule: &TransitionRule) -> bool {
    rule.match_type == MatchType::Exact && rule.rule_key == default_rule_key(&rule.field)
}
