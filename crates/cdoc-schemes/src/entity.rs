//! # Entity Scheme
//!
//! Master data of a legal entity: identity, legal name, addresses, payment
//! details and contacts. Leaves live under `entity` (`00030000`).
//!
//! ## Payment details
//!
//! Each payment detail carries exactly one method (bank, crypto or other).
//! The wire form keeps the three optional fields for compatibility with
//! existing payloads; [`PaymentMethod`] makes the "exactly one" rule a type.

use cdoc_core::AccountId;
use cdoc_document::{
    Attribute, CollaboratorsAccess, CoreDocument, Document, DocumentError, DocumentTree, FieldPath,
    PackedDocument, Scheme, TreeBuilder,
};
use serde::{Deserialize, Serialize};

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub is_main: bool,
    pub is_remit_to: bool,
    pub is_ship_to: bool,
    pub is_pay_to: bool,
    pub label: String,
    pub zip: String,
    pub state: String,
    pub country: String,
    pub address_line_1: String,
    pub address_line_2: String,
    pub contact_person: String,
}

/// Bank account details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankPaymentMethod {
    #[serde(with = "cdoc_core::serde_hex")]
    pub identifier: Vec<u8>,
    pub address: Address,
    pub holder_name: String,
    pub bank_key: String,
    pub bank_account_number: String,
    pub supported_currency: String,
}

/// On-chain payment details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoPaymentMethod {
    #[serde(with = "cdoc_core::serde_hex")]
    pub identifier: Vec<u8>,
    pub to: String,
    pub chain_uri: String,
    pub supported_currency: String,
}

/// Any other payment method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtherPaymentMethod {
    #[serde(with = "cdoc_core::serde_hex")]
    pub identifier: Vec<u8>,
    #[serde(rename = "type")]
    pub method_type: String,
    pub pay_to: String,
    pub supported_currency: String,
}

/// The single method of a payment detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    Bank(BankPaymentMethod),
    Crypto(CryptoPaymentMethod),
    Other(OtherPaymentMethod),
}

/// How the entity receives payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPaymentDetail", into = "RawPaymentDetail")]
pub struct PaymentDetail {
    /// Default payment detail.
    pub predefined: bool,
    /// The method.
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawPaymentDetail {
    predefined: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bank_payment_method: Option<BankPaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crypto_payment_method: Option<CryptoPaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    other_payment_method: Option<OtherPaymentMethod>,
}

impl TryFrom<RawPaymentDetail> for PaymentDetail {
    type Error = String;

    fn try_from(raw: RawPaymentDetail) -> Result<Self, Self::Error> {
        let method = match (
            raw.bank_payment_method,
            raw.crypto_payment_method,
            raw.other_payment_method,
        ) {
            (Some(bank), None, None) => PaymentMethod::Bank(bank),
            (None, Some(crypto), None) => PaymentMethod::Crypto(crypto),
            (None, None, Some(other)) => PaymentMethod::Other(other),
            (None, None, None) => return Err("no payment method set".into()),
            _ => return Err("multiple payment methods set".into()),
        };
        Ok(Self {
            predefined: raw.predefined,
            method,
        })
    }
}

impl From<PaymentDetail> for RawPaymentDetail {
    fn from(detail: PaymentDetail) -> Self {
        let mut raw = RawPaymentDetail {
            predefined: detail.predefined,
            ..Default::default()
        };
        match detail.method {
            PaymentMethod::Bank(m) => raw.bank_payment_method = Some(m),
            PaymentMethod::Crypto(m) => raw.crypto_payment_method = Some(m),
            PaymentMethod::Other(m) => raw.other_payment_method = Some(m),
        }
        raw
    }
}

/// A contact person.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub fax: String,
}

/// Entity payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityData {
    pub identity: Option<AccountId>,
    pub legal_name: String,
    pub addresses: Vec<Address>,
    pub payment_details: Vec<PaymentDetail>,
    pub contacts: Vec<Contact>,
}

impl EntityData {
    /// Decode a JSON payload.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, DocumentError> {
        serde_json::from_value(value.clone())
            .map_err(|e| DocumentError::InvalidPayload(format!("entity: {e}")))
    }

    /// A copy with the top-level fields present in `patch` replaced.
    pub fn merged(&self, patch: &serde_json::Value) -> Result<Self, DocumentError> {
        let patch = patch
            .as_object()
            .ok_or_else(|| DocumentError::InvalidPayload("entity patch must be an object".into()))?;
        let mut current = serde_json::to_value(self)?;
        if let Some(fields) = current.as_object_mut() {
            for (k, v) in patch {
                fields.insert(k.clone(), v.clone());
            }
        }
        Self::from_value(&current)
    }

    fn add_leaves(&self, b: &mut TreeBuilder) {
        let root = b.root().clone();
        b.add(root.field(1, "identity"), &self.identity);
        b.add(root.field(2, "legal_name"), &self.legal_name);
        b.add_list(&root.field(3, "addresses"), &self.addresses, add_address);
        b.add_list(
            &root.field(4, "payment_details"),
            &self.payment_details,
            |b, p, detail| {
                b.add(p.field(1, "predefined"), &detail.predefined);
                match &detail.method {
                    PaymentMethod::Bank(m) => {
                        let p = p.field(2, "bank_payment_method");
                        b.add(p.field(1, "identifier"), &m.identifier);
                        add_address(b, p.field(2, "address"), &m.address);
                        b.add(p.field(3, "holder_name"), &m.holder_name);
                        b.add(p.field(4, "bank_key"), &m.bank_key);
                        b.add(p.field(5, "bank_account_number"), &m.bank_account_number);
                        b.add(p.field(6, "supported_currency"), &m.supported_currency);
                    }
                    PaymentMethod::Crypto(m) => {
                        let p = p.field(3, "crypto_payment_method");
                        b.add(p.field(1, "identifier"), &m.identifier);
                        b.add(p.field(2, "to"), &m.to);
                        b.add(p.field(3, "chain_uri"), &m.chain_uri);
                        b.add(p.field(4, "supported_currency"), &m.supported_currency);
                    }
                    PaymentMethod::Other(m) => {
                        let p = p.field(4, "other_payment_method");
                        b.add(p.field(1, "identifier"), &m.identifier);
                        b.add(p.field(2, "type"), &m.method_type);
                        b.add(p.field(3, "pay_to"), &m.pay_to);
                        b.add(p.field(4, "supported_currency"), &m.supported_currency);
                    }
                }
            },
        );
        b.add_list(&root.field(5, "contacts"), &self.contacts, |b, p, c| {
            b.add(p.field(1, "name"), &c.name);
            b.add(p.field(2, "title"), &c.title);
            b.add(p.field(3, "email"), &c.email);
            b.add(p.field(4, "phone"), &c.phone);
            b.add(p.field(5, "fax"), &c.fax);
        });
    }
}

fn add_address(b: &mut TreeBuilder, p: FieldPath, a: &Address) {
    b.add(p.field(1, "is_main"), &a.is_main);
    b.add(p.field(2, "is_remit_to"), &a.is_remit_to);
    b.add(p.field(3, "is_ship_to"), &a.is_ship_to);
    b.add(p.field(4, "is_pay_to"), &a.is_pay_to);
    b.add(p.field(5, "label"), &a.label);
    b.add(p.field(6, "zip"), &a.zip);
    b.add(p.field(7, "state"), &a.state);
    b.add(p.field(8, "country"), &a.country);
    b.add(p.field(9, "address_line_1"), &a.address_line_1);
    b.add(p.field(10, "address_line_2"), &a.address_line_2);
    b.add(p.field(11, "contact_person"), &a.contact_person);
}

/// An entity document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    core: CoreDocument,
    data: EntityData,
}

impl Entity {
    /// Create version 1.
    pub fn create(
        author: AccountId,
        data: EntityData,
        access: &CollaboratorsAccess,
        attributes: Vec<Attribute>,
    ) -> Result<Self, DocumentError> {
        let core = CoreDocument::new(Scheme::Entity, None, author, access, attributes)?;
        Ok(Self { core, data })
    }

    /// Create version 1 from a JSON payload.
    pub fn from_payload(
        author: AccountId,
        payload: &serde_json::Value,
        access: &CollaboratorsAccess,
        attributes: Vec<Attribute>,
    ) -> Result<Self, DocumentError> {
        Self::create(author, EntityData::from_value(payload)?, access, attributes)
    }

    /// Derive the next version with `patch` merged into the data.
    pub fn derive_update(
        &self,
        author: AccountId,
        patch: &serde_json::Value,
        access: &CollaboratorsAccess,
        attributes: Vec<Attribute>,
    ) -> Result<Self, DocumentError> {
        let data = self.data.merged(patch)?;
        let core = self.core.prepare_new_version(author, access, attributes)?;
        Ok(Self { core, data })
    }

    /// Merge `patch` into this pending version.
    pub fn patch(
        &mut self,
        patch: &serde_json::Value,
        access: &CollaboratorsAccess,
        attributes: Vec<Attribute>,
    ) -> Result<(), DocumentError> {
        let data = self.data.merged(patch)?;
        self.core.patch(access, attributes)?;
        self.data = data;
        Ok(())
    }

    /// Rebuild from the stored form.
    pub fn from_packed(packed: PackedDocument) -> Result<Self, DocumentError> {
        let (core, payload) = packed.unpack_core(Scheme::Entity)?;
        Ok(Self {
            core,
            data: EntityData::from_value(&payload)?,
        })
    }

    /// Entity payload.
    pub fn data(&self) -> &EntityData {
        &self.data
    }
}

impl Document for Entity {
    fn scheme(&self) -> Scheme {
        Scheme::Entity
    }

    fn core(&self) -> &CoreDocument {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CoreDocument {
        &mut self.core
    }

    fn data_tree(&self) -> Result<DocumentTree, DocumentError> {
        let mut b = self.core.data_tree_builder();
        self.data.add_leaves(&mut b);
        b.build()
    }

    fn payload(&self) -> Result<serde_json::Value, DocumentError> {
        Ok(serde_json::to_value(&self.data)?)
    }
}
