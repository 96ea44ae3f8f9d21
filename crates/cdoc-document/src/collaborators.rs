//! Read-only and read-write collaborator sets.

use std::collections::BTreeSet;

use cdoc_core::AccountId;
use serde::{Deserialize, Serialize};

/// Collaborator changes requested by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorsAccess {
    /// Accounts to add as readers.
    #[serde(default)]
    pub read: Vec<AccountId>,
    /// Accounts to add as writers.
    #[serde(default)]
    pub read_write: Vec<AccountId>,
}

impl CollaboratorsAccess {
    /// Readers only.
    pub fn read(accounts: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            read: accounts.into_iter().collect(),
            read_write: Vec::new(),
        }
    }

    /// Writers only.
    pub fn read_write(accounts: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            read: Vec::new(),
            read_write: accounts.into_iter().collect(),
        }
    }
}

/// The two disjoint collaborator sets of a document.
///
/// A read-write collaborator is implicitly a reader and is never also listed
/// in `read`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborators {
    read: BTreeSet<AccountId>,
    read_write: BTreeSet<AccountId>,
}

impl Collaborators {
    /// Build from a request, deduplicating and keeping the sets disjoint.
    pub fn from_access(access: &CollaboratorsAccess) -> Self {
        let mut out = Self::default();
        out.merge(access);
        out
    }

    /// Add collaborators. Writers upgrade existing readers; readers that are
    /// already writers are left as writers. Nobody is removed.
    pub fn merge(&mut self, access: &CollaboratorsAccess) {
        for account in &access.read_write {
            self.read.remove(account);
            self.read_write.insert(*account);
        }
        for account in &access.read {
            if !self.read_write.contains(account) {
                self.read.insert(*account);
            }
        }
    }

    /// Remove accounts from both sets; returns how many were removed.
    pub fn remove(&mut self, accounts: &[AccountId]) -> usize {
        accounts
            .iter()
            .filter(|a| {
                let r = self.read.remove(a);
                let w = self.read_write.remove(a);
                r || w
            })
            .count()
    }

    /// Read-only collaborators.
    pub fn read_only(&self) -> impl Iterator<Item = &AccountId> {
        self.read.iter()
    }

    /// Read-write collaborators.
    pub fn read_write(&self) -> impl Iterator<Item = &AccountId> {
        self.read_write.iter()
    }

    /// Every collaborator.
    pub fn all(&self) -> impl Iterator<Item = &AccountId> {
        self.read_write.iter().chain(self.read.iter())
    }

    /// True for writers.
    pub fn can_write(&self, account: &AccountId) -> bool {
        self.read_write.contains(account)
    }

    /// True for readers and writers.
    pub fn can_read(&self, account: &AccountId) -> bool {
        self.read_write.contains(account) || self.read.contains(account)
    }

    /// Number of collaborators.
    pub fn len(&self) -> usize {
        self.read.len() + self.read_write.len()
    }

    /// True if there are no collaborators.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(b: u8) -> AccountId {
        AccountId::from_bytes([b; 32])
    }

    #[test]
    fn test_writer_wins_over_reader() {
        let c = Collaborators::from_access(&CollaboratorsAccess {
            read: vec![acct(1), acct(2), acct(2)],
            read_write: vec![acct(2), acct(3)],
        });
        assert_eq!(c.read_only().copied().collect::<Vec<_>>(), vec![acct(1)]);
        assert_eq!(c.read_write().copied().collect::<Vec<_>>(), vec![acct(2), acct(3)]);
        assert!(c.can_read(&acct(3)));
        assert!(!c.can_write(&acct(1)));
    }

    #[test]
    fn test_merge_is_additive() {
        let mut c = Collaborators::from_access(&CollaboratorsAccess::read_write([acct(1)]));
        c.merge(&CollaboratorsAccess::read([acct(1), acct(4)]));
        assert!(c.can_write(&acct(1)));
        assert!(c.can_read(&acct(4)));
        c.merge(&CollaboratorsAccess::read_write([acct(4)]));
        assert!(c.can_write(&acct(4)));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut c = Collaborators::from_access(&CollaboratorsAccess {
            read: vec![acct(1)],
            read_write: vec![acct(2)],
        });
        assert_eq!(c.remove(&[acct(1), acct(9)]), 1);
        assert!(!c.can_read(&acct(1)));
        assert!(c.can_read(&acct(2)));
    }
}
