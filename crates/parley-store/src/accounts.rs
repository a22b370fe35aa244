//! Known accounts, used to map account directories back to account ids.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use parley_shared::AccountId;

/// Snapshot provider of the accounts currently known to the process.
pub trait AccountSource: Send + Sync {
    fn accounts(&self) -> Vec<AccountId>;

    /// The unique known account whose directory name is `dirname`.
    fn resolve_dirname(&self, dirname: &str) -> Option<AccountId> {
        let mut matches = self
            .accounts()
            .into_iter()
            .filter(|account| account.dirname() == dirname);

        let first = matches.next()?;
        if let Some(other) = matches.next() {
            tracing::warn!(
                dirname,
                first = %first,
                other = %other,
                "Several accounts share one log directory, using the first"
            );
        }
        Some(first)
    }
}

/// Fixed list of accounts.
#[derive(Debug, Clone, Default)]
pub struct StaticAccounts(pub Vec<AccountId>);

impl AccountSource for StaticAccounts {
    fn accounts(&self) -> Vec<AccountId> {
        self.0.clone()
    }
}

/// Accounts learned at runtime.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: RwLock<BTreeSet<AccountId>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `account`. Returns `true` if it was not known before.
    pub fn insert(&self, account: AccountId) -> bool {
        self.accounts.write().insert(account)
    }

    pub fn remove(&self, account: &AccountId) -> bool {
        self.accounts.write().remove(account)
    }

    pub fn contains(&self, account: &AccountId) -> bool {
        self.accounts.read().contains(account)
    }
}

impl AccountSource for AccountRegistry {
    fn accounts(&self) -> Vec<AccountId> {
        self.accounts.read().iter().cloned().collect()
    }
}

impl FromIterator<AccountId> for AccountRegistry {
    fn from_iter<I: IntoIterator<Item = AccountId>>(iter: I) -> Self {
        Self {
            accounts: RwLock::new(iter.into_iter().collect()),
        }
    }
}
