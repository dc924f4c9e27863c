use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{error::LedgerError, GuildId, PlayerId};

pub const DEFAULT_BANK_NAME: &str = "Bank of Larceny";
pub const DEFAULT_CURRENCY: &str = "credits";
pub const DEFAULT_OPENING_BALANCE: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub player_id: PlayerId,
    pub name: String,
    pub balance: u64,
    pub created_at: DateTime<Utc>,
}

/// Per-guild bank. Balances are only changed through the methods below, so a
/// balance can never go negative and a failed operation never leaves a
/// partial update behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub guild_id: GuildId,
    pub bank_name: String,
    pub currency: String,
    pub default_balance: u64,
    accounts: BTreeMap<PlayerId, Account>,
}

impl Ledger {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            bank_name: DEFAULT_BANK_NAME.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            default_balance: DEFAULT_OPENING_BALANCE,
            accounts: BTreeMap::new(),
        }
    }

    pub fn get_or_create(&mut self, player_id: PlayerId, name: &str, now: DateTime<Utc>) -> &Account {
        let default_balance = self.default_balance;
        let account = self.accounts.entry(player_id).or_insert_with(|| {
            log::info!("Opening account for {name} ({player_id}) with {default_balance}");
            Account {
                player_id,
                name: name.to_string(),
                balance: default_balance,
                created_at: now,
            }
        });
        if account.name != name {
            account.name = name.to_string();
        }
        account
    }

    pub fn account(&self, player_id: PlayerId) -> Option<&Account> {
        self.accounts.get(&player_id)
    }

    pub fn balance(&self, player_id: PlayerId) -> Result<u64, LedgerError> {
        self.account(player_id)
            .map(|account| account.balance)
            .ok_or(LedgerError::NoAccount(player_id))
    }

    pub fn can_cover(&self, player_id: PlayerId, amount: u64) -> Result<(), LedgerError> {
        let available = self.balance(player_id)?;
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    /// Returns the new balance.
    pub fn deposit(&mut self, player_id: PlayerId, amount: u64) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let account = self.account_mut(player_id)?;
        account.balance = account.balance.saturating_add(amount);
        Ok(account.balance)
    }

    /// Returns the new balance.
    pub fn withdraw(&mut self, player_id: PlayerId, amount: u64) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        self.can_cover(player_id, amount)?;
        let account = self.account_mut(player_id)?;
        account.balance -= amount;
        Ok(account.balance)
    }

    pub fn transfer(&mut self, from: PlayerId, to: PlayerId, amount: u64) -> Result<(), LedgerError> {
        if from == to {
            return Err(LedgerError::SameAccount);
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        // validate both sides before touching either balance
        if !self.accounts.contains_key(&to) {
            return Err(LedgerError::NoAccount(to));
        }
        self.can_cover(from, amount)?;

        self.account_mut(from)?.balance -= amount;
        let receiver = self.account_mut(to)?;
        receiver.balance = receiver.balance.saturating_add(amount);
        Ok(())
    }

    pub fn set_balance(&mut self, player_id: PlayerId, amount: u64) -> Result<(), LedgerError> {
        self.account_mut(player_id)?.balance = amount;
        Ok(())
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Richest first; ties are broken by player id so the projection is stable.
    pub fn leaderboard(&self, limit: usize) -> Vec<&Account> {
        self.accounts
            .values()
            .sorted_by(|a, b| b.balance.cmp(&a.balance).then(a.player_id.cmp(&b.player_id)))
            .take(limit)
            .collect()
    }

    fn account_mut(&mut self, player_id: PlayerId) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(&player_id)
            .ok_or(LedgerError::NoAccount(player_id))
    }
}
