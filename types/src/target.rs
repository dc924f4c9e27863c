use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Percentage of `vault_max` restored per regeneration pass.
pub const VAULT_REGEN_PERCENT: u64 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub crew_size: usize,
    pub success: u64,
    pub vault: u64,
    pub vault_max: u64,
}

impl Target {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.name.trim().is_empty() {
            return Err(GameError::precondition("Target name cannot be empty"));
        }
        if self.crew_size == 0 {
            return Err(GameError::precondition("Crew size must be at least 1"));
        }
        if self.success > 100 {
            return Err(GameError::precondition(
                "Success rate must be between 0 and 100",
            ));
        }
        if self.vault > self.vault_max {
            return Err(GameError::precondition(
                "Vault cannot hold more than its maximum",
            ));
        }
        Ok(())
    }

    /// Returns true if the vault changed.
    pub fn regenerate(&mut self) -> bool {
        let before = self.vault;
        let step = self.vault_max * VAULT_REGEN_PERCENT / 100;
        self.vault = self.vault.saturating_add(step).min(self.vault_max);
        self.vault != before
    }

    pub fn success_rate(&self, crew_len: usize) -> u64 {
        self.success + crew_bonus(crew_len, self.crew_size)
    }
}

/// Bonus success percentage for how full a crew is relative to the target.
pub fn crew_bonus(crew_len: usize, crew_size: usize) -> u64 {
    let fill = (100 * crew_len).checked_div(crew_size).unwrap_or(0);
    match fill {
        0..=20 => 0,
        21..=40 => 1,
        41..=60 => 3,
        61..=80 => 4,
        _ => 5,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetEdit {
    pub crew_size: Option<usize>,
    pub success: Option<u64>,
    pub vault: Option<u64>,
    pub vault_max: Option<u64>,
}

/// A guild's targets, keyed by name. Crew sizes are unique so selection by
/// smallest fitting crew size never ties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Targets(BTreeMap<String, Target>);

impl Targets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_list(targets: impl IntoIterator<Item = Target>) -> Result<Self, GameError> {
        let mut set = Self::new();
        for target in targets {
            set.add(target)?;
        }
        Ok(set)
    }

    pub fn add(&mut self, target: Target) -> Result<(), GameError> {
        target.validate()?;
        if self.0.contains_key(&target.name) {
            return Err(GameError::precondition(format!(
                "A target named {} already exists",
                target.name
            )));
        }
        self.check_crew_size_free(target.crew_size, None)?;
        self.0.insert(target.name.clone(), target);
        Ok(())
    }

    pub fn edit(&mut self, name: &str, edit: TargetEdit) -> Result<&Target, GameError> {
        let current = self
            .0
            .get(name)
            .ok_or_else(|| GameError::not_found("target", name))?;
        let updated = Target {
            name: current.name.clone(),
            crew_size: edit.crew_size.unwrap_or(current.crew_size),
            success: edit.success.unwrap_or(current.success),
            vault: edit.vault.unwrap_or(current.vault),
            vault_max: edit.vault_max.unwrap_or(current.vault_max),
        };
        updated.validate()?;
        self.check_crew_size_free(updated.crew_size, Some(name))?;
        let slot = self
            .0
            .get_mut(name)
            .ok_or_else(|| GameError::not_found("target", name))?;
        *slot = updated;
        Ok(slot)
    }

    pub fn remove(&mut self, name: &str) -> Result<Target, GameError> {
        self.0
            .remove(name)
            .ok_or_else(|| GameError::not_found("target", name))
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Ordered by crew size.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        let mut targets: Vec<_> = self.0.values().collect();
        targets.sort_by_key(|t| t.crew_size);
        targets.into_iter()
    }

    /// The target with the smallest crew size that still fits the crew.
    pub fn select_for_crew(&self, crew_len: usize) -> Option<&Target> {
        self.0
            .values()
            .filter(|t| t.crew_size >= crew_len)
            .min_by_key(|t| t.crew_size)
    }

    /// Takes `amount` out of the named target's vault, stopping at zero.
    /// Returns what is left.
    pub fn take_loot(&mut self, name: &str, amount: u64) -> Result<u64, GameError> {
        let target = self
            .0
            .get_mut(name)
            .ok_or_else(|| GameError::not_found("target", name))?;
        target.vault = target.vault.saturating_sub(amount);
        Ok(target.vault)
    }

    pub fn largest_crew(&self) -> usize {
        self.0.values().map(|t| t.crew_size).max().unwrap_or(0)
    }

    /// Returns the number of vaults that changed.
    pub fn regenerate(&mut self) -> usize {
        self.0
            .values_mut()
            .map(Target::regenerate)
            .filter(|&changed| changed)
            .count()
    }

    fn check_crew_size_free(&self, crew_size: usize, except: Option<&str>) -> Result<(), GameError> {
        let taken = self
            .0
            .values()
            .any(|t| t.crew_size == crew_size && Some(t.name.as_str()) != except);
        if taken {
            return Err(GameError::precondition(format!(
                "Another target already has a crew size of {crew_size}"
            )));
        }
        Ok(())
    }
}
