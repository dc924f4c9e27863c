use std::{fmt::Display, str::FromStr};

use crate::StoreError;

/// Top-level document collections. `Reminder` is reserved for a reminder
/// subsystem and is never written by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Heist,
    Race,
    Economy,
    Theme,
    Target,
    Mode,
    Reminder,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Heist,
        Collection::Race,
        Collection::Economy,
        Collection::Theme,
        Collection::Target,
        Collection::Mode,
        Collection::Reminder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Heist => "heist",
            Collection::Race => "race",
            Collection::Economy => "economy",
            Collection::Theme => "theme",
            Collection::Target => "target",
            Collection::Mode => "mode",
            Collection::Reminder => "reminder",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StoreError::UnknownLocation(format!("collection {s}")))
    }
}

/// Ids end up as file names and table keys.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(collection.as_str().parse::<Collection>().unwrap(), collection);
        }
        assert!("players".parse::<Collection>().is_err());
    }

    #[test]
    fn ids_are_path_safe() {
        assert!(validate_id("123456789").is_ok());
        assert!(validate_id("heist_default-2").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("../etc").is_err());
        assert!(validate_id("a b").is_err());
    }
}
