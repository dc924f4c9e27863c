use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Upper bound on racers: one bet button per racer, `race_bet_1..=11`.
pub const MAX_RACERS: usize = 11;
pub const MIN_RACERS: usize = 2;

/// Per-guild knobs for both games. Durations are stored as whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildConfig {
    pub bail_base: u64,
    #[serde(with = "crate::serde_secs")]
    pub death_timer: Duration,
    pub hardcore: bool,
    pub heist_cost: u64,
    #[serde(with = "crate::serde_secs")]
    pub police_alert: Duration,
    #[serde(with = "crate::serde_secs")]
    pub sentence_base: Duration,
    pub theme: String,
    #[serde(with = "crate::serde_secs")]
    pub wait_time: Duration,
    /// The police stay alert until this instant; no heist may be planned before it.
    pub alert_time: Option<DateTime<Utc>>,

    pub bet_amount: u64,
    pub currency: String,
    pub mode: String,
    pub prize_min: u64,
    pub prize_max: u64,
    pub min_racers: usize,
    pub max_racers: usize,
    #[serde(with = "crate::serde_secs")]
    pub wait_for_join: Duration,
    #[serde(with = "crate::serde_secs")]
    pub wait_for_betting: Duration,
    #[serde(with = "crate::serde_secs")]
    pub wait_between_races: Duration,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            bail_base: 250,
            death_timer: Duration::from_secs(45 * 60),
            hardcore: false,
            heist_cost: 1500,
            police_alert: Duration::from_secs(60),
            sentence_base: Duration::from_secs(5 * 60),
            theme: "heist".to_string(),
            wait_time: Duration::from_secs(60),
            alert_time: None,

            bet_amount: 100,
            currency: crate::economy::DEFAULT_CURRENCY.to_string(),
            mode: "clash".to_string(),
            prize_min: 750,
            prize_max: 1250,
            min_racers: MIN_RACERS,
            max_racers: 10,
            wait_for_join: Duration::from_secs(30),
            wait_for_betting: Duration::from_secs(30),
            wait_between_races: Duration::from_secs(60),
        }
    }
}

impl GuildConfig {
    pub fn with_catalog_defaults(theme: &str, mode: &str) -> Self {
        Self {
            theme: theme.to_string(),
            mode: mode.to_string(),
            ..Default::default()
        }
    }

    pub fn police_alerted(&self, now: DateTime<Utc>) -> bool {
        self.alert_time.is_some_and(|until| now < until)
    }

    pub fn set_prize_range(&mut self, min: u64, max: u64) -> Result<(), GameError> {
        if min == 0 || min >= max {
            return Err(GameError::precondition(
                "The minimum prize must be positive and below the maximum prize",
            ));
        }
        self.prize_min = min;
        self.prize_max = max;
        Ok(())
    }

    pub fn set_racer_bounds(&mut self, min: usize, max: usize) -> Result<(), GameError> {
        if min < MIN_RACERS || max > MAX_RACERS || min > max {
            return Err(GameError::precondition(format!(
                "Racer limits must satisfy {MIN_RACERS} <= min <= max <= {MAX_RACERS}"
            )));
        }
        self.min_racers = min;
        self.max_racers = max;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_serialize_as_seconds() {
        let config = GuildConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["wait_time"], 60);
        assert_eq!(json["death_timer"], 2700);

        let parsed: GuildConfig =
            serde_json::from_str(r#"{"wait_time": 5, "theme": "pirates"}"#).unwrap();
        assert_eq!(parsed.wait_time, Duration::from_secs(5));
        assert_eq!(parsed.theme, "pirates");
        assert_eq!(parsed.heist_cost, GuildConfig::default().heist_cost);
    }

    #[test]
    fn racer_bounds_are_validated() {
        let mut config = GuildConfig::default();
        assert!(config.set_racer_bounds(1, 4).is_err());
        assert!(config.set_racer_bounds(3, 12).is_err());
        assert!(config.set_racer_bounds(5, 4).is_err());
        config.set_racer_bounds(3, 11).unwrap();
        assert_eq!((config.min_racers, config.max_racers), (3, 11));
    }

    #[test]
    fn prize_range_is_half_open() {
        let mut config = GuildConfig::default();
        assert!(config.set_prize_range(100, 100).is_err());
        config.set_prize_range(100, 101).unwrap();
    }

    #[test]
    fn police_alert_expires() {
        let now = Utc::now();
        let mut config = GuildConfig::default();
        assert!(!config.police_alerted(now));
        config.alert_time = Some(crate::clock::after(now, Duration::from_secs(60)));
        assert!(config.police_alerted(now));
        assert!(!config.police_alerted(crate::clock::after(now, Duration::from_secs(60))));
    }
}
