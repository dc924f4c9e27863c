use std::{collections::HashMap, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::{error::GameError, player::PlayerStatus, target::Target};

/// Narrative labels a theme substitutes into every heist message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    pub heist: String,
    pub crew: String,
    pub jail: String,
    pub bail: String,
    pub police: String,
    pub sentence: String,
    pub vault: String,
    pub oob: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            heist: "heist".to_string(),
            crew: "crew".to_string(),
            jail: "jail".to_string(),
            bail: "bail".to_string(),
            police: "police".to_string(),
            sentence: "sentence".to_string(),
            vault: "vault".to_string(),
            oob: "out on bail".to_string(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BadResult {
    Apprehended,
    Dead,
}

impl From<BadResult> for PlayerStatus {
    fn from(result: BadResult) -> Self {
        match result {
            BadResult::Apprehended => PlayerStatus::Apprehended,
            BadResult::Dead => PlayerStatus::Dead,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodMessage {
    pub message: String,
    pub bonus: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadMessage {
    pub message: String,
    pub result: BadResult,
}

/// One line of heist narration, drawn from either pool of a theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeistMessage {
    Good(GoodMessage),
    Bad(BadMessage),
}

impl HeistMessage {
    /// Templates carry a single `{}` placeholder for the member's name.
    pub fn render(&self, name: &str) -> String {
        let template = match self {
            HeistMessage::Good(good) => &good.message,
            HeistMessage::Bad(bad) => &bad.message,
        };
        template.replacen("{}", name, 1)
    }

    pub fn status(&self) -> PlayerStatus {
        match self {
            HeistMessage::Good(_) => PlayerStatus::Free,
            HeistMessage::Bad(bad) => bad.result.into(),
        }
    }

    pub fn bonus(&self) -> u64 {
        match self {
            HeistMessage::Good(good) => good.bonus,
            HeistMessage::Bad(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,
    #[serde(default)]
    pub labels: Labels,
    pub good: Vec<GoodMessage>,
    pub bad: Vec<BadMessage>,
}

impl Theme {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.good.is_empty() || self.bad.is_empty() {
            return Err(GameError::precondition(format!(
                "Theme {} needs at least one good and one bad message",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementClass {
    VeryFast,
    Fast,
    Slow,
    Steady,
    Aberrant,
    Predator,
    #[serde(other)]
    Special,
}

impl Display for MovementClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MovementClass::VeryFast => "veryfast",
            MovementClass::Fast => "fast",
            MovementClass::Slow => "slow",
            MovementClass::Steady => "steady",
            MovementClass::Aberrant => "aberrant",
            MovementClass::Predator => "predator",
            MovementClass::Special => "special",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub emoji: String,
    pub movement: MovementClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub id: String,
    pub beginning: String,
    pub ending: String,
    pub characters: Vec<Character>,
}

impl Mode {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.characters.is_empty() {
            return Err(GameError::precondition(format!(
                "Race mode {} has no characters",
                self.id
            )));
        }
        Ok(())
    }
}

/// Static data loaded once at startup. Target sets are templates: a guild
/// receives a copy of its theme's set when it is first created and owns the
/// copy from then on.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    themes: HashMap<String, Theme>,
    modes: HashMap<String, Mode>,
    targets: HashMap<String, Vec<Target>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_theme(&mut self, theme: Theme) -> Result<(), GameError> {
        theme.validate()?;
        self.themes.insert(theme.id.clone(), theme);
        Ok(())
    }

    pub fn add_mode(&mut self, mode: Mode) -> Result<(), GameError> {
        mode.validate()?;
        self.modes.insert(mode.id.clone(), mode);
        Ok(())
    }

    pub fn add_targets(&mut self, set_id: impl Into<String>, targets: Vec<Target>) {
        self.targets.insert(set_id.into(), targets);
    }

    pub fn theme(&self, id: &str) -> Result<&Theme, GameError> {
        self.themes
            .get(id)
            .ok_or_else(|| GameError::not_found("theme", id))
    }

    pub fn mode(&self, id: &str) -> Result<&Mode, GameError> {
        self.modes
            .get(id)
            .ok_or_else(|| GameError::not_found("mode", id))
    }

    pub fn target_set(&self, id: &str) -> Result<&[Target], GameError> {
        self.targets
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| GameError::not_found("target set", id))
    }

    pub fn theme_ids(&self) -> impl Iterator<Item = &str> {
        self.themes.keys().map(String::as_str)
    }

    pub fn mode_ids(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ids_are_not_found() {
        let catalog = Catalog::new();
        assert_eq!(
            catalog.theme("heist").unwrap_err(),
            GameError::not_found("theme", "heist")
        );
        assert!(catalog.mode("clash").is_err());
        assert!(catalog.target_set("heist").is_err());
    }

    #[test]
    fn themes_need_both_pools() {
        let mut catalog = Catalog::new();
        let theme = Theme {
            id: "empty".to_string(),
            labels: Labels::default(),
            good: vec![],
            bad: vec![],
        };
        assert!(catalog.add_theme(theme).is_err());
        assert_eq!(catalog.theme_ids().count(), 0);
    }

    #[test]
    fn unknown_movement_classes_fall_back_to_special() {
        let character: Character =
            serde_json::from_str(r#"{"emoji": "🐉", "movement": "teleport"}"#).unwrap();
        assert_eq!(character.movement, MovementClass::Special);
        let character: Character =
            serde_json::from_str(r#"{"emoji": "🐇", "movement": "veryfast"}"#).unwrap();
        assert_eq!(character.movement, MovementClass::VeryFast);
    }

    #[test]
    fn messages_render_member_names() {
        let good = HeistMessage::Good(GoodMessage {
            message: "{} slipped past the guards".to_string(),
            bonus: 50,
        });
        assert_eq!(good.render("Ana"), "Ana slipped past the guards");
        assert_eq!(good.status(), PlayerStatus::Free);
        assert_eq!(good.bonus(), 50);

        let bad = HeistMessage::Bad(BadMessage {
            message: "{} tripped the alarm".to_string(),
            result: BadResult::Dead,
        });
        assert_eq!(bad.status(), PlayerStatus::Dead);
        assert_eq!(bad.bonus(), 0);
    }
}
