use std::time::Duration;

use regex::{Captures, Regex};
use types::{config::MAX_RACERS, GameError, Target, TargetEdit};

use crate::{
    admin::{HeistSetting, RaceSetting},
    transport::Actor,
};

pub const JOIN_HEIST: &str = "join_heist";
pub const LEAVE_HEIST: &str = "leave_heist";
pub const CANCEL_HEIST: &str = "cancel_heist";
pub const JOIN_RACE: &str = "join_race";
pub const RACE_BET_PREFIX: &str = "race_bet_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PlanHeist,
    JoinHeist,
    LeaveHeist,
    CancelHeist,
    Bail { target: Option<Actor> },
    Release,
    Revive,
    PlayerInfo { target: Option<Actor> },
    Targets,
    ResetHeist,
    AddTarget(Target),
    EditTarget { name: String, edit: TargetEdit },
    RemoveTarget { name: String },
    SetHeist(HeistSetting),
    ClearPlayer { target: Actor },
    Race,
    JoinRace,
    /// Index into the race's racers, 0-based.
    Bet { racer: usize },
    ResetRace,
    SetRace(RaceSetting),
    RaceStats { target: Option<Actor> },
    Balance,
    Transfer { to: Actor, amount: u64 },
    SetBalance { target: Actor, amount: u64 },
    Leaderboard { limit: usize },
}

pub fn race_bet_button(racer: usize) -> String {
    format!("{RACE_BET_PREFIX}{}", racer + 1)
}

type Lookup<'a> = &'a dyn Fn(&str) -> Actor;
type RuleFn = for<'a, 'b, 'c> fn(&'a Captures<'b>, Lookup<'c>) -> Result<Command, GameError>;

impl Command {
    /// Maps a button custom id to the command it triggers.
    pub fn from_button(id: &str) -> Result<Command, GameError> {
        match id {
            JOIN_HEIST => Ok(Command::JoinHeist),
            LEAVE_HEIST => Ok(Command::LeaveHeist),
            CANCEL_HEIST => Ok(Command::CancelHeist),
            JOIN_RACE => Ok(Command::JoinRace),
            _ => {
                let slot = id
                    .strip_prefix(RACE_BET_PREFIX)
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| (1..=MAX_RACERS).contains(n))
                    .ok_or_else(|| GameError::not_found("button", id))?;
                Ok(Command::Bet { racer: slot - 1 })
            }
        }
    }

    /// Parses a console command such as `bail alice` or `race-set prize 500 900`.
    /// `lookup` turns a player name into an actor.
    pub fn parse(input: &str, lookup: Lookup) -> Result<Command, GameError> {
        let input = input.trim();
        let rules: [(&str, RuleFn); 14] = [
            (r"^click (?<button>\S+)$", |caps, _| Command::from_button(&caps["button"])),
            (r"^(?<word>plan|heist|join|leave|cancel|release|revive|targets|reset-heist|race|join-race|reset-race|balance)$", simple),
            (r"^(?<verb>bail|info|stats)(?: (?<name>\S+))?$", about_player),
            (r"^bet (?<n>\d+)$", |caps, _| {
                let slot = number::<usize>(&caps["n"])?;
                Command::from_button(&format!("{RACE_BET_PREFIX}{slot}"))
            }),
            (r"^clear (?<name>\S+)$", |caps, lookup| {
                Ok(Command::ClearPlayer {
                    target: lookup(&caps["name"]),
                })
            }),
            (r"^transfer (?<name>\S+) (?<amount>\d+)$", |caps, lookup| {
                Ok(Command::Transfer {
                    to: lookup(&caps["name"]),
                    amount: number(&caps["amount"])?,
                })
            }),
            (r"^set-balance (?<name>\S+) (?<amount>\d+)$", |caps, lookup| {
                Ok(Command::SetBalance {
                    target: lookup(&caps["name"]),
                    amount: number(&caps["amount"])?,
                })
            }),
            (r"^leaderboard(?: (?<n>\d+))?$", |caps, _| {
                let limit = match caps.name("n") {
                    Some(n) => number(n.as_str())?,
                    None => 10,
                };
                Ok(Command::Leaderboard { limit })
            }),
            (
                r#"^add-target "(?<name>[^"]+)" (?<crew>\d+) (?<success>\d+) (?<vault>\d+) (?<max>\d+)$"#,
                |caps, _| {
                    Ok(Command::AddTarget(Target {
                        name: caps["name"].to_string(),
                        crew_size: number(&caps["crew"])?,
                        success: number(&caps["success"])?,
                        vault: number(&caps["vault"])?,
                        vault_max: number(&caps["max"])?,
                    }))
                },
            ),
            (r#"^edit-target "(?<name>[^"]+)" (?<fields>.+)$"#, edit_target),
            (r#"^remove-target "(?<name>[^"]+)"$"#, |caps, _| {
                Ok(Command::RemoveTarget {
                    name: caps["name"].to_string(),
                })
            }),
            (r"^set (?<knob>\S+) (?<value>\S+)$", heist_setting),
            (r"^race-set (?<knob>prize|racers) (?<min>\d+) (?<max>\d+)$", |caps, _| {
                let (min, max) = (&caps["min"], &caps["max"]);
                Ok(Command::SetRace(match &caps["knob"] {
                    "prize" => RaceSetting::Prize {
                        min: number(min)?,
                        max: number(max)?,
                    },
                    _ => RaceSetting::Racers {
                        min: number(min)?,
                        max: number(max)?,
                    },
                }))
            }),
            (r"^race-set (?<knob>\S+) (?<value>\S+)$", race_setting),
        ];

        for (pattern, rule) in rules {
            let re = Regex::new(pattern).map_err(|e| GameError::Internal(e.to_string()))?;
            if let Some(caps) = re.captures(input) {
                log::debug!("Captured: {caps:?}");
                return rule(&caps, lookup);
            }
        }
        Err(GameError::not_found("command", input))
    }
}

fn simple(caps: &Captures, _lookup: Lookup) -> Result<Command, GameError> {
    Ok(match &caps["word"] {
        "plan" | "heist" => Command::PlanHeist,
        "join" => Command::JoinHeist,
        "leave" => Command::LeaveHeist,
        "cancel" => Command::CancelHeist,
        "release" => Command::Release,
        "revive" => Command::Revive,
        "targets" => Command::Targets,
        "reset-heist" => Command::ResetHeist,
        "race" => Command::Race,
        "join-race" => Command::JoinRace,
        "reset-race" => Command::ResetRace,
        "balance" => Command::Balance,
        other => return Err(GameError::Internal(format!("no command for the word {other}"))),
    })
}

fn about_player(caps: &Captures, lookup: Lookup) -> Result<Command, GameError> {
    let target = caps.name("name").map(|name| lookup(name.as_str()));
    Ok(match &caps["verb"] {
        "bail" => Command::Bail { target },
        "info" => Command::PlayerInfo { target },
        _ => Command::RaceStats { target },
    })
}

fn edit_target(caps: &Captures, _lookup: Lookup) -> Result<Command, GameError> {
    let mut edit = TargetEdit::default();
    for pair in caps["fields"].split_whitespace() {
        let (field, value) = pair
            .split_once('=')
            .ok_or_else(|| GameError::precondition(format!("Expected field=value, got {pair}")))?;
        match field {
            "crew" => edit.crew_size = Some(number(value)?),
            "success" => edit.success = Some(number(value)?),
            "vault" => edit.vault = Some(number(value)?),
            "max" => edit.vault_max = Some(number(value)?),
            _ => return Err(GameError::not_found("target field", field)),
        }
    }
    Ok(Command::EditTarget {
        name: caps["name"].to_string(),
        edit,
    })
}

fn heist_setting(caps: &Captures, _lookup: Lookup) -> Result<Command, GameError> {
    let value = &caps["value"];
    let setting = match &caps["knob"] {
        "bail" => HeistSetting::Bail(number(value)?),
        "cost" => HeistSetting::Cost(number(value)?),
        "death" => HeistSetting::Death(seconds(value)?),
        "hardcore" => HeistSetting::Hardcore(matches!(value, "on" | "true" | "yes")),
        "police" => HeistSetting::Police(seconds(value)?),
        "sentence" => HeistSetting::Sentence(seconds(value)?),
        "theme" => HeistSetting::Theme(value.to_string()),
        "wait" => HeistSetting::Wait(seconds(value)?),
        knob => return Err(GameError::not_found("heist setting", knob)),
    };
    Ok(Command::SetHeist(setting))
}

fn race_setting(caps: &Captures, _lookup: Lookup) -> Result<Command, GameError> {
    let value = &caps["value"];
    let setting = match &caps["knob"] {
        "bet" => RaceSetting::Bet(number(value)?),
        "join" => RaceSetting::JoinWait(seconds(value)?),
        "betting" => RaceSetting::BetWait(seconds(value)?),
        "cooldown" => RaceSetting::Cooldown(seconds(value)?),
        "mode" => RaceSetting::Mode(value.to_string()),
        "currency" => RaceSetting::Currency(value.to_string()),
        knob => return Err(GameError::not_found("race setting", knob)),
    };
    Ok(Command::SetRace(setting))
}

fn number<T: std::str::FromStr>(value: &str) -> Result<T, GameError> {
    value
        .parse()
        .map_err(|_| GameError::precondition(format!("{value} is not a valid number")))
}

fn seconds(value: &str) -> Result<Duration, GameError> {
    Ok(Duration::from_secs(number(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Actor {
        Actor::new(name.len() as u64, name)
    }

    fn parse(input: &str) -> Result<Command, GameError> {
        Command::parse(input, &lookup)
    }

    #[test]
    fn buttons() {
        assert_eq!(Command::from_button("join_heist"), Ok(Command::JoinHeist));
        assert_eq!(Command::from_button("cancel_heist"), Ok(Command::CancelHeist));
        assert_eq!(Command::from_button("join_race"), Ok(Command::JoinRace));
        assert_eq!(Command::from_button("race_bet_1"), Ok(Command::Bet { racer: 0 }));
        assert_eq!(Command::from_button("race_bet_11"), Ok(Command::Bet { racer: 10 }));
        assert!(Command::from_button("race_bet_0").is_err());
        assert!(Command::from_button("race_bet_12").is_err());
        assert!(Command::from_button("race_bet_x").is_err());
        assert!(Command::from_button("rob_bank").is_err());
        assert_eq!(race_bet_button(2), "race_bet_3");
    }

    #[test]
    fn unknown_plain_word_is_an_internal_error() {
        let caps = Regex::new(r"^(?P<word>\S+)$").unwrap().captures("loiter").unwrap();
        assert!(matches!(simple(&caps, &lookup), Err(GameError::Internal(_))));
    }

    #[test]
    fn plain_words() {
        assert_eq!(parse("plan"), Ok(Command::PlanHeist));
        assert_eq!(parse("  join "), Ok(Command::JoinHeist));
        assert_eq!(parse("join-race"), Ok(Command::JoinRace));
        assert_eq!(parse("balance"), Ok(Command::Balance));
        assert_eq!(parse("click race_bet_2"), Ok(Command::Bet { racer: 1 }));
        assert_eq!(parse("bet 3"), Ok(Command::Bet { racer: 2 }));
        assert!(parse("dance").is_err());
    }

    #[test]
    fn player_arguments() {
        assert_eq!(parse("bail"), Ok(Command::Bail { target: None }));
        assert_eq!(
            parse("bail bob"),
            Ok(Command::Bail {
                target: Some(Actor::new(3, "bob"))
            })
        );
        assert_eq!(
            parse("transfer carol 250"),
            Ok(Command::Transfer {
                to: Actor::new(5, "carol"),
                amount: 250
            })
        );
        assert_eq!(parse("leaderboard"), Ok(Command::Leaderboard { limit: 10 }));
        assert_eq!(parse("leaderboard 3"), Ok(Command::Leaderboard { limit: 3 }));
    }

    #[test]
    fn admin_settings() {
        assert_eq!(
            parse("set death 600"),
            Ok(Command::SetHeist(HeistSetting::Death(Duration::from_secs(600))))
        );
        assert_eq!(
            parse("set hardcore on"),
            Ok(Command::SetHeist(HeistSetting::Hardcore(true)))
        );
        assert!(parse("set volume 11").is_err());
        assert_eq!(
            parse("race-set prize 500 900"),
            Ok(Command::SetRace(RaceSetting::Prize { min: 500, max: 900 }))
        );
        assert_eq!(
            parse("race-set mode space"),
            Ok(Command::SetRace(RaceSetting::Mode("space".to_string())))
        );
        assert!(parse("set cost lots").is_err());
    }

    #[test]
    fn targets() {
        assert_eq!(
            parse(r#"add-target "First Bank" 4 35 8000 12000"#),
            Ok(Command::AddTarget(Target {
                name: "First Bank".to_string(),
                crew_size: 4,
                success: 35,
                vault: 8000,
                vault_max: 12000,
            }))
        );
        assert_eq!(
            parse(r#"edit-target "First Bank" success=20 max=9000"#),
            Ok(Command::EditTarget {
                name: "First Bank".to_string(),
                edit: TargetEdit {
                    success: Some(20),
                    vault_max: Some(9000),
                    ..Default::default()
                }
            })
        );
        assert!(parse(r#"edit-target "First Bank" color=red"#).is_err());
        assert_eq!(
            parse(r#"remove-target "First Bank""#),
            Ok(Command::RemoveTarget {
                name: "First Bank".to_string()
            })
        );
    }
}
