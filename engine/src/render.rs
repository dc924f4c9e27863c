//! Reply builders. Everything here is pure so replies can be rendered under
//! the guild lock and sent after it is released.

use std::time::Duration;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use types::{
    clock::format_duration,
    heist::MemberOutcome,
    race::{Race, RaceResult},
    Account, GuildConfig, GuildState, HeistOutcome, Labels, Mode, Player, PlayerStatus, Targets,
};

use crate::{
    command::{race_bet_button, CANCEL_HEIST, JOIN_HEIST, JOIN_RACE, LEAVE_HEIST},
    transport::{Button, Embed, Reply},
};

fn embed(title: impl Into<String>, description: impl Into<String>) -> Embed {
    Embed {
        title: title.into(),
        description: description.into(),
        ..Default::default()
    }
}

fn buttons(open: bool, specs: &[(String, String)]) -> Vec<Button> {
    specs
        .iter()
        .map(|(id, label)| Button {
            disabled: !open,
            ..Button::new(id.clone(), label.clone())
        })
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn ordinal(place: usize) -> String {
    let suffix = match (place % 10, place % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{place}{suffix}")
}

/// The planning message. `left` is `None` once the window has closed.
pub fn heist_planning(state: &GuildState, labels: &Labels, left: Option<Duration>) -> Reply {
    let Some(heist) = &state.heist else {
        return Reply::embed(embed(
            format!("No {} is being planned", labels.heist),
            "",
        ));
    };
    let crew = heist.crew.iter().map(|&id| state.player_name(id)).join(", ");
    let mut embed = embed(
        format!("{} is planning a {}", state.player_name(heist.planner), labels.heist),
        format!(
            "Join the {} for {} {}.",
            labels.crew, state.config.heist_cost, state.ledger.currency
        ),
    );
    embed.fields.push((
        format!("{} ({})", capitalize(&labels.crew), heist.crew.len()),
        crew,
    ));
    embed.fields.push(match left {
        Some(left) => ("Starts in".to_string(), format_duration(left)),
        None => ("Status".to_string(), "Underway".to_string()),
    });
    Reply::embed(embed).with_buttons(buttons(
        left.is_some(),
        &[
            (JOIN_HEIST.to_string(), "Join".to_string()),
            (LEAVE_HEIST.to_string(), "Leave".to_string()),
            (CANCEL_HEIST.to_string(), "Cancel".to_string()),
        ],
    ))
}

pub fn heist_joined(labels: &Labels, name: &str, crew: usize) -> Reply {
    Reply::text(format!(
        "{name} joined the {}. The {} now has {crew} members.",
        labels.crew, labels.crew
    ))
}

pub fn heist_left(labels: &Labels, name: &str) -> Reply {
    Reply::text(format!("{name} left the {}.", labels.crew))
}

pub fn heist_cancelled(labels: &Labels, name: &str) -> Reply {
    Reply::text(format!("{name} called off the {}.", labels.heist))
}

pub fn heist_banner(labels: &Labels, crew: usize, target: &str) -> Reply {
    Reply::text(format!(
        "Lock the doors! A {} of {crew} is hitting the {target}.",
        labels.crew
    ))
}

pub fn heist_no_crew(labels: &Labels) -> Reply {
    Reply::text(format!(
        "Nobody else joined, so the {} was called off.",
        labels.heist
    ))
}

pub fn heist_crew_too_large(labels: &Labels, crew: usize, largest: usize) -> Reply {
    Reply::text(format!(
        "A {} of {crew} is too big for any target (the largest takes {largest}). The {} noticed the crowd.",
        labels.crew, labels.police
    ))
}

fn outcome_line(member: &MemberOutcome, labels: &Labels, currency: &str) -> String {
    let status = match member.status {
        PlayerStatus::Free => "Escaped".to_string(),
        PlayerStatus::Apprehended => format!("Sent to {}", labels.jail),
        PlayerStatus::Dead => "Dead".to_string(),
    };
    if member.payout() == 0 {
        return status;
    }
    format!(
        "{status}, took {} + {} bonus {currency}",
        member.stolen, member.bonus
    )
}

pub fn heist_results(outcome: &HeistOutcome, labels: &Labels, currency: &str) -> Reply {
    let mut embed = embed(
        format!("The {} on the {} is over", labels.heist, outcome.target),
        format!(
            "Each survivor takes {} {currency} from the {}.",
            outcome.credits_per_survivor, labels.vault
        ),
    );
    embed.fields = outcome
        .members
        .iter()
        .map(|m| (m.name.clone(), outcome_line(m, labels, currency)))
        .collect();
    embed.footer = Some(format!(
        "The {} are on alert. Total haul: {} {currency}",
        labels.police,
        outcome.total_payout()
    ));
    Reply::embed(embed)
}

pub fn heist_failure(labels: &Labels) -> Reply {
    Reply::text(format!(
        "Something went wrong and the {} fell apart. Nobody was charged for the results.",
        labels.heist
    ))
}

pub fn heist_reset(labels: &Labels) -> Reply {
    Reply::text(format!("The {} has been reset.", labels.heist))
}

pub fn bailed(labels: &Labels, payer: &str, target: &str, cost: u64, currency: &str) -> Reply {
    if payer == target {
        return Reply::text(format!(
            "You paid {cost} {currency} {} and are now {}.",
            labels.bail, labels.oob
        ));
    }
    Reply::text(format!(
        "{payer} paid {cost} {currency} to {} {target}, who is now {}.",
        labels.bail, labels.oob
    ))
}

pub fn bail_notice(labels: &Labels, payer: &str, cost: u64, currency: &str) -> Reply {
    Reply::text(format!(
        "{payer} paid your {} of {cost} {currency}. You are now {}.",
        labels.bail, labels.oob
    ))
}

pub fn released(labels: &Labels, name: &str, served: bool) -> Reply {
    if served {
        return Reply::text(format!(
            "{name} served their {} and walked out of {}.",
            labels.sentence, labels.jail
        ));
    }
    Reply::text(format!(
        "{name} served their {} and is no longer {}.",
        labels.sentence, labels.oob
    ))
}

pub fn revived(name: &str) -> Reply {
    Reply::text(format!("{name} has returned to the land of the living."))
}

pub fn player_info(
    player: &Player,
    labels: &Labels,
    now: DateTime<Utc>,
    balance: Option<u64>,
    currency: &str,
) -> Reply {
    let status = match player.status {
        PlayerStatus::Free if player.oob => capitalize(&labels.oob),
        PlayerStatus::Free => "Free".to_string(),
        PlayerStatus::Apprehended => format!(
            "In {} for {}",
            labels.jail,
            format_duration(player.jail_remaining(now))
        ),
        PlayerStatus::Dead => format!(
            "Dead, revives in {}",
            format_duration(player.death_remaining(now))
        ),
    };
    let mut embed = embed(player.name.clone(), status);
    embed.fields = vec![
        ("Rank".to_string(), player.rank().to_string()),
        ("Criminal level".to_string(), player.criminal_level.to_string()),
        ("Spree".to_string(), player.spree.to_string()),
        ("Priors".to_string(), player.jail_counter.to_string()),
        (format!("Total {}", labels.jail), player.total_jail.to_string()),
        ("Deaths".to_string(), player.total_deaths.to_string()),
    ];
    if player.bail_cost > 0 {
        embed
            .fields
            .push((capitalize(&labels.bail), player.bail_cost.to_string()));
    }
    embed.footer = balance.map(|balance| format!("Balance: {balance} {currency}"));
    Reply::embed(embed)
}

pub fn targets(targets: &Targets, labels: &Labels) -> Reply {
    if targets.is_empty() {
        return Reply::text("There are no targets.").ephemeral();
    }
    let mut embed = embed("Targets", "");
    embed.fields = targets
        .iter()
        .map(|t| {
            let fill = (t.vault * 100).checked_div(t.vault_max).unwrap_or(0);
            (
                t.name.clone(),
                format!(
                    "{} {}, {}% success, {} {}/{} ({fill}%)",
                    t.crew_size, labels.crew, t.success, labels.vault, t.vault, t.vault_max
                ),
            )
        })
        .collect();
    Reply::embed(embed)
}

/// The race lobby. `left` is `None` once entries are closed.
pub fn race_lobby(race: &Race, config: &GuildConfig, mode: &Mode, left: Option<Duration>) -> Reply {
    let racers = race
        .racers
        .iter()
        .map(|r| format!("{} {}", r.character.emoji, r.entrant.name))
        .join("\n");
    let mut embed = embed(
        format!("A {} race is starting", mode.id),
        format!("Racers ({}/{})\n{racers}", race.racers.len(), config.max_racers),
    );
    embed.footer = Some(match left {
        Some(left) => format!("Entries close in {}", format_duration(left)),
        None => "Entries are closed".to_string(),
    });
    Reply::embed(embed).with_buttons(buttons(
        left.is_some(),
        &[(JOIN_RACE.to_string(), "Join race".to_string())],
    ))
}

pub fn race_joined(name: &str, emoji: &str) -> Reply {
    Reply::text(format!("{name} lines up as {emoji}."))
}

pub fn race_cancelled(entered: usize, min_racers: usize) -> Reply {
    Reply::text(format!(
        "Only {entered} racers showed up, {min_racers} are needed. The race is off."
    ))
}

/// The betting board with one button per racer.
pub fn betting_board(race: &Race, config: &GuildConfig, left: Option<Duration>) -> Reply {
    let racers = race
        .racers
        .iter()
        .enumerate()
        .map(|(idx, r)| format!("{}. {} {}", idx + 1, r.character.emoji, r.entrant.name))
        .join("\n");
    let mut embed = embed(
        "Place your bets",
        format!(
            "A bet costs {} {} and pays {} times that on the winner.\n{racers}",
            config.bet_amount,
            config.currency,
            race.racers.len()
        ),
    );
    embed.footer = Some(match left {
        Some(left) => format!("Betting closes in {}", format_duration(left)),
        None => "Betting is closed".to_string(),
    });
    let specs: Vec<_> = (0..race.racers.len())
        .map(|idx| (race_bet_button(idx), format!("Bet on {}", idx + 1)))
        .collect();
    Reply::embed(embed).with_buttons(buttons(left.is_some(), &specs))
}

pub fn bet_placed(name: &str, racer: &str, stake: u64, currency: &str) -> Reply {
    Reply::text(format!("{name} bet {stake} {currency} on {racer}."))
}

pub fn race_frame(race: &Race, mode: &Mode) -> Reply {
    Reply::text(race.racers.iter().map(|r| r.lane(mode)).join("\n"))
}

pub fn race_results(race: &Race, result: &RaceResult, currency: &str) -> Reply {
    let mut embed = embed(
        "Race results",
        format!("The purse was {} {currency}.", result.prize),
    );
    embed.fields = result
        .placings
        .iter()
        .filter_map(|placing| {
            let racer = race.racers.get(placing.racer)?;
            let time = racer.finish.map(|f| f.to_string()).unwrap_or_default();
            let mut line = format!("{} {} ({time})", racer.character.emoji, racer.entrant.name);
            if placing.prize > 0 && !racer.entrant.bot {
                line.push_str(&format!(", wins {} {currency}", placing.prize));
            }
            Some((ordinal(placing.place), line))
        })
        .collect();
    let winners = race
        .bets
        .iter()
        .filter(|b| b.winnings > 0)
        .map(|b| format!("{} (+{})", b.name, b.winnings))
        .join(", ");
    embed.footer = Some(if winners.is_empty() {
        "No bets paid out.".to_string()
    } else {
        format!("Winning bets: {winners}")
    });
    Reply::embed(embed)
}

pub fn race_reset(refunded: usize) -> Reply {
    Reply::text(format!("The race has been reset. {refunded} bets were refunded."))
}

pub fn race_stats(name: &str, player: Option<&Player>, currency: &str) -> Reply {
    let stats = player.map(|p| p.race.clone()).unwrap_or_default();
    let mut embed = embed(format!("{name}'s race record"), "");
    embed.fields = vec![
        ("Wins".to_string(), stats.wins.to_string()),
        ("Places".to_string(), stats.places.to_string()),
        ("Shows".to_string(), stats.shows.to_string()),
        ("Losses".to_string(), stats.losses.to_string()),
        ("Earnings".to_string(), format!("{} {currency}", stats.earnings)),
        (
            "Bets won".to_string(),
            format!("{}/{}", stats.bets_won, stats.bets_placed),
        ),
        (
            "Bet earnings".to_string(),
            format!("{} {currency}", stats.bet_earnings),
        ),
    ];
    Reply::embed(embed)
}

pub fn balance(account: &Account, bank: &str, currency: &str) -> Reply {
    Reply::text(format!(
        "{} has {} {currency} at the {bank}.",
        account.name, account.balance
    ))
    .ephemeral()
}

pub fn transferred(from: &str, to: &str, amount: u64, currency: &str) -> Reply {
    Reply::text(format!("{from} sent {amount} {currency} to {to}."))
}

pub fn balance_set(name: &str, amount: u64, currency: &str) -> Reply {
    Reply::text(format!("{name}'s balance is now {amount} {currency}."))
}

pub fn leaderboard(accounts: &[&Account], bank: &str, currency: &str) -> Reply {
    if accounts.is_empty() {
        return Reply::text(format!("Nobody banks at the {bank} yet."));
    }
    let lines = accounts
        .iter()
        .enumerate()
        .map(|(idx, a)| format!("{}. {} {} {currency}", idx + 1, a.name, a.balance))
        .join("\n");
    Reply::embed(embed(format!("{bank} leaderboard"), lines))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use types::{Heist, Target};

    use super::*;

    fn guild() -> GuildState {
        let targets = Targets::from_list([Target {
            name: "Bank".to_string(),
            crew_size: 4,
            success: 40,
            vault: 2000,
            vault_max: 8000,
        }])
        .unwrap();
        GuildState::new(1, GuildConfig::default(), targets)
    }

    #[test]
    fn ordinals() {
        let places: Vec<_> = [1, 2, 3, 4, 11, 12, 13, 21, 22].map(ordinal).to_vec();
        assert_eq!(
            places,
            vec!["1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd"]
        );
    }

    #[test]
    fn planning_message_lists_crew_and_closes() {
        let mut state = guild();
        state.player_mut(1, "Ana");
        state.player_mut(2, "Bo");
        let mut heist = Heist::plan(1, Utc::now(), Duration::from_secs(60));
        heist.add_member(2).unwrap();
        state.heist = Some(heist);
        let labels = Labels::default();

        let open = heist_planning(&state, &labels, Some(Duration::from_secs(55)));
        let text = open.plain_text();
        assert!(text.contains("Ana is planning a heist"));
        assert!(text.contains("Crew (2): Ana, Bo"));
        assert!(text.contains("Starts in: 55s"));
        assert_eq!(open.buttons.len(), 3);
        assert!(open.buttons.iter().all(|b| !b.disabled));

        let closed = heist_planning(&state, &labels, None);
        assert!(closed.buttons.iter().all(|b| b.disabled));
    }

    #[test]
    fn targets_show_vault_fill() {
        let text = targets(&guild().targets, &Labels::default()).plain_text();
        assert_eq!(text, "Targets\nBank: 4 crew, 40% success, vault 2000/8000 (25%)");
    }

    #[test]
    fn player_info_reports_jail_time() {
        let now = Utc::now();
        let mut player = Player::new(1, "Ana".to_string());
        player.apprehend(now, &GuildConfig::default());
        let text = player_info(&player, &Labels::default(), now, Some(10), "credits").plain_text();
        assert!(text.contains("In jail for 5m 0s"));
        assert!(text.contains("Rank: Renegade"));
        assert!(text.contains("Bail: 250"));
        assert!(text.contains("Balance: 10 credits"));
    }
}
