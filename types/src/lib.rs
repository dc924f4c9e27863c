pub mod catalog;
pub mod clock;
pub mod config;
pub mod dice;
pub mod economy;
pub mod error;
pub mod guild;
pub mod heist;
pub mod player;
pub mod race;
pub(crate) mod serde_secs;
pub mod target;

pub type GuildId = u64;
pub type PlayerId = u64;

pub use catalog::{BadResult, Catalog, Character, HeistMessage, Labels, Mode, MovementClass, Theme};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GuildConfig;
pub use dice::Dice;
pub use economy::{Account, Ledger};
pub use error::{GameError, LedgerError};
pub use guild::{GuildState, HeistDocument, RaceDocument};
pub use heist::{Heist, HeistOutcome, MemberOutcome};
pub use player::{CriminalRank, Player, PlayerStatus, RaceStats, Release};
pub use race::{Bettor, Entrant, FinishTime, Race, RacePhase, RaceResult, Racer};
pub use target::{Target, TargetEdit, Targets};
