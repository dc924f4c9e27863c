use std::{cell::RefCell, collections::HashMap, path::PathBuf, sync::Arc};

use clap::Parser;
use dice::RandomDice;
use engine::{
    catalog::load_catalog, Actor, BotConfig, CliOverrides, Command, ConsoleTransport, Engine,
    EngineError, Interaction, Services,
};
use store::FileStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use types::SystemClock;

/// Drives one guild from stdin. Each line is `<player> <command...>`,
/// for example `ana plan` or `bo click join_heist`.
#[derive(Parser, Debug)]
struct Params {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store location: memory, noop, sqlite:<url> or a directory
    #[arg(short, long)]
    store: Option<String>,

    /// Directory holding the theme, mode and target catalogs
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[arg(short, long)]
    theme: Option<String>,

    #[arg(short, long)]
    mode: Option<String>,

    #[arg(short, long, default_value_t = 1)]
    guild: u64,

    #[arg(long, default_value_t = 1)]
    channel: u64,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

/// Hands out stable ids for player names as they first appear.
#[derive(Default)]
struct Roster {
    ids: RefCell<HashMap<String, u64>>,
}

impl Roster {
    fn actor(&self, name: &str) -> Actor {
        let mut ids = self.ids.borrow_mut();
        let next = ids.len() as u64 + 1;
        let id = *ids.entry(name.to_lowercase()).or_insert(next);
        Actor::new(id, name)
    }
}

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    env_logger::init();
    let args = Params::parse();
    log::info!("args: {args:?}");

    let cli = CliOverrides {
        store: args.store.clone(),
        data_dir: args.data_dir.clone(),
        theme: args.theme.clone(),
        mode: args.mode.clone(),
    };
    let config = BotConfig::from_cli_or_env_or_yaml(&cli, args.config.as_deref())?;
    let catalog = load_catalog(&FileStore::new(&config.data_dir)).await?;
    let store = config.store_config(&cli)?.open().await?;
    let dice = match args.seed {
        Some(seed) => RandomDice::seeded(seed),
        None => RandomDice::new(),
    };
    let services = Services {
        transport: Arc::new(ConsoleTransport),
        store,
        clock: Arc::new(SystemClock),
        dice: Box::new(dice),
    };
    let engine = Engine::new(services, catalog, config.settings())?;
    engine.start_vault_regenerator();

    let roster = Roster::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some((name, input)) = line.trim().split_once(' ') else {
            if !line.trim().is_empty() {
                println!("usage: <player> <command...>");
            }
            continue;
        };
        let user = roster.actor(name);
        let command = match Command::parse(input, &|name: &str| roster.actor(name)) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        let ctx = Interaction {
            guild_id: args.guild,
            channel_id: args.channel,
            user,
        };
        if let Err(err) = engine.dispatch(&ctx, command).await {
            log::error!("{err}");
        }
    }

    engine.shutdown().await;
    Ok(())
}
