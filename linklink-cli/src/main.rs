use clap::Parser;
use log::info;
use std::path::PathBuf;

use linklink_core::{
    run, LinkLinkSettings, DEFAULT_EXTRA_ITEM_FILES, DEFAULT_FILLER_BLACKLIST, FREE_ITEMS,
    MAX_PLAYERS,
};

#[derive(Debug, Parser)]
#[command(name = "linklink", version, about = "Item link allocation for multiworld sessions")]
struct Args {
    /// World data directory or packaged .apworld archive.
    #[arg(long)]
    data: PathBuf,

    /// Session description (players, pools, victims).
    #[arg(long)]
    session: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    /// Report file; written gzip-compressed when it ends in `.gz`.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = MAX_PLAYERS)]
    max_players: usize,

    #[arg(long, default_value_t = FREE_ITEMS)]
    free_items: usize,

    /// Extra item files under `data/`. Defaults to the Pokemon and Kingdom Hearts lists.
    #[arg(long = "extra-item-file", value_name = "FILE")]
    extra_item_files: Vec<String>,

    /// Games never asked for filler. Defaults to the link game itself.
    #[arg(long = "filler-blacklist", value_name = "GAME")]
    filler_blacklist: Vec<String>,

    #[arg(long, default_value_t = false)]
    fake_generation: bool,

    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn or_defaults(values: Vec<String>, defaults: &[&str]) -> Vec<String> {
    if values.is_empty() {
        defaults.iter().map(|value| value.to_string()).collect()
    } else {
        values
    }
}

fn settings_from(args: Args) -> LinkLinkSettings {
    let mut settings = LinkLinkSettings::new(args.data, args.session);
    settings.seed = args.seed;
    settings.output_path = args.output;
    settings.max_players = args.max_players;
    settings.free_items = args.free_items;
    settings.extra_item_files = or_defaults(args.extra_item_files, DEFAULT_EXTRA_ITEM_FILES);
    settings.fake_generation = args.fake_generation;
    settings.filler_blacklist = or_defaults(args.filler_blacklist, DEFAULT_FILLER_BLACKLIST);
    settings
}

fn main() {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let settings = settings_from(args);

    match run(&settings) {
        Ok(report) => {
            for player in &report.link_players {
                info!(
                    "{}: {} links placed, {} replicas reclaimed, {} locations removed, {}/{} filler added",
                    player.player,
                    player.placement.placed.len(),
                    player.placement.reclaimed.len(),
                    player.placement.removed_locations,
                    player.reconcile.added,
                    player.reconcile.needed,
                );
            }
            println!("Seed {} generated", report.seed);
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
