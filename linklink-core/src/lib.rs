use flate2::{write::GzEncoder, Compression};
use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod data;
pub mod hints;
pub mod placement;
pub mod reconcile;
pub mod session;
pub mod synth;

#[cfg(test)]
mod test_support;

use data::{DataSource, LinkData};
use placement::{PlacementConfig, PlacementReport};
use reconcile::{ReconcileConfig, ReconcileReport};
use session::{LinkWorld, PlayerId, Session, SessionSpec};

pub const MAX_PLAYERS: usize = 40;
pub const FREE_ITEMS: usize = 0;
pub const DEFAULT_FILLER_BLACKLIST: &[&str] = &["Manual_LinkLink_Silasary"];
/// Item files the packaged world ships next to `items.json`.
pub const DEFAULT_EXTRA_ITEM_FILES: &[&str] = &["items_pkmn.json", "items_kh.json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkLinkSettings {
    pub seed: Option<u64>,
    /// World data: a directory holding `data/*.json`, or an `.apworld` archive.
    pub data_path: PathBuf,
    pub session_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub max_players: usize,
    pub free_items: usize,
    pub extra_item_files: Vec<String>,
    /// Games never asked to manufacture filler.
    pub filler_blacklist: Vec<String>,
    /// Set for tracker-style regenerations: unfilled link locations are kept.
    pub fake_generation: bool,
}

impl LinkLinkSettings {
    pub fn new(data_path: PathBuf, session_path: PathBuf) -> Self {
        LinkLinkSettings {
            seed: None,
            data_path,
            session_path,
            output_path: None,
            max_players: MAX_PLAYERS,
            free_items: FREE_ITEMS,
            extra_item_files: Vec::new(),
            filler_blacklist: DEFAULT_FILLER_BLACKLIST
                .iter()
                .map(|game| game.to_string())
                .collect(),
            fake_generation: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LinkLinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{player} lists unknown victim '{victim}'")]
    UnknownVictim { player: String, victim: String },
    #[error("no placeholder '{item}' left in {player}'s pool to reclaim")]
    MissingPlaceholder { item: String, player: String },
    #[error("location {0} is already filled")]
    LocationFilled(String),
}

pub type Result<T> = std::result::Result<T, LinkLinkError>;

#[derive(Debug, Clone, Serialize)]
pub struct LinkPlayerReport {
    pub player: String,
    pub placement: PlacementReport,
    pub reconcile: ReconcileReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub seed: u64,
    pub link_players: Vec<LinkPlayerReport>,
    /// Player name -> location address -> hint text.
    pub hints: BTreeMap<String, BTreeMap<u64, String>>,
    /// Location label -> item label, for every filled location.
    pub placements: BTreeMap<String, String>,
}

const FILL_SALT: u64 = 0xF111_F111_u64;

/// Synthesizes the link world, instantiates the session and runs placement,
/// reconciliation, the final fill and hint resolution in order.
pub fn run(settings: &LinkLinkSettings) -> Result<GenerationReport> {
    let source = DataSource::open(&settings.data_path)?;
    let data = LinkData::load(&source, &settings.extra_item_files)?;
    let table = data.link_table();
    let game_id = data.game.game_id();

    let locations = synth::extend_location_table(
        data.locations.clone(),
        &table,
        settings.max_players,
        settings.free_items,
    );
    let regions = synth::extend_region_table(data.regions.clone(), &table);
    info!(
        "{} link items, {} locations, {} regions",
        table.defs.len(),
        locations.len(),
        regions.len()
    );

    let world = LinkWorld {
        game_id: game_id.clone(),
        filler_item_name: data.game.filler_item_name.clone(),
        items: data.items,
        locations,
        regions,
    };

    let spec = SessionSpec::load(&settings.session_path)?;
    let seed = settings
        .seed
        .or(spec.seed)
        .unwrap_or_else(rand::random::<u64>);
    info!("Generating with seed {seed}");

    let mut session = Session::build(&spec, &world, seed)?;
    if session.player_count() > settings.max_players {
        warn!(
            "{} players exceed the {} link slots per replica; extra donors are never linked",
            session.player_count(),
            settings.max_players
        );
    }

    let link_players: Vec<PlayerId> = session
        .player_ids()
        .filter(|&id| session.player(id).game == game_id)
        .collect();

    let placement_config = PlacementConfig {
        max_players: settings.max_players,
        fake_generation: settings.fake_generation,
    };
    let reconcile_config = ReconcileConfig {
        sentinel: world.filler_item_name.clone(),
        filler_blacklist: settings.filler_blacklist.clone(),
    };

    let mut link_reports = Vec::new();
    for &player in &link_players {
        let placement = placement::place_links(&mut session, &table, player, &placement_config)?;
        let reconcile = reconcile::replace_nothings(&mut session, player, &reconcile_config);
        link_reports.push(LinkPlayerReport {
            player: session.player_name(player).to_string(),
            placement,
            reconcile,
        });
    }

    let mut rng = StdRng::seed_from_u64(session.seed() ^ FILL_SALT);
    session.fill_remaining(&mut rng)?;

    let mut hint_data = hints::HintData::new();
    for &player in &link_players {
        let mut random = session.player_random(player);
        hints::extend_hint_information(&session, player, &mut hint_data, &mut random);
    }

    let report = GenerationReport {
        seed: session.seed(),
        link_players: link_reports,
        hints: hint_data
            .into_iter()
            .map(|(player, entries)| (session.player_name(player).to_string(), entries))
            .collect(),
        placements: session
            .filled_locations()
            .filter_map(|location| {
                let item = session.location(location).item?;
                let item = session.item(item);
                Some((
                    session.location_label(location),
                    format!("{} ({})", item.name, session.player_name(item.player)),
                ))
            })
            .collect(),
    };

    if let Some(path) = &settings.output_path {
        write_report(path, &report)?;
        info!("Wrote report to {}", path.display());
    }

    Ok(report)
}

/// Writes the report as pretty JSON, gzip-compressed when `path` ends in `.gz`.
pub fn write_report(path: &Path, report: &GenerationReport) -> Result<()> {
    let json = serde_json::to_vec_pretty(report).map_err(|source| LinkLinkError::Json {
        file: path.display().to_string(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        fs::write(path, encoder.finish()?)?;
    } else {
        fs::write(path, json)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("linklink-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("data")).unwrap();
        dir
    }

    fn write_world(dir: &Path) {
        fs::write(
            dir.join("data/game.json"),
            r#"{"game": "LinkLink", "creator": "Silasary", "filler_item_name": "Nothing"}"#,
        )
        .unwrap();
        fs::write(
            dir.join("data/items.json"),
            r#"[
                {"name": "Ball", "count": 2, "progression": true, "linklink": {
                    "Pokemon Red and Blue": ["Master Ball", "Poke Ball"]
                }}
            ]"#,
        )
        .unwrap();
    }

    fn write_session(dir: &Path) -> PathBuf {
        let path = dir.join("session.json");
        fs::write(
            &path,
            r#"{
                "seed": 99,
                "players": [
                    {"name": "Linker", "game": "Manual_LinkLink_Silasary"},
                    {"name": "Red", "game": "Pokemon Red and Blue",
                     "items": [{"name": "Poke Ball", "count": 2}, {"name": "Master Ball"}],
                     "locations": ["Route 1", "Route 2", "Route 3"],
                     "filler_item_name": "Potion"},
                    {"name": "Blue", "game": "Pokemon Red and Blue",
                     "items": [{"name": "Potion"}],
                     "locations": ["Route 22"],
                     "filler_item_name": "Potion"}
                ]
            }"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn run_links_and_balances_the_session() {
        let dir = scratch_dir("run");
        write_world(&dir);
        let session_path = write_session(&dir);

        let mut settings = LinkLinkSettings::new(dir.clone(), session_path);
        settings.max_players = 3;
        let report = run(&settings).unwrap();

        assert_eq!(report.seed, 99);
        let linker = &report.link_players[0];
        // Red donates for both replicas, Blue has nothing on the allow-list.
        assert_eq!(linker.placement.placed.len(), 2);
        assert_eq!(linker.placement.placed[0].item, "Master Ball");
        assert_eq!(linker.placement.placed[1].item, "Poke Ball");
        assert!(linker.placement.reclaimed.is_empty());
        assert_eq!(linker.placement.removed_locations, 2 * 3 - 2);
        assert_eq!(linker.reconcile.added, linker.reconcile.needed);

        // Every location in the session ends up filled.
        assert_eq!(report.placements.len(), 2 + 3 + 1);
        assert_eq!(report.hints["Linker"].len(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn seed_override_wins_and_output_is_reproducible() {
        let dir = scratch_dir("seeded");
        write_world(&dir);
        let session_path = write_session(&dir);

        let mut settings = LinkLinkSettings::new(dir.clone(), session_path);
        settings.max_players = 3;
        settings.seed = Some(1234);
        let first = run(&settings).unwrap();
        let second = run(&settings).unwrap();

        assert_eq!(first.seed, 1234);
        assert_eq!(first.placements, second.placements);
        assert_eq!(first.hints, second.hints);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn gz_report_round_trips() {
        let dir = scratch_dir("gz");
        write_world(&dir);
        let session_path = write_session(&dir);

        let mut settings = LinkLinkSettings::new(dir.clone(), session_path);
        settings.max_players = 3;
        settings.output_path = Some(dir.join("out/report.json.gz"));
        let report = run(&settings).unwrap();

        let raw = fs::read(dir.join("out/report.json.gz")).unwrap();
        let mut text = String::new();
        GzDecoder::new(raw.as_slice()).read_to_string(&mut text).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["seed"], report.seed);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn demo_world_with_extra_item_files() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/linklink");
        let mut settings = LinkLinkSettings::new(root.clone(), root.join("session.json"));
        settings.extra_item_files = DEFAULT_EXTRA_ITEM_FILES
            .iter()
            .map(|file| file.to_string())
            .collect();
        let report = run(&settings).unwrap();

        assert_eq!(report.seed, 20261019);
        let linker = &report.link_players[0];
        assert_eq!(linker.player, "Linker");
        // 3 swords (2 Hero, 1 Kid), 3 bombs, 2 balls; nobody plays Kingdom Hearts
        assert_eq!(linker.placement.placed.len(), 8);
        assert_eq!(linker.placement.reclaimed, ["Keyblade 1"]);
        assert_eq!(linker.reconcile.needed, 2);
        assert_eq!(linker.reconcile.added, 2);
        assert_eq!(report.hints["Linker"].len(), 8);
        assert_eq!(report.placements.len(), 8 + 1 + 10 + 4 + 4);
    }

    #[test]
    fn missing_data_path_is_a_config_error() {
        let settings = LinkLinkSettings::new(
            PathBuf::from("/nonexistent/linklink"),
            PathBuf::from("/nonexistent/session.json"),
        );
        assert!(matches!(run(&settings), Err(LinkLinkError::Config(_))));
    }
}
