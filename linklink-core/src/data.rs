use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::{LinkLinkError, Result};

/// Source game id -> item names that game may donate, best first.
pub type AllowMap = IndexMap<String, Vec<String>>;

pub type RegionTable = IndexMap<String, RegionDef>;

fn default_count() -> usize {
    1
}

fn default_filler_item_name() -> String {
    "Nothing".to_string()
}

fn default_location_region() -> String {
    "Manual".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInfo {
    pub game: String,
    pub creator: String,
    #[serde(default = "default_filler_item_name")]
    pub filler_item_name: String,
}

impl GameInfo {
    /// The id other worlds see this game under, e.g. `Manual_LinkLink_Silasary`.
    pub fn game_id(&self) -> String {
        format!("Manual_{}_{}", self.game, self.creator)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub progression: bool,
    #[serde(default)]
    pub useful: bool,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linklink: Option<AllowMap>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDef {
    pub name: String,
    #[serde(default = "default_location_region")]
    pub region: String,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub requires: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDef {
    #[serde(default)]
    pub requires: String,
    #[serde(default)]
    pub connects_to: Vec<String>,
    #[serde(default)]
    pub starting: bool,
}

/// One link item: `count` replicas, each fed by the allow-listed items of
/// other players' games.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkItemDef {
    pub name: String,
    pub count: usize,
    pub allow: AllowMap,
}

impl LinkItemDef {
    /// Whether any game can ever donate to this link.
    pub fn is_linkable(&self) -> bool {
        !self.allow.is_empty()
    }

    /// Allow-list for `game`, if that game may donate at all.
    pub fn allow_list(&self, game: &str) -> Option<&[String]> {
        self.allow.get(game).map(Vec::as_slice)
    }
}

/// Every link item definition of the loaded world, in item-table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTable {
    pub defs: Vec<LinkItemDef>,
}

impl LinkTable {
    pub fn from_items(items: &[ItemDef]) -> Self {
        let defs = items
            .iter()
            .filter_map(|item| {
                item.linklink.as_ref().map(|allow| LinkItemDef {
                    name: item.name.clone(),
                    count: item.count,
                    allow: allow.clone(),
                })
            })
            .collect();
        LinkTable { defs }
    }
}

// Manual data files are either a bare list or wrapped in `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(v) => v,
            Listing::Wrapped { data } => data,
        }
    }
}

/// Where the world's `data/*.json` files live.
#[derive(Debug, Clone)]
pub enum DataSource {
    Directory(PathBuf),
    /// A packaged `.apworld` (zip) archive.
    Archive(PathBuf),
}

impl DataSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LinkLinkError::Config(format!(
                "Data path does not exist: {}",
                path.display()
            )));
        }

        if path.is_file() {
            return Ok(DataSource::Archive(path.to_path_buf()));
        }

        let nested = path.join("data");
        if nested.is_dir() {
            Ok(DataSource::Directory(nested))
        } else {
            Ok(DataSource::Directory(path.to_path_buf()))
        }
    }

    /// Raw bytes of `file_name`, or `None` when the source has no such file.
    pub fn read(&self, file_name: &str) -> Result<Option<Vec<u8>>> {
        match self {
            DataSource::Directory(dir) => {
                let path = dir.join(file_name);
                if path.is_file() {
                    Ok(Some(fs::read(path)?))
                } else {
                    Ok(None)
                }
            }
            DataSource::Archive(path) => {
                let mut archive = zip::ZipArchive::new(File::open(path)?)?;
                let wanted = format!("data/{file_name}");
                let nested = format!("/{wanted}");
                for index in 0..archive.len() {
                    let mut entry = archive.by_index(index)?;
                    let matches = entry.name() == wanted || entry.name().ends_with(&nested);
                    if entry.is_dir() || !matches {
                        continue;
                    }
                    let mut buf = Vec::with_capacity(entry.size() as usize);
                    entry.read_to_end(&mut buf)?;
                    return Ok(Some(buf));
                }
                Ok(None)
            }
        }
    }

    fn load_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<Option<T>> {
        let Some(bytes) = self.read(file_name)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).map_err(|source| LinkLinkError::Json {
            file: file_name.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    fn require_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<T> {
        self.load_json(file_name)?.ok_or_else(|| {
            LinkLinkError::Config(format!("Could not find data/{file_name} in world data"))
        })
    }
}

/// The parsed tables of the link world, before synthesis.
#[derive(Debug, Clone)]
pub struct LinkData {
    pub game: GameInfo,
    pub items: Vec<ItemDef>,
    pub locations: Vec<LocationDef>,
    pub regions: RegionTable,
}

impl LinkData {
    pub fn load(source: &DataSource, extra_item_files: &[String]) -> Result<Self> {
        let game: GameInfo = source.require_json("game.json")?;
        let mut items = source.require_json::<Listing<ItemDef>>("items.json")?.into_vec();

        for (i, extra_file) in extra_item_files.iter().enumerate() {
            let extra = source.require_json::<Listing<ItemDef>>(extra_file)?.into_vec();
            append_extra_items(&mut items, extra, i);
        }

        let locations = source
            .load_json::<Listing<LocationDef>>("locations.json")?
            .map(Listing::into_vec)
            .unwrap_or_default();
        let regions = source
            .load_json::<RegionTable>("regions.json")?
            .unwrap_or_default();

        log::debug!(
            "Loaded {} items, {} locations, {} regions for {}",
            items.len(),
            locations.len(),
            regions.len(),
            game.game_id()
        );

        Ok(LinkData {
            game,
            items,
            locations,
            regions,
        })
    }

    pub fn link_table(&self) -> LinkTable {
        LinkTable::from_items(&self.items)
    }
}

/// Appends the `index`-th (0-based) extra item file. Its first item is
/// pinned to id `(index + 1) * 1000` so each file gets its own id block.
fn append_extra_items(items: &mut Vec<ItemDef>, mut extra: Vec<ItemDef>, index: usize) {
    if let Some(first) = extra.first_mut() {
        first.id = Some((index as u64 + 1) * 1000);
    }
    items.append(&mut extra);
}
