//! Minimal multiworld host: players, items, regions, locations and the
//! shared item pool, with the primitives the link pipeline calls.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::data::{ItemDef, LocationDef, RegionTable};
use crate::{LinkLinkError, Result};

/// 1-based player slot, as players are numbered in a multiworld.
pub type PlayerId = usize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub usize);

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub game: String,
    /// Resolved `victims` option; empty means every player.
    pub victims: Vec<PlayerId>,
    pub filler_item_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub player: PlayerId,
    pub advancement: bool,
    pub location: Option<LocationId>,
}

#[derive(Debug, Clone)]
pub struct Location {
    pub name: String,
    pub player: PlayerId,
    /// `None` once the location has been removed from the graph.
    pub region: Option<RegionId>,
    pub address: Option<u64>,
    pub category: Vec<String>,
    pub requires: String,
    pub item: Option<ItemId>,
    pub locked: bool,
    pub link_item_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub player: PlayerId,
    pub requires: String,
    pub locations: Vec<LocationId>,
}

/// A donor world that cannot manufacture filler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unable to create filler for {player}")]
pub struct DonorFailure {
    pub player: String,
}

#[derive(Debug)]
pub struct Session {
    seed: u64,
    players: Vec<Player>,
    items: Vec<Item>,
    locations: Vec<Location>,
    regions: Vec<Region>,
    pool: Vec<ItemId>,
    precollected: BTreeMap<PlayerId, Vec<ItemId>>,
    location_index: HashMap<(PlayerId, String), LocationId>,
}

impl Session {
    pub fn new(seed: u64) -> Self {
        Session {
            seed,
            players: Vec::new(),
            items: Vec::new(),
            locations: Vec::new(),
            regions: Vec::new(),
            pool: Vec::new(),
            precollected: BTreeMap::new(),
            location_index: HashMap::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn add_player(
        &mut self,
        name: &str,
        game: &str,
        filler_item_name: Option<String>,
    ) -> PlayerId {
        let id = self.players.len() + 1;
        self.players.push(Player {
            id,
            name: name.to_string(),
            game: game.to_string(),
            victims: Vec::new(),
            filler_item_name,
        });
        id
    }

    pub fn set_victims(&mut self, player: PlayerId, victims: Vec<PlayerId>) {
        self.players[player - 1].victims = victims;
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> {
        1..=self.players.len()
    }

    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[id - 1]
    }

    pub fn player_name(&self, id: PlayerId) -> &str {
        &self.player(id).name
    }

    /// Players eligible to donate to / receive links from `player`. An empty
    /// `victims` option means everybody, `player` included.
    pub fn victim_set(&self, player: PlayerId) -> BTreeSet<PlayerId> {
        let victims = &self.player(player).victims;
        if victims.is_empty() {
            self.player_ids().collect()
        } else {
            victims.iter().copied().collect()
        }
    }

    /// Per-player random source, stable for a given session seed.
    pub fn player_random(&self, player: PlayerId) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ (player as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    pub fn create_item(&mut self, name: &str, player: PlayerId, advancement: bool) -> ItemId {
        let id = ItemId(self.items.len());
        self.items.push(Item {
            name: name.to_string(),
            player,
            advancement,
            location: None,
        });
        id
    }

    pub fn item(&self, id: ItemId) -> &Item {
        &self.items[id.0]
    }

    /// Manufactures one filler item owned by `donor`.
    pub fn create_filler(
        &mut self,
        donor: PlayerId,
    ) -> std::result::Result<ItemId, DonorFailure> {
        match self.player(donor).filler_item_name.clone() {
            Some(name) => Ok(self.create_item(&name, donor, false)),
            None => Err(DonorFailure {
                player: self.player_name(donor).to_string(),
            }),
        }
    }

    pub fn add_region(&mut self, player: PlayerId, name: &str, requires: &str) -> RegionId {
        let id = RegionId(self.regions.len());
        self.regions.push(Region {
            name: name.to_string(),
            player,
            requires: requires.to_string(),
            locations: Vec::new(),
        });
        id
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0]
    }

    pub fn add_location(
        &mut self,
        region: RegionId,
        name: &str,
        address: Option<u64>,
        category: Vec<String>,
        requires: &str,
    ) -> LocationId {
        let id = LocationId(self.locations.len());
        let player = self.regions[region.0].player;
        self.locations.push(Location {
            name: name.to_string(),
            player,
            region: Some(region),
            address,
            category,
            requires: requires.to_string(),
            item: None,
            locked: false,
            link_item_name: None,
        });
        self.regions[region.0].locations.push(id);
        self.location_index.insert((player, name.to_string()), id);
        id
    }

    pub fn location(&self, id: LocationId) -> &Location {
        &self.locations[id.0]
    }

    pub fn tag_link_location(&mut self, id: LocationId, link_item_name: &str) {
        self.locations[id.0].link_item_name = Some(link_item_name.to_string());
    }

    pub fn find_location(&self, name: &str, player: PlayerId) -> Option<LocationId> {
        self.location_index.get(&(player, name.to_string())).copied()
    }

    /// Locations currently attached to `player`'s regions, in region order.
    pub fn locations_of(&self, player: PlayerId) -> impl Iterator<Item = LocationId> + '_ {
        self.regions
            .iter()
            .filter(move |region| region.player == player)
            .flat_map(|region| region.locations.iter().copied())
    }

    pub fn unfilled_locations_of(&self, player: PlayerId) -> Vec<LocationId> {
        self.locations_of(player)
            .filter(|&id| self.location(id).item.is_none())
            .collect()
    }

    /// Every filled location still in the graph, across all players.
    pub fn filled_locations(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.regions
            .iter()
            .flat_map(|region| region.locations.iter().copied())
            .filter(|&id| self.location(id).item.is_some())
    }

    /// Display name of a location, as shown in hints and spoilers.
    pub fn location_label(&self, id: LocationId) -> String {
        let location = self.location(id);
        format!("{} ({})", location.name, self.player_name(location.player))
    }

    pub fn place_locked_item(&mut self, location: LocationId, item: ItemId) -> Result<()> {
        self.place_item(location, item)?;
        self.locations[location.0].locked = true;
        Ok(())
    }

    fn place_item(&mut self, location: LocationId, item: ItemId) -> Result<()> {
        if self.locations[location.0].item.is_some() {
            return Err(LinkLinkError::LocationFilled(self.location_label(location)));
        }
        self.locations[location.0].item = Some(item);
        self.items[item.0].location = Some(location);
        Ok(())
    }

    /// Detaches an unfilled location from its region.
    pub fn remove_location(&mut self, id: LocationId) {
        let location = &mut self.locations[id.0];
        if let Some(region) = location.region.take() {
            self.regions[region.0].locations.retain(|&l| l != id);
        }
        self.location_index
            .remove(&(location.player, location.name.clone()));
    }

    pub fn pool(&self) -> &[ItemId] {
        &self.pool
    }

    pub fn pool_add(&mut self, item: ItemId) {
        self.pool.push(item);
    }

    /// Removes one occurrence of `item`; false if it was not in the pool.
    pub fn pool_remove(&mut self, item: ItemId) -> bool {
        match self.pool.iter().position(|&i| i == item) {
            Some(pos) => {
                self.pool.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Pool items owned by `player`.
    pub fn pool_count(&self, player: PlayerId) -> usize {
        self.pool
            .iter()
            .filter(|&&id| self.item(id).player == player)
            .count()
    }

    pub fn precollect(&mut self, player: PlayerId, item: ItemId) {
        self.precollected.entry(player).or_default().push(item);
    }

    pub fn precollected(&self, player: PlayerId) -> &[ItemId] {
        self.precollected
            .get(&player)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Places the whole remaining pool into the remaining unfilled locations
    /// of every player, uniformly at random. Returns how many items were placed.
    pub fn fill_remaining(&mut self, rng: &mut StdRng) -> Result<usize> {
        let mut items = std::mem::take(&mut self.pool);
        let mut slots: Vec<LocationId> = self
            .regions
            .iter()
            .flat_map(|region| region.locations.iter().copied())
            .filter(|&id| self.location(id).item.is_none())
            .collect();

        if items.len() != slots.len() {
            warn!(
                "Item pool has {} items for {} unfilled locations",
                items.len(),
                slots.len()
            );
        }

        items.shuffle(rng);
        slots.shuffle(rng);

        let placed = items.len().min(slots.len());
        for (&slot, &item) in slots.iter().zip(items.iter()) {
            self.place_item(slot, item)?;
        }
        self.pool = items.split_off(placed);
        debug!("Filled {placed} locations");
        Ok(placed)
    }
}

fn default_count() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolItemSpec {
    pub name: String,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub advancement: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSpec {
    pub name: String,
    pub game: String,
    #[serde(default)]
    pub victims: Vec<String>,
    #[serde(default)]
    pub items: Vec<PoolItemSpec>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub filler_item_name: Option<String>,
    #[serde(default)]
    pub start_inventory: Vec<String>,
}

/// The players taking part in one generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSpec {
    #[serde(default)]
    pub seed: Option<u64>,
    pub players: Vec<PlayerSpec>,
}

impl SessionSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| LinkLinkError::Json {
            file: path.display().to_string(),
            source,
        })
    }
}

/// The synthesized tables every link-game player is instantiated from.
#[derive(Debug, Clone)]
pub struct LinkWorld {
    pub game_id: String,
    pub filler_item_name: String,
    pub items: Vec<ItemDef>,
    pub locations: Vec<LocationDef>,
    pub regions: RegionTable,
}

impl Session {
    pub fn build(spec: &SessionSpec, world: &LinkWorld, seed: u64) -> Result<Self> {
        let mut session = Session::new(seed);

        for player in &spec.players {
            let filler = if player.game == world.game_id {
                Some(world.filler_item_name.clone())
            } else {
                player.filler_item_name.clone()
            };
            session.add_player(&player.name, &player.game, filler);
        }

        let mut ids_by_name: HashMap<&str, PlayerId> = HashMap::new();
        for (i, player) in spec.players.iter().enumerate() {
            if ids_by_name.insert(player.name.as_str(), i + 1).is_some() {
                return Err(LinkLinkError::Config(format!(
                    "Player name '{}' is used by more than one slot",
                    player.name
                )));
            }
        }

        for (i, player) in spec.players.iter().enumerate() {
            let id = i + 1;
            let victims = player
                .victims
                .iter()
                .map(|victim| {
                    ids_by_name.get(victim.as_str()).copied().ok_or_else(|| {
                        LinkLinkError::UnknownVictim {
                            player: player.name.clone(),
                            victim: victim.clone(),
                        }
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            session.set_victims(id, victims);

            if player.game == world.game_id {
                session.build_link_player(id, player, world);
            } else {
                session.build_donor_player(id, player);
            }
        }

        Ok(session)
    }

    fn build_link_player(&mut self, id: PlayerId, spec: &PlayerSpec, world: &LinkWorld) {
        let mut regions: HashMap<String, RegionId> = HashMap::new();
        for (name, def) in &world.regions {
            regions.insert(name.clone(), self.add_region(id, name, &def.requires));
        }

        for (index, def) in world.locations.iter().enumerate() {
            let region = match regions.get(&def.region) {
                Some(&region) => region,
                None => {
                    let region = self.add_region(id, &def.region, "");
                    regions.insert(def.region.clone(), region);
                    region
                }
            };
            self.add_location(
                region,
                &def.name,
                Some(index as u64 + 1),
                def.category.clone(),
                &def.requires,
            );
        }

        let mut created = Vec::new();
        for def in &world.items {
            for _ in 0..def.count {
                created.push(self.create_item(&def.name, id, def.progression));
            }
        }
        let advancement_of = |name: &str| {
            world
                .items
                .iter()
                .find(|def| def.name == name)
                .is_some_and(|def| def.progression)
        };
        self.finish_player_pool(id, spec, created, advancement_of);
    }

    fn build_donor_player(&mut self, id: PlayerId, spec: &PlayerSpec) {
        let region = self.add_region(id, "Menu", "");
        for (index, name) in spec.locations.iter().enumerate() {
            self.add_location(region, name, Some(index as u64 + 1), Vec::new(), "");
        }

        let mut created = Vec::new();
        for item in &spec.items {
            for _ in 0..item.count {
                created.push(self.create_item(&item.name, id, item.advancement));
            }
        }
        let advancement_of = |name: &str| {
            spec.items
                .iter()
                .find(|item| item.name == name)
                .is_some_and(|item| item.advancement)
        };
        self.finish_player_pool(id, spec, created, advancement_of);
    }

    /// Moves start inventory out of `created`, pools the rest and pads the
    /// pool with filler up to the player's location count.
    fn finish_player_pool(
        &mut self,
        id: PlayerId,
        spec: &PlayerSpec,
        mut created: Vec<ItemId>,
        advancement_of: impl Fn(&str) -> bool,
    ) {
        for name in &spec.start_inventory {
            let item = match created.iter().position(|&item| self.item(item).name == *name) {
                Some(pos) => created.remove(pos),
                None => self.create_item(name, id, advancement_of(name)),
            };
            self.precollect(id, item);
        }

        for item in created {
            self.pool_add(item);
        }

        let location_count = self.locations_of(id).count();
        let item_count = self.pool_count(id);
        if item_count > location_count {
            warn!(
                "{} has {} items for {} locations",
                spec.name, item_count, location_count
            );
            return;
        }
        for _ in item_count..location_count {
            match self.create_filler(id) {
                Ok(filler) => self.pool_add(filler),
                Err(err) => {
                    warn!("Cannot pad item pool: {err}");
                    break;
                }
            }
        }
    }
}
