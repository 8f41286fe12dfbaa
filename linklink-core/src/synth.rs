//! Synthesis of link locations and regions from the link item table.
//!
//! Runs once while the location and region tables are being built, before
//! any item exists. Every link item gets one region per replica and one
//! location per (replica, donor slot) pair; the Placement Engine later fills
//! or removes those locations per player.

use crate::data::{LinkItemDef, LinkTable, LocationDef, RegionDef, RegionTable};

pub const FREE_ITEMS_REGION: &str = "Free Items";

/// Zero-pad width for indices up to `max`: the digit count of `max + 1`.
pub fn pad_width(max: usize) -> usize {
    (max + 1).to_string().len()
}

pub fn replica_region_name(def: &LinkItemDef, replica: usize) -> String {
    format!(
        "{} {:0width$}",
        def.name,
        replica,
        width = pad_width(def.count)
    )
}

pub fn link_location_name(
    def: &LinkItemDef,
    replica: usize,
    slot: usize,
    max_players: usize,
) -> String {
    format!(
        "{} Player {:0width$}",
        replica_region_name(def, replica),
        slot,
        width = pad_width(max_players)
    )
}

/// Logic token meaning "owns replica `replica` of this link item".
pub fn replica_requirement(def: &LinkItemDef, replica: usize) -> String {
    format!("|{}:{}|", def.name, replica)
}

/// Whether `location_name` has the shape `"{item_name} <digits> Player <digits>"`.
///
/// A plain prefix test would also match links whose names merely start with
/// `item_name` (e.g. "Sword" vs "Sword Upgrade").
pub fn is_link_location_of(location_name: &str, item_name: &str) -> bool {
    let Some(rest) = location_name
        .strip_prefix(item_name)
        .and_then(|rest| rest.strip_prefix(' '))
    else {
        return false;
    };
    let Some((replica, slot)) = rest.split_once(" Player ") else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(replica) && all_digits(slot)
}

/// Appends the link locations of every linkable def, then `free_items`
/// free-item locations.
pub fn extend_location_table(
    mut locations: Vec<LocationDef>,
    table: &LinkTable,
    max_players: usize,
    free_items: usize,
) -> Vec<LocationDef> {
    for def in table.defs.iter().filter(|def| def.is_linkable()) {
        for replica in 1..=def.count {
            let region = replica_region_name(def, replica);
            for slot in 1..=max_players {
                locations.push(LocationDef {
                    name: link_location_name(def, replica, slot, max_players),
                    region: region.clone(),
                    category: vec![def.name.clone()],
                    requires: String::new(),
                });
            }
        }
    }

    let width = pad_width(free_items);
    for i in 1..=free_items {
        locations.push(LocationDef {
            name: format!("Free Item {:0width$}", i),
            region: FREE_ITEMS_REGION.to_string(),
            category: vec![FREE_ITEMS_REGION.to_string()],
            requires: String::new(),
        });
    }

    locations
}

/// Adds one region per link replica. Regions already in the table are kept
/// as they are.
pub fn extend_region_table(mut regions: RegionTable, table: &LinkTable) -> RegionTable {
    for def in table.defs.iter().filter(|def| def.is_linkable()) {
        for replica in 1..=def.count {
            regions
                .entry(replica_region_name(def, replica))
                .or_insert_with(|| RegionDef {
                    requires: replica_requirement(def, replica),
                    ..RegionDef::default()
                });
        }
    }
    regions
}
