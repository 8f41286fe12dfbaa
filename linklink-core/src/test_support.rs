use indexmap::IndexMap;

use crate::data::{ItemDef, LinkTable, RegionTable};
use crate::session::{LinkWorld, PlayerSpec, PoolItemSpec, Session, SessionSpec};
use crate::synth;

pub(crate) const LINK_GAME: &str = "Manual_LinkLink_Silasary";

pub(crate) fn link_item(name: &str, count: usize, allow: Vec<(&str, Vec<&str>)>) -> ItemDef {
    let allow: IndexMap<String, Vec<String>> = allow
        .into_iter()
        .map(|(game, names)| {
            (
                game.to_string(),
                names.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();
    ItemDef {
        name: name.to_string(),
        count,
        progression: true,
        useful: false,
        category: Vec::new(),
        id: None,
        linklink: Some(allow),
    }
}

pub(crate) fn link_world(items: Vec<ItemDef>, max_players: usize) -> LinkWorld {
    link_world_with_free_items(items, max_players, 0)
}

pub(crate) fn link_world_with_free_items(
    items: Vec<ItemDef>,
    max_players: usize,
    free_items: usize,
) -> LinkWorld {
    let table = LinkTable::from_items(&items);
    LinkWorld {
        game_id: LINK_GAME.to_string(),
        filler_item_name: "Nothing".to_string(),
        locations: synth::extend_location_table(Vec::new(), &table, max_players, free_items),
        regions: synth::extend_region_table(RegionTable::new(), &table),
        items,
    }
}

pub(crate) fn link_player(name: &str) -> PlayerSpec {
    PlayerSpec {
        name: name.to_string(),
        game: LINK_GAME.to_string(),
        victims: Vec::new(),
        items: Vec::new(),
        locations: Vec::new(),
        filler_item_name: None,
        start_inventory: Vec::new(),
    }
}

/// A non-link player holding one copy of each of `items` and `locations`
/// checks of its own, with "Filler" as its filler item.
pub(crate) fn donor(name: &str, game: &str, items: &[&str], locations: usize) -> PlayerSpec {
    PlayerSpec {
        name: name.to_string(),
        game: game.to_string(),
        victims: Vec::new(),
        items: items
            .iter()
            .map(|item| PoolItemSpec {
                name: item.to_string(),
                count: 1,
                advancement: false,
            })
            .collect(),
        locations: (1..=locations)
            .map(|i| format!("{name} Check {i}"))
            .collect(),
        filler_item_name: Some("Filler".to_string()),
        start_inventory: Vec::new(),
    }
}

pub(crate) fn session_from(spec: &SessionSpec, world: &LinkWorld) -> Session {
    Session::build(spec, world, 42).unwrap()
}
