use log::{debug, info, warn};
use serde::Serialize;

use crate::data::{LinkItemDef, LinkTable};
use crate::session::{ItemId, LocationId, PlayerId, Session};
use crate::synth::{is_link_location_of, link_location_name, replica_region_name};
use crate::{LinkLinkError, Result};

#[derive(Debug, Clone, Copy)]
pub struct PlacementConfig {
    pub max_players: usize,
    /// Keeps unfilled link locations around instead of removing them.
    pub fake_generation: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkPlacement {
    pub location: String,
    pub item: String,
    pub donor: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlacementReport {
    pub placed: Vec<LinkPlacement>,
    /// Replicas no donor could feed, e.g. "Sword 2".
    pub reclaimed: Vec<String>,
    pub removed_locations: usize,
}

fn priority(allow: &[String], name: &str) -> usize {
    allow
        .iter()
        .position(|candidate| candidate == name)
        .unwrap_or(usize::MAX)
}

/// Locks donor items into `player`'s link locations.
///
/// Replicas are processed in order. For each one, every victim (ascending
/// player id) whose game is on the allow-list gets the next donor slot and
/// donates its best-priority unplaced item, if it has any. A replica no donor
/// could feed is reclaimed: its placeholder leaves `player`'s pool. Outside of
/// fake generation, link locations still empty afterwards are removed.
pub fn place_links(
    session: &mut Session,
    table: &LinkTable,
    player: PlayerId,
    config: &PlacementConfig,
) -> Result<PlacementReport> {
    let mut victims = session.victim_set(player);
    victims.remove(&player);

    let mut unplaced: Vec<ItemId> = session
        .pool()
        .iter()
        .copied()
        .filter(|&id| session.item(id).location.is_none())
        .collect();
    let mut report = PlacementReport::default();

    for def in &table.defs {
        debug!("{def:?}");
        for replica in 1..=def.count {
            let mut any_placed = false;
            let mut slot = 1;

            for donor in 1..=session.player_count() {
                if donor == player || !victims.contains(&donor) {
                    continue;
                }
                let name = link_location_name(def, replica, slot, config.max_players);
                let Some(location) = session.find_location(&name, player) else {
                    continue;
                };

                let game = session.player(donor).game.clone();
                let Some(allow) = def.allow_list(&game) else {
                    debug!("Game {game} not in linklink for {}", def.name);
                    continue;
                };
                session.tag_link_location(location, &def.name);

                let mut options: Vec<ItemId> = unplaced
                    .iter()
                    .copied()
                    .filter(|&id| {
                        let item = session.item(id);
                        item.player == donor && allow.contains(&item.name)
                    })
                    .collect();
                options.sort_by_key(|&id| priority(allow, &session.item(id).name));

                if replica == 1 && options.is_empty() {
                    warn!(
                        "No options for {} {} for {} ({})",
                        def.name,
                        replica,
                        session.player_name(donor),
                        game
                    );
                }

                if let Some(&item) = options.first() {
                    session.place_locked_item(location, item)?;
                    unplaced.retain(|&id| id != item);
                    session.pool_remove(item);
                    report.placed.push(LinkPlacement {
                        location: name,
                        item: session.item(item).name.clone(),
                        donor: session.player_name(donor).to_string(),
                    });
                    slot += 1;
                    any_placed = true;
                }
            }

            if !any_placed {
                reclaim_replica(session, &mut unplaced, def, player)?;
                report.reclaimed.push(replica_region_name(def, replica));
            }
        }

        if !config.fake_generation {
            report.removed_locations += remove_unfilled_links(session, def, player);
        }
    }

    Ok(report)
}

fn reclaim_replica(
    session: &mut Session,
    unplaced: &mut Vec<ItemId>,
    def: &LinkItemDef,
    player: PlayerId,
) -> Result<()> {
    let pos = unplaced
        .iter()
        .position(|&id| {
            let item = session.item(id);
            item.name == def.name && item.player == player
        })
        .ok_or_else(|| LinkLinkError::MissingPlaceholder {
            item: def.name.clone(),
            player: session.player_name(player).to_string(),
        })?;

    let item = unplaced.remove(pos);
    info!("Removing surplus {}", def.name);
    session.pool_remove(item);
    Ok(())
}

fn remove_unfilled_links(session: &mut Session, def: &LinkItemDef, player: PlayerId) -> usize {
    let stale: Vec<LocationId> = session
        .unfilled_locations_of(player)
        .into_iter()
        .filter(|&id| is_link_location_of(&session.location(id).name, &def.name))
        .collect();
    for &id in &stale {
        session.remove_location(id);
    }
    stale.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionSpec;
    use crate::test_support::{donor, link_item, link_player, link_world, session_from};

    const CONFIG: PlacementConfig = PlacementConfig {
        max_players: 3,
        fake_generation: false,
    };

    fn own_pool(session: &Session, player: PlayerId, name: &str) -> usize {
        session
            .pool()
            .iter()
            .filter(|&&id| session.item(id).player == player && session.item(id).name == name)
            .count()
    }

    #[test]
    fn single_donor_feeds_first_replica_and_second_is_reclaimed() {
        let items = vec![link_item(
            "Relic",
            2,
            vec![("Game A", vec!["Gem"]), ("Game B", vec!["Gem"])],
        )];
        let world = link_world(items, 3);
        let spec = SessionSpec {
            seed: None,
            players: vec![
                link_player("Link"),
                donor("Alice", "Game A", &["Gem", "Rock"], 2),
                donor("Bob", "Game B", &["Rock"], 1),
            ],
        };
        let mut session = session_from(&spec, &world);
        let table = LinkTable::from_items(&world.items);
        assert_eq!(session.locations_of(1).count(), 6);
        let alice_before = session.pool_count(2);
        let bob_before = session.pool_count(3);

        let report = place_links(&mut session, &table, 1, &CONFIG).unwrap();

        assert_eq!(report.placed.len(), 1);
        assert_eq!(report.placed[0].location, "Relic 1 Player 1");
        assert_eq!(report.placed[0].item, "Gem");
        assert_eq!(report.reclaimed, ["Relic 2"]);
        assert_eq!(report.removed_locations, 5);

        let survivors: Vec<_> = session.locations_of(1).collect();
        assert_eq!(survivors.len(), 1);
        let location = session.location(survivors[0]);
        assert!(location.locked);
        assert_eq!(location.link_item_name.as_deref(), Some("Relic"));

        assert_eq!(own_pool(&session, 1, "Relic"), 1);
        assert_eq!(session.pool_count(2), alice_before - 1);
        assert_eq!(session.pool_count(3), bob_before);
    }

    #[test]
    fn every_victim_gets_its_own_slot_in_player_order() {
        let items = vec![link_item("Coin", 1, vec![("Game A", vec!["Gold", "Silver"])])];
        let world = link_world(items, 3);
        let spec = SessionSpec {
            seed: None,
            players: vec![
                donor("Alice", "Game A", &["Silver", "Gold"], 2),
                link_player("Link"),
                donor("Bob", "Game A", &["Silver"], 1),
            ],
        };
        let mut session = session_from(&spec, &world);
        let table = LinkTable::from_items(&world.items);

        let report = place_links(&mut session, &table, 2, &CONFIG).unwrap();

        let summary: Vec<_> = report
            .placed
            .iter()
            .map(|p| (p.location.as_str(), p.item.as_str(), p.donor.as_str()))
            .collect();
        assert_eq!(
            summary,
            [
                ("Coin 1 Player 1", "Gold", "Alice"),
                ("Coin 1 Player 2", "Silver", "Bob"),
            ]
        );
        assert_eq!(report.removed_locations, 1);
        assert!(report.reclaimed.is_empty());
    }

    #[test]
    fn non_victims_never_donate() {
        let items = vec![link_item("Coin", 1, vec![("Game A", vec!["Gold"])])];
        let world = link_world(items, 3);
        let mut link = link_player("Link");
        link.victims = vec!["Bob".to_string()];
        let spec = SessionSpec {
            seed: None,
            players: vec![
                link,
                donor("Alice", "Game A", &["Gold"], 1),
                donor("Bob", "Game A", &["Gold"], 1),
            ],
        };
        let mut session = session_from(&spec, &world);
        let table = LinkTable::from_items(&world.items);

        let report = place_links(&mut session, &table, 1, &CONFIG).unwrap();
        assert_eq!(report.placed.len(), 1);
        assert_eq!(report.placed[0].donor, "Bob");
        assert_eq!(session.pool_count(2), 1);
    }

    #[test]
    fn fake_generation_keeps_unfilled_locations() {
        let items = vec![link_item("Coin", 2, vec![("Game A", vec!["Gold"])])];
        let world = link_world(items, 3);
        let spec = SessionSpec {
            seed: None,
            players: vec![link_player("Link"), donor("Alice", "Game A", &["Gold"], 1)],
        };
        let mut session = session_from(&spec, &world);
        let table = LinkTable::from_items(&world.items);
        let config = PlacementConfig {
            fake_generation: true,
            ..CONFIG
        };

        let report = place_links(&mut session, &table, 1, &config).unwrap();
        assert_eq!(report.removed_locations, 0);
        assert_eq!(report.reclaimed, ["Coin 2"]);
        assert_eq!(session.locations_of(1).count(), 6);
        assert_eq!(session.unfilled_locations_of(1).len(), 5);
    }

    #[test]
    fn missing_placeholder_is_fatal() {
        let items = vec![link_item("Coin", 1, vec![("Game A", vec!["Gold"])])];
        let world = link_world(items, 3);
        let mut link = link_player("Link");
        link.start_inventory = vec!["Coin".to_string()];
        let spec = SessionSpec {
            seed: None,
            players: vec![link, donor("Alice", "Game A", &["Rock"], 1)],
        };
        let mut session = session_from(&spec, &world);
        let table = LinkTable::from_items(&world.items);

        let err = place_links(&mut session, &table, 1, &CONFIG).unwrap_err();
        assert!(matches!(err, LinkLinkError::MissingPlaceholder { .. }));
    }

    #[test]
    fn empty_allow_map_reclaims_every_replica() {
        let items = vec![link_item("Void", 2, vec![])];
        let world = link_world(items, 3);
        let spec = SessionSpec {
            seed: None,
            players: vec![link_player("Link"), donor("Alice", "Game A", &["Gold"], 1)],
        };
        let mut session = session_from(&spec, &world);
        let table = LinkTable::from_items(&world.items);

        let report = place_links(&mut session, &table, 1, &CONFIG).unwrap();
        assert_eq!(report.reclaimed, ["Void 1", "Void 2"]);
        assert_eq!(own_pool(&session, 1, "Void"), 0);
    }
}
