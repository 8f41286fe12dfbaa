use log::{debug, error};
use serde::Serialize;
use std::collections::VecDeque;

use crate::session::{ItemId, PlayerId, Session};

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Placeholder filler of the link game, e.g. "Nothing".
    pub sentinel: String,
    /// Games that are never asked for filler.
    pub filler_blacklist: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub needed: usize,
    pub added: usize,
    pub failed_donors: Vec<String>,
}

/// Swaps `player`'s sentinel items for filler borrowed from its victims so
/// the session pool again matches the number of unfilled locations.
///
/// Donors are asked round-robin in player order. A donor that cannot make
/// filler is dropped for good and the queue restarts from its head; once no
/// donor is left the pool stays short.
pub fn replace_nothings(
    session: &mut Session,
    player: PlayerId,
    config: &ReconcileConfig,
) -> ReconcileReport {
    let mut sentinels: VecDeque<ItemId> = session
        .pool()
        .iter()
        .copied()
        .filter(|&id| {
            let item = session.item(id);
            item.player == player && item.name == config.sentinel
        })
        .collect();

    let location_count = session.locations_of(player).count();
    let own_items = session.pool_count(player) - sentinels.len();
    let needed = location_count.saturating_sub(own_items);
    debug!(
        "{}: {} locations, {} items, {} sentinels",
        session.player_name(player),
        location_count,
        own_items,
        sentinels.len()
    );

    let mut donors: Vec<PlayerId> = session
        .victim_set(player)
        .into_iter()
        .filter(|&victim| {
            victim != player && !config.filler_blacklist.contains(&session.player(victim).game)
        })
        .collect();

    let mut report = ReconcileReport {
        needed,
        ..ReconcileReport::default()
    };
    let mut cursor = 0;

    while report.added < needed {
        if donors.is_empty() {
            error!(
                "No donors left to create filler for {}: {} of {} added",
                session.player_name(player),
                report.added,
                needed
            );
            break;
        }
        if cursor >= donors.len() {
            cursor = 0;
        }

        let donor = donors[cursor];
        match session.create_filler(donor) {
            Ok(filler) => {
                // Filler goes in before the sentinel it replaces comes out.
                session.pool_add(filler);
                if let Some(sentinel) = sentinels.pop_front() {
                    session.pool_remove(sentinel);
                }
                report.added += 1;
                cursor += 1;
            }
            Err(failure) => {
                error!("Error creating filler for {}: {failure}", failure.player);
                report.failed_donors.push(failure.player);
                donors.remove(cursor);
                cursor = 0;
            }
        }
    }

    for sentinel in sentinels {
        session.pool_remove(sentinel);
    }

    report
}
