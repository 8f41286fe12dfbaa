use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap};

use crate::session::{ItemId, PlayerId, Session};
use crate::synth::FREE_ITEMS_REGION;

/// Player -> location address -> hint text.
pub type HintData = BTreeMap<PlayerId, BTreeMap<u64, String>>;

/// One shuffled candidate list, handed out front to back.
#[derive(Debug, Clone)]
struct HintCursor {
    shuffled: Vec<ItemId>,
    cursor: usize,
}

impl HintCursor {
    fn new(mut group: Vec<ItemId>, rng: &mut StdRng) -> Self {
        group.shuffle(rng);
        HintCursor {
            shuffled: group,
            cursor: 0,
        }
    }

    fn draw(&mut self) -> Option<ItemId> {
        let item = self.shuffled.get(self.cursor).copied();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }
}

/// Advancement items of `player` (placed anywhere, then precollected),
/// grouped by name.
fn advancement_groups(session: &Session, player: PlayerId) -> HashMap<&str, Vec<ItemId>> {
    let placed = session
        .filled_locations()
        .filter_map(|location| session.location(location).item);
    let precollected = session.precollected(player).iter().copied();

    let mut groups: HashMap<&str, Vec<ItemId>> = HashMap::new();
    for id in placed.chain(precollected) {
        let item = session.item(id);
        if item.player == player && item.advancement {
            groups.entry(item.name.as_str()).or_default().push(id);
        }
    }
    groups
}

/// Points each of `player`'s filled link locations at a real copy of the
/// link item it stands for.
///
/// Locations are keyed by (owner of the donated item, link item name). The
/// first location of a key shuffles that name's group with `rng`; later
/// locations of the same key take the next candidate. Once a key runs dry its
/// remaining locations get no hint.
pub fn extend_hint_information(
    session: &Session,
    player: PlayerId,
    hints: &mut HintData,
    rng: &mut StdRng,
) {
    let groups = advancement_groups(session, player);
    let entries = hints.entry(player).or_default();
    let mut cursors: HashMap<(PlayerId, &str), HintCursor> = HashMap::new();

    for id in session.locations_of(player) {
        let location = session.location(id);
        let Some(address) = location.address else {
            continue;
        };
        let in_free_items = location
            .region
            .is_some_and(|region| session.region(region).name == FREE_ITEMS_REGION);
        if in_free_items {
            continue;
        }
        let (Some(link_name), Some(donated)) = (location.link_item_name.as_deref(), location.item)
        else {
            continue;
        };
        let link_name = link_name.trim();

        let key = (session.item(donated).player, link_name);
        let cursor = cursors.entry(key).or_insert_with(|| {
            HintCursor::new(groups.get(link_name).cloned().unwrap_or_default(), rng)
        });
        let Some(candidate) = cursor.draw() else {
            continue;
        };

        let text = match session.item(candidate).location {
            Some(at) => session.location_label(at),
            None => format!("In {}'s start inventory", session.player_name(player)),
        };
        entries.insert(address, text);
    }
}
