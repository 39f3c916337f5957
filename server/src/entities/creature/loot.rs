//! Loot dropped on death.

use log::{debug, warn};
use rand::Rng;

use realm_shared::Point;

use super::{Creature, DROP_RANGE};
use crate::database::{DropInfo, DropPayload};
use crate::entities::WorldItem;
use crate::world::GameWorld;

/// Roll each entry of a drop table. An entry with chance N fires when a
/// roll in `1..=N` comes up 1.
pub fn roll_drops<'a, R: Rng + ?Sized>(rng: &mut R, drops: &'a [DropInfo]) -> Vec<&'a DropInfo> {
    drops
        .iter()
        .filter(|drop| rng.gen_range(1..=drop.chance.max(1)) == 1)
        .collect()
}

impl Creature {
    /// Roll this creature's drop table and place the results around `point`
    pub(crate) fn drop_loot(&self, world: &GameWorld, point: Point) {
        let Some(drops) = world.db().drops(&self.name) else {
            return;
        };

        let rolled = roll_drops(&mut rand::thread_rng(), drops);
        for drop in rolled {
            let item = match &drop.payload {
                DropPayload::Gold(amount) => WorldItem::gold(world.new_object_id(), *amount),
                DropPayload::Item(name) => {
                    let Some(info) = world.db().item(name) else {
                        debug!("{} drop references unknown item {}", self.name, name);
                        continue;
                    };
                    WorldItem::item(world.new_object_id(), world.db().create_item(info))
                }
            };

            if let Err(e) = world.drop_item(item, point, DROP_RANGE) {
                warn!("{} ({}) could not drop loot: {}", self.name, self.id, e);
            }
        }
    }
}
