//! Items lying on the ground.

use std::sync::{Mutex, PoisonError};

use realm_shared::{BaseStats, DefenceType, Direction, ObjectId, ObjectType, Point, ServerMessage};

use super::{AttackerInfo, DamageOutcome, MapObject};
use crate::world::GameWorld;

/// A concrete item instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserItem {
    pub unique_id: u64,
    /// Template index
    pub item_index: u32,
    pub name: String,
    pub current_durability: u16,
    pub max_durability: u16,
    pub count: u32,
}

/// What a ground item holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemContent {
    Gold(u64),
    Item(UserItem),
}

/// An item dropped on the map
#[derive(Debug)]
pub struct WorldItem {
    id: ObjectId,
    name: String,
    content: ItemContent,
    point: Mutex<Point>,
}

impl WorldItem {
    pub fn gold(id: ObjectId, amount: u64) -> Self {
        Self {
            id,
            name: "Gold".to_string(),
            content: ItemContent::Gold(amount),
            point: Mutex::new(Point::default()),
        }
    }

    pub fn item(id: ObjectId, item: UserItem) -> Self {
        Self {
            id,
            name: item.name.clone(),
            content: ItemContent::Item(item),
            point: Mutex::new(Point::default()),
        }
    }

    pub fn content(&self) -> &ItemContent {
        &self.content
    }

    pub fn set_point(&self, point: Point) {
        *self.point.lock().unwrap_or_else(PoisonError::into_inner) = point;
    }
}

impl MapObject for WorldItem {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn race(&self) -> ObjectType {
        ObjectType::Item
    }

    fn point(&self) -> Point {
        *self.point.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn direction(&self) -> Direction {
        Direction::Up
    }

    fn is_blocking(&self) -> bool {
        false
    }

    fn is_attack_target(&self, _attacker: &AttackerInfo) -> bool {
        false
    }

    fn base_stats(&self) -> BaseStats {
        BaseStats::default()
    }

    fn attacked(
        &self,
        _world: &GameWorld,
        _attacker: &AttackerInfo,
        _damage: i32,
        _defence: DefenceType,
        _damage_weapon: bool,
    ) -> DamageOutcome {
        DamageOutcome::Ignored
    }

    fn appearance(&self) -> ServerMessage {
        match &self.content {
            ItemContent::Gold(gold) => ServerMessage::ObjectGold {
                object_id: self.id,
                gold: *gold,
                location: self.point(),
            },
            ItemContent::Item(item) => ServerMessage::ObjectItem {
                object_id: self.id,
                name: item.name.clone(),
                location: self.point(),
            },
        }
    }
}
