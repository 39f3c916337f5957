//! Server-side entity definitions.
//!
//! Every object placed on a map implements [`MapObject`]. Combat and
//! targeting dispatch through this trait, so a creature attacks a player and
//! another creature through the same calls.

pub mod creature;
pub mod player;
mod item;

pub use creature::{ActionTask, Creature, CreatureState};
pub use player::ServerPlayer;
pub use item::{ItemContent, UserItem, WorldItem};

use realm_shared::{BaseStats, DefenceType, Direction, ObjectId, ObjectType, Point, ServerMessage};

use crate::world::GameWorld;

/// Snapshot of the attacking side of a combat exchange.
///
/// Taken while the attacker's own state is locked and passed by value, so the
/// defender never has to lock the attacker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackerInfo {
    pub id: ObjectId,
    pub race: ObjectType,
    /// AI identifier when the attacker is a creature
    pub ai: Option<u8>,
    pub accuracy: u8,
    pub point: Point,
}

/// What an incoming attack did to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// The target could not be damaged (already dead, not attackable)
    Ignored,
    /// Dodged or fully absorbed
    Miss,
    /// Health removed from the target
    Hit(u32),
}

/// Capability shared by everything that lives in a map cell
pub trait MapObject: Send + Sync {
    fn id(&self) -> ObjectId;

    fn name(&self) -> &str;

    fn race(&self) -> ObjectType;

    fn point(&self) -> Point;

    fn direction(&self) -> Direction;

    fn is_dead(&self) -> bool {
        false
    }

    /// Whether this object prevents others from entering its cell.
    /// Must not lock the object's state.
    fn is_blocking(&self) -> bool;

    /// Whether `attacker` may target this object.
    /// Must not lock the object's state.
    fn is_attack_target(&self, attacker: &AttackerInfo) -> bool;

    fn base_stats(&self) -> BaseStats;

    /// Deliver `damage` from `attacker`, defended with `defence`
    fn attacked(
        &self,
        world: &GameWorld,
        attacker: &AttackerInfo,
        damage: i32,
        defence: DefenceType,
        damage_weapon: bool,
    ) -> DamageOutcome;

    /// Credit kill experience
    fn win_exp(&self, _amount: u32, _level: u16) {}

    /// Deliver an event to this object if it is an observer
    fn enqueue(&self, _msg: &ServerMessage) {}

    /// Full description sent when this object comes into view
    fn appearance(&self) -> ServerMessage;
}
