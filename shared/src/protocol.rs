//! Network protocol definitions shared between client and server.
//!
//! Only the server-to-client events produced by the world simulation live
//! here; session handling is owned by the network layer.

use serde::{Deserialize, Serialize};

use crate::{DamageType, Direction, ObjectId, Point};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 3;

/// Server tick rate in Hz
pub const SERVER_TICK_RATE: u32 = 20;

/// Radius (in cells) within which observers receive an object's events
pub const DATA_RANGE: i32 = 20;

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// A monster came into view
    ObjectMonster {
        object_id: ObjectId,
        name: String,
        name_color: [u8; 3],
        location: Point,
        image: u16,
        direction: Direction,
        effect: u8,
        ai: u8,
        light: u8,
        dead: bool,
        skeleton: bool,
        hidden: bool,
    },

    /// A player came into view
    ObjectPlayer {
        object_id: ObjectId,
        name: String,
        location: Point,
        direction: Direction,
        dead: bool,
    },

    /// An item came into view
    ObjectItem {
        object_id: ObjectId,
        name: String,
        location: Point,
    },

    /// A gold pile came into view
    ObjectGold {
        object_id: ObjectId,
        gold: u64,
        location: Point,
    },

    /// An object left view or was removed from the map
    ObjectRemove {
        object_id: ObjectId,
    },

    /// An object walked one cell
    ObjectWalk {
        object_id: ObjectId,
        location: Point,
        direction: Direction,
    },

    /// An object turned in place
    ObjectTurn {
        object_id: ObjectId,
        location: Point,
        direction: Direction,
    },

    /// Attack animation
    ObjectAttack {
        object_id: ObjectId,
        location: Point,
        direction: Direction,
    },

    /// Struck animation
    ObjectStruck {
        object_id: ObjectId,
        attacker_id: ObjectId,
        location: Point,
        direction: Direction,
    },

    /// Health bar update
    ObjectHealth {
        object_id: ObjectId,
        percent: u8,
        /// Seconds the health bar stays visible
        expire: u8,
    },

    /// An object died
    ObjectDied {
        object_id: ObjectId,
        location: Point,
        direction: Direction,
    },

    /// Floating damage number
    DamageIndicator {
        object_id: ObjectId,
        damage: i32,
        kind: DamageType,
    },

    /// Local player's health changed
    HealthChanged {
        hp: u32,
    },

    /// Local player earned experience
    GainExperience {
        amount: u32,
    },
}

impl ServerMessage {
    pub fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Failed to serialize ServerMessage")
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
