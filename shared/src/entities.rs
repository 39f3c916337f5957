//! Shared entity definitions.

use serde::{Deserialize, Serialize};

/// Unique id of any object placed on a map
pub type ObjectId = u32;

/// Kind of a map object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectType {
    Player = 0,
    Monster = 1,
    Item = 2,
    Merchant = 3,
}

/// Combat stats every attackable object exposes to its attackers
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseStats {
    pub min_ac: u16,
    pub max_ac: u16,
    pub min_mac: u16,
    pub max_mac: u16,
    pub min_dc: u16,
    pub max_dc: u16,
    pub min_mc: u16,
    pub max_mc: u16,
    pub min_sc: u16,
    pub max_sc: u16,
    pub accuracy: u8,
    pub agility: u8,
}

/// How an incoming hit is defended against.
///
/// The agility variants roll a dodge against the attacker's accuracy before
/// any armor is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DefenceType {
    ACAgility = 0,
    AC = 1,
    MACAgility = 2,
    MAC = 3,
    Agility = 4,
}

impl DefenceType {
    pub fn has_agility_gate(&self) -> bool {
        matches!(self, Self::ACAgility | Self::MACAgility | Self::Agility)
    }
}

/// Kind of floating damage indicator shown to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DamageType {
    Hit = 0,
    Miss = 1,
    Critical = 2,
}
