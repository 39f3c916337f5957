//! Combat math shared by every attackable object.
//!
//! Creatures and players resolve incoming hits with the same rules so that a
//! creature can strike a player through the same call shape it uses against
//! another creature.

use log::trace;
use rand::Rng;

use realm_shared::DefenceType;

/// The defender-side numbers a hit is resolved against
#[derive(Debug, Clone, Copy)]
pub struct DefenceStats {
    pub agility: u8,
    pub min_ac: u16,
    pub max_ac: u16,
    pub min_mac: u16,
    pub max_mac: u16,
    /// Multiplier applied to the rolled armor
    pub armour_rate: f32,
    /// Multiplier applied to incoming damage
    pub damage_rate: f32,
}

/// Result of resolving one incoming hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitResult {
    /// The agility roll beat the attacker's accuracy
    Dodged,
    /// Armor absorbed all of the damage
    Absorbed,
    /// Net damage to subtract from health, always positive
    Hit(i32),
}

/// Roll attack damage from a min/max range, both bounds inclusive
pub fn attack_power<R: Rng + ?Sized>(rng: &mut R, min: i32, max: i32) -> i32 {
    let min = min.max(0);
    let max = max.max(min);
    rng.gen_range(min..=max)
}

/// Roll an armor value from a min/max range, both bounds inclusive.
/// The low bound wins when it exceeds the high bound.
pub fn defence_power<R: Rng + ?Sized>(rng: &mut R, min: i32, max: i32) -> i32 {
    let min = min.max(0);
    let max = max.max(min);
    rng.gen_range(min..=max)
}

/// Resolve `damage` from an attacker with `accuracy` against `defender`
pub fn resolve_hit<R: Rng + ?Sized>(
    rng: &mut R,
    defender: &DefenceStats,
    accuracy: u8,
    damage: i32,
    defence: DefenceType,
) -> HitResult {
    if defence.has_agility_gate() && rng.gen_range(0..=defender.agility) > accuracy {
        return HitResult::Dodged;
    }

    let armour = match defence {
        DefenceType::ACAgility | DefenceType::AC => {
            defence_power(rng, defender.min_ac as i32, defender.max_ac as i32)
        }
        DefenceType::MACAgility | DefenceType::MAC => {
            defence_power(rng, defender.min_mac as i32, defender.max_mac as i32)
        }
        DefenceType::Agility => 0,
    };

    let armour = (armour as f32 * defender.armour_rate) as i32;
    let damage = (damage as f32 * defender.damage_rate) as i32;
    let value = damage.saturating_sub(armour);
    trace!("damage {} vs armour {} -> {}", damage, armour, value);

    if value <= 0 {
        HitResult::Absorbed
    } else {
        HitResult::Hit(value)
    }
}
