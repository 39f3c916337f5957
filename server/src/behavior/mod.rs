//! Creature AI.
//!
//! A creature owns one [`Behavior`], built at spawn by the world's
//! [`BehaviorFactory`] from the template's AI identifier. The behavior runs
//! once per creature tick and drives the creature through its public
//! movement and combat operations.

use log::warn;
use rand::Rng;

use realm_shared::{Direction, Point};

use crate::entities::{Creature, MapObject};
use crate::world::GameWorld;

/// Aggressive melee monsters
pub const AI_HOSTILE: u8 = 0;
/// Wanders around, never attacks
pub const AI_PASSIVE: u8 = 1;
pub const AI_PASSIVE_ALT: u8 = 2;
/// Never moves or attacks
pub const AI_STATIC: u8 = 3;
/// Town guards
pub const AI_GUARD: u8 = 6;
pub const AI_GUARD_ALT: u8 = 58;

/// One in this many idle ticks a roaming creature takes a step
const ROAM_CHANCE: u32 = 10;

pub fn is_guard(ai: u8) -> bool {
    matches!(ai, AI_GUARD | AI_GUARD_ALT)
}

/// Creatures guards leave alone
pub fn is_pacifist(ai: u8) -> bool {
    matches!(ai, AI_PASSIVE | AI_PASSIVE_ALT | AI_STATIC)
}

/// Per-creature AI strategy
pub trait Behavior: Send {
    fn tick(&mut self, creature: &Creature, world: &GameWorld);
}

/// Builds the behavior for a freshly spawned creature
pub trait BehaviorFactory: Send + Sync {
    fn create(&self, ai: u8, creature: &Creature) -> Box<dyn Behavior>;
}

/// Maps the built-in AI identifiers to their strategies
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBehaviorFactory;

impl BehaviorFactory for DefaultBehaviorFactory {
    fn create(&self, ai: u8, creature: &Creature) -> Box<dyn Behavior> {
        match ai {
            AI_HOSTILE => Box::new(HostileBehavior),
            AI_PASSIVE | AI_PASSIVE_ALT => Box::new(RoamBehavior),
            AI_STATIC => Box::new(IdleBehavior),
            AI_GUARD | AI_GUARD_ALT => Box::new(GuardBehavior),
            _ => {
                warn!("Unknown AI {} for {} ({}), using idle behavior", ai, creature.name(), creature.id());
                Box::new(IdleBehavior)
            }
        }
    }
}

/// Does nothing
#[derive(Debug, Default)]
pub struct IdleBehavior;

impl Behavior for IdleBehavior {
    fn tick(&mut self, _creature: &Creature, _world: &GameWorld) {}
}

fn roam(creature: &Creature, world: &GameWorld) {
    if creature.can_move(world) && rand::thread_rng().gen_ratio(1, ROAM_CHANCE) {
        creature.walk(world, Direction::random());
    }
}

/// Where the current target stands
fn target_point(creature: &Creature, world: &GameWorld) -> Option<Point> {
    let target = world.object(creature.target()?)?;
    Some(target.point())
}

/// Wanders at random
#[derive(Debug, Default)]
pub struct RoamBehavior;

impl Behavior for RoamBehavior {
    fn tick(&mut self, creature: &Creature, world: &GameWorld) {
        if creature.is_dead() {
            return;
        }
        roam(creature, world);
    }
}

/// Hunts anything attackable in view, chasing and striking in melee
#[derive(Debug, Default)]
pub struct HostileBehavior;

impl Behavior for HostileBehavior {
    fn tick(&mut self, creature: &Creature, world: &GameWorld) {
        if creature.is_dead() {
            return;
        }
        if creature.target().is_none() {
            creature.find_target(world);
        }

        match target_point(creature, world) {
            Some(point) if creature.point().in_range(point, 1) => {
                creature.attack(world);
            }
            Some(point) => {
                if creature.can_move(world) {
                    creature.move_to(world, point);
                }
            }
            None => roam(creature, world),
        }
    }
}

/// Stands still and strikes adjacent targets with the guard attack
#[derive(Debug, Default)]
pub struct GuardBehavior;

impl Behavior for GuardBehavior {
    fn tick(&mut self, creature: &Creature, world: &GameWorld) {
        if creature.is_dead() {
            return;
        }
        if creature.target().is_none() {
            creature.find_target(world);
        }
        if let Some(point) = target_point(creature, world) {
            if creature.point().in_range(point, 1) {
                creature.guard_attack(world);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{GameDb, MonsterInfo};
    use crate::entities::ServerPlayer;
    use crate::world::tests::test_world;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_ai_classes() {
        assert!(is_guard(6) && is_guard(58));
        assert!(!is_guard(0));
        assert!(is_pacifist(1) && is_pacifist(2) && is_pacifist(3));
        assert!(!is_pacifist(0) && !is_pacifist(6));
    }

    #[test]
    fn test_unknown_ai_still_ticks() {
        let (world, clock) = test_world(GameDb::new());
        let mut info = MonsterInfo::new("Odd", 10);
        info.ai = 200;
        let creature = world.spawn_creature(&info, Point::new(3, 3)).unwrap();

        clock.advance(Duration::from_secs(10));
        assert!(creature.tick(&world));
        assert_eq!(creature.point(), Point::new(3, 3));
    }

    #[test]
    fn test_hostile_chases_and_hits_player() {
        let (world, clock) = test_world(GameDb::new());
        let mut info = MonsterInfo::new("Wolf", 50);
        info.min_dc = 5;
        info.max_dc = 5;
        info.move_speed = 500;
        info.attack_speed = 1_000;
        let wolf = world.spawn_creature(&info, Point::new(5, 5)).unwrap();

        let (player, _rx) = ServerPlayer::new(world.new_object_id(), "Ann", 100);
        let player = Arc::new(player);
        world.add_player(player.clone(), Point::new(5, 8));

        for _ in 0..20 {
            clock.advance(Duration::from_millis(500));
            wolf.tick(&world);
        }

        assert_eq!(wolf.target(), Some(player.id()));
        assert!(wolf.point().in_range(Point::new(5, 8), 1));
        assert!(player.hp() < 100);
    }

    #[test]
    fn test_guard_one_shots_outlaw_only() {
        let (world, clock) = test_world(GameDb::new());
        let mut info = MonsterInfo::new("Guard", 1_000);
        info.ai = AI_GUARD;
        let guard = world.spawn_creature(&info, Point::new(10, 10)).unwrap();

        let (player, _rx) = ServerPlayer::new(world.new_object_id(), "Ann", 500);
        let player = Arc::new(player);
        world.add_player(player.clone(), Point::new(11, 10));

        clock.advance(Duration::from_secs(2));
        guard.tick(&world);
        assert_eq!(player.hp(), 500);

        player.set_outlaw(true);
        clock.advance(Duration::from_secs(2));
        guard.tick(&world);
        assert!(player.is_dead());
        assert_eq!(guard.point(), Point::new(10, 10));
    }
}
