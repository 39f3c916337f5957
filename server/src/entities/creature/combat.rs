//! Creature attacks, incoming damage, health and death.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use log::{debug, trace};

use realm_shared::{DamageType, DefenceType, Direction, ObjectId, ObjectType, Point, ServerMessage};

use super::{Creature, CreatureState, DEATH_GRACE};
use crate::combat::{self, DefenceStats, HitResult};
use crate::entities::{AttackerInfo, DamageOutcome, MapObject};
use crate::world::GameWorld;

/// What a health change left to do once the state lock is released
enum HpChange {
    Unchanged,
    Health { percent: u8, point: Point },
    Died(DeathReport),
}

struct DeathReport {
    point: Point,
    direction: Direction,
    exp_owner: Option<ObjectId>,
    master: Option<ObjectId>,
    experience: u32,
    level: u16,
}

impl Creature {
    pub fn can_attack(&self, world: &GameWorld) -> bool {
        !self.is_dead() && world.now() >= self.state().attack_time
    }

    /// Melee the current target. Returns whether an attack was made.
    pub fn attack(&self, world: &GameWorld) -> bool {
        self.strike(world, false)
    }

    /// Guard attack: lethal against players, a normal hit against creatures
    pub fn guard_attack(&self, world: &GameWorld) -> bool {
        self.strike(world, true)
    }

    fn strike(&self, world: &GameWorld, guard: bool) -> bool {
        let now = world.now();
        let (target_id, info) = {
            let state = self.state();
            (state.target, self.attacker_info(&state))
        };
        let Some(target_id) = target_id else {
            return false;
        };
        let Some(target) = world.object(target_id) else {
            return false;
        };
        if !target.is_attack_target(&info) {
            return false;
        }
        let target_point = target.point();
        let lethal = guard && target.race() == ObjectType::Player;

        let (info, damage, point, direction) = {
            let mut state = self.state();
            if self.is_dead() || now < state.attack_time || state.target != Some(target_id) {
                return false;
            }
            state.direction = Direction::from_points(state.point, target_point);
            state.attack_time = now + Duration::from_millis(state.attack_speed);

            let damage = if lethal {
                i32::MAX
            } else {
                combat::attack_power(&mut rand::thread_rng(), state.min_dc as i32, state.max_dc as i32)
            };
            (self.attacker_info(&state), damage, state.point, state.direction)
        };

        world.broadcast(point, &ServerMessage::ObjectAttack {
            object_id: self.id,
            location: point,
            direction,
        }, None);
        if guard {
            world.broadcast(point, &ServerMessage::ObjectTurn {
                object_id: self.id,
                location: point,
                direction,
            }, None);
        }

        if damage <= 0 {
            return true;
        }
        let outcome = target.attacked(world, &info, damage, DefenceType::Agility, false);
        trace!("{} ({}) hit {} for {:?}", self.name, self.id, target_id, outcome);
        true
    }

    /// Resolve an incoming hit
    pub(crate) fn defend(
        &self,
        world: &GameWorld,
        attacker: &AttackerInfo,
        damage: i32,
        defence: DefenceType,
        _damage_weapon: bool,
    ) -> DamageOutcome {
        if self.is_dead() {
            return DamageOutcome::Ignored;
        }

        let my_info = {
            let state = self.state();
            self.attacker_info(&state)
        };
        let retaliate = world
            .object(attacker.id)
            .is_some_and(|object| object.is_attack_target(&my_info));

        let now = world.now();
        let mut state = self.state();
        if self.is_dead() {
            return DamageOutcome::Ignored;
        }
        if state.target.is_none() && retaliate {
            state.target = Some(attacker.id);
        }
        if attacker.race == ObjectType::Player && state.exp_owner.is_none() {
            state.exp_owner = Some(attacker.id);
        }

        let defender = defence_stats(&state);
        let point = state.point;
        let direction = state.direction;
        let value = match combat::resolve_hit(&mut rand::thread_rng(), &defender, attacker.accuracy, damage, defence) {
            HitResult::Hit(value) => value,
            HitResult::Dodged | HitResult::Absorbed => {
                drop(state);
                world.broadcast(point, &ServerMessage::DamageIndicator {
                    object_id: self.id,
                    damage: 0,
                    kind: DamageType::Miss,
                }, None);
                return DamageOutcome::Miss;
            }
        };

        let before = state.hp;
        let change = self.apply_hp(&mut state, now, -(value as i64));
        let lost = before - state.hp;
        drop(state);

        world.broadcast(point, &ServerMessage::ObjectStruck {
            object_id: self.id,
            attacker_id: attacker.id,
            location: point,
            direction,
        }, None);
        world.broadcast(point, &ServerMessage::DamageIndicator {
            object_id: self.id,
            damage: -value,
            kind: DamageType::Hit,
        }, None);
        self.finish_hp_change(world, change);

        DamageOutcome::Hit(lost)
    }

    /// Add `delta` to health, clamped to `0..=max_hp`. Reaching zero kills.
    pub fn change_hp(&self, world: &GameWorld, delta: i32) {
        let change = {
            let mut state = self.state();
            self.apply_hp(&mut state, world.now(), delta as i64)
        };
        self.finish_hp_change(world, change);
    }

    /// Kill the creature. Does nothing if it is already dead.
    pub fn die(&self, world: &GameWorld) {
        let change = {
            let mut state = self.state();
            self.mark_dead(&mut state, world.now())
        };
        self.finish_hp_change(world, change);
    }

    fn apply_hp(&self, state: &mut CreatureState, now: Instant, delta: i64) -> HpChange {
        if self.is_dead() {
            return HpChange::Unchanged;
        }
        let value = (state.hp as i64 + delta).min(state.max_hp as i64);
        if value == state.hp as i64 {
            return HpChange::Unchanged;
        }
        if value <= 0 {
            return self.mark_dead(state, now);
        }

        state.hp = value as u32;
        HpChange::Health {
            percent: (state.hp as u64 * 100 / state.max_hp.max(1) as u64) as u8,
            point: state.point,
        }
    }

    fn mark_dead(&self, state: &mut CreatureState, now: Instant) -> HpChange {
        if self.dead.swap(true, Ordering::AcqRel) {
            return HpChange::Unchanged;
        }
        state.hp = 0;
        state.dead_time = Some(now + DEATH_GRACE);

        HpChange::Died(DeathReport {
            point: state.point,
            direction: state.direction,
            exp_owner: state.exp_owner,
            master: state.master,
            experience: state.experience,
            level: state.level,
        })
    }

    /// Broadcast and credit whatever a health change produced
    fn finish_hp_change(&self, world: &GameWorld, change: HpChange) {
        match change {
            HpChange::Unchanged => {}
            HpChange::Health { percent, point } => {
                world.broadcast(point, &ServerMessage::ObjectHealth {
                    object_id: self.id,
                    percent,
                    expire: 5,
                }, None);
            }
            HpChange::Died(report) => {
                debug!("{} ({}) died at {}", self.name, self.id, report.point);
                world.broadcast(report.point, &ServerMessage::ObjectDied {
                    object_id: self.id,
                    location: report.point,
                    direction: report.direction,
                }, None);

                if report.master.is_none() {
                    let owner = report.exp_owner.and_then(|id| world.object(id));
                    if let Some(owner) = owner.filter(|o| o.race() == ObjectType::Player) {
                        owner.win_exp(report.experience, report.level);
                    }
                }
                self.drop_loot(world, report.point);
            }
        }
    }
}

fn defence_stats(state: &CreatureState) -> DefenceStats {
    DefenceStats {
        agility: state.agility,
        min_ac: state.min_ac,
        max_ac: state.max_ac,
        min_mac: state.min_mac,
        max_mac: state.max_mac,
        armour_rate: state.armour_rate,
        damage_rate: state.damage_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{GameDb, MonsterInfo};
    use crate::entities::ServerPlayer;
    use crate::world::tests::{drain, test_world};
    use realm_shared::Point;
    use std::sync::Arc;

    fn player_attacker(id: ObjectId, accuracy: u8) -> AttackerInfo {
        AttackerInfo {
            id,
            race: ObjectType::Player,
            ai: None,
            accuracy,
            point: Point::new(0, 0),
        }
    }

    fn template(hp: u32) -> MonsterInfo {
        let mut info = MonsterInfo::new("Hen", hp);
        info.ai = 3;
        info
    }

    #[test]
    fn test_hp_stays_in_bounds() {
        let (world, _) = test_world(GameDb::new());
        let hen = world.spawn_creature(&template(50), Point::new(3, 3)).unwrap();

        hen.change_hp(&world, 100);
        assert_eq!(hen.hp(), 50);
        hen.change_hp(&world, -20);
        assert_eq!(hen.hp(), 30);
        hen.change_hp(&world, 5);
        assert_eq!(hen.hp(), 35);
        hen.change_hp(&world, -1_000);
        assert_eq!(hen.hp(), 0);
        assert!(hen.is_dead());

        hen.change_hp(&world, 10);
        assert_eq!(hen.hp(), 0);
    }

    #[test]
    fn test_die_is_idempotent() {
        let (world, clock) = test_world(GameDb::new());
        let hen = world.spawn_creature(&template(10), Point::new(3, 3)).unwrap();
        let (player, mut rx) = ServerPlayer::new(world.new_object_id(), "Ann", 100);
        world.add_player(Arc::new(player), Point::new(4, 4));
        drain(&mut rx);

        hen.die(&world);
        let dead_time = hen.snapshot().dead_time;
        assert!(dead_time.is_some());

        clock.advance_ms(1_000);
        hen.die(&world);
        assert_eq!(hen.snapshot().dead_time, dead_time);

        let deaths = drain(&mut rx)
            .into_iter()
            .filter(|m| matches!(m, ServerMessage::ObjectDied { .. }))
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn test_dodge_leaves_hp_untouched() {
        let (world, _) = test_world(GameDb::new());
        let mut info = template(40);
        info.agility = 255;
        let hen = world.spawn_creature(&info, Point::new(3, 3)).unwrap();
        let (player, mut rx) = ServerPlayer::new(world.new_object_id(), "Ann", 100);
        world.add_player(Arc::new(player), Point::new(4, 4));

        let attacker = player_attacker(999, 0);
        let mut misses = 0;
        for _ in 0..200 {
            drain(&mut rx);
            let before = hen.hp();
            if hen.defend(&world, &attacker, 1, DefenceType::ACAgility, false) == DamageOutcome::Miss {
                misses += 1;
                assert_eq!(hen.hp(), before);
                let messages = drain(&mut rx);
                assert_eq!(messages.len(), 1);
                assert!(matches!(messages[0], ServerMessage::DamageIndicator { kind: DamageType::Miss, .. }));
            }
        }
        assert!(misses > 150);
    }

    #[test]
    fn test_exact_damage_after_armour_and_rates() {
        let (world, _) = test_world(GameDb::new());
        let mut info = template(200);
        info.min_ac = 6;
        info.max_ac = 6;
        info.damage_rate = 1.5;
        info.armour_rate = 0.5;
        let hen = world.spawn_creature(&info, Point::new(3, 3)).unwrap();

        // 20 * 1.5 - 6 * 0.5
        let outcome = hen.defend(&world, &player_attacker(999, 0), 20, DefenceType::AC, false);
        assert_eq!(outcome, DamageOutcome::Hit(27));
        assert_eq!(hen.hp(), 173);

        // 2 * 1.5 - 3 leaves nothing
        let outcome = hen.defend(&world, &player_attacker(999, 0), 2, DefenceType::AC, false);
        assert_eq!(outcome, DamageOutcome::Miss);
        assert_eq!(hen.hp(), 173);
    }

    #[test]
    fn test_hit_broadcasts_struck_indicator_then_health() {
        let (world, _) = test_world(GameDb::new());
        let hen = world.spawn_creature(&template(200), Point::new(3, 3)).unwrap();
        let (player, mut rx) = ServerPlayer::new(world.new_object_id(), "Ann", 100);
        world.add_player(Arc::new(player), Point::new(4, 4));
        drain(&mut rx);

        let outcome = hen.defend(&world, &player_attacker(999, 0), 30, DefenceType::AC, false);
        assert_eq!(outcome, DamageOutcome::Hit(30));
        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::ObjectStruck {
                    object_id: hen.id(),
                    attacker_id: 999,
                    location: Point::new(3, 3),
                    direction: hen.direction(),
                },
                ServerMessage::DamageIndicator {
                    object_id: hen.id(),
                    damage: -30,
                    kind: DamageType::Hit,
                },
                ServerMessage::ObjectHealth {
                    object_id: hen.id(),
                    percent: 85,
                    expire: 5,
                },
            ]
        );

        // 139 of 200 truncates to 69
        hen.defend(&world, &player_attacker(999, 0), 31, DefenceType::AC, false);
        let messages = drain(&mut rx);
        assert!(matches!(messages.last(), Some(ServerMessage::ObjectHealth { percent: 69, .. })));
    }

    #[test]
    fn test_attack_broadcasts_swing_before_hit() {
        let (world, _) = test_world(GameDb::new());
        let mut info = template(100);
        info.min_dc = 5;
        info.max_dc = 5;
        let wolf = world.spawn_creature(&info, Point::new(5, 5)).unwrap();
        let (player, mut rx) = ServerPlayer::new(world.new_object_id(), "Ann", 100);
        let player = Arc::new(player);
        world.add_player(player.clone(), Point::new(6, 5));
        drain(&mut rx);

        wolf.set_target(Some(player.id()));
        assert!(wolf.attack(&world));

        let messages = drain(&mut rx);
        assert_eq!(
            messages.first(),
            Some(&ServerMessage::ObjectAttack {
                object_id: wolf.id(),
                location: Point::new(5, 5),
                direction: Direction::Right,
            })
        );
        assert!(!messages.iter().any(|m| matches!(m, ServerMessage::ObjectTurn { .. })));
        assert!(messages.iter().any(|m| matches!(m, ServerMessage::ObjectStruck { .. })));
    }

    #[test]
    fn test_guard_attack_turns_after_swing() {
        let (world, _) = test_world(GameDb::new());
        let mut guard_info = template(100);
        guard_info.ai = 6;
        guard_info.min_dc = 7;
        guard_info.max_dc = 7;
        let guard = world.spawn_creature(&guard_info, Point::new(5, 5)).unwrap();
        let mut wolf_info = template(100);
        wolf_info.ai = 0;
        let wolf = world.spawn_creature(&wolf_info, Point::new(5, 6)).unwrap();
        let (player, mut rx) = ServerPlayer::new(world.new_object_id(), "Ann", 100);
        world.add_player(Arc::new(player), Point::new(8, 8));
        drain(&mut rx);

        guard.set_target(Some(wolf.id()));
        assert!(guard.guard_attack(&world));

        let messages = drain(&mut rx);
        assert_eq!(
            messages[..2],
            [
                ServerMessage::ObjectAttack {
                    object_id: guard.id(),
                    location: Point::new(5, 5),
                    direction: Direction::Down,
                },
                ServerMessage::ObjectTurn {
                    object_id: guard.id(),
                    location: Point::new(5, 5),
                    direction: Direction::Down,
                },
            ]
        );
    }

    #[test]
    fn test_killing_blow_credits_player() {
        let (world, _) = test_world(GameDb::new());
        let mut info = template(10);
        info.experience = 35;
        info.level = 4;
        let hen = world.spawn_creature(&info, Point::new(3, 3)).unwrap();
        let (player, _rx) = ServerPlayer::new(world.new_object_id(), "Ann", 100);
        let player = Arc::new(player);
        world.add_player(player.clone(), Point::new(4, 4));

        let attacker = player_attacker(player.id(), 0);
        assert_eq!(hen.defend(&world, &attacker, 4, DefenceType::AC, false), DamageOutcome::Hit(4));
        assert_eq!(hen.exp_owner(), Some(player.id()));
        assert_eq!(hen.target(), Some(player.id()));

        assert_eq!(hen.defend(&world, &attacker, 50, DefenceType::AC, false), DamageOutcome::Hit(6));
        assert!(hen.is_dead());
        assert_eq!(player.experience(), 35);
        assert_eq!(hen.defend(&world, &attacker, 50, DefenceType::AC, false), DamageOutcome::Ignored);
    }

    #[test]
    fn test_pet_kill_credits_nobody() {
        let (world, _) = test_world(GameDb::new());
        let mut info = template(10);
        info.experience = 35;
        let hen = world.spawn_creature(&info, Point::new(3, 3)).unwrap();
        let (player, _rx) = ServerPlayer::new(world.new_object_id(), "Ann", 100);
        let player = Arc::new(player);
        world.add_player(player.clone(), Point::new(4, 4));

        hen.set_master(Some(player.id()));
        hen.defend(&world, &player_attacker(player.id(), 0), 50, DefenceType::AC, false);
        assert!(hen.is_dead());
        assert_eq!(player.experience(), 0);
    }

    #[test]
    fn test_attack_cooldown() {
        let (world, clock) = test_world(GameDb::new());
        let mut info = template(100);
        info.min_dc = 10;
        info.max_dc = 20;
        info.attack_speed = 1_500;
        let wolf = world.spawn_creature(&info, Point::new(5, 5)).unwrap();
        let (player, _rx) = ServerPlayer::new(world.new_object_id(), "Ann", 10_000);
        let player = Arc::new(player);
        world.add_player(player.clone(), Point::new(6, 5));
        wolf.set_target(Some(player.id()));

        assert!(wolf.attack(&world));
        let after_first = player.hp();
        assert!((9_980..=9_990).contains(&after_first));
        assert_eq!(wolf.direction(), Direction::Right);

        clock.advance_ms(1_499);
        assert!(!wolf.can_attack(&world));
        assert!(!wolf.attack(&world));
        assert_eq!(player.hp(), after_first);

        clock.advance_ms(1);
        assert!(wolf.can_attack(&world));
        assert!(wolf.attack(&world));
        assert!(player.hp() < after_first);
    }

    #[test]
    fn test_attack_needs_target() {
        let (world, _) = test_world(GameDb::new());
        let wolf = world.spawn_creature(&template(100), Point::new(5, 5)).unwrap();
        assert!(!wolf.attack(&world));

        wolf.set_target(Some(12_345));
        assert!(!wolf.attack(&world));
    }

    #[test]
    fn test_guard_attack_is_normal_against_creatures() {
        let (world, _) = test_world(GameDb::new());
        let mut guard_info = template(100);
        guard_info.ai = 6;
        guard_info.min_dc = 7;
        guard_info.max_dc = 7;
        let guard = world.spawn_creature(&guard_info, Point::new(5, 5)).unwrap();
        let mut wolf_info = template(100);
        wolf_info.ai = 0;
        let wolf = world.spawn_creature(&wolf_info, Point::new(5, 6)).unwrap();

        guard.set_target(Some(wolf.id()));
        assert!(guard.guard_attack(&world));
        assert_eq!(wolf.hp(), 93);
        assert_eq!(wolf.target(), None);
    }

    #[test]
    fn test_concurrent_cross_attacks() {
        let (world, _) = test_world(GameDb::new());
        let mut info = template(1_000_000);
        info.ai = 6;
        let mut creatures = Vec::new();
        for x in 0..4 {
            creatures.push(world.spawn_creature(&info, Point::new(x, 0)).unwrap());
        }
        let mut wolf_info = template(100_000);
        wolf_info.ai = 0;
        let victims: Vec<_> = (0..4)
            .map(|x| world.spawn_creature(&wolf_info, Point::new(x, 1)).unwrap())
            .collect();

        std::thread::scope(|scope| {
            for (i, guard) in creatures.iter().enumerate() {
                let world = &world;
                let victims = &victims;
                scope.spawn(move || {
                    for round in 0..250 {
                        let victim = &victims[(i + round) % victims.len()];
                        let attacker = AttackerInfo {
                            id: guard.id(),
                            race: ObjectType::Monster,
                            ai: Some(6),
                            accuracy: 255,
                            point: guard.point(),
                        };
                        victim.defend(world, &attacker, 1, DefenceType::Agility, false);
                        victim.change_hp(world, 1);
                        victim.tick(world);
                    }
                });
            }
        });

        for victim in &victims {
            let hp = victim.hp();
            assert!(hp <= 100_000 && hp >= 100_000 - 1_000);
            assert!(!victim.is_dead());
        }
    }
}
