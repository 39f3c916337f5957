//! Server-side player entity.
//!
//! Only the parts creatures interact with live here: position, health,
//! experience and the outbound message queue the transport drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use tokio::sync::mpsc;

use realm_shared::{
    BaseStats, DamageType, DefenceType, Direction, ObjectId, ObjectType, Point, ServerMessage,
};

use super::{AttackerInfo, DamageOutcome, MapObject};
use crate::behavior;
use crate::combat::{self, DefenceStats, HitResult};
use crate::world::GameWorld;

/// Mutable player state
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub point: Point,
    pub direction: Direction,
    pub level: u16,
    pub experience: u64,
    pub hp: u32,
    pub max_hp: u32,
    pub stats: BaseStats,
}

/// Server-side player
#[derive(Debug)]
pub struct ServerPlayer {
    id: ObjectId,
    name: String,
    dead: AtomicBool,
    /// Guards attack outlaws on sight
    outlaw: AtomicBool,
    state: Mutex<PlayerState>,
    outbox: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerPlayer {
    /// Create a player and the receiving end of its message queue
    pub fn new(id: ObjectId, name: &str, hp: u32) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let player = Self {
            id,
            name: name.to_string(),
            dead: AtomicBool::new(false),
            outlaw: AtomicBool::new(false),
            state: Mutex::new(PlayerState {
                point: Point::default(),
                direction: Direction::Down,
                level: 1,
                experience: 0,
                hp,
                max_hp: hp,
                stats: BaseStats::default(),
            }),
            outbox,
        };
        (player, inbox)
    }

    fn state(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> PlayerState {
        self.state().clone()
    }

    pub fn set_point(&self, point: Point) {
        self.state().point = point;
    }

    pub fn set_stats(&self, stats: BaseStats) {
        self.state().stats = stats;
    }

    pub fn set_outlaw(&self, outlaw: bool) {
        self.outlaw.store(outlaw, Ordering::Relaxed);
    }

    pub fn is_outlaw(&self) -> bool {
        self.outlaw.load(Ordering::Relaxed)
    }

    pub fn hp(&self) -> u32 {
        self.state().hp
    }

    pub fn experience(&self) -> u64 {
        self.state().experience
    }
}

impl MapObject for ServerPlayer {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn race(&self) -> ObjectType {
        ObjectType::Player
    }

    fn point(&self) -> Point {
        self.state().point
    }

    fn direction(&self) -> Direction {
        self.state().direction
    }

    fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    fn is_blocking(&self) -> bool {
        !self.is_dead()
    }

    fn is_attack_target(&self, attacker: &AttackerInfo) -> bool {
        if self.is_dead() || attacker.race != ObjectType::Monster {
            return false;
        }
        match attacker.ai {
            Some(ai) if behavior::is_guard(ai) => self.is_outlaw(),
            _ => true,
        }
    }

    fn base_stats(&self) -> BaseStats {
        self.state().stats
    }

    fn attacked(
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

        let mut state = self.state();
        let defender = DefenceStats {
            agility: state.stats.agility,
            min_ac: state.stats.min_ac,
            max_ac: state.stats.max_ac,
            min_mac: state.stats.min_mac,
            max_mac: state.stats.max_mac,
            armour_rate: 1.0,
            damage_rate: 1.0,
        };
        let point = state.point;

        let value = match combat::resolve_hit(&mut rand::thread_rng(), &defender, attacker.accuracy, damage, defence) {
            HitResult::Hit(value) => value as u32,
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

        let lost = value.min(state.hp);
        state.hp -= lost;
        let hp = state.hp;
        let direction = state.direction;
        let died = hp == 0 && !self.dead.swap(true, Ordering::AcqRel);
        drop(state);

        world.broadcast(point, &ServerMessage::ObjectStruck {
            object_id: self.id,
            attacker_id: attacker.id,
            location: point,
            direction,
        }, None);
        world.broadcast(point, &ServerMessage::DamageIndicator {
            object_id: self.id,
            damage: -(lost as i32),
            kind: DamageType::Hit,
        }, None);
        self.enqueue(&ServerMessage::HealthChanged { hp });

        if died {
            info!("Player {} killed by {}", self.name, attacker.id);
            world.broadcast(point, &ServerMessage::ObjectDied {
                object_id: self.id,
                location: point,
                direction,
            }, None);
        }
        DamageOutcome::Hit(lost)
    }

    fn win_exp(&self, amount: u32, level: u16) {
        self.state().experience += amount as u64;
        debug!("{} gained {} exp from a level {} kill", self.name, amount, level);
        self.enqueue(&ServerMessage::GainExperience { amount });
    }

    fn enqueue(&self, msg: &ServerMessage) {
        // The receiver is gone once the session closes
        let _ = self.outbox.send(msg.clone());
    }

    fn appearance(&self) -> ServerMessage {
        let state = self.state();
        ServerMessage::ObjectPlayer {
            object_id: self.id,
            name: self.name.clone(),
            location: state.point,
            direction: state.direction,
            dead: self.is_dead(),
        }
    }
}
