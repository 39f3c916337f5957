//! Server-side creature (monster) entity.
//!
//! A creature's mutable state lives behind one mutex. Its own tick and
//! attacks from other entities both go through that lock. The dead flag and
//! the template fields sit outside it so targeting and blocking checks from
//! other threads never have to lock.
//!
//! A creature never holds its own state lock while calling into another
//! entity. Anything the other side needs is passed as an [`AttackerInfo`]
//! snapshot.

mod combat;
mod loot;
mod movement;

pub use loot::roll_drops;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

use realm_shared::{
    BaseStats, DefenceType, Direction, ObjectId, ObjectType, Point, ServerMessage, DATA_RANGE,
};

use super::{AttackerInfo, DamageOutcome, MapObject};
use crate::actions::{ActionId, ActionList};
use crate::behavior::{self, Behavior, BehaviorFactory, IdleBehavior};
use crate::database::MonsterInfo;
use crate::world::GameWorld;

/// How long a corpse stays on the map
pub const DEATH_GRACE: Duration = Duration::from_secs(5);

/// Radius searched for a free cell when dropping loot
pub const DROP_RANGE: i32 = 3;

/// One-shot task run against its creature on a later tick
pub type ActionTask = Box<dyn FnOnce(&Creature, &GameWorld) + Send + Sync>;

/// Mutable creature state, guarded by [`Creature::state`]
#[derive(Debug, Clone)]
pub struct CreatureState {
    pub point: Point,
    pub direction: Direction,
    pub name_color: [u8; 3],

    pub level: u16,
    pub pet_level: u16,
    /// Experience granted to whoever earns the kill
    pub experience: u32,
    pub hp: u32,
    pub max_hp: u32,

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
    /// Milliseconds per step
    pub move_speed: u64,
    /// Milliseconds between attacks
    pub attack_speed: u64,
    pub armour_rate: f32,
    pub damage_rate: f32,
    pub view_range: i32,

    pub target: Option<ObjectId>,
    pub exp_owner: Option<ObjectId>,
    pub master: Option<ObjectId>,

    pub action_time: Instant,
    pub attack_time: Instant,
    pub move_time: Instant,
    /// Set once, when the creature dies
    pub dead_time: Option<Instant>,
}

impl CreatureState {
    fn from_template(info: &MonsterInfo, point: Point, now: Instant) -> Self {
        Self {
            point,
            direction: Direction::random(),
            name_color: [255, 255, 255],
            level: info.level,
            pet_level: 0,
            experience: info.experience,
            hp: info.hp,
            max_hp: info.hp,
            min_ac: info.min_ac,
            max_ac: info.max_ac,
            min_mac: info.min_mac,
            max_mac: info.max_mac,
            min_dc: info.min_dc,
            max_dc: info.max_dc,
            min_mc: info.min_mc,
            max_mc: info.max_mc,
            min_sc: info.min_sc,
            max_sc: info.max_sc,
            accuracy: info.accuracy,
            agility: info.agility,
            move_speed: info.move_speed,
            attack_speed: info.attack_speed,
            armour_rate: info.armour_rate,
            damage_rate: info.damage_rate,
            view_range: info.view_range,
            target: None,
            exp_owner: None,
            master: None,
            action_time: now,
            attack_time: now,
            move_time: now,
            dead_time: None,
        }
    }
}

/// A live creature on the map
pub struct Creature {
    id: ObjectId,
    name: String,
    ai: u8,
    image: u16,
    effect: u8,
    light: u8,
    dead: AtomicBool,
    state: Mutex<CreatureState>,
    actions: ActionList<ActionTask>,
    behavior: Mutex<Box<dyn Behavior>>,
}

impl Creature {
    /// Build a creature from its template. The behavior comes from
    /// `behaviors`, keyed by the template's AI identifier.
    pub fn new(
        id: ObjectId,
        info: &MonsterInfo,
        point: Point,
        now: Instant,
        behaviors: &dyn BehaviorFactory,
    ) -> Self {
        let creature = Self {
            id,
            name: info.name.clone(),
            ai: info.ai,
            image: info.image,
            effect: info.effect,
            light: info.light,
            dead: AtomicBool::new(false),
            state: Mutex::new(CreatureState::from_template(info, point, now)),
            actions: ActionList::new(),
            behavior: Mutex::new(Box::new(IdleBehavior)),
        };
        let behavior = behaviors.create(info.ai, &creature);
        *creature.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
        creature
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, CreatureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> CreatureState {
        self.state().clone()
    }

    pub fn ai(&self) -> u8 {
        self.ai
    }

    pub fn hp(&self) -> u32 {
        self.state().hp
    }

    pub fn target(&self) -> Option<ObjectId> {
        self.state().target
    }

    pub fn set_target(&self, target: Option<ObjectId>) {
        self.state().target = target;
    }

    pub fn set_master(&self, master: Option<ObjectId>) {
        self.state().master = master;
    }

    pub fn exp_owner(&self) -> Option<ObjectId> {
        self.state().exp_owner
    }

    pub fn pending_actions(&self) -> usize {
        self.actions.len()
    }

    fn attacker_info(&self, state: &CreatureState) -> AttackerInfo {
        AttackerInfo {
            id: self.id,
            race: ObjectType::Monster,
            ai: Some(self.ai),
            accuracy: state.accuracy,
            point: state.point,
        }
    }

    /// Run one simulation step. Returns false once the creature has been
    /// removed from the world.
    pub fn tick(&self, world: &GameWorld) -> bool {
        self.validate_target(world);

        if self.is_dead() {
            let (point, expired) = {
                let state = self.state();
                let expired = state.dead_time.is_some_and(|t| world.now() >= t);
                (state.point, expired)
            };
            if expired {
                debug!("Removing corpse of {} ({})", self.name, self.id);
                world.remove_creature(self.id, point);
                return false;
            }
        }

        self.behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tick(self, world);

        self.process_buffs(world);
        self.process_regen(world);
        self.process_poison(world);
        self.process_actions(world);
        true
    }

    /// Drop the target once it can no longer be attacked or has left range
    fn validate_target(&self, world: &GameWorld) {
        let (target, info) = {
            let state = self.state();
            (state.target, self.attacker_info(&state))
        };
        let Some(id) = target else {
            return;
        };

        let valid = world.object(id).is_some_and(|object| {
            object.is_attack_target(&info) && object.point().in_range(info.point, DATA_RANGE)
        });
        if !valid {
            let mut state = self.state();
            if state.target == Some(id) {
                state.target = None;
            }
        }
    }

    /// Scan the view range for something to attack.
    ///
    /// A player ends the scan at once. Creatures keep the scan going, so
    /// without a player the last attackable creature in scan order wins.
    pub fn find_target(&self, world: &GameWorld) -> bool {
        let (info, range) = {
            let state = self.state();
            (self.attacker_info(&state), state.view_range)
        };

        let mut found = None;
        world.map().range_objects(info.point, range, |object| {
            if object.id() == self.id {
                return true;
            }
            match object.race() {
                ObjectType::Monster => {
                    if object.is_attack_target(&info) {
                        found = Some(object.id());
                    }
                    true
                }
                ObjectType::Player => {
                    if object.is_attack_target(&info) {
                        found = Some(object.id());
                        return false;
                    }
                    true
                }
                _ => true,
            }
        });

        match found {
            Some(id) => {
                self.state().target = Some(id);
                true
            }
            None => false,
        }
    }

    /// Register `task` to run on the first tick at or after `due`
    pub fn schedule_action(&self, due: Instant, task: ActionTask) -> ActionId {
        self.actions.schedule(due, task)
    }

    fn process_actions(&self, world: &GameWorld) {
        self.actions.sweep(world.now(), |task| task(self, world));
    }

    // Effect hooks. Buffs, regeneration and poison are not simulated yet.
    fn process_buffs(&self, _world: &GameWorld) {}

    fn process_regen(&self, _world: &GameWorld) {}

    fn process_poison(&self, _world: &GameWorld) {}
}

/// Whether a creature with `attacker_ai` may target a creature with
/// `defender_ai`
pub fn can_target_creature(
    attacker_id: ObjectId,
    attacker_ai: Option<u8>,
    defender_id: ObjectId,
    defender_ai: u8,
) -> bool {
    if attacker_id == defender_id || behavior::is_guard(defender_ai) {
        return false;
    }
    match attacker_ai {
        Some(ai) if behavior::is_guard(ai) => !behavior::is_pacifist(defender_ai),
        _ => false,
    }
}

impl MapObject for Creature {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn race(&self) -> ObjectType {
        ObjectType::Monster
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
        if self.is_dead() {
            return false;
        }
        match attacker.race {
            ObjectType::Player => true,
            ObjectType::Monster => can_target_creature(attacker.id, attacker.ai, self.id, self.ai),
            _ => false,
        }
    }

    fn base_stats(&self) -> BaseStats {
        let state = self.state();
        BaseStats {
            min_ac: state.min_ac,
            max_ac: state.max_ac,
            min_mac: state.min_mac,
            max_mac: state.max_mac,
            min_dc: state.min_dc,
            max_dc: state.max_dc,
            min_mc: state.min_mc,
            max_mc: state.max_mc,
            min_sc: state.min_sc,
            max_sc: state.max_sc,
            accuracy: state.accuracy,
            agility: state.agility,
        }
    }

    fn attacked(
        &self,
        world: &GameWorld,
        attacker: &AttackerInfo,
        damage: i32,
        defence: DefenceType,
        damage_weapon: bool,
    ) -> DamageOutcome {
        self.defend(world, attacker, damage, defence, damage_weapon)
    }

    fn appearance(&self) -> ServerMessage {
        let state = self.state();
        ServerMessage::ObjectMonster {
            object_id: self.id,
            name: self.name.clone(),
            name_color: state.name_color,
            location: state.point,
            image: self.image,
            direction: state.direction,
            effect: self.effect,
            ai: self.ai,
            light: self.light,
            dead: self.is_dead(),
            skeleton: false,
            hidden: false,
        }
    }
}

impl std::fmt::Debug for Creature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Creature")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("ai", &self.ai)
            .field("dead", &self.is_dead())
            .field("pending_actions", &self.actions.len())
            .finish()
    }
}
