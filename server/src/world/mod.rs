//! Game world management.
//!
//! `GameWorld` ties the spatial index, the game database, the clock and the
//! live creature set together. It is shared behind an `Arc` and every method
//! takes `&self`, so creatures on different worker tasks can tick against it
//! concurrently.

mod clock;
mod map;
mod respawn;

pub use clock::{Clock, ManualClock, SystemClock};
pub use map::{Cell, CellDiff, GridMap, MAX_MAP_SIDE};
pub use respawn::RespawnTracker;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use dashmap::DashMap;
use log::{info, warn, debug, error};

use realm_shared::{ObjectId, ObjectType, Point, ServerMessage, DATA_RANGE};

use crate::behavior::BehaviorFactory;
use crate::database::{GameDb, MonsterInfo};
use crate::entities::{Creature, MapObject, ServerPlayer, WorldItem};
use crate::error::{WorldError, WorldResult};

/// Attempts at finding a free cell for one respawn
const RESPAWN_ATTEMPTS: usize = 10;

/// The game world containing all entities
pub struct GameWorld {
    map: GridMap,
    db: Arc<GameDb>,
    behaviors: Arc<dyn BehaviorFactory>,
    clock: Arc<dyn Clock>,
    creatures: DashMap<ObjectId, Arc<Creature>>,
    players: DashMap<ObjectId, Arc<ServerPlayer>>,
    respawns: Mutex<Vec<RespawnTracker>>,
}

impl GameWorld {
    pub fn new(
        map: GridMap,
        db: Arc<GameDb>,
        behaviors: Arc<dyn BehaviorFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let respawns = db
            .respawns()
            .iter()
            .cloned()
            .map(RespawnTracker::new)
            .collect();

        Self {
            map,
            db,
            behaviors,
            clock,
            creatures: DashMap::new(),
            players: DashMap::new(),
            respawns: Mutex::new(respawns),
        }
    }

    pub fn map(&self) -> &GridMap {
        &self.map
    }

    pub fn db(&self) -> &GameDb {
        &self.db
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn new_object_id(&self) -> ObjectId {
        self.map.new_object_id()
    }

    /// Resolve an object id to a live object on the map
    pub fn object(&self, id: ObjectId) -> Option<Arc<dyn MapObject>> {
        self.map.object(id)
    }

    pub fn creature(&self, id: ObjectId) -> Option<Arc<Creature>> {
        self.creatures.get(&id).map(|c| c.value().clone())
    }

    /// Snapshot of every live creature
    pub fn creatures(&self) -> Vec<Arc<Creature>> {
        self.creatures.iter().map(|c| c.value().clone()).collect()
    }

    pub fn creature_count(&self) -> usize {
        self.creatures.len()
    }

    pub fn player(&self, id: ObjectId) -> Option<Arc<ServerPlayer>> {
        self.players.get(&id).map(|p| p.value().clone())
    }

    /// Send `msg` to every player within the broadcast radius of `point`
    pub fn broadcast(&self, point: Point, msg: &ServerMessage, exclude: Option<ObjectId>) {
        self.map.range_objects(point, DATA_RANGE, |object| {
            if object.race() == ObjectType::Player && Some(object.id()) != exclude {
                object.enqueue(msg);
            }
            true
        });
    }

    /// Place a new creature built from `info` at `point`
    pub fn spawn_creature(&self, info: &MonsterInfo, point: Point) -> WorldResult<Arc<Creature>> {
        info.validate()?;
        if !self.map.valid_point(point) {
            return Err(WorldError::InvalidSpawnPoint(point));
        }

        let id = self.map.new_object_id();
        let creature = Arc::new(Creature::new(id, info, point, self.now(), self.behaviors.as_ref()));
        if !self.map.add_object(creature.clone(), point) {
            return Err(WorldError::InvalidSpawnPoint(point));
        }
        self.creatures.insert(id, creature.clone());

        debug!("Spawned {} ({}) at {}", info.name, id, point);
        self.broadcast(point, &creature.appearance(), None);
        Ok(creature)
    }

    /// Spawn a creature by template name
    pub fn spawn_by_name(&self, name: &str, point: Point) -> WorldResult<Arc<Creature>> {
        let info = self
            .db
            .monster(name)
            .ok_or_else(|| WorldError::UnknownMonster(name.to_string()))?;
        self.spawn_creature(info, point)
    }

    /// Take a creature off the map and tell observers it is gone
    pub fn remove_creature(&self, id: ObjectId, point: Point) {
        self.map.remove_object(id, point);
        self.creatures.remove(&id);
        self.broadcast(point, &ServerMessage::ObjectRemove { object_id: id }, None);
    }

    /// Enter a player into the world at `point`.
    ///
    /// The player is placed on its cell before the range scan, so anything
    /// that moves into range meanwhile reaches it through the normal
    /// visibility updates. It may see such an object twice.
    pub fn add_player(&self, player: Arc<ServerPlayer>, point: Point) -> bool {
        player.set_point(point);
        let id = player.id();
        if !self.map.add_object(player.clone(), point) {
            return false;
        }
        self.players.insert(id, player.clone());

        self.map.range_objects(point, DATA_RANGE, |object| {
            if object.id() != id {
                player.enqueue(&object.appearance());
            }
            true
        });

        info!("Player {} ({}) entered at {}", player.name(), id, point);
        self.broadcast(point, &player.appearance(), Some(id));
        true
    }

    pub fn remove_player(&self, id: ObjectId) {
        if let Some((_, player)) = self.players.remove(&id) {
            let point = player.point();
            self.map.remove_object(id, point);
            self.broadcast(point, &ServerMessage::ObjectRemove { object_id: id }, None);
            info!("Player {} ({}) left", player.name(), id);
        }
    }

    /// Put `item` on the first free cell around `center`
    pub fn drop_item(&self, item: WorldItem, center: Point, radius: i32) -> WorldResult<()> {
        let item = Arc::new(item);
        for point in self.map.drop_candidates(center, radius) {
            item.set_point(point);
            if self.map.try_add_item(item.clone(), point) {
                self.broadcast(point, &item.appearance(), None);
                return Ok(());
            }
        }
        Err(WorldError::NoDropSpace { point: center, radius })
    }

    /// Tick every creature on the calling thread, then respawn
    pub fn process(&self) {
        for creature in self.creatures() {
            creature.tick(self);
        }
        self.process_respawns();
    }

    /// Tick the creature set split across `workers` blocking tasks, then
    /// respawn
    pub async fn process_parallel(self: &Arc<Self>, workers: usize) {
        let creatures = self.creatures();
        if !creatures.is_empty() {
            let chunk_size = creatures.len().div_ceil(workers.max(1));
            let tasks = creatures.chunks(chunk_size).map(|chunk| {
                let world = self.clone();
                let chunk = chunk.to_vec();
                tokio::task::spawn_blocking(move || {
                    for creature in chunk {
                        creature.tick(&world);
                    }
                })
            });

            for result in futures::future::join_all(tasks).await {
                if let Err(e) = result {
                    error!("Creature tick worker failed: {}", e);
                }
            }
        }

        self.process_respawns();
    }

    /// Refill respawn entries whose replacements are due
    pub fn process_respawns(&self) {
        let now = self.now();
        let mut respawns = self.respawns.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rng = rand::thread_rng();

        for tracker in respawns.iter_mut() {
            tracker.refresh(now, |id| self.creature(id).is_some_and(|c| !c.is_dead()));

            for _ in 0..tracker.take_due(now) {
                match self.respawn_one(tracker, &mut rng) {
                    Ok(creature) => tracker.add_member(creature.id()),
                    Err(e) => {
                        warn!("Respawn of {} failed: {}", tracker.info.monster, e);
                        tracker.retry(now);
                    }
                }
            }
        }
    }

    fn respawn_one(&self, tracker: &RespawnTracker, rng: &mut impl rand::Rng) -> WorldResult<Arc<Creature>> {
        let mut last = tracker.info.point;
        for _ in 0..RESPAWN_ATTEMPTS {
            let point = tracker.random_point(rng);
            last = point;
            let free = self
                .map
                .cell(point)
                .is_some_and(|cell| cell.is_valid() && !cell.has_blocking(None));
            if free {
                return self.spawn_by_name(&tracker.info.monster, point);
            }
        }
        Err(WorldError::InvalidSpawnPoint(last))
    }

    /// (population, pending) of every respawn entry
    pub fn respawn_status(&self) -> Vec<(usize, usize)> {
        self.respawns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| (t.population(), t.pending()))
            .collect()
    }
}

impl std::fmt::Debug for GameWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameWorld")
            .field("map", &self.map)
            .field("creatures", &self.creatures.len())
            .field("players", &self.players.len())
            .finish()
    }
}
