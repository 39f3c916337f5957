//! Respawn bookkeeping.
//!
//! Each entry keeps a population of one creature template alive around a
//! point. When a member dies (or is removed) a replacement is queued for
//! `delay` milliseconds later.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;

use realm_shared::{ObjectId, Point};

use crate::database::RespawnInfo;

/// Live state of one respawn entry
#[derive(Debug)]
pub struct RespawnTracker {
    pub info: RespawnInfo,
    alive: HashSet<ObjectId>,
    /// Due times of queued replacements
    pending: Vec<Instant>,
}

impl RespawnTracker {
    pub fn new(info: RespawnInfo) -> Self {
        Self {
            info,
            alive: HashSet::new(),
            pending: Vec::new(),
        }
    }

    pub fn population(&self) -> usize {
        self.alive.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(self.info.delay)
    }

    /// Drop members for which `is_alive` is false and queue their
    /// replacements. Missing members with nothing queued are due at once.
    pub fn refresh<F: Fn(ObjectId) -> bool>(&mut self, now: Instant, is_alive: F) {
        let before = self.alive.len();
        self.alive.retain(|id| is_alive(*id));
        let lost = before - self.alive.len();
        if lost > 0 {
            debug!("{} lost {} members, respawning in {:?}", self.info.monster, lost, self.delay());
        }
        let due = now + self.delay();
        self.pending.extend(std::iter::repeat(due).take(lost));

        let wanted = self.info.count as usize;
        while self.alive.len() + self.pending.len() < wanted {
            self.pending.push(now);
        }
    }

    /// Remove and count the replacements due at `now`
    pub fn take_due(&mut self, now: Instant) -> usize {
        let before = self.pending.len();
        self.pending.retain(|due| *due > now);
        before - self.pending.len()
    }

    /// Requeue a replacement that could not be placed
    pub fn retry(&mut self, now: Instant) {
        let due = now + self.delay();
        self.pending.push(due);
    }

    pub fn add_member(&mut self, id: ObjectId) {
        self.alive.insert(id);
    }

    /// A random point within `spread` of the entry's point
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        let spread = self.info.spread.max(0);
        Point::new(
            self.info.point.x + rng.gen_range(-spread..=spread),
            self.info.point.y + rng.gen_range(-spread..=spread),
        )
    }
}
