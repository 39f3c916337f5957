//! Per-entity registry of one-shot delayed actions.
//!
//! Entries are swept every tick. A sweep runs in two phases: due entries are
//! first claimed and executed, then everything finished during the sweep is
//! evicted. Tasks run with no shard lock held, so a task may schedule further
//! actions on the same registry, and other threads may register actions while
//! a sweep is in progress. Tasks must be `Send + Sync` for the registry to be
//! shared across threads.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use dashmap::DashMap;

/// Id of a scheduled action, unique within its registry
pub type ActionId = u32;

/// A task scheduled to run once at or after `due`
pub struct DelayedAction<T> {
    pub id: ActionId,
    pub due: Instant,
    task: Option<T>,
    pub finished: bool,
}

impl<T> std::fmt::Debug for DelayedAction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedAction")
            .field("id", &self.id)
            .field("due", &self.due)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Concurrency-safe registry of delayed actions
pub struct ActionList<T> {
    entries: DashMap<ActionId, DelayedAction<T>>,
    next_id: AtomicU32,
}

impl<T> ActionList<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Register `task` to run on the first sweep at or after `due`
    pub fn schedule(&self, due: Instant, task: T) -> ActionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(id, DelayedAction {
            id,
            due,
            task: Some(task),
            finished: false,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Run every action due at `now` exactly once, then evict them.
    /// Returns the number of actions executed.
    pub fn sweep<F: FnMut(T)>(&self, now: Instant, mut execute: F) -> usize {
        let due: Vec<ActionId> = self
            .entries
            .iter()
            .filter(|entry| !entry.finished && entry.due <= now)
            .map(|entry| *entry.key())
            .collect();

        let mut finished = Vec::with_capacity(due.len());
        for id in due {
            // Claim under the shard lock, run after releasing it
            let task = match self.entries.get_mut(&id) {
                Some(mut entry) if !entry.finished => {
                    entry.finished = true;
                    entry.task.take()
                }
                _ => None,
            };
            if let Some(task) = task {
                execute(task);
                finished.push(id);
            }
        }

        for id in &finished {
            self.entries.remove(id);
        }
        finished.len()
    }
}

impl<T> Default for ActionList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ActionList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionList")
            .field("pending", &self.entries.len())
            .finish()
    }
}
