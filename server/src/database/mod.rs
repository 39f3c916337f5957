//! Static game data: creature templates, item templates, drop tables and
//! respawn entries.
//!
//! Everything is loaded once at startup from JSON files and drop text files
//! in the data directory, then shared read-only across the simulation.

mod drops;

pub use drops::{parse_drop_table, DropInfo, DropPayload};

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn, error};
use serde::Deserialize;

use realm_shared::Point;

use crate::entities::UserItem;
use crate::error::{WorldError, WorldResult};
use crate::world::MAX_MAP_SIDE;

fn default_rate() -> f32 {
    1.0
}

fn default_speed() -> u64 {
    1000
}

fn default_view_range() -> i32 {
    7
}

/// Creature template
#[derive(Debug, Clone, Deserialize)]
pub struct MonsterInfo {
    pub name: String,
    #[serde(default)]
    pub image: u16,
    #[serde(default)]
    pub ai: u8,
    #[serde(default)]
    pub effect: u8,
    #[serde(default)]
    pub light: u8,
    #[serde(default)]
    pub level: u16,
    #[serde(default = "default_view_range")]
    pub view_range: i32,
    /// Experience granted to the killer
    #[serde(default)]
    pub experience: u32,
    pub hp: u32,
    #[serde(default)]
    pub min_ac: u16,
    #[serde(default)]
    pub max_ac: u16,
    #[serde(default)]
    pub min_mac: u16,
    #[serde(default)]
    pub max_mac: u16,
    #[serde(default)]
    pub min_dc: u16,
    #[serde(default)]
    pub max_dc: u16,
    #[serde(default)]
    pub min_mc: u16,
    #[serde(default)]
    pub max_mc: u16,
    #[serde(default)]
    pub min_sc: u16,
    #[serde(default)]
    pub max_sc: u16,
    #[serde(default)]
    pub accuracy: u8,
    #[serde(default)]
    pub agility: u8,
    /// Milliseconds between steps
    #[serde(default = "default_speed")]
    pub move_speed: u64,
    /// Milliseconds between attacks
    #[serde(default = "default_speed")]
    pub attack_speed: u64,
    #[serde(default = "default_rate")]
    pub armour_rate: f32,
    #[serde(default = "default_rate")]
    pub damage_rate: f32,
}

impl MonsterInfo {
    /// A template with the given name and health and every other stat zeroed
    pub fn new(name: &str, hp: u32) -> Self {
        Self {
            name: name.to_string(),
            image: 0,
            ai: 0,
            effect: 0,
            light: 0,
            level: 1,
            view_range: default_view_range(),
            experience: 0,
            hp,
            min_ac: 0,
            max_ac: 0,
            min_mac: 0,
            max_mac: 0,
            min_dc: 0,
            max_dc: 0,
            min_mc: 0,
            max_mc: 0,
            min_sc: 0,
            max_sc: 0,
            accuracy: 0,
            agility: 0,
            move_speed: default_speed(),
            attack_speed: default_speed(),
            armour_rate: default_rate(),
            damage_rate: default_rate(),
        }
    }

    /// Reject templates the simulation cannot run
    pub fn validate(&self) -> WorldResult<()> {
        if self.hp == 0 {
            return Err(WorldError::InvalidTemplate {
                name: self.name.clone(),
                reason: "max hp must be greater than zero",
            });
        }
        if !(0..=MAX_MAP_SIDE).contains(&self.view_range) {
            return Err(WorldError::InvalidTemplate {
                name: self.name.clone(),
                reason: "view range out of bounds",
            });
        }
        Ok(())
    }
}

/// Item template
#[derive(Debug, Clone, Deserialize)]
pub struct ItemInfo {
    pub index: u32,
    pub name: String,
    #[serde(default)]
    pub durability: u16,
    #[serde(default = "default_stack")]
    pub stack_size: u32,
}

fn default_stack() -> u32 {
    1
}

/// A population of one creature template kept alive around a point
#[derive(Debug, Clone, Deserialize)]
pub struct RespawnInfo {
    pub monster: String,
    pub point: Point,
    /// Radius around `point` replacements may appear in
    #[serde(default)]
    pub spread: i32,
    pub count: u32,
    /// Milliseconds between a death and its replacement
    #[serde(default)]
    pub delay: u64,
}

/// Read-only game data shared by the world
#[derive(Debug, Default)]
pub struct GameDb {
    monsters: HashMap<String, MonsterInfo>,
    items: HashMap<String, ItemInfo>,
    drops: HashMap<String, Vec<DropInfo>>,
    respawns: Vec<RespawnInfo>,
    next_item_id: AtomicU64,
}

impl GameDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every data file under `data_dir`.
    ///
    /// `monsters.json` is required; the other files are optional.
    pub fn load<P: AsRef<Path>>(data_dir: P) -> WorldResult<Self> {
        let dir = data_dir.as_ref();
        let mut db = Self::new();

        let monsters: Vec<MonsterInfo> = read_json(&dir.join("monsters.json"))?;
        for monster in monsters {
            match monster.validate() {
                Ok(()) => db.insert_monster(monster),
                Err(e) => warn!("Skipping monster template: {}", e),
            }
        }

        let items_path = dir.join("items.json");
        if items_path.exists() {
            let items: Vec<ItemInfo> = read_json(&items_path)?;
            for item in items {
                db.insert_item(item);
            }
        }

        let spawns_path = dir.join("spawns.json");
        if spawns_path.exists() {
            db.respawns = read_json(&spawns_path)?;
        }

        let drops_dir = dir.join("Drops");
        if drops_dir.is_dir() {
            for (name, drops) in drops::load_drop_dir(&drops_dir)? {
                db.set_drops(&name, drops);
            }
        }

        info!(
            "Loaded {} monsters, {} items, {} drop tables, {} spawns from {:?}",
            db.monsters.len(),
            db.items.len(),
            db.drops.len(),
            db.respawns.len(),
            dir
        );
        Ok(db)
    }

    /// Load the data directory, falling back to an empty database
    pub fn load_or_default<P: AsRef<Path>>(data_dir: P) -> Self {
        match Self::load(data_dir.as_ref()) {
            Ok(db) => db,
            Err(e) => {
                error!("Failed to load game data from {:?}: {}", data_dir.as_ref(), e);
                error!("Running with an empty game database");
                Self::new()
            }
        }
    }

    pub fn insert_monster(&mut self, info: MonsterInfo) {
        self.monsters.insert(info.name.clone(), info);
    }

    pub fn insert_item(&mut self, info: ItemInfo) {
        self.items.insert(info.name.clone(), info);
    }

    pub fn set_drops(&mut self, monster: &str, drops: Vec<DropInfo>) {
        self.drops.insert(monster.to_string(), drops);
    }

    pub fn add_respawn(&mut self, respawn: RespawnInfo) {
        self.respawns.push(respawn);
    }

    pub fn monster(&self, name: &str) -> Option<&MonsterInfo> {
        self.monsters.get(name)
    }

    pub fn item(&self, name: &str) -> Option<&ItemInfo> {
        self.items.get(name)
    }

    /// Drop table for a creature template
    pub fn drops(&self, monster: &str) -> Option<&[DropInfo]> {
        self.drops.get(monster).map(Vec::as_slice)
    }

    pub fn respawns(&self) -> &[RespawnInfo] {
        &self.respawns
    }

    /// Materialize a fresh item instance from a template
    pub fn create_item(&self, info: &ItemInfo) -> UserItem {
        UserItem {
            unique_id: self.next_item_id.fetch_add(1, Ordering::Relaxed) + 1,
            item_index: info.index,
            name: info.name.clone(),
            current_durability: info.durability,
            max_durability: info.durability,
            count: 1,
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> WorldResult<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hp_template_rejected() {
        assert!(MonsterInfo::new("Hen", 0).validate().is_err());
        assert!(MonsterInfo::new("Hen", 5).validate().is_ok());
    }

    #[test]
    fn test_view_range_bounds() {
        let mut info = MonsterInfo::new("Hen", 5);
        info.view_range = -1;
        assert!(info.validate().is_err());
        info.view_range = i32::MAX;
        assert!(info.validate().is_err());
        info.view_range = 0;
        assert!(info.validate().is_ok());
    }

    #[test]
    fn test_load_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("monsters.json"),
            r#"[
                { "name": "Hen", "hp": 5, "min_dc": 1, "max_dc": 2 },
                { "name": "Broken", "hp": 0 }
            ]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("items.json"),
            r#"[{ "index": 7, "name": "DrugLarge", "durability": 0 }]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("spawns.json"),
            r#"[{ "monster": "Hen", "point": { "x": 10, "y": 12 }, "spread": 3, "count": 4, "delay": 2000 }]"#,
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("Drops")).unwrap();
        std::fs::write(dir.path().join("Drops").join("Hen.txt"), "1/10 Gold 500\n1/5 (MP)DrugLarge\n").unwrap();

        let db = GameDb::load(dir.path()).unwrap();
        let hen = db.monster("Hen").unwrap();
        assert_eq!(hen.max_dc, 2);
        assert_eq!(hen.move_speed, 1000);
        assert_eq!(hen.armour_rate, 1.0);
        assert!(db.monster("Broken").is_none());
        assert_eq!(db.drops("Hen").map(|d| d.len()), Some(2));
        assert_eq!(db.respawns()[0].point, Point::new(10, 12));

        let item = db.create_item(db.item("DrugLarge").unwrap());
        let next = db.create_item(db.item("DrugLarge").unwrap());
        assert_eq!(item.item_index, 7);
        assert_ne!(item.unique_id, next.unique_id);
    }

    #[test]
    fn test_missing_data_dir_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = GameDb::load_or_default(dir.path().join("missing"));
        assert!(db.monster("Hen").is_none());
        assert!(db.respawns().is_empty());
    }
}
