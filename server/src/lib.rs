//! Authoritative world simulation: creatures, their AI and combat, loot and
//! respawns on a grid map.

pub mod actions;
pub mod behavior;
pub mod combat;
pub mod config;
pub mod database;
pub mod entities;
pub mod error;
pub mod world;

pub use error::{WorldError, WorldResult};
