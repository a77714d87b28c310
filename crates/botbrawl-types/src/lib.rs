//! BotBrawl Types - Canonical domain types for agent battles
//!
//! This crate contains the foundational types shared by every BotBrawl crate,
//! with zero dependencies on other botbrawl crates:
//!
//! - Identity types (AgentId, BattleId, PoolId, etc.)
//! - Arena kinds and contest sides
//! - The shared error taxonomy and its status mapping
//! - Engine configuration

pub mod arena;
pub mod config;
pub mod error;
pub mod identity;

pub use arena::*;
pub use config::*;
pub use error::*;
pub use identity::*;
