//! Database module for dbstore
//!
//! This module handles connections and the gateway they are reached through.

pub mod connection;
pub mod database;
pub mod gateway;
pub mod scripted;

// Re-export key types
pub use connection::MySqlGateway;
pub use database::Database;
pub use gateway::{ConnectionGateway, DriverType, Params, Row};
pub use scripted::{LoggedStatement, ScriptedGateway};
