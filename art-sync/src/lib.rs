#![doc = "art-sync: CLI and vendor transport for the artwork sync service."]

//! The binary crate wires the core reconciliation library to the outside
//! world: command-line parsing, environment loading, the concrete vendor
//! websocket client, and the solar preview output. All sync logic lives in
//! `art-sync-core`.

pub mod cli;
pub mod client;
pub mod solar_preview;
