#![doc = "art-sync-core: core logic library for art-sync."]

//! This crate contains the reconciliation, state-tracking, brightness and
//! scheduling logic for mirroring a local artwork directory onto networked
//! art-mode displays. The vendor transport is not included here; it plugs in
//! through the capability traits in [`contract`].
//!
//! # Usage
//! Add this as a dependency for all shared reconciliation, config, mapping
//! and scheduling code. Device behavior is substituted with mocks in tests
//! via the `test-export-mocks` feature.

pub mod artwork;
pub mod brightness;
pub mod config;
pub mod contract;
pub mod fleet;
pub mod mapping;
pub mod reconcile;
pub mod schedule;
