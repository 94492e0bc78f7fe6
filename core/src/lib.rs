//! adsim-core: deterministic synthetic campaign metrics, plus the
//! command and manifest pipeline that seeds and verifies a tenant.
//!
//! Leaf-first: rng → simulation → scenario/fixture/dataset → store →
//! commands → verification → pipeline.

pub mod command;
pub mod commands;
pub mod config;
pub mod context;
pub mod dataset;
pub mod error;
pub mod fixture;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod rng;
pub mod scenario;
pub mod simulation;
pub mod store;
pub mod types;
pub mod verification;
