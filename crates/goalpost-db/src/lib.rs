//! Persistence layer for goalpost: connection config, pool, migrations,
//! row models, and per-table query functions.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
