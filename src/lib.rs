// Library exports for talaan.
// Integration tests drive the engine and the router through these modules.

pub mod accounts;
pub mod actor;
pub mod auth;
pub mod blog;
pub mod clock;
pub mod comments;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod features;
pub mod kv;
pub mod persistence;
pub mod routes;
pub mod search;
pub mod share;
pub mod state;
pub mod statistics;
pub mod sysconf;
