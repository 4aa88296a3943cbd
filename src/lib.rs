//! A single-node proof-of-work ledger.
//!
//! [`blockchain`] holds the ledger engine, [`api`] the actix-web adapter on top
//! of it and [`config`] the runtime settings.

pub mod api;
pub mod blockchain;
pub mod config;
