//! # hearth-common
//!
//! Permission taxonomy, the records the resolver reads, the resolver itself, and
//! the shared primitives (config, errors, validation) every Hearth crate uses.
//! No I/O lives here.

pub mod auth;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod models;
pub mod overrides;
pub mod permissions;
pub mod resolver;
pub mod snowflake;
pub mod validation;
