//! API route modules.

pub mod health;
pub mod members;
pub mod overrides;
pub mod permissions;
pub mod roles;
