//! Records consumed by the permission resolver.
//!
//! These are plain data shapes. The storage layer produces them and the resolver
//! reads them; neither side depends on the other's representation.

pub mod channel;
pub mod member;
pub mod role;

pub use channel::*;
pub use member::*;
pub use role::*;
