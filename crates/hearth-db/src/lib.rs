//! # hearth-db
//!
//! Record storage for Hearth. The API depends only on the [`store`] traits;
//! two backends implement them:
//! - **PostgreSQL** ([`postgres::PgStore`]) for deployments
//! - **In-memory** ([`memory::MemoryStore`]) for tests, local runs and fixtures

pub mod fixture;
pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{RecordReader, RecordStore, RecordWriter};
