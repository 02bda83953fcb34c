//! Record id generation.
//!
//! Roles minted by the API use UUID v7: time-sortable and generated without
//! coordination, so ids created later compare greater.

use uuid::Uuid;

/// Generate a new record id.
pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}
