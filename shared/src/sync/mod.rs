pub mod change;
pub mod coordinator;
pub mod error;
pub mod fetch_queue;
pub mod handler;
pub mod shadow_records;
