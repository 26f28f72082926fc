pub mod base_connection;
pub mod connection_config;
pub mod error;
pub mod update_channel;
