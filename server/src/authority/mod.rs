pub mod authority;
pub mod authority_config;
mod handler;
