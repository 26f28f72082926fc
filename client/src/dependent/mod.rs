pub mod dependent;
pub mod dependent_config;
mod handler;
