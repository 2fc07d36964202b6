pub mod config;
pub mod discovery;
