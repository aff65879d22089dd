pub mod cli;
pub mod config;
pub mod engine;
pub mod feed;
pub mod logging;
pub mod types;
