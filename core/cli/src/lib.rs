pub mod args;
pub mod cli;
pub mod commands;
pub mod config;
mod utils;
