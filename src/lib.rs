// ABOUTME: Library module for schemafetcher
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod export;
pub mod process;
pub mod utils;
