//! CLI commands

pub mod budget;
pub mod compress;
