//! CLI command implementations

pub mod config;
pub mod run;
pub mod stage_all;
pub mod start;
pub mod status;
pub mod stop;
pub mod toggle;
