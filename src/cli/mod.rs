//! CLI subcommand implementations for the forage binary.

pub mod acquire_cmd;
pub mod doctor;
pub mod serve;
