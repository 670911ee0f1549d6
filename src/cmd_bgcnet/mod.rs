//! Subcommand modules for the `bgcnet` binary.

pub mod classify;
pub mod filter;
pub mod network;
pub mod pair;
