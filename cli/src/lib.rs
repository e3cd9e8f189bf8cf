//! A3S Store CLI - manage manifest lists in the local store.

pub mod commands;
pub mod output;
