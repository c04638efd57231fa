//! CLI commands.

pub mod render;
