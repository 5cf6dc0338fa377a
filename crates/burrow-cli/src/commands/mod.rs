//! CLI subcommand implementations.

pub mod status;
pub mod stop;
pub mod up;
