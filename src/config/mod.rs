//! Configuration and CLI handling

pub mod cli;
pub mod settings;

pub use cli::{Cli, ProbeBackend};
pub use settings::Settings;
