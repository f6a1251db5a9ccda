pub mod cli;
pub mod drive;
pub mod load_config;
pub mod mail;
pub mod mirror;
pub mod server;

pub use cli::{run, Cli, Commands};
