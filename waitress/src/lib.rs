pub mod cli;
pub mod crm;
pub mod load_config;
pub mod logging;

pub use cli::{run, Cli};
