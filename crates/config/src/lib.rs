// Configuration loading

pub mod settings;

pub use settings::{ConfigError, DatabaseSettings, LookupSettings, OutputSettings, Settings};
