pub mod config;
pub mod error;
pub mod parser;
pub mod scheduler;

pub use config::{ScrapeConfig, ScrapeConfigBuilder};
pub use error::{ConfigError, Result};
pub use parser::{discover_config, parse_config_from_file, parse_config_from_str, DEFAULT_CONFIG_PATHS};
pub use scheduler::{Scheduler, SchedulerState, SweepReport};
