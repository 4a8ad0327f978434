// Logging setup for the binary. The library only uses the `log` facade.

use env_logger::{Builder, Env};

use crate::config::Config;

/// Install env_logger with the config's level as the default filter.
/// `RUST_LOG` still wins when set. Safe to call more than once.
pub fn init(config: &Config) {
    let env = Env::default().default_filter_or(config.debug.log_level.as_str());
    let _ = Builder::from_env(env).format_timestamp_millis().try_init();
}
