//! Tracing setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `debug`, `causenet_store=debug`).
pub const LOG_ENV: &str = "CAUSENET_LOG";

/// Install a stderr subscriber filtered by `CAUSENET_LOG` (default `info`).
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
