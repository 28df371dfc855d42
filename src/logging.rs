//! Diagnostic logging to stderr.
//!
//! `RUST_LOG` wins when set. Otherwise only warnings and errors are shown
//! until debugging is turned on, from the command line before the config
//! is read or from the config file afterwards.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

const DEFAULT_LEVEL: &str = "warn";
const DEBUG_LEVEL: &str = "debug";

/// Handle for raising the log level once the configuration is known.
pub struct Logging {
    filter: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

/// Install the global subscriber.
pub fn init_logging(debug: bool) -> Result<Logging> {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (
            EnvFilter::new(if debug { DEBUG_LEVEL } else { DEFAULT_LEVEL }),
            false,
        ),
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).without_time())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    Ok(Logging {
        filter: handle,
        from_env,
    })
}

impl Logging {
    pub fn enable_debug(&self) -> Result<()> {
        if self.from_env {
            return Ok(());
        }
        self.filter
            .reload(EnvFilter::new(DEBUG_LEVEL))
            .map_err(|e| anyhow::anyhow!("failed to change log level: {e}"))
    }
}
