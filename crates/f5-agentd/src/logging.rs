// Logging setup with a level that can be changed at runtime

use anyhow::Result;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, fmt, reload};

/// Handle to the installed level filter
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<LevelFilter, Registry>,
}

impl LogHandle {
    /// Replace the active level filter
    pub fn set_level(&self, level: LevelFilter) -> Result<()> {
        let previous = self.handle.clone_current();
        self.handle
            .reload(level)
            .map_err(|e| anyhow::anyhow!("Failed to reload log level: {}", e))?;
        if previous != Some(level) {
            tracing::info!("Log level set to {}", level);
        }
        Ok(())
    }
}

/// Install the global subscriber
pub fn init(level: LevelFilter) -> Result<LogHandle> {
    let (filter, handle) = reload::Layer::new(level);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    Ok(LogHandle { handle })
}
